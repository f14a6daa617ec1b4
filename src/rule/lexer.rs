//! Rule string tokenizer
//!
//! Splits a rule like `(age > 30 AND department = 'Sales') OR salary >= 50000`
//! into lexemes. Parentheses always stand alone; everything else is
//! whitespace-separated, and a condition spans exactly three words.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, RuleError};
use crate::rule::ast::{Comparator, Condition, Value};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

static INTEGER_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?[0-9]+$").expect("valid regex"));

static STRING_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^'([^']*)'$").expect("valid regex"));

/// A classified token
#[derive(Debug, Clone, PartialEq)]
pub enum Lexeme {
    OpenParen,
    CloseParen,
    And,
    Or,
    Condition(Arc<Condition>),
}

impl Lexeme {
    /// Short human-readable form for error messages
    pub fn describe(&self) -> String {
        match self {
            Lexeme::OpenParen => "'('".to_string(),
            Lexeme::CloseParen => "')'".to_string(),
            Lexeme::And => "AND".to_string(),
            Lexeme::Or => "OR".to_string(),
            Lexeme::Condition(cond) => format!("condition '{}'", cond),
        }
    }
}

/// Lexeme plus the byte offset of its first word in the input
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub lexeme: Lexeme,
    pub position: usize,
}

/// Tokenize a rule string into lexemes
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let words = split_words(input);
    let mut tokens = Vec::with_capacity(words.len());
    let mut i = 0;

    while i < words.len() {
        let (position, word) = words[i];
        let lexeme = match word {
            "(" => Lexeme::OpenParen,
            ")" => Lexeme::CloseParen,
            "AND" => Lexeme::And,
            "OR" => Lexeme::Or,
            _ => {
                let condition = read_condition(&words[i..])?;
                tokens.push(Token {
                    lexeme: Lexeme::Condition(Arc::new(condition)),
                    position,
                });
                i += 3;
                continue;
            }
        };
        tokens.push(Token { lexeme, position });
        i += 1;
    }

    Ok(tokens)
}

/// Split on whitespace, emitting each parenthesis as its own word
fn split_words(input: &str) -> Vec<(usize, &str)> {
    let mut words = Vec::new();
    let mut start: Option<usize> = None;

    for (i, c) in input.char_indices() {
        let is_paren = c == '(' || c == ')';
        if is_paren || c.is_whitespace() {
            if let Some(s) = start.take() {
                words.push((s, &input[s..i]));
            }
            if is_paren {
                words.push((i, &input[i..i + 1]));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }

    if let Some(s) = start {
        words.push((s, &input[s..]));
    }

    words
}

fn read_condition(words: &[(usize, &str)]) -> Result<Condition> {
    let (field_pos, field) = words[0];
    if !IDENTIFIER.is_match(field) {
        return Err(lex_error(field, field_pos, "unrecognized token"));
    }

    let Some(&(op_pos, op)) = words.get(1) else {
        return Err(lex_error(field, field_pos, "incomplete condition"));
    };
    let operator = Comparator::from_symbol(op)
        .ok_or_else(|| lex_error(op, op_pos, "expected comparator, found"))?;

    let Some(&(literal_pos, literal)) = words.get(2) else {
        return Err(lex_error(field, field_pos, "incomplete condition"));
    };
    let value = parse_literal(literal, literal_pos)?;

    Ok(Condition {
        field: field.to_string(),
        operator,
        value,
    })
}

fn parse_literal(word: &str, position: usize) -> Result<Value> {
    if INTEGER_LITERAL.is_match(word) {
        return word
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| lex_error(word, position, "integer literal out of range"));
    }

    if let Some(caps) = STRING_LITERAL.captures(word) {
        return Ok(Value::String(caps[1].to_string()));
    }

    Err(lex_error(word, position, "expected literal, found"))
}

/// Whether the rendered condition reads back as the same condition
///
/// The field must be an identifier other than a connective, and a string
/// value may not contain quotes, parentheses or whitespace.
pub fn is_expressible(cond: &Condition) -> bool {
    let field_ok = IDENTIFIER.is_match(&cond.field) && cond.field != "AND" && cond.field != "OR";
    let value_ok = match &cond.value {
        Value::Integer(_) => true,
        Value::String(s) => !s
            .chars()
            .any(|c| c == '\'' || c == '(' || c == ')' || c.is_whitespace()),
    };
    field_ok && value_ok
}

fn lex_error(token: &str, position: usize, reason: &'static str) -> RuleError {
    RuleError::Lex {
        token: token.to_string(),
        position,
        reason,
    }
}
