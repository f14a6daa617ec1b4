//! Rule expression parser
//!
//! Grammar (left-associative, no precedence between AND and OR):
//!
//! ```text
//! Expression := Term { ( AND | OR ) Term }
//! Term       := Condition | "(" Expression ")"
//! ```

use crate::config::EngineConfig;
use crate::error::{Result, RuleError};
use crate::rule::ast::{AstNode, LogicalOperator};
use crate::rule::lexer::{tokenize, Lexeme, Token};

/// Parse a rule string into an AST using default limits
pub fn parse(rule: &str) -> Result<AstNode> {
    parse_with_config(rule, &EngineConfig::default())
}

/// Parse a rule string into an AST, enforcing the config's length, condition and nesting limits
pub fn parse_with_config(rule: &str, config: &EngineConfig) -> Result<AstNode> {
    if rule.len() > config.max_rule_length {
        return Err(RuleError::parse(
            format!(
                "rule is {} bytes, longer than the {} byte limit",
                rule.len(),
                config.max_rule_length
            ),
            config.max_rule_length,
        ));
    }

    let tokens = tokenize(rule)?;
    let mut conditions = tokens
        .iter()
        .filter(|t| matches!(t.lexeme, Lexeme::Condition(_)));
    if let Some(extra) = conditions.nth(config.max_conditions) {
        return Err(RuleError::parse(
            format!("rule has more than {} conditions", config.max_conditions),
            extra.position,
        ));
    }

    Parser::new(&tokens, rule.len())
        .with_max_depth(config.max_nesting_depth)
        .parse()
}

/// Recursive-descent parser over an immutable token slice
pub struct Parser<'a> {
    tokens: &'a [Token],
    cursor: usize,
    end: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    /// `end` is the position reported for errors at end of input
    pub fn new(tokens: &'a [Token], end: usize) -> Self {
        Self {
            tokens,
            cursor: 0,
            end,
            depth: 0,
            max_depth: EngineConfig::default().max_nesting_depth,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Parse the whole token slice as one expression
    pub fn parse(mut self) -> Result<AstNode> {
        if self.tokens.is_empty() {
            return Err(RuleError::parse("empty expression", 0));
        }

        let ast = self.parse_expression()?;

        match self.peek() {
            None => Ok(ast),
            Some(token) => Err(self.unexpected_after_term(token)),
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.cursor)
    }

    fn parse_expression(&mut self) -> Result<AstNode> {
        let mut node = self.parse_term(None)?;

        while let Some(op) = self.peek().and_then(|t| connective(&t.lexeme)) {
            self.cursor += 1;
            let right = self.parse_term(Some(op))?;
            node = AstNode::logical(op, node, right);
        }

        Ok(node)
    }

    /// `after` is the connective just consumed, if any
    fn parse_term(&mut self, after: Option<LogicalOperator>) -> Result<AstNode> {
        let Some(token) = self.peek() else {
            return Err(match after {
                Some(op) => RuleError::parse(format!("missing right operand for {}", op), self.end),
                None => RuleError::parse("unexpected end of input", self.end),
            });
        };

        match &token.lexeme {
            Lexeme::Condition(cond) => {
                self.cursor += 1;
                Ok(AstNode::Condition(cond.clone()))
            }
            Lexeme::OpenParen => self.parse_group(token.position),
            Lexeme::And | Lexeme::Or | Lexeme::CloseParen => Err(match after {
                Some(op) => {
                    RuleError::parse(format!("missing right operand for {}", op), token.position)
                }
                None if token.lexeme == Lexeme::CloseParen => {
                    RuleError::parse("unmatched ')'", token.position)
                }
                None => RuleError::parse(
                    format!("missing left operand for {}", token.lexeme.describe()),
                    token.position,
                ),
            }),
        }
    }

    fn parse_group(&mut self, open: usize) -> Result<AstNode> {
        if self.depth >= self.max_depth {
            return Err(RuleError::parse(
                format!("parentheses nested deeper than {}", self.max_depth),
                open,
            ));
        }
        self.cursor += 1;

        match self.peek() {
            None => return Err(RuleError::parse("unmatched '('", open)),
            Some(token) if token.lexeme == Lexeme::CloseParen => {
                return Err(RuleError::parse("empty parentheses", open));
            }
            Some(_) => {}
        }

        self.depth += 1;
        let inner = self.parse_expression()?;
        self.depth -= 1;

        match self.peek() {
            Some(token) if token.lexeme == Lexeme::CloseParen => {
                self.cursor += 1;
                Ok(inner)
            }
            None => Err(RuleError::parse("unmatched '('", open)),
            Some(token) => Err(self.unexpected_after_term(token)),
        }
    }

    /// Error for a token that follows a complete term but is not a connective
    fn unexpected_after_term(&self, token: &Token) -> RuleError {
        match token.lexeme {
            Lexeme::CloseParen => RuleError::parse("unmatched ')'", token.position),
            _ => RuleError::parse(
                format!("expected AND or OR before {}", token.lexeme.describe()),
                token.position,
            ),
        }
    }
}

fn connective(lexeme: &Lexeme) -> Option<LogicalOperator> {
    match lexeme {
        Lexeme::And => Some(LogicalOperator::And),
        Lexeme::Or => Some(LogicalOperator::Or),
        _ => None,
    }
}
