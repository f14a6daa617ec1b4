//! Rule expression engine
//!
//! Tokenizes rule strings like "age > 30 AND department = 'Sales'", parses
//! them into an AST, combines several rules into one expression and
//! evaluates the result against attribute records.

mod ast;
pub mod combiner;
mod evaluator;
pub mod lexer;
pub mod parser;


pub use ast::*;
pub use combiner::*;
pub use evaluator::*;
pub use lexer::*;
pub use parser::*;
