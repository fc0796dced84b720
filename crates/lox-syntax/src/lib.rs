pub mod ast;
pub mod lexer;
pub mod parser;

use lox_common::error::{Error, ErrorS, SyntaxError};

use crate::ast::Program;
use crate::parser::Parser;

/// Parses a complete program. Syntax errors are collected rather than
/// returned early; the program contains every statement that parsed cleanly.
pub fn parse(source: &str) -> (Program, Vec<ErrorS>) {
    Parser::new(source).parse()
}

/// Whether `source` can be run as-is, or is cut off in the middle of a
/// statement, block or string and needs more input.
pub fn is_complete(source: &str) -> bool {
    let (_, errors) = parse(source);
    !errors.iter().any(|(e, _)| {
        matches!(
            e,
            Error::SyntaxError(SyntaxError::UnrecognizedEOF { .. } | SyntaxError::UnterminatedString)
        )
    })
}
