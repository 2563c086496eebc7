// src/errors/parser.rs
//! Parser errors (E1xxx).

use crate::errors::LexerError;
use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum ParserError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lex(#[from] LexerError),

    #[error("unexpected {found}")]
    #[diagnostic(code(E1001))]
    UnexpectedToken {
        found: String,
        #[label("{message}")]
        span: SourceSpan,
        message: String,
    },

    #[error("expected {expected}, found {found}")]
    #[diagnostic(code(E1002))]
    ExpectedToken {
        expected: String,
        found: String,
        #[label("expected {expected}")]
        span: SourceSpan,
    },

    #[error("unexpected 'super'")]
    #[diagnostic(
        code(E1003),
        help("'super' may only appear as the receiver of a method call")
    )]
    UnexpectedSuper {
        #[label("not a method-call receiver")]
        span: SourceSpan,
    },
}
