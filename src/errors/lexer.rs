// src/errors/lexer.rs
//! Lexer errors (E0xxx).

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum LexerError {
    #[error("unexpected character '{character}'")]
    #[diagnostic(code(E0001))]
    UnexpectedCharacter {
        character: char,
        #[label("not valid here")]
        span: SourceSpan,
    },

    #[error("unterminated string literal")]
    #[diagnostic(code(E0002))]
    UnterminatedString {
        #[label("string starts here")]
        span: SourceSpan,
    },

    #[error("invalid number literal '{literal}'")]
    #[diagnostic(code(E0003))]
    InvalidNumber {
        literal: String,
        #[label("cannot be parsed")]
        span: SourceSpan,
    },
}
