// src/errors/resolver.rs
//! Name resolution errors (E2xxx).

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum ResolutionError {
    #[error("unknown type '{name}'")]
    #[diagnostic(code(E2001))]
    UnknownType {
        name: String,
        #[label("not found in scope")]
        span: SourceSpan,
    },

    #[error("imported file '{file}' does not exist")]
    #[diagnostic(code(E2002))]
    MissingImport {
        file: String,
        #[label("no such file")]
        span: SourceSpan,
    },

    #[error("unexpected 'super'")]
    #[diagnostic(
        code(E2003),
        help("'super' may only appear as the receiver of a method call")
    )]
    StraySuper {
        #[label("not a method-call receiver")]
        span: SourceSpan,
    },

    #[error("type indirection fulfilled twice; this is a compiler bug, please report it")]
    #[diagnostic(code(E2900))]
    DuplicateFulfillment {
        #[label("while resolving this definition")]
        span: SourceSpan,
    },
}
