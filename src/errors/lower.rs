// src/errors/lower.rs
//! Lowering errors (E4xxx).
//!
//! Internal variants indicate a compiler bug and carry a "please report"
//! marker; they are never silently recovered from.

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum LoweringError {
    #[error("const methods are compile-time only and cannot be called here")]
    #[diagnostic(code(E4001))]
    ConstMethodCall {
        #[label("call to a const method")]
        span: SourceSpan,
    },

    #[error("internal lowering error: {message}; this is a compiler bug, please report it")]
    #[diagnostic(code(E4900))]
    Internal {
        message: String,
        #[label("while lowering this expression")]
        span: SourceSpan,
    },
}
