// src/errors/mod.rs
//! Structured error reporting for the Snuggle compiler.
//!
//! Each pass has its own diagnostic enum; codes are partitioned by pass
//! (E0xxx lexer, E1xxx parser, E2xxx resolution, E3xxx typing, E4xxx
//! lowering, E5xxx reflection bridge).

pub mod lexer;
pub mod lower;
pub mod parser;
pub mod reflect;
pub mod resolver;
pub mod sema;

pub use lexer::LexerError;
pub use lower::LoweringError;
pub use parser::ParserError;
pub use reflect::ReflectError;
pub use resolver::ResolutionError;
pub use sema::TypingError;

use miette::Diagnostic;
use thiserror::Error;

/// Any error the compile pipeline can surface to the driver.
///
/// Emission stops at the first error that escapes a pass; there is no local
/// recovery.
#[derive(Error, Debug, Diagnostic)]
pub enum CompileError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParserError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolve(#[from] ResolutionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Type(#[from] TypingError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Lower(#[from] LoweringError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Reflect(#[from] ReflectError),
}
