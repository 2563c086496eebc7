// src/errors/reflect.rs
//! Host-reflection bridge errors (E5xxx).
//!
//! These are raised while validating the host-class registry at compiler
//! start-up and are fatal; they carry no source span because no user source
//! is involved.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum ReflectError {
    #[error("host class '{name}' has type parameters but does not acknowledge generic erasure")]
    #[diagnostic(code(E5001))]
    UnacknowledgedGenerics { name: String },

    #[error("singleton host class '{name}' has no object index")]
    #[diagnostic(code(E5002))]
    SingletonWithoutObjectIndex { name: String },

    #[error("host class '{name}' carries an object index but is not a singleton")]
    #[diagnostic(code(E5003))]
    ObjectIndexWithoutSingleton { name: String },

    #[error("singleton host class '{name}' exposes fields, which is not supported")]
    #[diagnostic(code(E5004))]
    SingletonWithFields { name: String },

    #[error("two host classes share the Snuggle name '{name}'")]
    #[diagnostic(code(E5005))]
    DuplicateClassName { name: String },
}
