// src/errors/sema.rs
//! Type checking errors (E3xxx).

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum TypingError {
    #[error("expected {expected}, found {found}")]
    #[diagnostic(code(E3001))]
    TypeMismatch {
        expected: String,
        found: String,
        #[label("type mismatch")]
        span: SourceSpan,
    },

    #[error("undefined variable '{name}'")]
    #[diagnostic(code(E3002))]
    UndefinedVariable {
        name: String,
        #[label("not found in scope")]
        span: SourceSpan,
    },

    #[error("type '{ty}' has no field '{name}'")]
    #[diagnostic(code(E3003))]
    UnknownField {
        ty: String,
        name: String,
        #[label("unknown field")]
        span: SourceSpan,
    },

    #[error("type '{ty}' has no method '{name}' matching these arguments")]
    #[diagnostic(code(E3004))]
    UnknownMethod {
        ty: String,
        name: String,
        #[label("no matching method")]
        span: SourceSpan,
    },

    #[error("expected {expected} arguments, found {found}")]
    #[diagnostic(code(E3005))]
    WrongArgumentCount {
        expected: usize,
        found: usize,
        #[label("wrong number of arguments")]
        span: SourceSpan,
    },

    #[error("expected {expected} generic arguments, found {found}")]
    #[diagnostic(code(E3006))]
    WrongGenericArgumentCount {
        expected: usize,
        found: usize,
        #[label("wrong number of generic arguments")]
        span: SourceSpan,
    },

    #[error("fallible patterns are not yet supported")]
    #[diagnostic(code(E3007))]
    FalliblePattern {
        #[label("this pattern may fail to match")]
        span: SourceSpan,
    },

    #[error("'new' requires a class, but '{ty}' is not one")]
    #[diagnostic(code(E3008))]
    ConstructorOnNonClass {
        ty: String,
        #[label("not a class")]
        span: SourceSpan,
    },

    #[error("'{ty}' is not a struct")]
    #[diagnostic(code(E3009))]
    RawConstructorOnNonStruct {
        ty: String,
        #[label("not a struct")]
        span: SourceSpan,
    },

    #[error("condition must be bool, found {found}")]
    #[diagnostic(code(E3010))]
    ConditionNotBool {
        found: String,
        #[label("expected bool")]
        span: SourceSpan,
    },

    #[error("parameter needs a type annotation")]
    #[diagnostic(code(E3011))]
    UntypedParameter {
        #[label("add ': Type'")]
        span: SourceSpan,
    },

    #[error("value type '{ty}' contains itself")]
    #[diagnostic(
        code(E3012),
        help("a struct laid out inline cannot contain a field of its own type")
    )]
    InfiniteValueType {
        ty: String,
        #[label("recursive layout")]
        span: SourceSpan,
    },

    #[error("type alias cycle through '{name}'")]
    #[diagnostic(code(E3013))]
    AliasCycle {
        name: String,
        #[label("alias refers back to itself")]
        span: SourceSpan,
    },

    #[error("'super' requires a supertype, but '{ty}' has none")]
    #[diagnostic(code(E3014))]
    SuperWithoutSupertype {
        ty: String,
        #[label("no supertype")]
        span: SourceSpan,
    },

    #[error("generic host class '{name}' is not usable")]
    #[diagnostic(
        code(E3015),
        help("the host class must acknowledge generic erasure to be bridged")
    )]
    UnacknowledgedReflectedGenerics {
        name: String,
        #[label("generic host class")]
        span: SourceSpan,
    },

    #[error("cannot assign to this expression")]
    #[diagnostic(code(E3016))]
    InvalidAssignmentTarget {
        #[label("not an assignable place")]
        span: SourceSpan,
    },
}
