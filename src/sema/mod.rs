// src/sema/mod.rs
pub mod builtins;
pub mod checker;
mod expr;
pub mod generic;
pub mod type_arena;
pub mod typed;

pub use builtins::{BasicType, BuiltinSet};
pub use checker::Checker;
pub use generic::{MethodSpecKey, SpecKey};
pub use type_arena::{
    BodyState, FieldDef, Leaf, MethodDef, MethodKind, TypeArena, TypeDef, TypeDefKind, TypeId,
};
pub use typed::{ConstValue, LValue, TypedExpr, TypedExprKind, TypedFile, TypedProgram};
