// src/sema/typed.rs
//
// The typed AST: every expression carries the TypeId its operations produce.

use crate::frontend::Span;
use crate::sema::type_arena::{TypeArena, TypeId};
use smallvec::SmallVec;

/// A compile-time constant
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Null,
}

/// A typed binding pattern. Bindings occupy consecutive local slots starting
/// at `index`; tuple patterns flatten onto the same layout as the bound
/// value, so the base index and type are all lowering needs.
#[derive(Debug, Clone)]
pub struct TypedPattern {
    pub index: u32,
    pub ty: TypeId,
    pub span: Span,
}

/// Where a captured value comes from at the lambda's construction site
#[derive(Debug, Clone, Copy)]
pub enum CaptureSource {
    /// A local slot of the constructing frame
    Local(u32),
    /// A capture field of the enclosing closure (nested lambdas capture
    /// through their parent)
    EnclosingField { owner: TypeId, field: u32 },
}

/// A captured variable of a lambda
#[derive(Debug, Clone)]
pub struct Capture {
    pub source: CaptureSource,
    pub ty: TypeId,
}

/// An assignable place
#[derive(Debug, Clone)]
pub enum LValue {
    /// A local (possibly a field path within a plural local)
    Local {
        index: u32,
        ty: TypeId,
        path: SmallVec<[u32; 4]>,
    },
    /// A field path rooted at a reference-typed receiver; the path indices
    /// are relative to `owner`, the type declaring the first field
    Field {
        receiver: Box<TypedExpr>,
        owner: TypeId,
        path: SmallVec<[u32; 4]>,
    },
    /// A field path rooted at a static field
    Static {
        owner: TypeId,
        field: u32,
        path: SmallVec<[u32; 4]>,
    },
}

#[derive(Debug, Clone)]
pub struct TypedExpr {
    pub kind: TypedExprKind,
    pub ty: TypeId,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypedExprKind {
    Literal(ConstValue),
    Import(String),
    Variable {
        index: u32,
    },
    FieldAccess {
        receiver: Box<TypedExpr>,
        /// The type that declares the field (a supertype of the receiver's
        /// type when the field is inherited)
        owner: TypeId,
        field: u32,
    },
    StaticField {
        owner: TypeId,
        field: u32,
    },
    /// Any method call; the invocation shape is derived from the owner's
    /// definition at lowering time
    Call {
        receiver: Option<Box<TypedExpr>>,
        owner: TypeId,
        method: u32,
        args: Vec<TypedExpr>,
    },
    SuperCall {
        /// The supertype that owns the target method
        owner: TypeId,
        method: u32,
        args: Vec<TypedExpr>,
    },
    Constructor {
        class: TypeId,
        /// `None` calls the default host constructor
        method: Option<u32>,
        args: Vec<TypedExpr>,
    },
    /// Raw struct construction; also covers tuple literals
    RawStruct {
        args: Vec<TypedExpr>,
    },
    Lambda {
        impl_ty: TypeId,
        captures: Vec<Capture>,
    },
    Declaration {
        pattern: TypedPattern,
        value: Box<TypedExpr>,
    },
    Assignment {
        target: LValue,
        value: Box<TypedExpr>,
    },
    Return(Option<Box<TypedExpr>>),
    If {
        condition: Box<TypedExpr>,
        then_branch: Box<TypedExpr>,
        else_branch: Option<Box<TypedExpr>>,
    },
    While {
        condition: Box<TypedExpr>,
        body: Box<TypedExpr>,
    },
    Block {
        exprs: Vec<TypedExpr>,
        /// Whether the final expression's value is the block's value (false
        /// when a type definition closes the block)
        trailing: bool,
    },
}

/// A type-checked source file: its top-level expressions in order
#[derive(Debug)]
pub struct TypedFile {
    pub exprs: Vec<TypedExpr>,
    pub max_locals: u32,
}

/// Output of the typing pass
#[derive(Debug)]
pub struct TypedProgram {
    pub arena: TypeArena,
    /// Files in resolution order (imports before importers)
    pub files: Vec<(String, TypedFile)>,
    pub entry: String,
}
