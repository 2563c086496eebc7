// src/resolver/ast.rs
//
// The resolved AST: every identifier that names a type has been replaced by
// a DefId handle into the definition arena. Forward and cyclic references go
// through arena slots that are allocated unfulfilled (indirections) and
// fulfilled exactly once.

use crate::errors::ResolutionError;
use crate::frontend::{Span, Symbol};
use crate::sema::builtins::BasicType;
use std::rc::Rc;

/// Handle to a resolved type definition in the `DefArena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefId(pub u32);

/// A resolved type reference. Generic parameters keep their declaration
/// index so the type checker can substitute concrete arguments later.
#[derive(Debug, Clone)]
pub enum ResolvedType {
    /// Reference to a definition, possibly applied to generic arguments
    Def { def: DefId, args: Vec<ResolvedType> },
    /// Type parameter of the enclosing type definition
    TypeGeneric { index: usize, name: Symbol },
    /// Type parameter of the enclosing method
    MethodGeneric { index: usize, name: Symbol },
    /// Tuple type; the empty tuple is unit
    Tuple(Vec<ResolvedType>),
    /// Function (closure) type
    Func {
        params: Vec<ResolvedType>,
        ret: Box<ResolvedType>,
    },
}

impl ResolvedType {
    pub fn unit() -> Self {
        ResolvedType::Tuple(Vec::new())
    }
}

/// Write-once arena of resolved type definitions.
///
/// A slot is allocated (unfulfilled) during the pre-declaration phase and
/// fulfilled exactly once during in-order resolution; fulfilling twice is a
/// compiler bug surfaced as E2900.
#[derive(Debug, Default)]
pub struct DefArena {
    slots: Vec<Option<ResolvedTypeDef>>,
}

impl DefArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an unfulfilled slot (an indirection)
    pub fn alloc(&mut self) -> DefId {
        let id = DefId(self.slots.len() as u32);
        self.slots.push(None);
        id
    }

    /// Allocate and immediately fulfill; used for the builtin set
    pub fn insert(&mut self, def: ResolvedTypeDef) -> DefId {
        let id = DefId(self.slots.len() as u32);
        self.slots.push(Some(def));
        id
    }

    /// Fulfill an indirection exactly once
    pub fn fulfill(
        &mut self,
        id: DefId,
        def: ResolvedTypeDef,
        span: Span,
    ) -> Result<(), ResolutionError> {
        let slot = &mut self.slots[id.0 as usize];
        if slot.is_some() {
            return Err(ResolutionError::DuplicateFulfillment { span: span.into() });
        }
        *slot = Some(def);
        Ok(())
    }

    pub fn get(&self, id: DefId) -> Option<&ResolvedTypeDef> {
        self.slots[id.0 as usize].as_ref()
    }

    pub fn is_fulfilled(&self, id: DefId) -> bool {
        self.slots[id.0 as usize].is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// True when every allocated slot has been fulfilled
    pub fn all_fulfilled(&self) -> bool {
        self.slots.iter().all(|s| s.is_some())
    }
}

/// A fulfilled type definition
#[derive(Debug)]
pub enum ResolvedTypeDef {
    /// Provided at resolution entry (bool, int widths, option, ...)
    Builtin(BasicType),
    /// Bridge to a host class; the index points into the `HostRegistry`
    Reflected(usize),
    Class(ResolvedClass),
    Struct(ResolvedStruct),
    Enum(ResolvedEnum),
    Alias(ResolvedType),
}

#[derive(Debug)]
pub struct ResolvedClass {
    pub name: Symbol,
    pub generics: Vec<Symbol>,
    pub supertype: Option<ResolvedType>,
    pub fields: Vec<ResolvedField>,
    pub methods: Vec<ResolvedMethod>,
    pub span: Span,
}

#[derive(Debug)]
pub struct ResolvedStruct {
    pub name: Symbol,
    pub generics: Vec<Symbol>,
    pub fields: Vec<ResolvedField>,
    pub methods: Vec<ResolvedMethod>,
    pub span: Span,
}

#[derive(Debug)]
pub struct ResolvedEnum {
    pub name: Symbol,
    pub variants: Vec<Symbol>,
    pub span: Span,
}

#[derive(Debug)]
pub struct ResolvedField {
    pub public: bool,
    pub is_static: bool,
    pub name: Symbol,
    pub ty: ResolvedType,
    pub span: Span,
}

#[derive(Debug)]
pub struct ResolvedMethod {
    pub public: bool,
    pub is_static: bool,
    pub is_const: bool,
    pub name: Symbol,
    pub generics: Vec<Symbol>,
    pub params: Vec<ResolvedPattern>,
    pub return_type: ResolvedType,
    pub body: Rc<ResolvedExpr>,
    pub span: Span,
}

/// Methods added to an existing type through an impl block
#[derive(Debug)]
pub struct ResolvedImpl {
    pub target: DefId,
    pub methods: Vec<ResolvedMethod>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ResolvedPattern {
    pub kind: ResolvedPatternKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ResolvedPatternKind {
    Binding(Symbol),
    Typed(Box<ResolvedPattern>, ResolvedType),
    Tuple(Vec<ResolvedPattern>),
}

impl ResolvedPattern {
    /// Collect binding names left to right
    pub fn bindings(&self, out: &mut Vec<Symbol>) {
        match &self.kind {
            ResolvedPatternKind::Binding(name) => out.push(*name),
            ResolvedPatternKind::Typed(inner, _) => inner.bindings(out),
            ResolvedPatternKind::Tuple(parts) => {
                for p in parts {
                    p.bindings(out);
                }
            }
        }
    }

    /// The declared type, when the pattern carries one at its root
    pub fn declared_type(&self) -> Option<&ResolvedType> {
        match &self.kind {
            ResolvedPatternKind::Typed(_, ty) => Some(ty),
            _ => None,
        }
    }
}

/// One element of a resolved block
#[derive(Debug, Clone)]
pub enum ResolvedElement {
    /// The definition lives in the arena; the handle is kept so the type
    /// checker can instantiate non-generic definitions eagerly
    TypeDef(DefId),
    Expr(ResolvedExpr),
}

#[derive(Debug, Clone)]
pub struct ResolvedExpr {
    pub kind: ResolvedExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ResolvedExprKind {
    Block(Vec<ResolvedElement>),
    Import(String),
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),
    BoolLiteral(bool),
    Variable(Symbol),
    FieldAccess {
        receiver: Box<ResolvedExpr>,
        name: Symbol,
    },
    /// Field access whose receiver named a type in scope
    StaticFieldAccess {
        ty: ResolvedType,
        name: Symbol,
    },
    MethodCall {
        receiver: Box<ResolvedExpr>,
        name: Symbol,
        generic_args: Vec<ResolvedType>,
        args: Vec<ResolvedExpr>,
    },
    /// Method call whose receiver named a type in scope
    StaticMethodCall {
        ty: ResolvedType,
        name: Symbol,
        generic_args: Vec<ResolvedType>,
        args: Vec<ResolvedExpr>,
    },
    SuperCall {
        name: Symbol,
        args: Vec<ResolvedExpr>,
    },
    ConstructorCall {
        ty: ResolvedType,
        args: Vec<ResolvedExpr>,
    },
    RawStructConstructor {
        ty: ResolvedType,
        args: Vec<ResolvedExpr>,
    },
    Tuple(Vec<ResolvedExpr>),
    Lambda {
        params: Vec<ResolvedPattern>,
        return_type: Option<ResolvedType>,
        body: Rc<ResolvedExpr>,
    },
    Declaration {
        pattern: ResolvedPattern,
        value: Box<ResolvedExpr>,
    },
    Assignment {
        target: Box<ResolvedExpr>,
        value: Box<ResolvedExpr>,
    },
    Return(Option<Box<ResolvedExpr>>),
    If {
        condition: Box<ResolvedExpr>,
        then_branch: Box<ResolvedExpr>,
        else_branch: Option<Box<ResolvedExpr>>,
    },
    While {
        condition: Box<ResolvedExpr>,
        body: Box<ResolvedExpr>,
    },
}

/// A fully resolved source file: its top-level block
#[derive(Debug)]
pub struct ResolvedFile {
    pub elements: Vec<ResolvedElement>,
}

/// Output of the resolution pass
#[derive(Debug)]
pub struct ResolvedProgram {
    pub arena: DefArena,
    /// Files in resolution-completion order (imports before importers)
    pub files: Vec<(String, ResolvedFile)>,
    pub impls: Vec<ResolvedImpl>,
    pub entry: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_slots_are_write_once() {
        let mut arena = DefArena::new();
        let id = arena.alloc();
        assert!(!arena.is_fulfilled(id));
        assert!(!arena.all_fulfilled());

        let def = ResolvedTypeDef::Enum(ResolvedEnum {
            name: Symbol(0),
            variants: vec![],
            span: Span::default(),
        });
        arena.fulfill(id, def, Span::default()).unwrap();
        assert!(arena.is_fulfilled(id));
        assert!(arena.all_fulfilled());

        let again = ResolvedTypeDef::Enum(ResolvedEnum {
            name: Symbol(0),
            variants: vec![],
            span: Span::default(),
        });
        assert!(arena.fulfill(id, again, Span::default()).is_err());
    }
}
