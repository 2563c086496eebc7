// src/frontend/ast.rs

use crate::frontend::Span;

/// Unique identifier for symbols (interned strings)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(pub u32);

/// A parsed source file: an ordered block of type definitions and expressions
#[derive(Debug, Clone)]
pub struct File {
    pub elements: Vec<Element>,
    pub span: Span,
}

/// One element of a block. Blocks interleave expressions and type definitions,
/// and sibling type definitions may reference each other.
#[derive(Debug, Clone)]
pub enum Element {
    TypeDef(TypeDefDecl),
    Expr(Expr),
}

/// A type definition appearing in a block
#[derive(Debug, Clone)]
pub struct TypeDefDecl {
    pub kind: TypeDefDeclKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeDefDeclKind {
    Class(ClassDecl),
    Struct(StructDecl),
    Impl(ImplBlock),
    Enum(EnumDecl),
    Alias(AliasDecl),
}

impl TypeDefDecl {
    /// The defined name, if this definition introduces one (impl blocks don't)
    pub fn name(&self) -> Option<Symbol> {
        match &self.kind {
            TypeDefDeclKind::Class(c) => Some(c.name),
            TypeDefDeclKind::Struct(s) => Some(s.name),
            TypeDefDeclKind::Enum(e) => Some(e.name),
            TypeDefDeclKind::Alias(a) => Some(a.name),
            TypeDefDeclKind::Impl(_) => None,
        }
    }

    pub fn is_public(&self) -> bool {
        match &self.kind {
            TypeDefDeclKind::Class(c) => c.public,
            TypeDefDeclKind::Struct(s) => s.public,
            TypeDefDeclKind::Enum(e) => e.public,
            TypeDefDeclKind::Alias(a) => a.public,
            TypeDefDeclKind::Impl(_) => false,
        }
    }
}

/// Class declaration (reference type, nominal, single primary supertype)
#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub public: bool,
    pub name: Symbol,
    pub generics: Vec<Symbol>,
    pub supertype: Option<TypeExpr>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    pub span: Span,
}

/// Struct declaration (plural value type)
#[derive(Debug, Clone)]
pub struct StructDecl {
    pub public: bool,
    pub name: Symbol,
    pub generics: Vec<Symbol>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    pub span: Span,
}

/// Implementation block: impl Target { methods }
#[derive(Debug, Clone)]
pub struct ImplBlock {
    pub target: TypeExpr,
    pub methods: Vec<MethodDecl>,
    pub span: Span,
}

/// C-like enum declaration
#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub public: bool,
    pub name: Symbol,
    pub variants: Vec<Symbol>,
    pub span: Span,
}

/// Type alias: type Name = Target
#[derive(Debug, Clone)]
pub struct AliasDecl {
    pub public: bool,
    pub name: Symbol,
    pub target: TypeExpr,
    pub span: Span,
}

/// Field in a class or struct body
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub public: bool,
    pub is_static: bool,
    pub name: Symbol,
    pub ty: TypeExpr,
    pub span: Span,
}

/// Method in a type body or impl block
#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub public: bool,
    pub is_static: bool,
    pub is_const: bool,
    pub name: Symbol,
    pub generics: Vec<Symbol>,
    pub params: Vec<Pattern>,
    pub return_type: Option<TypeExpr>,
    pub body: Expr,
    pub span: Span,
}

/// Binding pattern: parameters and let declarations
#[derive(Debug, Clone)]
pub struct Pattern {
    pub kind: PatternKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum PatternKind {
    /// Single binding: x
    Binding(Symbol),
    /// Typed binding: pat: T
    Typed(Box<Pattern>, TypeExpr),
    /// Tuple binding: (a, b)
    Tuple(Vec<Pattern>),
}

/// A parsed (unresolved) type
#[derive(Debug, Clone)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeExprKind {
    /// Named type with optional generic arguments: Foo, Foo<A, B>
    Named(Symbol, Vec<TypeExpr>),
    /// Tuple type: (A, B); () is the unit type
    Tuple(Vec<TypeExpr>),
    /// Function type: fn(A, B): R
    Func(Vec<TypeExpr>, Option<Box<TypeExpr>>),
}

/// A parsed expression
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Block(Vec<Element>),
    Import(String),
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),
    BoolLiteral(bool),
    Variable(Symbol),
    FieldAccess {
        receiver: Box<Expr>,
        name: Symbol,
    },
    MethodCall {
        receiver: Box<Expr>,
        name: Symbol,
        generic_args: Vec<TypeExpr>,
        args: Vec<Expr>,
    },
    SuperCall {
        name: Symbol,
        args: Vec<Expr>,
    },
    /// new Type(args): run the class constructor
    ConstructorCall {
        ty: TypeExpr,
        args: Vec<Expr>,
    },
    /// new Type { e1, e2 }: build a struct value directly from field values
    RawStructConstructor {
        ty: TypeExpr,
        args: Vec<Expr>,
    },
    Tuple(Vec<Expr>),
    Lambda {
        params: Vec<Pattern>,
        return_type: Option<TypeExpr>,
        body: Box<Expr>,
    },
    Declaration {
        pattern: Pattern,
        value: Box<Expr>,
    },
    Assignment {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Return(Option<Box<Expr>>),
    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
    },
    While {
        condition: Box<Expr>,
        body: Box<Expr>,
    },
    Parenthesized(Box<Expr>),
    /// Bare `super`; only legal as the receiver of a method call
    Super,
}
