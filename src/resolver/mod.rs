// src/resolver/mod.rs
//
// Name resolution: maps type identifiers to DefId handles, discovers
// imported files, and builds indirections so that mutually referencing
// definitions resolve without ordering constraints.
//
// Block resolution runs in two phases over the block's own elements:
//   Phase A walks the children once and pre-declares an unfulfilled arena
//   slot for every type definition, so siblings can reference siblings.
//   Phase B walks again in order, resolving expressions (threading types
//   exposed by earlier siblings, e.g. imports) and fulfilling each
//   definition's slot exactly once.

pub mod ast;

pub use ast::{
    DefArena, DefId, ResolvedClass, ResolvedElement, ResolvedEnum, ResolvedExpr, ResolvedExprKind,
    ResolvedField, ResolvedFile, ResolvedImpl, ResolvedMethod, ResolvedPattern,
    ResolvedPatternKind, ResolvedProgram, ResolvedStruct, ResolvedType, ResolvedTypeDef,
};

use crate::errors::{CompileError, ResolutionError};
use crate::frontend::{Interner, Parser, Span, Symbol, ast as parsed};
use rustc_hash::{FxHashMap, FxHashSet};
use std::rc::Rc;
use tracing::debug;

/// Types and value bindings visible at a point in the program.
///
/// Value bindings are tracked so that a receiver identifier naming both a
/// local and a type resolves to the local; the type wins only when no local
/// binding shadows it.
#[derive(Debug, Clone, Default)]
struct Scope {
    types: FxHashMap<Symbol, DefId>,
    values: FxHashSet<Symbol>,
}

/// Generic parameters in scope while resolving a type definition body
#[derive(Debug, Clone, Copy, Default)]
struct GenericCtx<'g> {
    type_generics: &'g [Symbol],
    method_generics: &'g [Symbol],
}

pub struct Resolver<'a> {
    sources: &'a FxHashMap<String, String>,
    interner: &'a mut Interner,
    arena: DefArena,
    base_scope: Scope,
    impls: Vec<ResolvedImpl>,
    files: Vec<(String, ResolvedFile)>,
    /// File-public-members cache: the first import of a file computes its
    /// exposed types; later imports read from here.
    exports_cache: FxHashMap<String, Vec<(Symbol, DefId)>>,
    this_sym: Symbol,
}

impl<'a> Resolver<'a> {
    pub fn new(
        sources: &'a FxHashMap<String, String>,
        interner: &'a mut Interner,
        arena: DefArena,
        builtin_scope: &[(Symbol, DefId)],
    ) -> Self {
        let mut base_scope = Scope::default();
        for &(name, def) in builtin_scope {
            base_scope.types.insert(name, def);
        }
        let this_sym = interner.intern("this");
        Self {
            sources,
            interner,
            arena,
            base_scope,
            impls: Vec::new(),
            files: Vec::new(),
            exports_cache: FxHashMap::default(),
            this_sym,
        }
    }

    /// Resolve the entry file and everything it transitively imports
    pub fn resolve(mut self, entry: &str) -> Result<ResolvedProgram, CompileError> {
        self.resolve_file(entry, Span::default())?;
        debug_assert!(self.arena.all_fulfilled());
        Ok(ResolvedProgram {
            arena: self.arena,
            files: self.files,
            impls: self.impls,
            entry: entry.to_string(),
        })
    }

    fn resolve_file(&mut self, name: &str, import_span: Span) -> Result<(), CompileError> {
        if self.exports_cache.contains_key(name) {
            return Ok(());
        }
        let Some(source) = self.sources.get(name) else {
            return Err(ResolutionError::MissingImport {
                file: name.to_string(),
                span: import_span.into(),
            }
            .into());
        };
        let file = Parser::new(source, self.interner).parse_file()?;
        let mut scope = self.base_scope.clone();
        let ctx = GenericCtx::default();
        let elements = self.resolve_block(&file.elements, &mut scope, ctx, Some(name))?;
        debug!(file = name, types = self.arena.len(), "resolved file");
        self.files.push((name.to_string(), ResolvedFile { elements }));
        Ok(())
    }

    /// Two-phase resolution of one block. When `file` is given, the block is
    /// a file's top level and its public definitions are recorded in the
    /// export cache between the phases, which lets import cycles resolve.
    fn resolve_block(
        &mut self,
        elements: &[parsed::Element],
        scope: &mut Scope,
        ctx: GenericCtx,
        file: Option<&str>,
    ) -> Result<Vec<ResolvedElement>, CompileError> {
        // Phase A: pre-declare an indirection per type definition
        let mut slots: Vec<Option<DefId>> = Vec::with_capacity(elements.len());
        let mut exports = Vec::new();
        for element in elements {
            match element {
                parsed::Element::TypeDef(def) => {
                    if let Some(name) = def.name() {
                        let id = self.arena.alloc();
                        scope.types.insert(name, id);
                        if def.is_public() {
                            exports.push((name, id));
                        }
                        slots.push(Some(id));
                    } else {
                        slots.push(None); // impl block: no name to bind
                    }
                }
                parsed::Element::Expr(_) => slots.push(None),
            }
        }
        if let Some(name) = file {
            self.exports_cache.insert(name.to_string(), exports);
        }

        // Phase B: resolve in order, fulfilling each indirection once
        let mut out = Vec::with_capacity(elements.len());
        for (element, slot) in elements.iter().zip(slots) {
            match element {
                parsed::Element::TypeDef(def) => {
                    if let Some(resolved) = self.resolve_type_def(def, slot, scope, ctx)? {
                        out.push(ResolvedElement::TypeDef(resolved));
                    }
                }
                parsed::Element::Expr(expr) => {
                    out.push(ResolvedElement::Expr(self.resolve_expr(expr, scope, ctx)?));
                }
            }
        }
        Ok(out)
    }

    fn resolve_type_def(
        &mut self,
        def: &parsed::TypeDefDecl,
        slot: Option<DefId>,
        scope: &Scope,
        ctx: GenericCtx,
    ) -> Result<Option<DefId>, CompileError> {
        match &def.kind {
            parsed::TypeDefDeclKind::Class(class) => {
                let id = slot.expect("named definition without slot");
                let body_ctx = GenericCtx {
                    type_generics: &class.generics,
                    method_generics: &[],
                };
                let supertype = class
                    .supertype
                    .as_ref()
                    .map(|t| self.resolve_type(t, scope, body_ctx))
                    .transpose()?;
                let fields = self.resolve_fields(&class.fields, scope, body_ctx)?;
                let methods = self.resolve_methods(&class.methods, scope, &class.generics)?;
                let resolved = ResolvedTypeDef::Class(ResolvedClass {
                    name: class.name,
                    generics: class.generics.clone(),
                    supertype,
                    fields,
                    methods,
                    span: class.span,
                });
                self.arena.fulfill(id, resolved, def.span)?;
                Ok(Some(id))
            }
            parsed::TypeDefDeclKind::Struct(s) => {
                let id = slot.expect("named definition without slot");
                let body_ctx = GenericCtx {
                    type_generics: &s.generics,
                    method_generics: &[],
                };
                let fields = self.resolve_fields(&s.fields, scope, body_ctx)?;
                let methods = self.resolve_methods(&s.methods, scope, &s.generics)?;
                let resolved = ResolvedTypeDef::Struct(ResolvedStruct {
                    name: s.name,
                    generics: s.generics.clone(),
                    fields,
                    methods,
                    span: s.span,
                });
                self.arena.fulfill(id, resolved, def.span)?;
                Ok(Some(id))
            }
            parsed::TypeDefDeclKind::Enum(e) => {
                let id = slot.expect("named definition without slot");
                let resolved = ResolvedTypeDef::Enum(ResolvedEnum {
                    name: e.name,
                    variants: e.variants.clone(),
                    span: e.span,
                });
                self.arena.fulfill(id, resolved, def.span)?;
                Ok(Some(id))
            }
            parsed::TypeDefDeclKind::Alias(a) => {
                let id = slot.expect("named definition without slot");
                let target = self.resolve_type(&a.target, scope, ctx)?;
                self.arena
                    .fulfill(id, ResolvedTypeDef::Alias(target), def.span)?;
                Ok(Some(id))
            }
            parsed::TypeDefDeclKind::Impl(imp) => {
                let target = self.resolve_impl_target(&imp.target, scope)?;
                let methods = self.resolve_methods(&imp.methods, scope, &[])?;
                self.impls.push(ResolvedImpl {
                    target,
                    methods,
                    span: imp.span,
                });
                Ok(None)
            }
        }
    }

    /// An impl block targets a definition, not an instantiation; its methods
    /// apply to every specialization of that definition.
    fn resolve_impl_target(
        &mut self,
        target: &parsed::TypeExpr,
        scope: &Scope,
    ) -> Result<DefId, CompileError> {
        if let parsed::TypeExprKind::Named(name, args) = &target.kind {
            if args.is_empty() {
                if let Some(&def) = scope.types.get(name) {
                    return Ok(def);
                }
            }
        }
        Err(ResolutionError::UnknownType {
            name: self.type_expr_name(target),
            span: target.span.into(),
        }
        .into())
    }

    fn resolve_fields(
        &mut self,
        fields: &[parsed::FieldDecl],
        scope: &Scope,
        ctx: GenericCtx,
    ) -> Result<Vec<ResolvedField>, CompileError> {
        fields
            .iter()
            .map(|f| {
                Ok(ResolvedField {
                    public: f.public,
                    is_static: f.is_static,
                    name: f.name,
                    ty: self.resolve_type(&f.ty, scope, ctx)?,
                    span: f.span,
                })
            })
            .collect()
    }

    fn resolve_methods(
        &mut self,
        methods: &[parsed::MethodDecl],
        scope: &Scope,
        type_generics: &[Symbol],
    ) -> Result<Vec<ResolvedMethod>, CompileError> {
        methods
            .iter()
            .map(|m| self.resolve_method(m, scope, type_generics))
            .collect()
    }

    fn resolve_method(
        &mut self,
        m: &parsed::MethodDecl,
        scope: &Scope,
        type_generics: &[Symbol],
    ) -> Result<ResolvedMethod, CompileError> {
        let ctx = GenericCtx {
            type_generics,
            method_generics: &m.generics,
        };
        let params = m
            .params
            .iter()
            .map(|p| self.resolve_pattern(p, scope, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        let return_type = match &m.return_type {
            Some(t) => self.resolve_type(t, scope, ctx)?,
            None => ResolvedType::unit(),
        };

        let mut body_scope = scope.clone();
        if !m.is_static {
            body_scope.values.insert(self.this_sym);
        }
        let mut bindings = Vec::new();
        for p in &params {
            p.bindings(&mut bindings);
        }
        body_scope.values.extend(bindings);

        let body = self.resolve_expr(&m.body, &mut body_scope, ctx)?;
        Ok(ResolvedMethod {
            public: m.public,
            is_static: m.is_static,
            is_const: m.is_const,
            name: m.name,
            generics: m.generics.clone(),
            params,
            return_type,
            body: Rc::new(body),
            span: m.span,
        })
    }

    fn resolve_pattern(
        &mut self,
        p: &parsed::Pattern,
        scope: &Scope,
        ctx: GenericCtx,
    ) -> Result<ResolvedPattern, CompileError> {
        let kind = match &p.kind {
            parsed::PatternKind::Binding(name) => ResolvedPatternKind::Binding(*name),
            parsed::PatternKind::Typed(inner, ty) => ResolvedPatternKind::Typed(
                Box::new(self.resolve_pattern(inner, scope, ctx)?),
                self.resolve_type(ty, scope, ctx)?,
            ),
            parsed::PatternKind::Tuple(parts) => ResolvedPatternKind::Tuple(
                parts
                    .iter()
                    .map(|part| self.resolve_pattern(part, scope, ctx))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        };
        Ok(ResolvedPattern { kind, span: p.span })
    }

    /// Map a parsed type to a resolved type, recursively, preserving the
    /// declaration indices of type and method generics.
    fn resolve_type(
        &mut self,
        t: &parsed::TypeExpr,
        scope: &Scope,
        ctx: GenericCtx,
    ) -> Result<ResolvedType, CompileError> {
        match &t.kind {
            parsed::TypeExprKind::Named(name, args) => {
                if args.is_empty() {
                    if let Some(index) = ctx.method_generics.iter().position(|g| g == name) {
                        return Ok(ResolvedType::MethodGeneric { index, name: *name });
                    }
                    if let Some(index) = ctx.type_generics.iter().position(|g| g == name) {
                        return Ok(ResolvedType::TypeGeneric { index, name: *name });
                    }
                }
                if let Some(&def) = scope.types.get(name) {
                    let args = args
                        .iter()
                        .map(|a| self.resolve_type(a, scope, ctx))
                        .collect::<Result<Vec<_>, _>>()?;
                    return Ok(ResolvedType::Def { def, args });
                }
                Err(ResolutionError::UnknownType {
                    name: self.interner.resolve(*name).to_string(),
                    span: t.span.into(),
                }
                .into())
            }
            parsed::TypeExprKind::Tuple(parts) => Ok(ResolvedType::Tuple(
                parts
                    .iter()
                    .map(|part| self.resolve_type(part, scope, ctx))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            parsed::TypeExprKind::Func(params, ret) => {
                let params = params
                    .iter()
                    .map(|param| self.resolve_type(param, scope, ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                let ret = match ret {
                    Some(r) => self.resolve_type(r, scope, ctx)?,
                    None => ResolvedType::unit(),
                };
                Ok(ResolvedType::Func {
                    params,
                    ret: Box::new(ret),
                })
            }
        }
    }

    fn resolve_expr(
        &mut self,
        e: &parsed::Expr,
        scope: &mut Scope,
        ctx: GenericCtx,
    ) -> Result<ResolvedExpr, CompileError> {
        use parsed::ExprKind as P;
        let kind = match &e.kind {
            P::Block(elements) => {
                let mut child = scope.clone();
                ResolvedExprKind::Block(self.resolve_block(elements, &mut child, ctx, None)?)
            }
            P::Import(file) => {
                self.resolve_file(file, e.span)?;
                let exports = self.exports_cache[file].clone();
                for (name, def) in exports {
                    scope.types.insert(name, def);
                }
                ResolvedExprKind::Import(file.clone())
            }
            P::IntLiteral(v) => ResolvedExprKind::IntLiteral(*v),
            P::FloatLiteral(v) => ResolvedExprKind::FloatLiteral(*v),
            P::StringLiteral(v) => ResolvedExprKind::StringLiteral(v.clone()),
            P::BoolLiteral(v) => ResolvedExprKind::BoolLiteral(*v),
            P::Variable(name) => ResolvedExprKind::Variable(*name),
            P::FieldAccess { receiver, name } => {
                if let Some(ty) = self.static_receiver(receiver, scope, ctx) {
                    ResolvedExprKind::StaticFieldAccess { ty, name: *name }
                } else {
                    ResolvedExprKind::FieldAccess {
                        receiver: Box::new(self.resolve_expr(receiver, scope, ctx)?),
                        name: *name,
                    }
                }
            }
            P::MethodCall {
                receiver,
                name,
                generic_args,
                args,
            } => {
                let generic_args = generic_args
                    .iter()
                    .map(|g| self.resolve_type(g, scope, ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                let args = self.resolve_exprs(args, scope, ctx)?;
                if let Some(ty) = self.static_receiver(receiver, scope, ctx) {
                    ResolvedExprKind::StaticMethodCall {
                        ty,
                        name: *name,
                        generic_args,
                        args,
                    }
                } else {
                    ResolvedExprKind::MethodCall {
                        receiver: Box::new(self.resolve_expr(receiver, scope, ctx)?),
                        name: *name,
                        generic_args,
                        args,
                    }
                }
            }
            P::SuperCall { name, args } => ResolvedExprKind::SuperCall {
                name: *name,
                args: self.resolve_exprs(args, scope, ctx)?,
            },
            P::Super => {
                return Err(ResolutionError::StraySuper {
                    span: e.span.into(),
                }
                .into());
            }
            P::ConstructorCall { ty, args } => ResolvedExprKind::ConstructorCall {
                ty: self.resolve_type(ty, scope, ctx)?,
                args: self.resolve_exprs(args, scope, ctx)?,
            },
            P::RawStructConstructor { ty, args } => ResolvedExprKind::RawStructConstructor {
                ty: self.resolve_type(ty, scope, ctx)?,
                args: self.resolve_exprs(args, scope, ctx)?,
            },
            P::Tuple(parts) => ResolvedExprKind::Tuple(self.resolve_exprs(parts, scope, ctx)?),
            P::Lambda {
                params,
                return_type,
                body,
            } => {
                let params = params
                    .iter()
                    .map(|p| self.resolve_pattern(p, scope, ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                let return_type = return_type
                    .as_ref()
                    .map(|t| self.resolve_type(t, scope, ctx))
                    .transpose()?;
                let mut body_scope = scope.clone();
                let mut bindings = Vec::new();
                for p in &params {
                    p.bindings(&mut bindings);
                }
                body_scope.values.extend(bindings);
                let body = self.resolve_expr(body, &mut body_scope, ctx)?;
                ResolvedExprKind::Lambda {
                    params,
                    return_type,
                    body: Rc::new(body),
                }
            }
            P::Declaration { pattern, value } => {
                let value = self.resolve_expr(value, scope, ctx)?;
                let pattern = self.resolve_pattern(pattern, scope, ctx)?;
                let mut bindings = Vec::new();
                pattern.bindings(&mut bindings);
                scope.values.extend(bindings);
                ResolvedExprKind::Declaration {
                    pattern,
                    value: Box::new(value),
                }
            }
            P::Assignment { target, value } => ResolvedExprKind::Assignment {
                target: Box::new(self.resolve_expr(target, scope, ctx)?),
                value: Box::new(self.resolve_expr(value, scope, ctx)?),
            },
            P::Return(value) => ResolvedExprKind::Return(
                value
                    .as_ref()
                    .map(|v| self.resolve_expr(v, scope, ctx).map(Box::new))
                    .transpose()?,
            ),
            P::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.resolve_expr(condition, scope, ctx)?;
                let mut then_scope = scope.clone();
                let then_branch = self.resolve_expr(then_branch, &mut then_scope, ctx)?;
                let else_branch = match else_branch {
                    Some(eb) => {
                        let mut else_scope = scope.clone();
                        Some(Box::new(self.resolve_expr(eb, &mut else_scope, ctx)?))
                    }
                    None => None,
                };
                ResolvedExprKind::If {
                    condition: Box::new(condition),
                    then_branch: Box::new(then_branch),
                    else_branch,
                }
            }
            P::While { condition, body } => {
                let condition = self.resolve_expr(condition, scope, ctx)?;
                let mut body_scope = scope.clone();
                let body = self.resolve_expr(body, &mut body_scope, ctx)?;
                ResolvedExprKind::While {
                    condition: Box::new(condition),
                    body: Box::new(body),
                }
            }
            P::Parenthesized(inner) => return self.resolve_expr(inner, scope, ctx),
        };
        Ok(ResolvedExpr { kind, span: e.span })
    }

    fn resolve_exprs(
        &mut self,
        exprs: &[parsed::Expr],
        scope: &mut Scope,
        ctx: GenericCtx,
    ) -> Result<Vec<ResolvedExpr>, CompileError> {
        exprs
            .iter()
            .map(|e| self.resolve_expr(e, scope, ctx))
            .collect()
    }

    /// A bare-identifier receiver that names a type in scope resolves
    /// statically, unless a local binding of the same name shadows it.
    fn static_receiver(
        &self,
        receiver: &parsed::Expr,
        scope: &Scope,
        ctx: GenericCtx,
    ) -> Option<ResolvedType> {
        let parsed::ExprKind::Variable(name) = &receiver.kind else {
            return None;
        };
        if scope.values.contains(name) {
            return None;
        }
        if let Some(index) = ctx.method_generics.iter().position(|g| g == name) {
            return Some(ResolvedType::MethodGeneric { index, name: *name });
        }
        if let Some(index) = ctx.type_generics.iter().position(|g| g == name) {
            return Some(ResolvedType::TypeGeneric { index, name: *name });
        }
        scope.types.get(name).map(|&def| ResolvedType::Def {
            def,
            args: Vec::new(),
        })
    }

    fn type_expr_name(&self, t: &parsed::TypeExpr) -> String {
        match &t.kind {
            parsed::TypeExprKind::Named(name, _) => self.interner.resolve(*name).to_string(),
            parsed::TypeExprKind::Tuple(_) => "tuple".to_string(),
            parsed::TypeExprKind::Func(_, _) => "function type".to_string(),
        }
    }
}
