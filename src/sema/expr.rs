// src/sema/expr.rs
//
// Expression checking - impl Checker methods.

use crate::errors::TypingError;
use crate::frontend::{Span, Symbol};
use crate::resolver::{ResolvedExpr, ResolvedExprKind, ResolvedPattern, ResolvedPatternKind};
use crate::sema::builtins::BasicType;
use crate::sema::checker::{Checker, Env, LambdaFrame, LocalBinding, Lookup, Subst};
use crate::sema::type_arena::{
    BodyState, FieldDef, GenericMethodDef, MethodKind, TypeDef, TypeDefKind, TypeId,
};
use crate::sema::typed::{
    ConstValue, LValue, TypedExpr, TypedExprKind, TypedPattern,
};
use smallvec::SmallVec;

impl<'a> Checker<'a> {
    /// Check an expression. `expect` is a hint that steers literal widths
    /// and tuple element types; callers that require the hint to hold use
    /// `check_expect`.
    pub(crate) fn check_expr(
        &mut self,
        env: &mut Env,
        e: &ResolvedExpr,
        expect: Option<TypeId>,
    ) -> Result<TypedExpr, TypingError> {
        use ResolvedExprKind as R;
        let span = e.span;
        match &e.kind {
            R::IntLiteral(v) => {
                let (value, ty) = match expect.and_then(|t| self.basic_kind(t)) {
                    Some(BasicType::I8 | BasicType::I16 | BasicType::I32 | BasicType::I64) => {
                        (ConstValue::Int(*v), expect.expect("basic kind implies expect"))
                    }
                    Some(BasicType::F32 | BasicType::F64) => (
                        ConstValue::Float(*v as f64),
                        expect.expect("basic kind implies expect"),
                    ),
                    _ => (ConstValue::Int(*v), self.basic(BasicType::I32)),
                };
                Ok(TypedExpr {
                    kind: TypedExprKind::Literal(value),
                    ty,
                    span,
                })
            }
            R::FloatLiteral(v) => {
                let ty = match expect.and_then(|t| self.basic_kind(t)) {
                    Some(BasicType::F32) => expect.expect("basic kind implies expect"),
                    _ => self.basic(BasicType::F64),
                };
                Ok(TypedExpr {
                    kind: TypedExprKind::Literal(ConstValue::Float(*v)),
                    ty,
                    span,
                })
            }
            R::StringLiteral(v) => Ok(TypedExpr {
                kind: TypedExprKind::Literal(ConstValue::Str(v.clone())),
                ty: self.basic(BasicType::Str),
                span,
            }),
            R::BoolLiteral(v) => Ok(TypedExpr {
                kind: TypedExprKind::Literal(ConstValue::Bool(*v)),
                ty: self.basic(BasicType::Bool),
                span,
            }),
            R::Variable(name) => self.check_variable(env, *name, span),
            R::FieldAccess { receiver, name } => {
                let recv = self.check_expr(env, receiver, None)?;
                let name_str = self.interner.resolve(*name);
                let Some((owner, field, fty)) = self.find_field(recv.ty, name_str) else {
                    return Err(TypingError::UnknownField {
                        ty: self.arena.name(recv.ty).to_string(),
                        name: name_str.to_string(),
                        span: span.into(),
                    });
                };
                Ok(TypedExpr {
                    kind: TypedExprKind::FieldAccess {
                        receiver: Box::new(recv),
                        owner,
                        field,
                    },
                    ty: fty,
                    span,
                })
            }
            R::StaticFieldAccess { ty, name } => {
                let owner = self.type_id_of(ty, env.subst(), span)?;
                let name_str = self.interner.resolve(*name);
                let Some((field, fty)) = self.find_static_field(owner, name_str) else {
                    return Err(TypingError::UnknownField {
                        ty: self.arena.name(owner).to_string(),
                        name: name_str.to_string(),
                        span: span.into(),
                    });
                };
                Ok(TypedExpr {
                    kind: TypedExprKind::StaticField { owner, field },
                    ty: fty,
                    span,
                })
            }
            R::MethodCall {
                receiver,
                name,
                generic_args,
                args,
            } => {
                let recv = self.check_expr(env, receiver, None)?;
                let gargs = self.generic_arg_ids(env, generic_args, span)?;
                let (owner, method, targs, ret) =
                    self.resolve_call(env, recv.ty, *name, &gargs, args, false, span)?;
                Ok(TypedExpr {
                    kind: TypedExprKind::Call {
                        receiver: Some(Box::new(recv)),
                        owner,
                        method: method as u32,
                        args: targs,
                    },
                    ty: ret,
                    span,
                })
            }
            R::StaticMethodCall {
                ty,
                name,
                generic_args,
                args,
            } => {
                let owner = self.type_id_of(ty, env.subst(), span)?;
                let gargs = self.generic_arg_ids(env, generic_args, span)?;
                let (owner, method, targs, ret) =
                    self.resolve_call(env, owner, *name, &gargs, args, true, span)?;
                Ok(TypedExpr {
                    kind: TypedExprKind::Call {
                        receiver: None,
                        owner,
                        method: method as u32,
                        args: targs,
                    },
                    ty: ret,
                    span,
                })
            }
            R::SuperCall { name, args } => self.check_super_call(env, *name, args, span),
            R::ConstructorCall { ty, args } => self.check_constructor(env, ty, args, span),
            R::RawStructConstructor { ty, args } => {
                let tid = self.type_id_of(ty, env.subst(), span)?;
                let is_struct = matches!(
                    self.arena.def(tid).map(|d| &d.kind),
                    Some(TypeDefKind::Struct { .. } | TypeDefKind::Tuple)
                );
                if !is_struct {
                    return Err(TypingError::RawConstructorOnNonStruct {
                        ty: self.arena.name(tid).to_string(),
                        span: span.into(),
                    });
                }
                let field_tys: Vec<TypeId> = self
                    .arena
                    .def(tid)
                    .expect("checked above")
                    .instance_fields()
                    .map(|(_, f)| f.ty)
                    .collect();
                if field_tys.len() != args.len() {
                    return Err(TypingError::WrongArgumentCount {
                        expected: field_tys.len(),
                        found: args.len(),
                        span: span.into(),
                    });
                }
                let mut targs = Vec::with_capacity(args.len());
                for (arg, &fty) in args.iter().zip(&field_tys) {
                    targs.push(self.check_expect(env, arg, fty)?);
                }
                Ok(TypedExpr {
                    kind: TypedExprKind::RawStruct { args: targs },
                    ty: tid,
                    span,
                })
            }
            R::Tuple(parts) => {
                let expects: Option<Vec<TypeId>> = expect.and_then(|t| {
                    self.arena.def(t).and_then(|d| {
                        (matches!(d.kind, TypeDefKind::Tuple)
                            && d.fields.len() == parts.len())
                        .then(|| d.fields.iter().map(|f| f.ty).collect())
                    })
                });
                let mut targs = Vec::with_capacity(parts.len());
                for (i, part) in parts.iter().enumerate() {
                    let hint = expects.as_ref().map(|tys| tys[i]);
                    targs.push(self.check_expr(env, part, hint)?);
                }
                let elem_tys: Vec<TypeId> = targs.iter().map(|t| t.ty).collect();
                let ty = self.tuple_type(&elem_tys);
                Ok(TypedExpr {
                    kind: TypedExprKind::RawStruct { args: targs },
                    ty,
                    span,
                })
            }
            R::Lambda {
                params,
                return_type,
                body,
            } => self.check_lambda(env, params, return_type.as_ref(), body, span),
            R::Declaration { pattern, value } => {
                let declared = match pattern.declared_type() {
                    Some(rt) => Some(self.type_id_of(rt, env.subst(), span)?),
                    None => None,
                };
                let value_t = self.check_expr(env, value, declared)?;
                let tp = self.bind_pattern(env, pattern, value_t.ty, span)?;
                let unit = self.unit_type();
                Ok(TypedExpr {
                    kind: TypedExprKind::Declaration {
                        pattern: tp,
                        value: Box::new(value_t),
                    },
                    ty: unit,
                    span,
                })
            }
            R::Assignment { target, value } => {
                let (lv, target_ty) = self.check_lvalue(env, target)?;
                let value_t = self.check_expect(env, value, target_ty)?;
                let unit = self.unit_type();
                Ok(TypedExpr {
                    kind: TypedExprKind::Assignment {
                        target: lv,
                        value: Box::new(value_t),
                    },
                    ty: unit,
                    span,
                })
            }
            R::Return(value) => {
                let ret = env.ret_ty;
                let unit = self.unit_type();
                let value_t = match value {
                    Some(v) => Some(Box::new(self.check_expect(env, v, ret)?)),
                    None => {
                        if ret != unit {
                            return Err(TypingError::TypeMismatch {
                                expected: self.arena.name(ret).to_string(),
                                found: "()".to_string(),
                                span: span.into(),
                            });
                        }
                        None
                    }
                };
                Ok(TypedExpr {
                    kind: TypedExprKind::Return(value_t),
                    ty: unit,
                    span,
                })
            }
            R::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond = self.check_condition(env, condition)?;
                let then_t = self.check_expr(env, then_branch, expect)?;
                match else_branch {
                    Some(eb) => {
                        let hint = expect.or(Some(then_t.ty));
                        let else_t = self.check_expr(env, eb, hint)?;
                        let ty = if self.assignable(else_t.ty, then_t.ty) {
                            then_t.ty
                        } else if self.assignable(then_t.ty, else_t.ty) {
                            else_t.ty
                        } else {
                            return Err(TypingError::TypeMismatch {
                                expected: self.arena.name(then_t.ty).to_string(),
                                found: self.arena.name(else_t.ty).to_string(),
                                span: eb.span.into(),
                            });
                        };
                        Ok(TypedExpr {
                            kind: TypedExprKind::If {
                                condition: Box::new(cond),
                                then_branch: Box::new(then_t),
                                else_branch: Some(Box::new(else_t)),
                            },
                            ty,
                            span,
                        })
                    }
                    None => {
                        let unit = self.unit_type();
                        Ok(TypedExpr {
                            kind: TypedExprKind::If {
                                condition: Box::new(cond),
                                then_branch: Box::new(then_t),
                                else_branch: None,
                            },
                            ty: unit,
                            span,
                        })
                    }
                }
            }
            R::While { condition, body } => {
                let cond = self.check_condition(env, condition)?;
                let body_t = self.check_expr(env, body, None)?;
                let unit = self.unit_type();
                Ok(TypedExpr {
                    kind: TypedExprKind::While {
                        condition: Box::new(cond),
                        body: Box::new(body_t),
                    },
                    ty: unit,
                    span,
                })
            }
            R::Block(elements) => {
                env.push_scope();
                let mut exprs = Vec::new();
                let last_index = elements.len().checked_sub(1);
                let mut last_is_expr = false;
                for (i, element) in elements.iter().enumerate() {
                    match element {
                        crate::resolver::ResolvedElement::TypeDef(def) => {
                            self.instantiate_if_concrete(*def)?;
                            last_is_expr = false;
                        }
                        crate::resolver::ResolvedElement::Expr(inner) => {
                            let hint = if Some(i) == last_index { expect } else { None };
                            exprs.push(self.check_expr(env, inner, hint)?);
                            last_is_expr = true;
                        }
                    }
                }
                env.pop_scope();
                let ty = if last_is_expr {
                    exprs.last().map(|t| t.ty).expect("non-empty when last_is_expr")
                } else {
                    self.unit_type()
                };
                Ok(TypedExpr {
                    kind: TypedExprKind::Block {
                        exprs,
                        trailing: last_is_expr,
                    },
                    ty,
                    span,
                })
            }
            R::Import(file) => {
                let unit = self.unit_type();
                Ok(TypedExpr {
                    kind: TypedExprKind::Import(file.clone()),
                    ty: unit,
                    span,
                })
            }
        }
    }

    /// Check an expression against a required type
    pub(crate) fn check_expect(
        &mut self,
        env: &mut Env,
        e: &ResolvedExpr,
        want: TypeId,
    ) -> Result<TypedExpr, TypingError> {
        let typed = self.check_expr(env, e, Some(want))?;
        if !self.assignable(typed.ty, want) {
            return Err(TypingError::TypeMismatch {
                expected: self.arena.name(want).to_string(),
                found: self.arena.name(typed.ty).to_string(),
                span: typed.span.into(),
            });
        }
        Ok(typed)
    }

    fn check_condition(
        &mut self,
        env: &mut Env,
        e: &ResolvedExpr,
    ) -> Result<TypedExpr, TypingError> {
        let bool_ty = self.basic(BasicType::Bool);
        let cond = self.check_expr(env, e, Some(bool_ty))?;
        if cond.ty != bool_ty {
            return Err(TypingError::ConditionNotBool {
                found: self.arena.name(cond.ty).to_string(),
                span: cond.span.into(),
            });
        }
        Ok(cond)
    }

    fn check_variable(
        &mut self,
        env: &mut Env,
        name: Symbol,
        span: Span,
    ) -> Result<TypedExpr, TypingError> {
        match env.lookup(name) {
            Lookup::Local(binding) => Ok(TypedExpr {
                kind: TypedExprKind::Variable {
                    index: binding.index,
                },
                ty: binding.ty,
                span,
            }),
            Lookup::Capture { field, ty } => {
                let impl_ty = env
                    .lambdas
                    .last()
                    .map(|f| f.impl_ty)
                    .expect("capture outside a lambda");
                let receiver = TypedExpr {
                    kind: TypedExprKind::Variable { index: 0 },
                    ty: impl_ty,
                    span,
                };
                Ok(TypedExpr {
                    kind: TypedExprKind::FieldAccess {
                        receiver: Box::new(receiver),
                        owner: impl_ty,
                        field,
                    },
                    ty,
                    span,
                })
            }
            Lookup::NotFound => Err(TypingError::UndefinedVariable {
                name: self.interner.resolve(name).to_string(),
                span: span.into(),
            }),
        }
    }

    fn check_super_call(
        &mut self,
        env: &mut Env,
        name: Symbol,
        args: &[ResolvedExpr],
        span: Span,
    ) -> Result<TypedExpr, TypingError> {
        let owner = env.owner.ok_or_else(|| TypingError::SuperWithoutSupertype {
            ty: "top-level code".to_string(),
            span: span.into(),
        })?;
        let sup = self
            .arena
            .def(owner)
            .and_then(|d| d.supertype)
            .ok_or_else(|| TypingError::SuperWithoutSupertype {
                ty: self.arena.name(owner).to_string(),
                span: span.into(),
            })?;
        let (fowner, method, targs, ret) =
            self.resolve_call(env, sup, name, &[], args, false, span)?;
        Ok(TypedExpr {
            kind: TypedExprKind::SuperCall {
                owner: fowner,
                method: method as u32,
                args: targs,
            },
            ty: ret,
            span,
        })
    }

    fn check_constructor(
        &mut self,
        env: &mut Env,
        ty: &crate::resolver::ResolvedType,
        args: &[ResolvedExpr],
        span: Span,
    ) -> Result<TypedExpr, TypingError> {
        let class_ty = self.type_id_of(ty, env.subst(), span)?;
        let is_class = matches!(
            self.arena.def(class_ty).map(|d| &d.kind),
            Some(TypeDefKind::Class { .. })
        );
        if !is_class {
            return Err(TypingError::ConstructorOnNonClass {
                ty: self.arena.name(class_ty).to_string(),
                span: span.into(),
            });
        }
        let ctor_sym = self.interner.lookup("new");
        let has_ctor = ctor_sym.is_some()
            && self
                .arena
                .def(class_ty)
                .map(|d| d.methods.iter().any(|m| m.name == "new"))
                .unwrap_or(false);
        if !has_ctor {
            if !args.is_empty() {
                return Err(TypingError::WrongArgumentCount {
                    expected: 0,
                    found: args.len(),
                    span: span.into(),
                });
            }
            return Ok(TypedExpr {
                kind: TypedExprKind::Constructor {
                    class: class_ty,
                    method: None,
                    args: Vec::new(),
                },
                ty: class_ty,
                span,
            });
        }
        let ctor_sym = ctor_sym.expect("checked above");
        let (_, method, targs, _) =
            self.resolve_call(env, class_ty, ctor_sym, &[], args, false, span)?;
        Ok(TypedExpr {
            kind: TypedExprKind::Constructor {
                class: class_ty,
                method: Some(method as u32),
                args: targs,
            },
            ty: class_ty,
            span,
        })
    }

    fn check_lambda(
        &mut self,
        env: &mut Env,
        params: &[ResolvedPattern],
        return_type: Option<&crate::resolver::ResolvedType>,
        body: &ResolvedExpr,
        span: Span,
    ) -> Result<TypedExpr, TypingError> {
        let param_tys = self.param_types(params, env.subst())?;
        let declared_ret = match return_type {
            Some(rt) => Some(self.type_id_of(rt, env.subst(), span)?),
            None => None,
        };

        let index = self.lambda_counter;
        self.lambda_counter += 1;
        let impl_name = format!("Lambda${index}");
        let impl_ty = self
            .arena
            .alloc_pending(impl_name.clone(), impl_name.clone(), true);

        // The lambda body runs in its own frame: fresh local slots, with the
        // closure instance at slot 0.
        let saved_next = env.next_local;
        let saved_max = env.max_locals;
        env.lambdas.push(LambdaFrame {
            barrier: env.depth(),
            impl_ty,
            captures: Vec::new(),
        });
        env.push_scope();
        env.next_local = 0;
        env.max_locals = 0;
        let this_index = env.alloc(1);
        env.bind(
            self.this_sym,
            LocalBinding {
                index: this_index,
                ty: impl_ty,
            },
        );
        for (p, &ty) in params.iter().zip(&param_tys) {
            self.bind_pattern(env, p, ty, p.span)?;
        }

        let body_t = self.check_expr(env, body, declared_ret)?;
        let ret = match declared_ret {
            Some(r) => {
                let unit = self.unit_type();
                if r != unit && !self.assignable(body_t.ty, r) {
                    return Err(TypingError::TypeMismatch {
                        expected: self.arena.name(r).to_string(),
                        found: self.arena.name(body_t.ty).to_string(),
                        span: body_t.span.into(),
                    });
                }
                r
            }
            None => body_t.ty,
        };
        let lambda_max = env.max_locals;
        env.pop_scope();
        let frame = env.lambdas.pop().expect("frame pushed above");
        env.next_local = saved_next;
        env.max_locals = saved_max;

        let func_ty = self.func_type(&param_tys, ret);
        let fields = frame
            .captures
            .iter()
            .map(|(sym, cap)| FieldDef {
                name: self.interner.resolve(*sym).to_string(),
                public: false,
                is_static: false,
                ty: cap.ty,
            })
            .collect();
        let object = self.basic(BasicType::Object);
        let mut invoke = crate::sema::builtins::pending_method(
            "invoke".to_string(),
            "invoke".to_string(),
            false,
            false,
            param_tys.clone(),
            ret,
        );
        invoke.kind = MethodKind::Snuggle(BodyState::Typed {
            body: body_t,
            max_locals: lambda_max,
        });
        self.arena.fulfill(
            impl_ty,
            TypeDef {
                name: impl_name.clone(),
                runtime_name: impl_name,
                kind: TypeDefKind::FuncImpl { func: func_ty },
                supertype: Some(object),
                fields,
                methods: vec![invoke],
                generic_methods: Vec::new(),
                is_plural: false,
                is_reference: true,
            },
        );
        Ok(TypedExpr {
            kind: TypedExprKind::Lambda {
                impl_ty,
                captures: frame.captures.into_iter().map(|(_, c)| c).collect(),
            },
            ty: func_ty,
            span,
        })
    }

    fn generic_arg_ids(
        &mut self,
        env: &Env,
        generic_args: &[crate::resolver::ResolvedType],
        span: Span,
    ) -> Result<Vec<TypeId>, TypingError> {
        let subst = Subst {
            type_args: &env.type_args,
            method_args: &env.method_args,
        };
        generic_args
            .iter()
            .map(|g| self.type_id_of(g, subst, span))
            .collect()
    }

    /// Resolve a call by name against a receiver type: overloads pick the
    /// first signature the argument types satisfy, in runtime-name order;
    /// generic arguments select a template and specialize it first.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn resolve_call(
        &mut self,
        env: &mut Env,
        owner: TypeId,
        name: Symbol,
        gargs: &[TypeId],
        args: &[ResolvedExpr],
        is_static: bool,
        span: Span,
    ) -> Result<(TypeId, usize, Vec<TypedExpr>, TypeId), TypingError> {
        let name_str = self.interner.resolve(name).to_string();

        if !gargs.is_empty() {
            // Calls on the bare `Option` factory apply their explicit type
            // arguments to the type itself, then resolve on the instance.
            if let Some(TypeDefKind::Basic(BasicType::Option)) =
                self.arena.def(owner).map(|d| &d.kind)
            {
                let option_def = self.builtins.def_of(BasicType::Option);
                let instance = self.specialize(option_def, gargs, span)?;
                return self.resolve_call(env, instance, name, &[], args, is_static, span);
            }
            let mut cur = owner;
            loop {
                let template = self.arena.def(cur).and_then(|d| {
                    d.generic_methods
                        .iter()
                        .find(|t| t.name == name && t.generic_count == gargs.len())
                        .cloned()
                });
                if let Some(template) = template {
                    return self.call_template(env, cur, &template, gargs, args, span);
                }
                match self.arena.def(cur).and_then(|d| d.supertype) {
                    Some(sup) => cur = sup,
                    None => break,
                }
            }
            return Err(TypingError::UnknownMethod {
                ty: self.arena.name(owner).to_string(),
                name: name_str,
                span: span.into(),
            });
        }

        // Collect candidates along the supertype chain
        let mut candidates: Vec<(TypeId, usize)> = Vec::new();
        let mut cur = owner;
        loop {
            if let Some(def) = self.arena.def(cur) {
                for (i, m) in def.methods.iter().enumerate() {
                    if m.name == name_str && m.is_static == is_static && m.params.len() == args.len()
                    {
                        candidates.push((cur, i));
                    }
                }
            }
            match self.arena.def(cur).and_then(|d| d.supertype) {
                Some(sup) => cur = sup,
                None => break,
            }
        }

        if candidates.is_empty() {
            // A generic template of this name exists: the call is missing
            // its explicit type arguments.
            let mut cur = owner;
            loop {
                let count = self.arena.def(cur).and_then(|d| {
                    d.generic_methods
                        .iter()
                        .find(|t| t.name == name)
                        .map(|t| t.generic_count)
                });
                if let Some(expected) = count {
                    return Err(TypingError::WrongGenericArgumentCount {
                        expected,
                        found: 0,
                        span: span.into(),
                    });
                }
                match self.arena.def(cur).and_then(|d| d.supertype) {
                    Some(sup) => cur = sup,
                    None => break,
                }
            }
            return Err(TypingError::UnknownMethod {
                ty: self.arena.name(owner).to_string(),
                name: name_str,
                span: span.into(),
            });
        }

        if candidates.len() == 1 {
            let (fowner, midx) = candidates[0];
            let (params, ret) = self.method_sig(fowner, midx);
            let mut targs = Vec::with_capacity(args.len());
            for (arg, &pty) in args.iter().zip(&params) {
                targs.push(self.check_expect(env, arg, pty)?);
            }
            return Ok((fowner, midx, targs, ret));
        }

        // Overloaded: type the arguments once, then pick the first
        // candidate every argument is assignable to (source order).
        let mut targs = Vec::with_capacity(args.len());
        for arg in args {
            targs.push(self.check_expr(env, arg, None)?);
        }
        for (fowner, midx) in candidates {
            let (params, ret) = self.method_sig(fowner, midx);
            let matches = targs
                .iter()
                .zip(&params)
                .all(|(t, &p)| self.assignable(t.ty, p));
            if matches {
                return Ok((fowner, midx, targs, ret));
            }
        }
        Err(TypingError::UnknownMethod {
            ty: self.arena.name(owner).to_string(),
            name: name_str,
            span: span.into(),
        })
    }

    fn call_template(
        &mut self,
        env: &mut Env,
        owner: TypeId,
        template: &GenericMethodDef,
        gargs: &[TypeId],
        args: &[ResolvedExpr],
        span: Span,
    ) -> Result<(TypeId, usize, Vec<TypedExpr>, TypeId), TypingError> {
        let midx = self.specialize_method(owner, template, gargs, span)?;
        let (params, ret) = self.method_sig(owner, midx);
        if params.len() != args.len() {
            return Err(TypingError::WrongArgumentCount {
                expected: params.len(),
                found: args.len(),
                span: span.into(),
            });
        }
        let mut targs = Vec::with_capacity(args.len());
        for (arg, &pty) in args.iter().zip(&params) {
            targs.push(self.check_expect(env, arg, pty)?);
        }
        Ok((owner, midx, targs, ret))
    }

    fn method_sig(&self, owner: TypeId, index: usize) -> (Vec<TypeId>, TypeId) {
        let m = &self.arena.def(owner).expect("owner fulfilled").methods[index];
        (m.params.clone(), m.ret)
    }

    /// The basic kind of a type, when it is one
    fn basic_kind(&self, ty: TypeId) -> Option<BasicType> {
        match self.arena.def(ty).map(|d| &d.kind) {
            Some(TypeDefKind::Basic(b)) => Some(*b),
            _ => None,
        }
    }

    /// Find an instance field, walking the primary supertype chain
    fn find_field(&self, ty: TypeId, name: &str) -> Option<(TypeId, u32, TypeId)> {
        let mut cur = ty;
        loop {
            if let Some(def) = self.arena.def(cur) {
                for (i, f) in def.instance_fields() {
                    if f.name == name {
                        return Some((cur, i as u32, f.ty));
                    }
                }
            }
            cur = self.arena.def(cur).and_then(|d| d.supertype)?;
        }
    }

    fn find_static_field(&self, ty: TypeId, name: &str) -> Option<(u32, TypeId)> {
        let def = self.arena.def(ty)?;
        def.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.is_static && f.name == name)
            .map(|(i, f)| (i as u32, f.ty))
    }

    // ------------------------------------------------------------------
    // Patterns and lvalues
    // ------------------------------------------------------------------

    /// Bind a pattern against a value of the given type, allocating dense
    /// local slots left to right. A typed sub-pattern narrows (a downcast)
    /// only through the fallible path, which is not yet supported.
    pub(crate) fn bind_pattern(
        &mut self,
        env: &mut Env,
        pattern: &ResolvedPattern,
        ty: TypeId,
        span: Span,
    ) -> Result<TypedPattern, TypingError> {
        match &pattern.kind {
            ResolvedPatternKind::Binding(name) => {
                let slots = self.arena.stack_slots(ty).unwrap_or(1);
                let index = env.alloc(slots);
                env.bind(*name, LocalBinding { index, ty });
                Ok(TypedPattern {
                    index,
                    ty,
                    span: pattern.span,
                })
            }
            ResolvedPatternKind::Typed(inner, rt) => {
                let declared = self.type_id_of(rt, env.subst(), pattern.span)?;
                if declared == ty || self.assignable(ty, declared) {
                    self.bind_pattern(env, inner, declared, span)
                } else if self.assignable(declared, ty) {
                    Err(TypingError::FalliblePattern {
                        span: pattern.span.into(),
                    })
                } else {
                    Err(TypingError::TypeMismatch {
                        expected: self.arena.name(declared).to_string(),
                        found: self.arena.name(ty).to_string(),
                        span: pattern.span.into(),
                    })
                }
            }
            ResolvedPatternKind::Tuple(parts) => {
                let field_tys: Vec<TypeId> = match self.arena.def(ty) {
                    Some(def)
                        if def.is_plural && def.instance_fields().count() == parts.len() =>
                    {
                        def.instance_fields().map(|(_, f)| f.ty).collect()
                    }
                    _ => {
                        return Err(TypingError::TypeMismatch {
                            expected: format!("a {}-field value", parts.len()),
                            found: self.arena.name(ty).to_string(),
                            span: pattern.span.into(),
                        });
                    }
                };
                let base = env.next_local;
                for (part, &fty) in parts.iter().zip(&field_tys) {
                    self.bind_pattern(env, part, fty, span)?;
                }
                Ok(TypedPattern {
                    index: base,
                    ty,
                    span: pattern.span,
                })
            }
        }
    }

    /// Resolve an assignment target to an lvalue and its leaf type
    fn check_lvalue(
        &mut self,
        env: &mut Env,
        target: &ResolvedExpr,
    ) -> Result<(LValue, TypeId), TypingError> {
        use ResolvedExprKind as R;
        let span = target.span;
        match &target.kind {
            R::Variable(name) => match env.lookup(*name) {
                Lookup::Local(binding) => Ok((
                    LValue::Local {
                        index: binding.index,
                        ty: binding.ty,
                        path: SmallVec::new(),
                    },
                    binding.ty,
                )),
                Lookup::Capture { .. } => Err(TypingError::InvalidAssignmentTarget {
                    span: span.into(),
                }),
                Lookup::NotFound => Err(TypingError::UndefinedVariable {
                    name: self.interner.resolve(*name).to_string(),
                    span: span.into(),
                }),
            },
            R::StaticFieldAccess { ty, name } => {
                let owner = self.type_id_of(ty, env.subst(), span)?;
                let name_str = self.interner.resolve(*name);
                let Some((field, fty)) = self.find_static_field(owner, name_str) else {
                    return Err(TypingError::UnknownField {
                        ty: self.arena.name(owner).to_string(),
                        name: name_str.to_string(),
                        span: span.into(),
                    });
                };
                Ok((
                    LValue::Static {
                        owner,
                        field,
                        path: SmallVec::new(),
                    },
                    fty,
                ))
            }
            R::FieldAccess { receiver, name } => {
                let name_str = self.interner.resolve(*name).to_string();
                let place_receiver = matches!(
                    receiver.kind,
                    R::Variable(_) | R::FieldAccess { .. } | R::StaticFieldAccess { .. }
                );
                if place_receiver {
                    let (inner, inner_ty) = self.check_lvalue(env, receiver)?;
                    if self.arena.is_reference(inner_ty) {
                        let recv = self.check_expr(env, receiver, None)?;
                        let Some((owner, field, fty)) = self.find_field(inner_ty, &name_str) else {
                            return Err(TypingError::UnknownField {
                                ty: self.arena.name(inner_ty).to_string(),
                                name: name_str,
                                span: span.into(),
                            });
                        };
                        return Ok((
                            LValue::Field {
                                receiver: Box::new(recv),
                                owner,
                                path: SmallVec::from_slice(&[field]),
                            },
                            fty,
                        ));
                    }
                    // Plural place: extend the field path
                    let Some((_, field, fty)) = self.find_field(inner_ty, &name_str) else {
                        return Err(TypingError::UnknownField {
                            ty: self.arena.name(inner_ty).to_string(),
                            name: name_str,
                            span: span.into(),
                        });
                    };
                    let extended = match inner {
                        LValue::Local {
                            index,
                            ty,
                            mut path,
                        } => {
                            path.push(field);
                            LValue::Local { index, ty, path }
                        }
                        LValue::Field {
                            receiver,
                            owner,
                            mut path,
                        } => {
                            path.push(field);
                            LValue::Field {
                                receiver,
                                owner,
                                path,
                            }
                        }
                        LValue::Static {
                            owner,
                            field: sfield,
                            mut path,
                        } => {
                            path.push(field);
                            LValue::Static {
                                owner,
                                field: sfield,
                                path,
                            }
                        }
                    };
                    return Ok((extended, fty));
                }
                // Arbitrary receiver expression: must be a reference type
                let recv = self.check_expr(env, receiver, None)?;
                if !self.arena.is_reference(recv.ty) {
                    return Err(TypingError::InvalidAssignmentTarget {
                        span: span.into(),
                    });
                }
                let Some((owner, field, fty)) = self.find_field(recv.ty, &name_str) else {
                    return Err(TypingError::UnknownField {
                        ty: self.arena.name(recv.ty).to_string(),
                        name: name_str,
                        span: span.into(),
                    });
                };
                Ok((
                    LValue::Field {
                        receiver: Box::new(recv),
                        owner,
                        path: SmallVec::from_slice(&[field]),
                    },
                    fty,
                ))
            }
            _ => Err(TypingError::InvalidAssignmentTarget {
                span: span.into(),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Deferred method bodies
    // ------------------------------------------------------------------

    /// Check one queued method body. Only the owner handle, the resolved
    /// body, and the generic argument tuples cross into this context.
    pub(crate) fn check_method_body(
        &mut self,
        pending: crate::sema::checker::PendingBody,
    ) -> Result<(), TypingError> {
        let m = self.resolved_method(pending.def, pending.source);
        let owner_def = self.arena.def(pending.owner).expect("owner fulfilled");
        let sig = &owner_def.methods[pending.method_index];
        let (params, ret, is_static) = (sig.params.clone(), sig.ret, sig.is_static);

        let mut env = Env::new(ret);
        env.owner = Some(pending.owner);
        env.type_args = pending.type_args.clone();
        env.method_args = pending.method_args.clone();
        if !is_static {
            let slots = self.arena.stack_slots(pending.owner).unwrap_or(1);
            let index = env.alloc(slots);
            env.bind(
                self.this_sym,
                LocalBinding {
                    index,
                    ty: pending.owner,
                },
            );
        }
        for (p, &ty) in m.params.iter().zip(&params) {
            self.bind_pattern(&mut env, p, ty, p.span)?;
        }

        let unit = self.unit_type();
        let expect = (ret != unit).then_some(ret);
        let body = self.check_expr(&mut env, &m.body, expect)?;
        if ret != unit && !self.assignable(body.ty, ret) {
            return Err(TypingError::TypeMismatch {
                expected: self.arena.name(ret).to_string(),
                found: self.arena.name(body.ty).to_string(),
                span: body.span.into(),
            });
        }

        let max_locals = env.max_locals;
        let def = self
            .arena
            .def_mut(pending.owner)
            .expect("owner fulfilled");
        def.methods[pending.method_index].kind =
            MethodKind::Snuggle(BodyState::Typed { body, max_locals });
        Ok(())
    }
}
