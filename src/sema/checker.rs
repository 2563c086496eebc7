// src/sema/checker.rs
//
// The typing pass. Generic types and methods specialize on demand through
// tuple-keyed caches; method signatures are computed eagerly while bodies
// are queued and drained afterwards, which breaks the cycle where typing
// one body forces the signature of another whose body forces the first.

use crate::errors::{CompileError, TypingError};
use crate::frontend::{Interner, Span, Symbol};
use crate::reflect::{HostRegistry, HostType};
use crate::resolver::{
    DefArena, DefId, ResolvedImpl, ResolvedMethod, ResolvedPattern, ResolvedProgram, ResolvedType,
    ResolvedTypeDef,
};
use crate::sema::builtins::{self, BasicType, BuiltinSet};
use crate::sema::generic::{MethodSpecCache, MethodSpecKey, SpecKey, TypeSpecCache};
use crate::sema::type_arena::{
    FieldDef, GenericMethodDef, MethodDef, MethodKind, MethodSource, TypeArena, TypeDef,
    TypeDefKind, TypeId, TypeIdVec,
};
use crate::sema::typed::{Capture, CaptureSource, TypedFile, TypedProgram};
use crate::lower::ir::{CallKind, Instruction, MethodRef};
use crate::lower::names;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::collections::VecDeque;
use tracing::debug;

/// Type arguments in force while converting resolved types to TypeIds
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Subst<'s> {
    pub type_args: &'s [TypeId],
    pub method_args: &'s [TypeId],
}

/// A method whose signature exists but whose body still needs checking.
/// The entry captures only the owner handle, where the resolved body lives,
/// and the generic argument tuples; nothing else crosses into deferred
/// checking.
#[derive(Debug)]
pub(crate) struct PendingBody {
    pub owner: TypeId,
    pub method_index: usize,
    pub def: DefId,
    pub source: MethodSource,
    pub type_args: TypeIdVec,
    pub method_args: TypeIdVec,
}

/// A local binding: its slot index and type
#[derive(Debug, Clone, Copy)]
pub(crate) struct LocalBinding {
    pub index: u32,
    pub ty: TypeId,
}

/// Capture bookkeeping for one lambda under analysis
#[derive(Debug)]
pub(crate) struct LambdaFrame {
    /// Scope depth at lambda entry; lookups below it are captures
    pub barrier: usize,
    pub impl_ty: TypeId,
    pub captures: Vec<(Symbol, Capture)>,
}

/// Result of a variable lookup
pub(crate) enum Lookup {
    Local(LocalBinding),
    /// The variable lives outside the current lambda; access goes through a
    /// capture field of `this`
    Capture { field: u32, ty: TypeId },
    NotFound,
}

/// Binding environment for one method (or file top-level) body
pub(crate) struct Env {
    scopes: Vec<FxHashMap<Symbol, LocalBinding>>,
    scope_starts: Vec<u32>,
    pub next_local: u32,
    pub max_locals: u32,
    pub ret_ty: TypeId,
    pub owner: Option<TypeId>,
    pub type_args: TypeIdVec,
    pub method_args: TypeIdVec,
    pub lambdas: Vec<LambdaFrame>,
}

impl Env {
    pub fn new(ret_ty: TypeId) -> Self {
        Self {
            scopes: vec![FxHashMap::default()],
            scope_starts: vec![0],
            next_local: 0,
            max_locals: 0,
            ret_ty,
            owner: None,
            type_args: SmallVec::new(),
            method_args: SmallVec::new(),
            lambdas: Vec::new(),
        }
    }

    pub fn subst(&self) -> Subst<'_> {
        Subst {
            type_args: &self.type_args,
            method_args: &self.method_args,
        }
    }

    /// Current scope depth; lambda frames record this as their barrier
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
        self.scope_starts.push(self.next_local);
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
        if let Some(start) = self.scope_starts.pop() {
            self.next_local = start;
        }
    }

    /// Allocate `slots` consecutive local slots
    pub fn alloc(&mut self, slots: u32) -> u32 {
        let index = self.next_local;
        self.next_local += slots;
        self.max_locals = self.max_locals.max(self.next_local);
        index
    }

    pub fn bind(&mut self, name: Symbol, binding: LocalBinding) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, binding);
        }
    }

    /// Look a variable up, registering captures when the binding lives
    /// outside the innermost lambda.
    pub fn lookup(&mut self, name: Symbol) -> Lookup {
        let mut found = None;
        for (depth, scope) in self.scopes.iter().enumerate().rev() {
            if let Some(&binding) = scope.get(&name) {
                found = Some((depth, binding));
                break;
            }
        }
        let Some((depth, binding)) = found else {
            return Lookup::NotFound;
        };

        // Which lambda frames does the reference cross?
        let first_crossed = self.lambdas.iter().position(|f| f.barrier > depth);
        let Some(first) = first_crossed else {
            return Lookup::Local(binding);
        };

        // Thread the capture through every crossed frame: the outermost one
        // captures the local, each inner one captures its parent's field.
        let mut source = CaptureSource::Local(binding.index);
        let mut field = 0;
        for frame in &mut self.lambdas[first..] {
            if let Some(existing) = frame.captures.iter().position(|(n, _)| *n == name) {
                field = existing as u32;
            } else {
                frame.captures.push((
                    name,
                    Capture {
                        source,
                        ty: binding.ty,
                    },
                ));
                field = (frame.captures.len() - 1) as u32;
            }
            source = CaptureSource::EnclosingField {
                owner: frame.impl_ty,
                field,
            };
        }
        Lookup::Capture {
            field,
            ty: binding.ty,
        }
    }
}

pub struct Checker<'a> {
    pub(crate) arena: TypeArena,
    pub(crate) defs: &'a DefArena,
    pub(crate) interner: &'a Interner,
    pub(crate) registry: &'a HostRegistry,
    pub(crate) builtins: &'a BuiltinSet,
    pub(crate) impl_list: &'a [ResolvedImpl],
    /// Impl-block methods grouped by target definition
    pub(crate) impls_by_target: FxHashMap<DefId, Vec<(usize, usize)>>,
    /// All type specializations, keyed by (definition, argument tuple)
    pub(crate) type_cache: TypeSpecCache,
    /// Generic method specializations
    pub(crate) method_cache: MethodSpecCache,
    pub(crate) tuple_cache: FxHashMap<TypeIdVec, TypeId>,
    pub(crate) func_cache: FxHashMap<(TypeIdVec, TypeId), TypeId>,
    pub(crate) pending_bodies: VecDeque<PendingBody>,
    pub(crate) alias_chain: Vec<DefId>,
    pub(crate) lambda_counter: u32,
    pub(crate) this_sym: Symbol,
}

impl<'a> Checker<'a> {
    pub fn new(
        resolved: &'a ResolvedProgram,
        interner: &'a Interner,
        registry: &'a HostRegistry,
        builtins: &'a BuiltinSet,
    ) -> Self {
        let mut impls_by_target: FxHashMap<DefId, Vec<(usize, usize)>> = FxHashMap::default();
        for (impl_index, imp) in resolved.impls.iter().enumerate() {
            for method_index in 0..imp.methods.len() {
                impls_by_target
                    .entry(imp.target)
                    .or_default()
                    .push((impl_index, method_index));
            }
        }
        let this_sym = interner.lookup("this").expect("'this' interned by resolver");
        Self {
            arena: TypeArena::new(),
            defs: &resolved.arena,
            interner,
            registry,
            builtins,
            impl_list: &resolved.impls,
            impls_by_target,
            type_cache: TypeSpecCache::new(),
            method_cache: MethodSpecCache::new(),
            tuple_cache: FxHashMap::default(),
            func_cache: FxHashMap::default(),
            pending_bodies: VecDeque::new(),
            alias_chain: Vec::new(),
            lambda_counter: 0,
            this_sym,
        }
    }

    /// Type-check the whole resolved program
    pub fn check(
        resolved: &'a ResolvedProgram,
        interner: &'a Interner,
        registry: &'a HostRegistry,
        builtins: &'a BuiltinSet,
    ) -> Result<TypedProgram, CompileError> {
        let mut checker = Checker::new(resolved, interner, registry, builtins);
        let mut files = Vec::with_capacity(resolved.files.len());
        for (name, file) in &resolved.files {
            let typed = checker.check_file(file)?;
            files.push((name.clone(), typed));
        }
        checker.drain_pending()?;
        debug!(
            types = checker.arena.len(),
            specializations = checker.type_cache.len(),
            "typing complete"
        );
        Ok(TypedProgram {
            arena: checker.arena,
            files,
            entry: resolved.entry.clone(),
        })
    }

    fn check_file(
        &mut self,
        file: &crate::resolver::ResolvedFile,
    ) -> Result<TypedFile, CompileError> {
        let unit = self.unit_type();
        let mut env = Env::new(unit);
        let mut exprs = Vec::new();
        for element in &file.elements {
            match element {
                crate::resolver::ResolvedElement::TypeDef(def) => {
                    self.instantiate_if_concrete(*def)?;
                }
                crate::resolver::ResolvedElement::Expr(e) => {
                    exprs.push(self.check_expr(&mut env, e, None)?);
                }
            }
        }
        Ok(TypedFile {
            exprs,
            max_locals: env.max_locals,
        })
    }

    /// Eagerly specialize a non-generic definition so it is emitted even
    /// when nothing in the file's code mentions it.
    pub(crate) fn instantiate_if_concrete(&mut self, def: DefId) -> Result<(), TypingError> {
        let defs = self.defs;
        let (generic, span) = match defs.get(def).expect("resolution fulfills definitions") {
            ResolvedTypeDef::Class(c) => (!c.generics.is_empty(), c.span),
            ResolvedTypeDef::Struct(s) => (!s.generics.is_empty(), s.span),
            ResolvedTypeDef::Enum(e) => (false, e.span),
            ResolvedTypeDef::Alias(_) => (false, Span::default()),
            ResolvedTypeDef::Builtin(_) | ResolvedTypeDef::Reflected(_) => (false, Span::default()),
        };
        if !generic {
            self.specialize(def, &[], span)?;
        }
        Ok(())
    }

    /// Drain the deferred-body queue until empty. Checking a body can
    /// enqueue further specializations, so this loops to a fixed point.
    pub(crate) fn drain_pending(&mut self) -> Result<(), TypingError> {
        while let Some(pending) = self.pending_bodies.pop_front() {
            self.check_method_body(pending)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Specialization
    // ------------------------------------------------------------------

    /// Specialize a definition at a concrete argument tuple. Equal tuples
    /// return the identical handle; re-entry for a tuple whose signature
    /// pass is still running returns the pending placeholder.
    pub(crate) fn specialize(
        &mut self,
        def: DefId,
        args: &[TypeId],
        span: Span,
    ) -> Result<TypeId, TypingError> {
        let key = SpecKey::new(def, TypeIdVec::from_slice(args));
        if let Some(&tid) = self.type_cache.get(&key) {
            return Ok(tid);
        }
        let defs = self.defs;
        match defs.get(def).expect("resolution fulfills definitions") {
            ResolvedTypeDef::Alias(target) => {
                if self.alias_chain.contains(&def) {
                    return Err(TypingError::AliasCycle {
                        name: self.describe_resolved(target),
                        span: span.into(),
                    });
                }
                if !args.is_empty() {
                    return Err(TypingError::WrongGenericArgumentCount {
                        expected: 0,
                        found: args.len(),
                        span: span.into(),
                    });
                }
                self.alias_chain.push(def);
                let tid = self.type_id_of(target, Subst::default(), span)?;
                self.alias_chain.pop();
                self.type_cache.insert(key, tid);
                Ok(tid)
            }
            ResolvedTypeDef::Builtin(basic) => {
                let basic = *basic;
                self.specialize_basic(basic, args, key, span)
            }
            ResolvedTypeDef::Reflected(host) => {
                let host = *host;
                if !args.is_empty() {
                    let class = &self.registry.classes[host];
                    if !class.acknowledge_generics {
                        return Err(TypingError::UnacknowledgedReflectedGenerics {
                            name: class.name.to_string(),
                            span: span.into(),
                        });
                    }
                    // Acknowledged generics are erased: the bare type is the
                    // one and only specialization.
                    let tid = self.specialize(def, &[], span)?;
                    self.type_cache.insert(key, tid);
                    return Ok(tid);
                }
                self.specialize_reflected(def, host, key)
            }
            ResolvedTypeDef::Class(_) => self.specialize_class(def, args, key, span),
            ResolvedTypeDef::Struct(_) => self.specialize_struct(def, args, key, span),
            ResolvedTypeDef::Enum(_) => self.specialize_enum(def, key),
        }
    }

    fn specialize_basic(
        &mut self,
        basic: BasicType,
        args: &[TypeId],
        key: SpecKey,
        span: Span,
    ) -> Result<TypeId, TypingError> {
        // The bare `Option` name is the generic factory itself; its static
        // constructors take explicit type arguments that select the
        // instance (`Option.some::<i32>(x)`), so zero arguments here build
        // only the factory marker type.
        if basic == BasicType::Option {
            match args {
                [] => {}
                [arg] => return self.specialize_option(*arg, key, span),
                _ => {
                    return Err(TypingError::WrongGenericArgumentCount {
                        expected: 1,
                        found: args.len(),
                        span: span.into(),
                    });
                }
            }
        } else if !args.is_empty() {
            return Err(TypingError::WrongGenericArgumentCount {
                expected: 0,
                found: args.len(),
                span: span.into(),
            });
        }

        let tid = self.arena.alloc_pending(
            basic.name().to_string(),
            basic.runtime_name().to_string(),
            basic.is_reference(),
        );
        self.type_cache.insert(key, tid);

        let bool_ty = if basic == BasicType::Bool {
            tid
        } else {
            self.basic(BasicType::Bool)
        };
        let methods = match basic {
            BasicType::Bool => builtins::bool_methods(tid),
            BasicType::I8 | BasicType::I16 | BasicType::I32 | BasicType::I64 => {
                builtins::int_methods(basic, tid, bool_ty)
            }
            BasicType::F32 | BasicType::F64 => builtins::float_methods(basic, tid, bool_ty),
            BasicType::Str => builtins::string_methods(tid),
            _ => Vec::new(),
        };

        let def = self.builtins.def_of(basic);
        let generic_methods = self.impl_generic_methods(def);
        self.arena.fulfill(
            tid,
            TypeDef {
                name: basic.name().to_string(),
                runtime_name: basic.runtime_name().to_string(),
                kind: TypeDefKind::Basic(basic),
                supertype: None,
                fields: Vec::new(),
                methods,
                generic_methods,
                is_plural: false,
                is_reference: basic.is_reference(),
            },
        );
        self.append_impl_methods(tid, def, &[])?;
        debug!(ty = basic.name(), "specialized builtin");
        Ok(tid)
    }

    fn specialize_option(
        &mut self,
        arg: TypeId,
        key: SpecKey,
        span: Span,
    ) -> Result<TypeId, TypingError> {
        let name = format!("Option<{}>", self.arena.name(arg));
        let runtime =
            names::instance_runtime_name("snuggle/lang/Option", &[self.arena.runtime_name(arg)]);
        let tid = self.arena.alloc_pending(name.clone(), runtime.clone(), false);
        self.type_cache.insert(key, tid);
        let bool_ty = self.basic(BasicType::Bool);

        let methods =
            builtins::option_methods(&self.arena, tid, arg, bool_ty).ok_or_else(|| {
                TypingError::InfiniteValueType {
                    ty: name.clone(),
                    span: span.into(),
                }
            })?;
        self.arena.fulfill(
            tid,
            TypeDef {
                name,
                runtime_name: runtime,
                kind: TypeDefKind::Option { arg },
                supertype: None,
                fields: vec![
                    FieldDef {
                        name: "value".to_string(),
                        public: false,
                        is_static: false,
                        ty: arg,
                    },
                    FieldDef {
                        name: "present".to_string(),
                        public: false,
                        is_static: false,
                        ty: bool_ty,
                    },
                ],
                methods,
                generic_methods: Vec::new(),
                is_plural: true,
                is_reference: false,
            },
        );
        Ok(tid)
    }

    fn specialize_reflected(
        &mut self,
        def: DefId,
        host: usize,
        key: SpecKey,
    ) -> Result<TypeId, TypingError> {
        let registry = self.registry;
        let class = &registry.classes[host];
        let name = class.name.to_string();
        let runtime = class.runtime_name.to_string();
        let singleton = class.is_singleton;
        let instance_field = class.instance_field.to_string();

        let tid = self.arena.alloc_pending(name.clone(), runtime.clone(), true);
        self.type_cache.insert(key, tid);

        let mut methods = Vec::with_capacity(class.methods.len());
        for hm in &class.methods {
            let params = hm
                .params
                .iter()
                .map(|&p| self.host_type(p))
                .collect::<Vec<_>>();
            let ret = self.host_type(hm.ret);
            let pre = if singleton && !hm.is_static {
                vec![Instruction::GetStaticField(crate::lower::ir::FieldRef {
                    owner: runtime.clone(),
                    name: instance_field.clone(),
                    ty: tid,
                })]
            } else {
                Vec::new()
            };
            let call_kind = if hm.is_static {
                CallKind::Static
            } else {
                CallKind::Virtual
            };
            methods.push(MethodDef {
                name: hm.snuggle_name().to_string(),
                runtime_name: hm.name.to_string(),
                // In singleton mode the receiver comes from the well-known
                // static instance, so the call site has no receiver at all.
                is_static: singleton || hm.is_static,
                is_const: false,
                params,
                ret,
                kind: MethodKind::Bytecode {
                    cost: 1,
                    pre,
                    ops: vec![Instruction::Call {
                        kind: call_kind,
                        method: MethodRef {
                            owner: runtime.clone(),
                            name: hm.name.to_string(),
                            descriptor: hm.descriptor.to_string(),
                        },
                    }],
                },
            });
        }
        let mut fields = Vec::with_capacity(class.fields.len());
        for hf in &class.fields {
            let ty = self.host_type(hf.ty);
            fields.push(FieldDef {
                name: hf.name.to_string(),
                public: true,
                is_static: false,
                ty,
            });
        }

        let object = self.basic(BasicType::Object);
        let generic_methods = self.impl_generic_methods(def);
        self.arena.fulfill(
            tid,
            TypeDef {
                name,
                runtime_name: runtime,
                kind: TypeDefKind::Reflected { host },
                supertype: Some(object),
                fields,
                methods,
                generic_methods,
                is_plural: false,
                is_reference: true,
            },
        );
        self.append_impl_methods(tid, def, &[])?;
        Ok(tid)
    }

    fn specialize_class(
        &mut self,
        def: DefId,
        args: &[TypeId],
        key: SpecKey,
        span: Span,
    ) -> Result<TypeId, TypingError> {
        let defs = self.defs;
        let ResolvedTypeDef::Class(class) = defs.get(def).expect("resolution fulfills definitions")
        else {
            unreachable!("specialize_class on non-class");
        };
        if class.generics.len() != args.len() {
            return Err(TypingError::WrongGenericArgumentCount {
                expected: class.generics.len(),
                found: args.len(),
                span: span.into(),
            });
        }
        let base = self.interner.resolve(class.name).to_string();
        let name = self.display_name(&base, args);
        let runtime = self.instance_runtime(&base, args);
        let tid = self.arena.alloc_pending(name.clone(), runtime.clone(), true);
        self.type_cache.insert(key, tid);

        let subst = Subst {
            type_args: args,
            method_args: &[],
        };
        let supertype = match &class.supertype {
            Some(st) => self.type_id_of(st, subst, span)?,
            None => self.basic(BasicType::Object),
        };

        let mut fields = Vec::with_capacity(class.fields.len());
        for f in &class.fields {
            let ty = self.type_id_of(&f.ty, subst, f.span)?;
            fields.push(FieldDef {
                name: self.interner.resolve(f.name).to_string(),
                public: f.public,
                is_static: f.is_static,
                ty,
            });
        }

        let (methods, generic_methods, queued) =
            self.build_method_table(def, tid, args, true, span)?;
        self.arena.fulfill(
            tid,
            TypeDef {
                name,
                runtime_name: runtime,
                kind: TypeDefKind::Class {
                    def,
                    args: TypeIdVec::from_slice(args),
                },
                supertype: Some(supertype),
                fields,
                methods,
                generic_methods,
                is_plural: false,
                is_reference: true,
            },
        );
        self.pending_bodies.extend(queued);
        debug!(ty = %self.arena.name(tid), "specialized class");
        Ok(tid)
    }

    fn specialize_struct(
        &mut self,
        def: DefId,
        args: &[TypeId],
        key: SpecKey,
        span: Span,
    ) -> Result<TypeId, TypingError> {
        let defs = self.defs;
        let ResolvedTypeDef::Struct(s) = defs.get(def).expect("resolution fulfills definitions")
        else {
            unreachable!("specialize_struct on non-struct");
        };
        if s.generics.len() != args.len() {
            return Err(TypingError::WrongGenericArgumentCount {
                expected: s.generics.len(),
                found: args.len(),
                span: span.into(),
            });
        }
        let base = self.interner.resolve(s.name).to_string();
        let name = self.display_name(&base, args);
        let runtime = self.instance_runtime(&base, args);
        let tid = self.arena.alloc_pending(name.clone(), runtime.clone(), false);
        self.type_cache.insert(key, tid);

        let subst = Subst {
            type_args: args,
            method_args: &[],
        };
        let mut fields = Vec::with_capacity(s.fields.len());
        for f in &s.fields {
            let ty = self.type_id_of(&f.ty, subst, f.span)?;
            fields.push(FieldDef {
                name: self.interner.resolve(f.name).to_string(),
                public: f.public,
                is_static: f.is_static,
                ty,
            });
        }

        let (methods, generic_methods, queued) =
            self.build_method_table(def, tid, args, false, span)?;
        self.arena.fulfill(
            tid,
            TypeDef {
                name: name.clone(),
                runtime_name: runtime,
                kind: TypeDefKind::Struct {
                    def,
                    args: TypeIdVec::from_slice(args),
                },
                supertype: None,
                fields,
                methods,
                generic_methods,
                is_plural: true,
                is_reference: false,
            },
        );
        self.pending_bodies.extend(queued);

        // A value type laid out inline cannot contain itself
        if self.arena.stack_slots(tid).is_none() {
            return Err(TypingError::InfiniteValueType {
                ty: name,
                span: span.into(),
            });
        }
        debug!(ty = %self.arena.name(tid), "specialized struct");
        Ok(tid)
    }

    fn specialize_enum(&mut self, def: DefId, key: SpecKey) -> Result<TypeId, TypingError> {
        let defs = self.defs;
        let ResolvedTypeDef::Enum(e) = defs.get(def).expect("resolution fulfills definitions")
        else {
            unreachable!("specialize_enum on non-enum");
        };
        let name = self.interner.resolve(e.name).to_string();
        let variants: Vec<String> = e
            .variants
            .iter()
            .map(|v| self.interner.resolve(*v).to_string())
            .collect();
        let runtime = names::mangle(&name);
        let tid = self.arena.alloc_pending(name.clone(), runtime.clone(), false);
        self.type_cache.insert(key, tid);

        let i32_ty = self.basic(BasicType::I32);
        let mut methods = Vec::with_capacity(variants.len() + 1);
        for (ordinal, variant) in variants.iter().enumerate() {
            methods.push(MethodDef {
                name: variant.clone(),
                runtime_name: variant.clone(),
                is_static: true,
                is_const: false,
                params: Vec::new(),
                ret: tid,
                kind: MethodKind::Bytecode {
                    cost: 1,
                    pre: Vec::new(),
                    ops: vec![Instruction::Push(
                        crate::lower::ir::Constant::Int(ordinal as i64),
                        tid,
                    )],
                },
            });
        }
        // The backing value already is the ordinal
        methods.push(MethodDef {
            name: "ordinal".to_string(),
            runtime_name: "ordinal".to_string(),
            is_static: false,
            is_const: false,
            params: Vec::new(),
            ret: i32_ty,
            kind: MethodKind::Bytecode {
                cost: 0,
                pre: Vec::new(),
                ops: Vec::new(),
            },
        });

        let generic_methods = self.impl_generic_methods(def);
        self.arena.fulfill(
            tid,
            TypeDef {
                name,
                runtime_name: runtime,
                kind: TypeDefKind::Enum { def },
                supertype: None,
                fields: Vec::new(),
                methods,
                generic_methods,
                is_plural: false,
                is_reference: false,
            },
        );
        self.append_impl_methods(tid, def, &[])?;
        Ok(tid)
    }

    /// Build the eager method signatures for a class or struct: its own
    /// methods first, then impl-block methods, with overload runtime names
    /// assigned in source order and `new` renamed to the host constructor.
    fn build_method_table(
        &mut self,
        def: DefId,
        owner: TypeId,
        type_args: &[TypeId],
        is_class: bool,
        span: Span,
    ) -> Result<(Vec<MethodDef>, Vec<GenericMethodDef>, Vec<PendingBody>), TypingError> {
        let defs = self.defs;
        let impl_list = self.impl_list;
        let mut sources: Vec<(MethodSource, &'a ResolvedMethod)> = Vec::new();
        match defs.get(def).expect("resolution fulfills definitions") {
            ResolvedTypeDef::Class(c) => {
                for (i, m) in c.methods.iter().enumerate() {
                    sources.push((MethodSource::TypeDef { method_index: i }, m));
                }
            }
            ResolvedTypeDef::Struct(s) => {
                for (i, m) in s.methods.iter().enumerate() {
                    sources.push((MethodSource::TypeDef { method_index: i }, m));
                }
            }
            _ => {}
        }
        if let Some(entries) = self.impls_by_target.get(&def) {
            for &(impl_index, method_index) in entries {
                let m = &impl_list[impl_index].methods[method_index];
                sources.push((
                    MethodSource::Impl {
                        impl_index,
                        method_index,
                    },
                    m,
                ));
            }
        }

        let mut methods = Vec::new();
        let mut generic_methods = Vec::new();
        let mut queued = Vec::new();
        let mut name_counts: FxHashMap<String, u32> = FxHashMap::default();
        let subst = Subst {
            type_args,
            method_args: &[],
        };
        for (source, m) in sources {
            if !m.generics.is_empty() {
                generic_methods.push(GenericMethodDef {
                    name: m.name,
                    generic_count: m.generics.len(),
                    def,
                    source,
                });
                continue;
            }
            let params = self.param_types(&m.params, subst)?;
            let ret = self.type_id_of(&m.return_type, subst, m.span)?;
            let base = self.interner.resolve(m.name).to_string();
            let runtime_name = if is_class && base == "new" {
                "<init>".to_string()
            } else {
                let n = name_counts.entry(base.clone()).or_insert(0);
                let rn = if *n == 0 {
                    base.clone()
                } else {
                    format!("{base}${n}")
                };
                *n += 1;
                rn
            };
            let method_index = methods.len();
            methods.push(builtins::pending_method(
                base,
                runtime_name,
                m.is_static,
                m.is_const,
                params,
                ret,
            ));
            queued.push(PendingBody {
                owner,
                method_index,
                def,
                source,
                type_args: TypeIdVec::from_slice(type_args),
                method_args: SmallVec::new(),
            });
        }
        let _ = span;
        Ok((methods, generic_methods, queued))
    }

    /// Generic templates contributed by impl blocks on a definition that has
    /// no own method table (builtins, enums, reflected types)
    fn impl_generic_methods(&self, def: DefId) -> Vec<GenericMethodDef> {
        let Some(entries) = self.impls_by_target.get(&def) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter_map(|&(impl_index, method_index)| {
                let m = &self.impl_list[impl_index].methods[method_index];
                (!m.generics.is_empty()).then(|| GenericMethodDef {
                    name: m.name,
                    generic_count: m.generics.len(),
                    def,
                    source: MethodSource::Impl {
                        impl_index,
                        method_index,
                    },
                })
            })
            .collect()
    }

    /// Append non-generic impl-block methods to an already-fulfilled type
    /// (builtins, enums, reflected types; classes and structs pick theirs up
    /// in `build_method_table`).
    fn append_impl_methods(
        &mut self,
        owner: TypeId,
        def: DefId,
        type_args: &[TypeId],
    ) -> Result<(), TypingError> {
        let Some(entries) = self.impls_by_target.get(&def).cloned() else {
            return Ok(());
        };
        let impl_list = self.impl_list;
        let subst = Subst {
            type_args,
            method_args: &[],
        };
        for (impl_index, method_index) in entries {
            let m = &impl_list[impl_index].methods[method_index];
            if !m.generics.is_empty() {
                continue;
            }
            let is_static = m.is_static;
            let is_const = m.is_const;
            let params = self.param_types(&m.params, subst)?;
            let ret = self.type_id_of(&m.return_type, subst, m.span)?;
            let base = self.interner.resolve(m.name).to_string();
            let owner_def = self.arena.def(owner).expect("owner fulfilled");
            let n = owner_def.methods.iter().filter(|om| om.name == base).count();
            let runtime_name = if n == 0 {
                base.clone()
            } else {
                format!("{base}${n}")
            };
            let owner_def = self.arena.def_mut(owner).expect("owner fulfilled");
            let new_index = owner_def.methods.len();
            owner_def.methods.push(builtins::pending_method(
                base,
                runtime_name,
                is_static,
                is_const,
                params,
                ret,
            ));
            self.pending_bodies.push_back(PendingBody {
                owner,
                method_index: new_index,
                def,
                source: MethodSource::Impl {
                    impl_index,
                    method_index,
                },
                type_args: TypeIdVec::from_slice(type_args),
                method_args: SmallVec::new(),
            });
        }
        Ok(())
    }

    /// Specialize a generic method at an explicit argument tuple, appending
    /// the new method to the owner. Equal tuples return the cached index.
    pub(crate) fn specialize_method(
        &mut self,
        owner: TypeId,
        template: &GenericMethodDef,
        args: &[TypeId],
        span: Span,
    ) -> Result<usize, TypingError> {
        let key = MethodSpecKey::new(owner, template.name, TypeIdVec::from_slice(args));
        if let Some(&index) = self.method_cache.get(&key) {
            return Ok(index);
        }
        if args.len() != template.generic_count {
            return Err(TypingError::WrongGenericArgumentCount {
                expected: template.generic_count,
                found: args.len(),
                span: span.into(),
            });
        }
        let m = self.resolved_method(template.def, template.source);
        let type_args: TypeIdVec = match self.arena.def(owner).map(|d| &d.kind) {
            Some(TypeDefKind::Class { args, .. }) | Some(TypeDefKind::Struct { args, .. }) => {
                args.clone()
            }
            _ => SmallVec::new(),
        };
        let subst = Subst {
            type_args: &type_args,
            method_args: args,
        };
        let params = self.param_types(&m.params, subst)?;
        let ret = self.type_id_of(&m.return_type, subst, m.span)?;
        let is_static = m.is_static;
        let is_const = m.is_const;
        let base = self.interner.resolve(template.name).to_string();

        let owner_def = self.arena.def(owner).expect("owner fulfilled");
        let n = owner_def.methods.iter().filter(|om| om.name == base).count();
        let runtime_name = if n == 0 {
            base.clone()
        } else {
            format!("{base}${n}")
        };

        let owner_def = self.arena.def_mut(owner).expect("owner fulfilled");
        let index = owner_def.methods.len();
        owner_def.methods.push(builtins::pending_method(
            base, runtime_name, is_static, is_const, params, ret,
        ));
        self.method_cache.insert(key, index);
        self.pending_bodies.push_back(PendingBody {
            owner,
            method_index: index,
            def: template.def,
            source: template.source,
            type_args,
            method_args: TypeIdVec::from_slice(args),
        });
        debug!(method = %self.interner.resolve(template.name), "specialized generic method");
        Ok(index)
    }

    // ------------------------------------------------------------------
    // Type construction helpers
    // ------------------------------------------------------------------

    pub(crate) fn basic(&mut self, basic: BasicType) -> TypeId {
        self.specialize(self.builtins.def_of(basic), &[], Span::default())
            .expect("basic types always specialize")
    }

    pub(crate) fn unit_type(&mut self) -> TypeId {
        self.tuple_type(&[])
    }

    pub(crate) fn tuple_type(&mut self, elems: &[TypeId]) -> TypeId {
        let key = TypeIdVec::from_slice(elems);
        if let Some(&tid) = self.tuple_cache.get(&key) {
            return tid;
        }
        let name = format!(
            "({})",
            elems
                .iter()
                .map(|&e| self.arena.name(e).to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        let elem_runtimes: Vec<&str> = elems.iter().map(|&e| self.arena.runtime_name(e)).collect();
        let runtime = names::tuple_runtime_name(&elem_runtimes);
        let tid = self.arena.alloc_pending(name.clone(), runtime.clone(), false);
        let fields = elems
            .iter()
            .enumerate()
            .map(|(i, &e)| FieldDef {
                name: format!("v{i}"),
                public: true,
                is_static: false,
                ty: e,
            })
            .collect();
        self.arena.fulfill(
            tid,
            TypeDef {
                name,
                runtime_name: runtime,
                kind: TypeDefKind::Tuple,
                supertype: None,
                fields,
                methods: Vec::new(),
                generic_methods: Vec::new(),
                is_plural: true,
                is_reference: false,
            },
        );
        self.tuple_cache.insert(key, tid);
        tid
    }

    pub(crate) fn func_type(&mut self, params: &[TypeId], ret: TypeId) -> TypeId {
        let key = (TypeIdVec::from_slice(params), ret);
        if let Some(&tid) = self.func_cache.get(&key) {
            return tid;
        }
        let name = format!(
            "fn({}): {}",
            params
                .iter()
                .map(|&p| self.arena.name(p).to_string())
                .collect::<Vec<_>>()
                .join(", "),
            self.arena.name(ret)
        );
        let param_runtimes: Vec<&str> =
            params.iter().map(|&p| self.arena.runtime_name(p)).collect();
        let runtime = names::func_runtime_name(&param_runtimes, self.arena.runtime_name(ret));
        let tid = self.arena.alloc_pending(name.clone(), runtime.clone(), true);
        let object = self.basic(BasicType::Object);
        self.arena.fulfill(
            tid,
            TypeDef {
                name,
                runtime_name: runtime,
                kind: TypeDefKind::FuncType {
                    params: TypeIdVec::from_slice(params),
                    ret,
                },
                supertype: Some(object),
                fields: Vec::new(),
                methods: vec![builtins::invoke_slot(params.to_vec(), ret)],
                generic_methods: Vec::new(),
                is_plural: false,
                is_reference: true,
            },
        );
        self.func_cache.insert(key, tid);
        tid
    }

    /// Convert a resolved type into a TypeId under the given substitution
    pub(crate) fn type_id_of(
        &mut self,
        rt: &ResolvedType,
        subst: Subst<'_>,
        span: Span,
    ) -> Result<TypeId, TypingError> {
        match rt {
            ResolvedType::Def { def, args } => {
                let mut arg_ids = Vec::with_capacity(args.len());
                for a in args {
                    arg_ids.push(self.type_id_of(a, subst, span)?);
                }
                self.specialize(*def, &arg_ids, span)
            }
            ResolvedType::TypeGeneric { index, .. } => Ok(*subst
                .type_args
                .get(*index)
                .expect("resolution validated type generic indices")),
            ResolvedType::MethodGeneric { index, .. } => Ok(*subst
                .method_args
                .get(*index)
                .expect("resolution validated method generic indices")),
            ResolvedType::Tuple(parts) => {
                let mut ids = Vec::with_capacity(parts.len());
                for p in parts {
                    ids.push(self.type_id_of(p, subst, span)?);
                }
                Ok(self.tuple_type(&ids))
            }
            ResolvedType::Func { params, ret } => {
                let mut ids = Vec::with_capacity(params.len());
                for p in params {
                    ids.push(self.type_id_of(p, subst, span)?);
                }
                let ret = self.type_id_of(ret, subst, span)?;
                Ok(self.func_type(&ids, ret))
            }
        }
    }

    /// Parameter types from the declared pattern annotations
    pub(crate) fn param_types(
        &mut self,
        params: &[ResolvedPattern],
        subst: Subst<'_>,
    ) -> Result<Vec<TypeId>, TypingError> {
        params
            .iter()
            .map(|p| match self.pattern_type(p) {
                Some(rt) => self.type_id_of(&rt, subst, p.span),
                None => Err(TypingError::UntypedParameter {
                    span: p.span.into(),
                }),
            })
            .collect()
    }

    /// The resolved type a pattern declares, when every binding is covered
    fn pattern_type(&self, p: &ResolvedPattern) -> Option<ResolvedType> {
        match &p.kind {
            crate::resolver::ResolvedPatternKind::Typed(_, ty) => Some(ty.clone()),
            crate::resolver::ResolvedPatternKind::Tuple(parts) => {
                let mut tys = Vec::with_capacity(parts.len());
                for part in parts {
                    tys.push(self.pattern_type(part)?);
                }
                Some(ResolvedType::Tuple(tys))
            }
            crate::resolver::ResolvedPatternKind::Binding(_) => None,
        }
    }

    pub(crate) fn resolved_method(&self, def: DefId, source: MethodSource) -> &'a ResolvedMethod {
        match source {
            MethodSource::TypeDef { method_index } => {
                match self.defs.get(def).expect("resolution fulfills definitions") {
                    ResolvedTypeDef::Class(c) => &c.methods[method_index],
                    ResolvedTypeDef::Struct(s) => &s.methods[method_index],
                    _ => unreachable!("type-def method source on a definition without methods"),
                }
            }
            MethodSource::Impl {
                impl_index,
                method_index,
            } => &self.impl_list[impl_index].methods[method_index],
        }
    }

    fn host_type(&mut self, ty: HostType) -> TypeId {
        match ty {
            HostType::Bool => self.basic(BasicType::Bool),
            HostType::I32 => self.basic(BasicType::I32),
            HostType::I64 => self.basic(BasicType::I64),
            HostType::F32 => self.basic(BasicType::F32),
            HostType::F64 => self.basic(BasicType::F64),
            HostType::Str => self.basic(BasicType::Str),
            HostType::Object => self.basic(BasicType::Object),
            HostType::Unit => self.unit_type(),
        }
    }

    fn display_name(&self, base: &str, args: &[TypeId]) -> String {
        if args.is_empty() {
            base.to_string()
        } else {
            format!(
                "{base}<{}>",
                args.iter()
                    .map(|&a| self.arena.name(a).to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        }
    }

    fn instance_runtime(&self, base: &str, args: &[TypeId]) -> String {
        let arg_runtimes: Vec<&str> = args.iter().map(|&a| self.arena.runtime_name(a)).collect();
        names::instance_runtime_name(base, &arg_runtimes)
    }

    pub(crate) fn describe_resolved(&self, rt: &ResolvedType) -> String {
        match rt {
            ResolvedType::Def { def, .. } => {
                match self.defs.get(*def) {
                    Some(ResolvedTypeDef::Class(c)) => self.interner.resolve(c.name).to_string(),
                    Some(ResolvedTypeDef::Struct(s)) => self.interner.resolve(s.name).to_string(),
                    Some(ResolvedTypeDef::Enum(e)) => self.interner.resolve(e.name).to_string(),
                    Some(ResolvedTypeDef::Builtin(b)) => b.name().to_string(),
                    Some(ResolvedTypeDef::Reflected(i)) => {
                        self.registry.classes[*i].name.to_string()
                    }
                    Some(ResolvedTypeDef::Alias(_)) | None => "alias".to_string(),
                }
            }
            ResolvedType::TypeGeneric { name, .. } | ResolvedType::MethodGeneric { name, .. } => {
                self.interner.resolve(*name).to_string()
            }
            ResolvedType::Tuple(_) => "tuple".to_string(),
            ResolvedType::Func { .. } => "function".to_string(),
        }
    }

    /// Structural assignability: exact match, reference widening to object,
    /// walking the primary supertype chain, and closure implementations to
    /// their erased interface.
    pub(crate) fn assignable(&mut self, from: TypeId, to: TypeId) -> bool {
        if from == to {
            return true;
        }
        let object = self.basic(BasicType::Object);
        if to == object && self.arena.is_reference(from) {
            return true;
        }
        if let Some(def) = self.arena.def(from) {
            if let TypeDefKind::FuncImpl { func } = def.kind {
                if func == to {
                    return true;
                }
            }
        }
        let mut current = from;
        while let Some(sup) = self.arena.def(current).and_then(|d| d.supertype) {
            if sup == to {
                return true;
            }
            current = sup;
        }
        false
    }
}
