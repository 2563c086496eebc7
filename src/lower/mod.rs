// src/lower/mod.rs
//
// Lowering: typed AST -> IR program. The walk threads a `desired` field
// path into every recursive call; expressions that produce plural values
// emit code only for the requested leaves, and a whole plural value is
// never placed on the stack as one unit.

pub mod ir;
pub mod names;

pub use ir::{
    CallKind, CodeBlock, Constant, FieldRef, GeneratedClass, GeneratedField, GeneratedFuncImpl,
    GeneratedFuncType, GeneratedMethod, GeneratedType, GeneratedValueType, Instruction, LabelId,
    MethodBody, MethodRef, Program, RawOp,
};

use crate::errors::LoweringError;
use crate::frontend::Span;
use crate::sema::type_arena::{
    BodyState, FieldDef, Leaf, MethodDef, MethodKind, TypeArena, TypeDefKind, TypeId, TypeSlot,
};
use crate::sema::typed::{
    CaptureSource, ConstValue, LValue, TypedExpr, TypedExprKind, TypedProgram,
};
use tracing::debug;

/// Lower a type-checked program to the IR
pub fn lower(program: &TypedProgram) -> Result<Program, LoweringError> {
    Lowerer {
        arena: &program.arena,
    }
    .run(program)
}

struct Lowerer<'a> {
    arena: &'a TypeArena,
}

impl<'a> Lowerer<'a> {
    fn run(&self, program: &TypedProgram) -> Result<Program, LoweringError> {
        let mut out = Program::default();
        for (file, typed_file) in &program.files {
            let mut f = FnLowerer::new(self.arena, None, typed_file.max_locals);
            for e in &typed_file.exprs {
                f.expr(e, &[])?;
                f.pop_leaves(e.ty, e.span)?;
            }
            f.code.push(Instruction::Return(None));
            out.top_level.insert(file.clone(), f.finish());
            out.file_order.push(file.clone());
        }

        for (tid, slot) in self.arena.iter() {
            let TypeSlot::Ready(def) = slot else { continue };
            match def.kind {
                TypeDefKind::Class { .. } => out.types.push(self.gen_class(tid)?),
                TypeDefKind::Struct { .. }
                | TypeDefKind::Tuple
                | TypeDefKind::Enum { .. }
                | TypeDefKind::Option { .. } => out.types.push(self.gen_value_type(tid)?),
                TypeDefKind::FuncType { .. } => out.types.push(self.gen_func_type(tid)?),
                TypeDefKind::FuncImpl { .. } => out.types.push(self.gen_func_impl(tid)?),
                TypeDefKind::Basic(_) | TypeDefKind::Reflected { .. } => {}
            }
        }
        debug!(
            types = out.types.len(),
            files = out.file_order.len(),
            "lowering complete"
        );
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Generated types
    // ------------------------------------------------------------------

    fn gen_class(&self, tid: TypeId) -> Result<GeneratedType, LoweringError> {
        let def = self.arena.def(tid).expect("ready slot");
        let mut fields = Vec::new();
        for f in &def.fields {
            self.flatten_field(f, &mut fields)?;
        }
        let supertype = def
            .supertype
            .map(|s| self.arena.runtime_name(s).to_string())
            .unwrap_or_else(|| "java/lang/Object".to_string());
        Ok(GeneratedType::Class(GeneratedClass {
            runtime_name: def.runtime_name.clone(),
            supertype,
            fields,
            methods: self.gen_methods(tid)?,
        }))
    }

    fn gen_value_type(&self, tid: TypeId) -> Result<GeneratedType, LoweringError> {
        let def = self.arena.def(tid).expect("ready slot");
        // Only static fields exist at runtime; instance leaves live on the
        // stack and in flattened slots of their containers.
        let mut fields = Vec::new();
        for f in def.fields.iter().filter(|f| f.is_static) {
            self.flatten_field(f, &mut fields)?;
        }
        let mut returning_fields = Vec::new();
        if def.is_plural {
            let leaves = self.leaves_of(tid, Span::default())?;
            for leaf in leaves.iter().skip(1) {
                returning_fields.push(GeneratedField {
                    runtime_name: names::return_channel_name(&leaf.names),
                    runtime_static: true,
                    descriptor: self.descriptor_of(leaf.ty)?,
                });
            }
        }
        Ok(GeneratedType::ValueType(GeneratedValueType {
            runtime_name: def.runtime_name.clone(),
            fields,
            returning_fields,
            methods: self.gen_methods(tid)?,
        }))
    }

    fn gen_func_type(&self, tid: TypeId) -> Result<GeneratedType, LoweringError> {
        let def = self.arena.def(tid).expect("ready slot");
        Ok(GeneratedType::FuncType(GeneratedFuncType {
            runtime_name: def.runtime_name.clone(),
            methods: self.gen_methods(tid)?,
        }))
    }

    fn gen_func_impl(&self, tid: TypeId) -> Result<GeneratedType, LoweringError> {
        let def = self.arena.def(tid).expect("ready slot");
        let TypeDefKind::FuncImpl { func } = def.kind else {
            unreachable!("gen_func_impl on non-impl");
        };
        let mut fields = Vec::new();
        for f in &def.fields {
            self.flatten_field(f, &mut fields)?;
        }
        Ok(GeneratedType::FuncImpl(GeneratedFuncImpl {
            runtime_name: def.runtime_name.clone(),
            func_type: self.arena.runtime_name(func).to_string(),
            fields,
            methods: self.gen_methods(tid)?,
        }))
    }

    /// Flatten one declared field into per-leaf generated fields
    fn flatten_field(
        &self,
        f: &FieldDef,
        out: &mut Vec<GeneratedField>,
    ) -> Result<(), LoweringError> {
        for leaf in self.leaves_of(f.ty, Span::default())? {
            let mut segments = vec![f.name.clone()];
            segments.extend(leaf.names.iter().cloned());
            out.push(GeneratedField {
                runtime_name: names::field_path_name(&segments),
                runtime_static: f.is_static,
                descriptor: self.descriptor_of(leaf.ty)?,
            });
        }
        Ok(())
    }

    fn gen_methods(&self, owner: TypeId) -> Result<Vec<GeneratedMethod>, LoweringError> {
        let def = self.arena.def(owner).expect("ready slot");
        let mut out = Vec::new();
        for m in &def.methods {
            if m.is_const {
                continue; // compile-time only, nothing to emit
            }
            let descriptor = self.arena.method_descriptor(owner, m).ok_or_else(|| {
                LoweringError::Internal {
                    message: format!("descriptor of {}.{} has no layout", def.name, m.name),
                    span: Span::default().into(),
                }
            })?;
            let body = match &m.kind {
                MethodKind::Snuggle(BodyState::Typed { body, max_locals }) => {
                    MethodBody::Snuggle(self.lower_method_body(owner, m, body, *max_locals)?)
                }
                MethodKind::Snuggle(BodyState::Pending) => {
                    return Err(LoweringError::Internal {
                        message: format!("body of {}.{} was never checked", def.name, m.name),
                        span: Span::default().into(),
                    });
                }
                MethodKind::Bytecode { .. } => MethodBody::Custom,
                MethodKind::InterfaceSlot => MethodBody::Abstract,
            };
            out.push(GeneratedMethod {
                runtime_name: m.runtime_name.clone(),
                descriptor,
                // Value-type methods pass the receiver as leading arguments
                is_static: m.is_static || !self.arena.is_reference(owner),
                body,
            });
        }
        Ok(out)
    }

    fn lower_method_body(
        &self,
        _owner: TypeId,
        m: &MethodDef,
        body: &TypedExpr,
        max_locals: u32,
    ) -> Result<CodeBlock, LoweringError> {
        let mut f = FnLowerer::new(self.arena, Some(m.ret), max_locals);
        f.expr(body, &[])?;
        let ret_leaves = f.leaves_of(m.ret, body.span)?;
        if ret_leaves.is_empty() {
            // Void method: discard whatever the body left behind
            f.pop_leaves(body.ty, body.span)?;
            f.code.push(Instruction::Return(None));
        } else {
            f.emit_return_value(m.ret, body.span)?;
        }
        Ok(f.finish())
    }

    fn leaves_of(&self, ty: TypeId, span: Span) -> Result<Vec<Leaf>, LoweringError> {
        self.arena.leaves(ty).ok_or_else(|| LoweringError::Internal {
            message: format!("type {} has no layout", self.arena.name(ty)),
            span: span.into(),
        })
    }

    fn descriptor_of(&self, ty: TypeId) -> Result<String, LoweringError> {
        self.arena
            .descriptor(ty)
            .ok_or_else(|| LoweringError::Internal {
                message: format!("type {} has no descriptor", self.arena.name(ty)),
                span: Span::default().into(),
            })
    }
}

// ----------------------------------------------------------------------
// Per-body lowering
// ----------------------------------------------------------------------

struct FnLowerer<'a> {
    arena: &'a TypeArena,
    code: Vec<Instruction>,
    /// Declared return type; `None` lowers returns as void
    ret: Option<TypeId>,
    next_label: u32,
    /// Scratch slots above the bindings, used for receiver stashes
    next_stash: u32,
    max_stash: u32,
}

impl<'a> FnLowerer<'a> {
    fn new(arena: &'a TypeArena, ret: Option<TypeId>, max_locals: u32) -> Self {
        Self {
            arena,
            code: Vec::new(),
            ret,
            next_label: 0,
            next_stash: max_locals,
            max_stash: max_locals,
        }
    }

    fn finish(self) -> CodeBlock {
        CodeBlock {
            instructions: self.code,
            max_locals: self.max_stash,
        }
    }

    fn fresh_label(&mut self) -> LabelId {
        let id = LabelId(self.next_label);
        self.next_label += 1;
        id
    }

    fn stash(&mut self, slots: u32) -> u32 {
        let base = self.next_stash;
        self.next_stash += slots;
        self.max_stash = self.max_stash.max(self.next_stash);
        base
    }

    fn unstash(&mut self, slots: u32) {
        self.next_stash -= slots;
    }

    fn leaves_of(&self, ty: TypeId, span: Span) -> Result<Vec<Leaf>, LoweringError> {
        self.arena.leaves(ty).ok_or_else(|| LoweringError::Internal {
            message: format!("type {} has no layout", self.arena.name(ty)),
            span: span.into(),
        })
    }

    fn descriptor_of(&self, ty: TypeId, span: Span) -> Result<String, LoweringError> {
        self.arena
            .descriptor(ty)
            .ok_or_else(|| LoweringError::Internal {
                message: format!("type {} has no descriptor", self.arena.name(ty)),
                span: span.into(),
            })
    }

    fn internal(&self, message: impl Into<String>, span: Span) -> LoweringError {
        LoweringError::Internal {
            message: message.into(),
            span: span.into(),
        }
    }

    /// Leaves of `ty` selected by a desired-field prefix path
    fn selected(leaves: &[Leaf], desired: &[u32]) -> Vec<Leaf> {
        leaves
            .iter()
            .filter(|l| l.path.len() >= desired.len() && l.path[..desired.len()] == *desired)
            .cloned()
            .collect()
    }

    fn pop_leaves(&mut self, ty: TypeId, span: Span) -> Result<(), LoweringError> {
        let leaves = self.leaves_of(ty, span)?;
        for leaf in leaves.iter().rev() {
            self.code.push(Instruction::Pop(leaf.ty));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expression walk
    // ------------------------------------------------------------------

    fn expr(&mut self, e: &TypedExpr, desired: &[u32]) -> Result<(), LoweringError> {
        match &e.kind {
            TypedExprKind::Literal(value) => {
                self.code
                    .push(Instruction::Push(const_of(value.clone()), e.ty));
                Ok(())
            }
            TypedExprKind::Import(file) => {
                self.code.push(Instruction::RunImport(file.clone()));
                Ok(())
            }
            TypedExprKind::Variable { index } => {
                let leaves = self.leaves_of(e.ty, e.span)?;
                for leaf in Self::selected(&leaves, desired) {
                    self.code
                        .push(Instruction::LoadLocal(index + leaf.offset, leaf.ty));
                }
                Ok(())
            }
            TypedExprKind::FieldAccess {
                receiver,
                owner,
                field,
            } => self.field_access(e, receiver, *owner, *field, desired),
            TypedExprKind::StaticField { owner, field } => {
                let odef = self.arena.def(*owner).expect("owner ready");
                let fdef = &odef.fields[*field as usize];
                let owner_runtime = odef.runtime_name.clone();
                let fname = fdef.name.clone();
                let leaves = self.leaves_of(fdef.ty, e.span)?;
                for leaf in Self::selected(&leaves, desired) {
                    let mut segments = vec![fname.clone()];
                    segments.extend(leaf.names.iter().cloned());
                    self.code.push(Instruction::GetStaticField(FieldRef {
                        owner: owner_runtime.clone(),
                        name: names::field_path_name(&segments),
                        ty: leaf.ty,
                    }));
                }
                Ok(())
            }
            TypedExprKind::Call {
                receiver,
                owner,
                method,
                args,
            } => self.call(e, receiver.as_deref(), *owner, *method, args, desired),
            TypedExprKind::SuperCall {
                owner,
                method,
                args,
            } => {
                self.code.push(Instruction::LoadRefType(0));
                for arg in args {
                    self.expr(arg, &[])?;
                }
                let m = &self.arena.def(*owner).expect("owner ready").methods[*method as usize];
                let descriptor = self
                    .arena
                    .method_descriptor(*owner, m)
                    .ok_or_else(|| self.internal("super target has no descriptor", e.span))?;
                self.code.push(Instruction::Call {
                    kind: CallKind::Special,
                    method: MethodRef {
                        owner: self.arena.runtime_name(*owner).to_string(),
                        name: m.runtime_name.clone(),
                        descriptor,
                    },
                });
                let ret = m.ret;
                self.read_call_result(ret, desired, e.span)
            }
            TypedExprKind::Constructor {
                class,
                method,
                args,
            } => {
                self.code.push(Instruction::NewRefAndDup(*class));
                for arg in args {
                    self.expr(arg, &[])?;
                }
                let descriptor = match method {
                    Some(midx) => {
                        let m = &self.arena.def(*class).expect("class ready").methods
                            [*midx as usize];
                        self.arena
                            .method_descriptor(*class, m)
                            .ok_or_else(|| self.internal("constructor has no descriptor", e.span))?
                    }
                    None => "()V".to_string(),
                };
                self.code.push(Instruction::Call {
                    kind: CallKind::Special,
                    method: MethodRef {
                        owner: self.arena.runtime_name(*class).to_string(),
                        name: "<init>".to_string(),
                        descriptor,
                    },
                });
                Ok(())
            }
            TypedExprKind::RawStruct { args } => {
                match desired.split_first() {
                    None => {
                        for arg in args {
                            self.expr(arg, &[])?;
                        }
                    }
                    Some((&first, rest)) => {
                        // Only the requested field is evaluated
                        let arg = args.get(first as usize).ok_or_else(|| {
                            self.internal("desired field out of range", e.span)
                        })?;
                        self.expr(arg, rest)?;
                    }
                }
                Ok(())
            }
            TypedExprKind::Lambda { impl_ty, captures } => {
                self.lambda(e.span, *impl_ty, captures)
            }
            TypedExprKind::Declaration { pattern, value } => {
                self.expr(value, &[])?;
                let leaves = self.leaves_of(pattern.ty, e.span)?;
                for leaf in leaves.iter().rev() {
                    self.code
                        .push(Instruction::StoreLocal(pattern.index + leaf.offset, leaf.ty));
                }
                Ok(())
            }
            TypedExprKind::Assignment { target, value } => self.assignment(e, target, value),
            TypedExprKind::Return(value) => {
                match value {
                    None => self.code.push(Instruction::Return(None)),
                    Some(v) => {
                        self.expr(v, &[])?;
                        let ret = self.ret.unwrap_or(v.ty);
                        self.emit_return_value(ret, v.span)?;
                    }
                }
                Ok(())
            }
            TypedExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.expr(condition, &[])?;
                match else_branch {
                    Some(eb) => {
                        let l_else = self.fresh_label();
                        let l_end = self.fresh_label();
                        self.code.push(Instruction::JumpIfFalse(l_else));
                        self.expr(then_branch, desired)?;
                        self.code.push(Instruction::Jump(l_end));
                        self.code.push(Instruction::Label(l_else));
                        self.expr(eb, desired)?;
                        self.code.push(Instruction::Label(l_end));
                    }
                    None => {
                        let l_end = self.fresh_label();
                        self.code.push(Instruction::JumpIfFalse(l_end));
                        self.expr(then_branch, &[])?;
                        self.pop_leaves(then_branch.ty, then_branch.span)?;
                        self.code.push(Instruction::Label(l_end));
                    }
                }
                Ok(())
            }
            TypedExprKind::While { condition, body } => {
                let l_start = self.fresh_label();
                let l_end = self.fresh_label();
                self.code.push(Instruction::Label(l_start));
                self.expr(condition, &[])?;
                self.code.push(Instruction::JumpIfFalse(l_end));
                self.expr(body, &[])?;
                self.pop_leaves(body.ty, body.span)?;
                self.code.push(Instruction::Jump(l_start));
                self.code.push(Instruction::Label(l_end));
                Ok(())
            }
            TypedExprKind::Block { exprs, trailing } => {
                let last = exprs.len().checked_sub(1);
                for (i, inner) in exprs.iter().enumerate() {
                    if *trailing && Some(i) == last {
                        self.expr(inner, desired)?;
                    } else {
                        self.expr(inner, &[])?;
                        self.pop_leaves(inner.ty, inner.span)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn field_access(
        &mut self,
        e: &TypedExpr,
        receiver: &TypedExpr,
        owner: TypeId,
        field: u32,
        desired: &[u32],
    ) -> Result<(), LoweringError> {
        if self.arena.is_plural(receiver.ty) {
            // Navigation: push the field onto the desired path, no loads here
            let mut path = Vec::with_capacity(desired.len() + 1);
            path.push(field);
            path.extend_from_slice(desired);
            return self.expr(receiver, &path);
        }
        if !self.arena.is_reference(receiver.ty) {
            return Err(self.internal(
                "field access on a receiver that is neither plural nor a reference",
                e.span,
            ));
        }

        self.expr(receiver, &[])?;
        let odef = self.arena.def(owner).expect("owner ready");
        let fdef = &odef.fields[field as usize];
        let owner_runtime = odef.runtime_name.clone();
        let fname = fdef.name.clone();
        let fty = fdef.ty;
        let leaves = self.leaves_of(fty, e.span)?;
        let wanted = Self::selected(&leaves, desired);

        let field_ref = |leaf: &Leaf| {
            let mut segments = vec![fname.clone()];
            segments.extend(leaf.names.iter().cloned());
            FieldRef {
                owner: owner_runtime.clone(),
                name: names::field_path_name(&segments),
                ty: leaf.ty,
            }
        };

        match wanted.len() {
            0 => {
                // A zero-leaf (unit-typed) field: the receiver is unused
                self.code.push(Instruction::Pop(receiver.ty));
            }
            1 => {
                self.code
                    .push(Instruction::GetReferenceTypeField(field_ref(&wanted[0])));
            }
            _ => {
                // Multiple leaves: stash the receiver and reload it per leaf
                let slot = self.stash(1);
                self.code.push(Instruction::StoreLocal(slot, receiver.ty));
                for leaf in &wanted {
                    self.code.push(Instruction::LoadRefType(slot));
                    self.code
                        .push(Instruction::GetReferenceTypeField(field_ref(leaf)));
                }
                self.unstash(1);
            }
        }
        Ok(())
    }

    fn call(
        &mut self,
        e: &TypedExpr,
        receiver: Option<&TypedExpr>,
        owner: TypeId,
        method: u32,
        args: &[TypedExpr],
        desired: &[u32],
    ) -> Result<(), LoweringError> {
        let m = &self.arena.def(owner).expect("owner ready").methods[method as usize];
        if m.is_const {
            return Err(LoweringError::ConstMethodCall {
                span: e.span.into(),
            });
        }
        match &m.kind {
            MethodKind::Bytecode { pre, ops, .. } => {
                let pre = pre.clone();
                let ops = ops.clone();
                let is_static = m.is_static;
                let ret = m.ret;
                self.code.extend(pre);
                if let Some(recv) = receiver {
                    if !is_static {
                        self.expr(recv, &[])?;
                    }
                }
                for arg in args {
                    self.expr(arg, &[])?;
                }
                // The pre-computed body is inlined as one unit
                self.code.push(Instruction::Code(ops));
                if !desired.is_empty() {
                    self.narrow_leaves(ret, desired, e.span)?;
                }
                Ok(())
            }
            MethodKind::Snuggle(_) | MethodKind::InterfaceSlot => {
                let ret = m.ret;
                let is_static = m.is_static;
                let runtime_name = m.runtime_name.clone();
                let descriptor = self
                    .arena
                    .method_descriptor(owner, m)
                    .ok_or_else(|| self.internal("method has no descriptor", e.span))?;
                if let Some(recv) = receiver {
                    self.expr(recv, &[])?;
                }
                for arg in args {
                    self.expr(arg, &[])?;
                }
                let kind = self.call_kind(owner, is_static);
                self.code.push(Instruction::Call {
                    kind,
                    method: MethodRef {
                        owner: self.arena.runtime_name(owner).to_string(),
                        name: runtime_name,
                        descriptor,
                    },
                });
                self.read_call_result(ret, desired, e.span)
            }
        }
    }

    /// The call shapes map onto the invocation opcodes: class method ->
    /// virtual, value-type or static method -> static, interface slot ->
    /// interface. Super calls and constructors emit special invocations
    /// directly.
    fn call_kind(&self, owner: TypeId, is_static: bool) -> CallKind {
        if is_static {
            return CallKind::Static;
        }
        match self.arena.def(owner).map(|d| &d.kind) {
            Some(TypeDefKind::FuncType { .. }) => CallKind::Interface,
            _ if self.arena.is_reference(owner) => CallKind::Virtual,
            _ => CallKind::Static,
        }
    }

    /// After a call whose return type is plural, the first leaf is on the
    /// stack and the rest sit in the static return channels of the return
    /// type; read back only the desired leaves.
    fn read_call_result(
        &mut self,
        ret: TypeId,
        desired: &[u32],
        span: Span,
    ) -> Result<(), LoweringError> {
        let leaves = self.leaves_of(ret, span)?;
        if leaves.len() <= 1 {
            if !desired.is_empty() {
                return Err(self.internal("desired fields on a non-plural call result", span));
            }
            return Ok(());
        }
        let wanted = Self::selected(&leaves, desired);
        let owner_runtime = self.arena.runtime_name(ret).to_string();
        if !wanted.iter().any(|l| l.offset == 0) {
            self.code.push(Instruction::Pop(leaves[0].ty));
        }
        for leaf in leaves.iter().skip(1) {
            if wanted.iter().any(|w| w.offset == leaf.offset) {
                self.code.push(Instruction::GetStaticField(FieldRef {
                    owner: owner_runtime.clone(),
                    name: names::return_channel_name(&leaf.names),
                    ty: leaf.ty,
                }));
            }
        }
        Ok(())
    }

    /// A full plural value is on the stack but only part of it is wanted:
    /// spill every leaf to scratch locals and reload the selection.
    fn narrow_leaves(
        &mut self,
        ty: TypeId,
        desired: &[u32],
        span: Span,
    ) -> Result<(), LoweringError> {
        let leaves = self.leaves_of(ty, span)?;
        if leaves.len() <= 1 {
            if !desired.is_empty() {
                return Err(self.internal("desired fields on a non-plural value", span));
            }
            return Ok(());
        }
        let total = leaves.len() as u32;
        let base = self.stash(total);
        for leaf in leaves.iter().rev() {
            self.code
                .push(Instruction::StoreLocal(base + leaf.offset, leaf.ty));
        }
        for leaf in Self::selected(&leaves, desired) {
            self.code
                .push(Instruction::LoadLocal(base + leaf.offset, leaf.ty));
        }
        self.unstash(total);
        Ok(())
    }

    fn lambda(
        &mut self,
        span: Span,
        impl_ty: TypeId,
        captures: &[crate::sema::typed::Capture],
    ) -> Result<(), LoweringError> {
        self.code.push(Instruction::NewRefAndDup(impl_ty));
        self.code.push(Instruction::Call {
            kind: CallKind::Special,
            method: MethodRef {
                owner: self.arena.runtime_name(impl_ty).to_string(),
                name: "<init>".to_string(),
                descriptor: "()V".to_string(),
            },
        });
        let impl_runtime = self.arena.runtime_name(impl_ty).to_string();
        for (field_index, cap) in captures.iter().enumerate() {
            let fname = self.arena.def(impl_ty).expect("impl ready").fields[field_index]
                .name
                .clone();
            for leaf in self.leaves_of(cap.ty, span)? {
                self.code.push(Instruction::DupRef);
                match cap.source {
                    CaptureSource::Local(index) => {
                        self.code
                            .push(Instruction::LoadLocal(index + leaf.offset, leaf.ty));
                    }
                    CaptureSource::EnclosingField { owner, field } => {
                        let odef = self.arena.def(owner).expect("enclosing impl ready");
                        let outer_name = odef.fields[field as usize].name.clone();
                        let mut segments = vec![outer_name];
                        segments.extend(leaf.names.iter().cloned());
                        self.code.push(Instruction::LoadRefType(0));
                        self.code.push(Instruction::GetReferenceTypeField(FieldRef {
                            owner: odef.runtime_name.clone(),
                            name: names::field_path_name(&segments),
                            ty: leaf.ty,
                        }));
                    }
                }
                let mut segments = vec![fname.clone()];
                segments.extend(leaf.names.iter().cloned());
                self.code.push(Instruction::PutReferenceTypeField(FieldRef {
                    owner: impl_runtime.clone(),
                    name: names::field_path_name(&segments),
                    ty: leaf.ty,
                }));
            }
        }
        Ok(())
    }

    /// Assignment mirrors the read protocol in reverse: the RHS leaves go
    /// onto the stack, then each leaf is stored back-to-front.
    fn assignment(
        &mut self,
        e: &TypedExpr,
        target: &LValue,
        value: &TypedExpr,
    ) -> Result<(), LoweringError> {
        match target {
            LValue::Local { index, ty, path } => {
                self.expr(value, &[])?;
                let base = self
                    .arena
                    .offset_of_path(*ty, path)
                    .ok_or_else(|| self.internal("assignment path has no layout", e.span))?;
                let target_ty = self
                    .arena
                    .type_at_path(*ty, path)
                    .ok_or_else(|| self.internal("assignment path is invalid", e.span))?;
                let leaves = self.leaves_of(target_ty, e.span)?;
                for leaf in leaves.iter().rev() {
                    self.code
                        .push(Instruction::StoreLocal(index + base + leaf.offset, leaf.ty));
                }
                Ok(())
            }
            LValue::Static { owner, field, path } => {
                self.expr(value, &[])?;
                let odef = self.arena.def(*owner).expect("owner ready");
                let fdef = &odef.fields[*field as usize];
                let owner_runtime = odef.runtime_name.clone();
                let (prefix, target_ty) = self.path_segments(fdef.ty, &fdef.name, path, e.span)?;
                let leaves = self.leaves_of(target_ty, e.span)?;
                for leaf in leaves.iter().rev() {
                    let mut segments = prefix.clone();
                    segments.extend(leaf.names.iter().cloned());
                    self.code.push(Instruction::PutStaticField(FieldRef {
                        owner: owner_runtime.clone(),
                        name: names::field_path_name(&segments),
                        ty: leaf.ty,
                    }));
                }
                Ok(())
            }
            LValue::Field {
                receiver,
                owner,
                path,
            } => {
                // Receiver first, stashed; then the RHS; then store each
                // leaf, reloading the receiver and swapping to keep the
                // stack in (receiver, value) order.
                self.expr(receiver, &[])?;
                let slot = self.stash(1);
                self.code.push(Instruction::StoreLocal(slot, receiver.ty));
                self.expr(value, &[])?;

                let odef = self.arena.def(*owner).expect("owner ready");
                let (first, rest) = path
                    .split_first()
                    .ok_or_else(|| self.internal("empty assignment path", e.span))?;
                let fdef = &odef.fields[*first as usize];
                let owner_runtime = odef.runtime_name.clone();
                let (prefix, target_ty) = self.path_segments(fdef.ty, &fdef.name, rest, e.span)?;
                let leaves = self.leaves_of(target_ty, e.span)?;
                for leaf in leaves.iter().rev() {
                    self.code.push(Instruction::LoadRefType(slot));
                    self.code.push(Instruction::SwapBasic(receiver.ty, leaf.ty));
                    let mut segments = prefix.clone();
                    segments.extend(leaf.names.iter().cloned());
                    self.code.push(Instruction::PutReferenceTypeField(FieldRef {
                        owner: owner_runtime.clone(),
                        name: names::field_path_name(&segments),
                        ty: leaf.ty,
                    }));
                }
                self.unstash(1);
                Ok(())
            }
        }
    }

    /// Walk a field path below `root_ty`, returning the name segments
    /// (starting with `root_name`) and the type at the end of the path.
    fn path_segments(
        &self,
        root_ty: TypeId,
        root_name: &str,
        path: &[u32],
        span: Span,
    ) -> Result<(Vec<String>, TypeId), LoweringError> {
        let mut segments = vec![root_name.to_string()];
        let mut current = root_ty;
        for &index in path {
            let def = self
                .arena
                .def(current)
                .ok_or_else(|| self.internal("assignment path through pending type", span))?;
            let fdef = &def.fields[index as usize];
            segments.push(fdef.name.clone());
            current = fdef.ty;
        }
        Ok((segments, current))
    }

    fn emit_return_value(&mut self, ret: TypeId, span: Span) -> Result<(), LoweringError> {
        let leaves = self.leaves_of(ret, span)?;
        match leaves.len() {
            0 => self.code.push(Instruction::Return(None)),
            1 => self.code.push(Instruction::Return(Some(leaves[0].ty))),
            _ => {
                // Store all but the first leaf into the static return
                // channels of the return type, then return the first leaf.
                let owner_runtime = self.arena.runtime_name(ret).to_string();
                for leaf in leaves.iter().skip(1).rev() {
                    self.code.push(Instruction::PutStaticField(FieldRef {
                        owner: owner_runtime.clone(),
                        name: names::return_channel_name(&leaf.names),
                        ty: leaf.ty,
                    }));
                }
                self.code.push(Instruction::Return(Some(leaves[0].ty)));
            }
        }
        Ok(())
    }
}

fn const_of(value: ConstValue) -> Constant {
    match value {
        ConstValue::Int(v) => Constant::Int(v),
        ConstValue::Float(v) => Constant::Float(v),
        ConstValue::Bool(v) => Constant::Bool(v),
        ConstValue::Str(v) => Constant::Str(v),
        ConstValue::Null => Constant::Null,
    }
}
