// src/sema/builtins.rs
//
// The built-in type set provided at resolution entry, and the bytecode
// method tables for each basic type. Builtin methods are pre-computed
// instruction sequences inlined at their call sites.

use crate::frontend::{Interner, Symbol};
use crate::lower::ir::{CallKind, Constant, Instruction, MethodRef, RawOp};
use crate::reflect::HostRegistry;
use crate::resolver::{DefArena, DefId, ResolvedTypeDef};
use crate::sema::type_arena::{BodyState, MethodDef, MethodKind, TypeArena, TypeDefKind, TypeId};
use smallvec::SmallVec;

/// The non-generic basic builtins plus `Option`, the one generic one.
/// `IntLiteral` is the compile-time type of integer literals; it never
/// survives into a typed expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Object,
    Str,
    Option,
    IntLiteral,
}

impl BasicType {
    pub fn name(&self) -> &'static str {
        match self {
            BasicType::Bool => "bool",
            BasicType::I8 => "i8",
            BasicType::I16 => "i16",
            BasicType::I32 => "i32",
            BasicType::I64 => "i64",
            BasicType::F32 => "f32",
            BasicType::F64 => "f64",
            BasicType::Object => "object",
            BasicType::Str => "string",
            BasicType::Option => "Option",
            BasicType::IntLiteral => "IntLiteral",
        }
    }

    pub fn runtime_name(&self) -> &'static str {
        match self {
            BasicType::Object => "java/lang/Object",
            BasicType::Str => "java/lang/String",
            BasicType::Option => "snuggle/lang/Option",
            other => other.name(),
        }
    }

    pub fn descriptor(&self) -> &'static str {
        match self {
            BasicType::Bool => "Z",
            BasicType::I8 => "B",
            BasicType::I16 => "S",
            BasicType::I32 | BasicType::IntLiteral => "I",
            BasicType::I64 => "J",
            BasicType::F32 => "F",
            BasicType::F64 => "D",
            BasicType::Object => "Ljava/lang/Object;",
            BasicType::Str => "Ljava/lang/String;",
            BasicType::Option => "Ljava/lang/Object;",
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, BasicType::Object | BasicType::Str)
    }

    pub fn all() -> &'static [BasicType] {
        &[
            BasicType::Bool,
            BasicType::I8,
            BasicType::I16,
            BasicType::I32,
            BasicType::I64,
            BasicType::F32,
            BasicType::F64,
            BasicType::Object,
            BasicType::Str,
            BasicType::Option,
            BasicType::IntLiteral,
        ]
    }
}

/// The builtin definitions seeded into the resolution arena before the
/// name resolver runs: every basic type plus one entry per reflected host
/// class.
#[derive(Debug)]
pub struct BuiltinSet {
    /// Name bindings visible at the top of every file
    pub scope: Vec<(Symbol, DefId)>,
    basics: Vec<(BasicType, DefId)>,
    /// One DefId per registry class, in registry order
    pub reflected: Vec<DefId>,
}

impl BuiltinSet {
    pub fn install(
        arena: &mut DefArena,
        interner: &mut Interner,
        registry: &HostRegistry,
    ) -> BuiltinSet {
        let mut scope = Vec::new();
        let mut basics = Vec::new();
        for &basic in BasicType::all() {
            let def = arena.insert(ResolvedTypeDef::Builtin(basic));
            scope.push((interner.intern(basic.name()), def));
            basics.push((basic, def));
        }
        let mut reflected = Vec::new();
        for (index, class) in registry.classes.iter().enumerate() {
            let def = arena.insert(ResolvedTypeDef::Reflected(index));
            scope.push((interner.intern(class.name), def));
            reflected.push(def);
        }
        BuiltinSet {
            scope,
            basics,
            reflected,
        }
    }

    pub fn def_of(&self, basic: BasicType) -> DefId {
        self.basics
            .iter()
            .find(|(b, _)| *b == basic)
            .map(|(_, d)| *d)
            .expect("every basic type is installed")
    }
}

fn raw(cost: u32, ops: &[RawOp]) -> MethodKind {
    MethodKind::Bytecode {
        cost,
        pre: Vec::new(),
        ops: vec![Instruction::Bytecodes {
            cost,
            ops: SmallVec::from_slice(ops),
        }],
    }
}

fn method(name: &str, params: Vec<TypeId>, ret: TypeId, kind: MethodKind) -> MethodDef {
    MethodDef {
        name: name.to_string(),
        runtime_name: name.to_string(),
        is_static: false,
        is_const: false,
        params,
        ret,
        kind,
    }
}

fn static_method(name: &str, params: Vec<TypeId>, ret: TypeId, kind: MethodKind) -> MethodDef {
    MethodDef {
        is_static: true,
        ..method(name, params, ret, kind)
    }
}

/// Boolean algebra over the int-backed boolean representation
pub fn bool_methods(self_ty: TypeId) -> Vec<MethodDef> {
    vec![
        method("add", vec![self_ty], self_ty, raw(1, &[RawOp::Ior])),
        method("mul", vec![self_ty], self_ty, raw(1, &[RawOp::Iand])),
        method(
            "not",
            vec![],
            self_ty,
            raw(2, &[RawOp::Iconst(1), RawOp::Ixor]),
        ),
        method(
            "eq",
            vec![self_ty],
            self_ty,
            raw(3, &[RawOp::Ixor, RawOp::Iconst(1), RawOp::Ixor]),
        ),
    ]
}

struct IntOps {
    add: RawOp,
    sub: RawOp,
    mul: RawOp,
    div: RawOp,
    rem: RawOp,
    neg: RawOp,
    eq: RawOp,
    lt: RawOp,
}

fn int_ops(kind: BasicType) -> IntOps {
    match kind {
        BasicType::I64 => IntOps {
            add: RawOp::Ladd,
            sub: RawOp::Lsub,
            mul: RawOp::Lmul,
            div: RawOp::Ldiv,
            rem: RawOp::Lrem,
            neg: RawOp::Lneg,
            eq: RawOp::LcmpEq,
            lt: RawOp::LcmpLt,
        },
        _ => IntOps {
            add: RawOp::Iadd,
            sub: RawOp::Isub,
            mul: RawOp::Imul,
            div: RawOp::Idiv,
            rem: RawOp::Irem,
            neg: RawOp::Ineg,
            eq: RawOp::IcmpEq,
            lt: RawOp::IcmpLt,
        },
    }
}

/// Arithmetic and comparison methods shared by the integer widths
pub fn int_methods(kind: BasicType, self_ty: TypeId, bool_ty: TypeId) -> Vec<MethodDef> {
    let ops = int_ops(kind);
    let mut out = vec![
        method("add", vec![self_ty], self_ty, raw(1, &[ops.add])),
        method("sub", vec![self_ty], self_ty, raw(1, &[ops.sub])),
        method("mul", vec![self_ty], self_ty, raw(1, &[ops.mul])),
        method("div", vec![self_ty], self_ty, raw(1, &[ops.div])),
        method("rem", vec![self_ty], self_ty, raw(1, &[ops.rem])),
        method("neg", vec![], self_ty, raw(1, &[ops.neg])),
        method("eq", vec![self_ty], bool_ty, raw(1, &[ops.eq])),
        method("lt", vec![self_ty], bool_ty, raw(1, &[ops.lt])),
    ];
    // gt via the int comparison pseudo-ops only exists for 32-bit-and-below
    if !matches!(kind, BasicType::I64) {
        out.push(method("gt", vec![self_ty], bool_ty, raw(1, &[RawOp::IcmpGt])));
        out.push(method("le", vec![self_ty], bool_ty, raw(1, &[RawOp::IcmpLe])));
        out.push(method("ge", vec![self_ty], bool_ty, raw(1, &[RawOp::IcmpGe])));
    }
    out
}

pub fn float_methods(kind: BasicType, self_ty: TypeId, bool_ty: TypeId) -> Vec<MethodDef> {
    let double = matches!(kind, BasicType::F64);
    let (add, sub, mul, div, eq, lt) = if double {
        (
            RawOp::Dadd,
            RawOp::Dsub,
            RawOp::Dmul,
            RawOp::Ddiv,
            RawOp::DcmpEq,
            RawOp::DcmpLt,
        )
    } else {
        (
            RawOp::Fadd,
            RawOp::Fsub,
            RawOp::Fmul,
            RawOp::Fdiv,
            RawOp::FcmpEq,
            RawOp::FcmpLt,
        )
    };
    vec![
        method("add", vec![self_ty], self_ty, raw(1, &[add])),
        method("sub", vec![self_ty], self_ty, raw(1, &[sub])),
        method("mul", vec![self_ty], self_ty, raw(1, &[mul])),
        method("div", vec![self_ty], self_ty, raw(1, &[div])),
        method("eq", vec![self_ty], bool_ty, raw(1, &[eq])),
        method("lt", vec![self_ty], bool_ty, raw(1, &[lt])),
    ]
}

pub fn string_methods(self_ty: TypeId) -> Vec<MethodDef> {
    vec![method(
        "concat",
        vec![self_ty],
        self_ty,
        MethodKind::Bytecode {
            cost: 1,
            pre: Vec::new(),
            ops: vec![Instruction::Call {
                kind: CallKind::Virtual,
                method: MethodRef {
                    owner: "java/lang/String".to_string(),
                    name: "concat".to_string(),
                    descriptor: "(Ljava/lang/String;)Ljava/lang/String;".to_string(),
                },
            }],
        },
    )]
}

/// The zero value pushed for an absent `Option` payload leaf
pub fn default_constant(arena: &TypeArena, leaf: TypeId) -> Constant {
    if arena.is_reference(leaf) {
        return Constant::Null;
    }
    match arena.def(leaf).map(|d| &d.kind) {
        Some(TypeDefKind::Basic(BasicType::Bool)) => Constant::Bool(false),
        Some(TypeDefKind::Basic(BasicType::F32 | BasicType::F64)) => Constant::Float(0.0),
        _ => Constant::Int(0),
    }
}

/// Methods of `Option<T>`, laid out as the payload leaves followed by a
/// presence flag.
pub fn option_methods(
    arena: &TypeArena,
    self_ty: TypeId,
    arg: TypeId,
    bool_ty: TypeId,
) -> Option<Vec<MethodDef>> {
    let arg_leaves = arena.leaves(arg)?;

    // get: drop the presence flag, leaving the payload leaves
    let get = method(
        "get",
        vec![],
        arg,
        MethodKind::Bytecode {
            cost: 1,
            pre: Vec::new(),
            ops: vec![Instruction::Pop(bool_ty)],
        },
    );

    // some: the payload is already on the stack, mark it present
    let some = static_method(
        "some",
        vec![arg],
        self_ty,
        MethodKind::Bytecode {
            cost: 1,
            pre: Vec::new(),
            ops: vec![Instruction::Push(Constant::Bool(true), bool_ty)],
        },
    );

    // none: push a zero value per payload leaf, then an absent flag
    let mut none_ops: Vec<Instruction> = arg_leaves
        .iter()
        .map(|leaf| Instruction::Push(default_constant(arena, leaf.ty), leaf.ty))
        .collect();
    none_ops.push(Instruction::Push(Constant::Bool(false), bool_ty));
    let none = static_method(
        "none",
        vec![],
        self_ty,
        MethodKind::Bytecode {
            cost: arg_leaves.len() as u32 + 1,
            pre: Vec::new(),
            ops: none_ops,
        },
    );

    Some(vec![get, some, none])
}

/// A method def for the `invoke` slot of a func type
pub fn invoke_slot(params: Vec<TypeId>, ret: TypeId) -> MethodDef {
    MethodDef {
        name: "invoke".to_string(),
        runtime_name: "invoke".to_string(),
        is_static: false,
        is_const: false,
        params,
        ret,
        kind: MethodKind::InterfaceSlot,
    }
}

/// A snuggle-bodied method starting in the pending state
pub fn pending_method(
    name: String,
    runtime_name: String,
    is_static: bool,
    is_const: bool,
    params: Vec<TypeId>,
    ret: TypeId,
) -> MethodDef {
    MethodDef {
        name,
        runtime_name,
        is_static,
        is_const,
        params,
        ret,
        kind: MethodKind::Snuggle(BodyState::Pending),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_table_uses_the_documented_opcodes() {
        let self_ty = TypeId(0);
        let methods = bool_methods(self_ty);
        let find = |name: &str| {
            methods
                .iter()
                .find(|m| m.name == name)
                .expect("method exists")
        };

        let ops_of = |m: &MethodDef| match &m.kind {
            MethodKind::Bytecode { ops, .. } => match &ops[0] {
                Instruction::Bytecodes { ops, .. } => ops.to_vec(),
                other => panic!("expected raw ops, got {other:?}"),
            },
            other => panic!("expected bytecode method, got {other:?}"),
        };

        assert_eq!(ops_of(find("add")), vec![RawOp::Ior]);
        assert_eq!(ops_of(find("mul")), vec![RawOp::Iand]);
        assert_eq!(ops_of(find("not")), vec![RawOp::Iconst(1), RawOp::Ixor]);
    }

    #[test]
    fn i64_arithmetic_uses_long_opcodes() {
        let methods = int_methods(BasicType::I64, TypeId(0), TypeId(1));
        let add = methods.iter().find(|m| m.name == "add").unwrap();
        match &add.kind {
            MethodKind::Bytecode { ops, .. } => {
                assert_eq!(
                    ops[0],
                    Instruction::Bytecodes {
                        cost: 1,
                        ops: SmallVec::from_slice(&[RawOp::Ladd]),
                    }
                );
            }
            other => panic!("expected bytecode method, got {other:?}"),
        }
    }
}
