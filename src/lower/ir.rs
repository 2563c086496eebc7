// src/lower/ir.rs
//
// The instruction vocabulary consumed by the bytecode writer, plus the
// generated-type model describing each class file to emit. The vocabulary is
// closed: lowering never emits anything outside these variants.

use crate::sema::type_arena::TypeId;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// A branch target, unique within one method body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelId(pub u32);

/// A compile-time constant pushed by `Push`
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Null,
}

/// A host method reference: owner class runtime name, member name, and the
/// JVM-style descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

/// A host field reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub owner: String,
    pub name: String,
    pub ty: TypeId,
}

/// Invocation shape for `Call`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Virtual,
    Static,
    Special,
    Interface,
}

/// Raw JVM-family opcodes used inside `Bytecodes` sequences. Comparison
/// opcodes are pseudo-ops that leave a boolean; the writer expands them to
/// the branch idiom of the target format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawOp {
    Iconst(i32),
    Ior,
    Iand,
    Ixor,
    Iadd,
    Isub,
    Imul,
    Idiv,
    Irem,
    Ineg,
    IcmpEq,
    IcmpLt,
    IcmpGt,
    IcmpLe,
    IcmpGe,
    Ladd,
    Lsub,
    Lmul,
    Ldiv,
    Lrem,
    Lneg,
    LcmpEq,
    LcmpLt,
    Fadd,
    Fsub,
    Fmul,
    Fdiv,
    FcmpEq,
    FcmpLt,
    Dadd,
    Dsub,
    Dmul,
    Ddiv,
    DcmpEq,
    DcmpLt,
}

/// One instruction of the stack-machine IR
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// A nested instruction sequence, kept as a unit (used when a bytecode
    /// method body is inlined at its call site)
    Code(Vec<Instruction>),
    /// A raw opcode sequence with an estimated cost
    Bytecodes { cost: u32, ops: SmallVec<[RawOp; 4]> },
    /// Run the top-level code of an imported file (at most once, per the
    /// runtime contract)
    RunImport(String),
    Call {
        kind: CallKind,
        method: MethodRef,
    },
    /// Return the value on the stack; `None` returns void
    Return(Option<TypeId>),
    Label(LabelId),
    Jump(LabelId),
    JumpIfTrue(LabelId),
    JumpIfFalse(LabelId),
    Push(Constant, TypeId),
    Pop(TypeId),
    /// Swap the top two single-slot values; operands are (top, second)
    SwapBasic(TypeId, TypeId),
    /// Allocate a reference-type instance and duplicate the reference
    NewRefAndDup(TypeId),
    DupRef,
    /// Load a reference-typed local (receiver stashes, `this`)
    LoadRefType(u32),
    StoreLocal(u32, TypeId),
    LoadLocal(u32, TypeId),
    GetReferenceTypeField(FieldRef),
    PutReferenceTypeField(FieldRef),
    GetStaticField(FieldRef),
    PutStaticField(FieldRef),
}

/// An instruction sequence plus the local-slot high-water mark
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeBlock {
    pub instructions: Vec<Instruction>,
    pub max_locals: u32,
}

/// A field of a generated class file. The runtime name is distinct from the
/// Snuggle source name so plural-field paths can be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedField {
    pub runtime_name: String,
    pub runtime_static: bool,
    pub descriptor: String,
}

/// How a generated method gets its body
#[derive(Debug, Clone, PartialEq)]
pub enum MethodBody {
    /// A user method, lowered to instructions
    Snuggle(CodeBlock),
    /// A bytecode method: its body is inlined at every call site, so the
    /// writer emits only the member slot
    Custom,
    /// An abstract interface slot
    Abstract,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedMethod {
    pub runtime_name: String,
    pub descriptor: String,
    pub is_static: bool,
    pub body: MethodBody,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedClass {
    pub runtime_name: String,
    pub supertype: String,
    pub fields: Vec<GeneratedField>,
    pub methods: Vec<GeneratedMethod>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedValueType {
    pub runtime_name: String,
    pub fields: Vec<GeneratedField>,
    /// Static channels that carry the non-first leaves of plural returns
    pub returning_fields: Vec<GeneratedField>,
    pub methods: Vec<GeneratedMethod>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedFuncType {
    pub runtime_name: String,
    pub methods: Vec<GeneratedMethod>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedFuncImpl {
    pub runtime_name: String,
    pub func_type: String,
    pub fields: Vec<GeneratedField>,
    pub methods: Vec<GeneratedMethod>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedType {
    Class(GeneratedClass),
    ValueType(GeneratedValueType),
    FuncType(GeneratedFuncType),
    FuncImpl(GeneratedFuncImpl),
}

impl GeneratedType {
    pub fn runtime_name(&self) -> &str {
        match self {
            GeneratedType::Class(c) => &c.runtime_name,
            GeneratedType::ValueType(v) => &v.runtime_name,
            GeneratedType::FuncType(f) => &f.runtime_name,
            GeneratedType::FuncImpl(f) => &f.runtime_name,
        }
    }

    pub fn methods(&self) -> &[GeneratedMethod] {
        match self {
            GeneratedType::Class(c) => &c.methods,
            GeneratedType::ValueType(v) => &v.methods,
            GeneratedType::FuncType(f) => &f.methods,
            GeneratedType::FuncImpl(f) => &f.methods,
        }
    }
}

/// The lowered program: every generated type plus, per file, the lowered
/// top-level instruction block.
#[derive(Debug, Default)]
pub struct Program {
    pub types: Vec<GeneratedType>,
    pub top_level: FxHashMap<String, CodeBlock>,
    /// File order as discovered by resolution (imports before importers)
    pub file_order: Vec<String>,
}

impl Program {
    /// Find a generated type by runtime name
    pub fn type_named(&self, runtime_name: &str) -> Option<&GeneratedType> {
        self.types.iter().find(|t| t.runtime_name() == runtime_name)
    }
}
