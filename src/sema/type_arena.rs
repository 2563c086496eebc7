// src/sema/type_arena.rs
//
// The typing arena owns every TypeDef produced by specialization; a TypeId
// handle is the only way later passes refer to a type. A slot is Pending
// while its definition is being specialized (the typed-side indirection that
// lets self-referencing types check without cycles) and Ready afterwards.

use crate::frontend::Symbol;
use crate::lower::ir::Instruction;
use crate::resolver::DefId;
use crate::sema::builtins::BasicType;
use crate::sema::typed::TypedExpr;
use smallvec::SmallVec;

/// Handle to a type definition in the arena.
///
/// Unlike `DefId` (which identifies a *definition* like `class Box<T>`),
/// `TypeId` identifies a concrete instantiated type (like `Box<i32>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub u32);

impl TypeId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// SmallVec for type argument tuples - inline up to 4
pub type TypeIdVec = SmallVec<[TypeId; 4]>;

/// Discriminates the shape of a TypeDef
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDefKind {
    /// bool, int widths, float widths, object, string, int-literal
    Basic(BasicType),
    /// The one generic builtin
    Option { arg: TypeId },
    /// Bridge to a host class; index into the `HostRegistry`
    Reflected { host: usize },
    Class { def: DefId, args: TypeIdVec },
    Struct { def: DefId, args: TypeIdVec },
    Enum { def: DefId },
    /// Anonymous plural struct
    Tuple,
    /// Closure type, erased to an interface with a single `invoke` slot
    FuncType { params: TypeIdVec, ret: TypeId },
    /// One implementation class per lambda
    FuncImpl { func: TypeId },
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub public: bool,
    pub is_static: bool,
    pub ty: TypeId,
}

/// State of a Snuggle method's body.
///
/// Signatures are computed eagerly when a type is specialized; bodies sit in
/// a pending queue and are checked afterwards, so body-typing of one method
/// can force signature-typing of another without recursing into its body.
#[derive(Debug, Clone)]
pub enum BodyState {
    Pending,
    Typed { body: TypedExpr, max_locals: u32 },
}

#[derive(Debug, Clone)]
pub enum MethodKind {
    /// User-defined method with a typed body
    Snuggle(BodyState),
    /// Builtin or bridged method: a pre-computed instruction sequence that
    /// is inlined at every call site. `pre` is emitted before the arguments
    /// (singleton-instance loads), `ops` after them.
    Bytecode {
        cost: u32,
        pre: Vec<Instruction>,
        ops: Vec<Instruction>,
    },
    /// Abstract interface slot
    InterfaceSlot,
}

#[derive(Debug, Clone)]
pub struct MethodDef {
    pub name: String,
    /// Runtime name after overload disambiguation and constructor renaming
    pub runtime_name: String,
    pub is_static: bool,
    /// Const methods are compile-time only; lowering rejects calls to them
    pub is_const: bool,
    /// Parameter types, excluding the receiver
    pub params: Vec<TypeId>,
    pub ret: TypeId,
    pub kind: MethodKind,
}

/// Where a generic method template's resolved form lives
#[derive(Debug, Clone, Copy)]
pub enum MethodSource {
    TypeDef { method_index: usize },
    Impl { impl_index: usize, method_index: usize },
}

/// A generic method: a factory producing specializations keyed by the tuple
/// of method type arguments. The resolved template stays in the resolution
/// arena; specializations are appended to the owner's method list on demand.
#[derive(Debug, Clone)]
pub struct GenericMethodDef {
    pub name: Symbol,
    pub generic_count: usize,
    pub def: DefId,
    pub source: MethodSource,
}

#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: String,
    pub runtime_name: String,
    pub kind: TypeDefKind,
    pub supertype: Option<TypeId>,
    pub fields: Vec<FieldDef>,
    pub methods: Vec<MethodDef>,
    pub generic_methods: Vec<GenericMethodDef>,
    pub is_plural: bool,
    pub is_reference: bool,
}

impl TypeDef {
    /// Non-static fields in declaration order
    pub fn instance_fields(&self) -> impl Iterator<Item = (usize, &FieldDef)> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.is_static)
    }
}

#[derive(Debug)]
pub enum TypeSlot {
    Pending {
        name: String,
        runtime_name: String,
        is_reference: bool,
    },
    Ready(TypeDef),
}

/// One leaf slot of a (possibly plural) value
#[derive(Debug, Clone)]
pub struct Leaf {
    /// Field indices from the root type to the leaf; empty for non-plural
    pub path: SmallVec<[u32; 4]>,
    /// Field names along the path, for `$`-mangled runtime names
    pub names: SmallVec<[String; 4]>,
    pub ty: TypeId,
    /// Slot offset from the start of the value
    pub offset: u32,
}

#[derive(Debug, Default)]
pub struct TypeArena {
    slots: Vec<TypeSlot>,
}

impl TypeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_pending(&mut self, name: String, runtime_name: String, is_reference: bool) -> TypeId {
        let id = TypeId(self.slots.len() as u32);
        self.slots.push(TypeSlot::Pending {
            name,
            runtime_name,
            is_reference,
        });
        id
    }

    pub fn fulfill(&mut self, id: TypeId, def: TypeDef) {
        let slot = &mut self.slots[id.0 as usize];
        debug_assert!(
            matches!(slot, TypeSlot::Pending { .. }),
            "type slot fulfilled twice"
        );
        *slot = TypeSlot::Ready(def);
    }

    pub fn slot(&self, id: TypeId) -> &TypeSlot {
        &self.slots[id.0 as usize]
    }

    pub fn def(&self, id: TypeId) -> Option<&TypeDef> {
        match &self.slots[id.0 as usize] {
            TypeSlot::Ready(def) => Some(def),
            TypeSlot::Pending { .. } => None,
        }
    }

    pub fn def_mut(&mut self, id: TypeId) -> Option<&mut TypeDef> {
        match &mut self.slots[id.0 as usize] {
            TypeSlot::Ready(def) => Some(def),
            TypeSlot::Pending { .. } => None,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &TypeSlot)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, s)| (TypeId(i as u32), s))
    }

    pub fn name(&self, id: TypeId) -> &str {
        match &self.slots[id.0 as usize] {
            TypeSlot::Ready(def) => &def.name,
            TypeSlot::Pending { name, .. } => name,
        }
    }

    pub fn runtime_name(&self, id: TypeId) -> &str {
        match &self.slots[id.0 as usize] {
            TypeSlot::Ready(def) => &def.runtime_name,
            TypeSlot::Pending { runtime_name, .. } => runtime_name,
        }
    }

    pub fn is_reference(&self, id: TypeId) -> bool {
        match &self.slots[id.0 as usize] {
            TypeSlot::Ready(def) => def.is_reference,
            TypeSlot::Pending { is_reference, .. } => *is_reference,
        }
    }

    pub fn is_plural(&self, id: TypeId) -> bool {
        match &self.slots[id.0 as usize] {
            TypeSlot::Ready(def) => def.is_plural,
            TypeSlot::Pending { is_reference, .. } => !is_reference,
        }
    }

    /// Number of stack slots a value of this type occupies. `None` when the
    /// layout cannot be computed (a pending slot, or a value type that
    /// recursively contains itself).
    pub fn stack_slots(&self, id: TypeId) -> Option<u32> {
        let mut visiting = Vec::new();
        self.stack_slots_inner(id, &mut visiting)
    }

    fn stack_slots_inner(&self, id: TypeId, visiting: &mut Vec<TypeId>) -> Option<u32> {
        if self.is_reference(id) {
            return Some(1);
        }
        if visiting.contains(&id) {
            return None;
        }
        let def = match &self.slots[id.0 as usize] {
            TypeSlot::Ready(def) => def,
            TypeSlot::Pending { .. } => return None,
        };
        if !def.is_plural {
            return Some(1);
        }
        visiting.push(id);
        let mut total = 0;
        for (_, field) in def.instance_fields() {
            total += self.stack_slots_inner(field.ty, visiting)?;
        }
        visiting.pop();
        Some(total)
    }

    /// Enumerate the leaf slots of a value of this type, in layout order.
    /// A non-plural type is a single leaf with an empty path.
    pub fn leaves(&self, id: TypeId) -> Option<Vec<Leaf>> {
        let mut out = Vec::new();
        let mut visiting = Vec::new();
        let mut offset = 0;
        self.leaves_inner(
            id,
            &mut SmallVec::new(),
            &mut SmallVec::new(),
            &mut offset,
            &mut visiting,
            &mut out,
        )?;
        Some(out)
    }

    #[allow(clippy::too_many_arguments)]
    fn leaves_inner(
        &self,
        id: TypeId,
        path: &mut SmallVec<[u32; 4]>,
        names: &mut SmallVec<[String; 4]>,
        offset: &mut u32,
        visiting: &mut Vec<TypeId>,
        out: &mut Vec<Leaf>,
    ) -> Option<()> {
        if !self.is_plural(id) {
            out.push(Leaf {
                path: path.clone(),
                names: names.clone(),
                ty: id,
                offset: *offset,
            });
            *offset += 1;
            return Some(());
        }
        if visiting.contains(&id) {
            return None;
        }
        let def = self.def(id)?;
        visiting.push(id);
        for (index, field) in def.instance_fields() {
            path.push(index as u32);
            names.push(field.name.clone());
            self.leaves_inner(field.ty, path, names, offset, visiting, out)?;
            names.pop();
            path.pop();
        }
        visiting.pop();
        Some(())
    }

    /// Slot offset of a field path within a value of this type
    pub fn offset_of_path(&self, id: TypeId, path: &[u32]) -> Option<u32> {
        let mut offset = 0;
        let mut current = id;
        for &index in path {
            let def = self.def(current)?;
            for (i, field) in def.instance_fields() {
                if i as u32 == index {
                    current = field.ty;
                    break;
                }
                offset += self.stack_slots(field.ty)?;
            }
        }
        Some(offset)
    }

    /// The type reached by following a field path
    pub fn type_at_path(&self, id: TypeId, path: &[u32]) -> Option<TypeId> {
        let mut current = id;
        for &index in path {
            let def = self.def(current)?;
            current = def.fields.get(index as usize)?.ty;
        }
        Some(current)
    }

    /// JVM-style descriptor of one leaf type
    pub fn descriptor(&self, id: TypeId) -> Option<String> {
        if let Some(def) = self.def(id) {
            if let TypeDefKind::Basic(basic) = &def.kind {
                return Some(basic.descriptor().to_string());
            }
            if matches!(def.kind, TypeDefKind::Enum { .. }) {
                return Some("I".to_string());
            }
        }
        if self.is_reference(id) {
            return Some(format!("L{};", self.runtime_name(id)));
        }
        None
    }

    /// Descriptors of every leaf slot, in layout order
    pub fn descriptors(&self, id: TypeId) -> Option<Vec<String>> {
        self.leaves(id)?
            .iter()
            .map(|leaf| self.descriptor(leaf.ty))
            .collect()
    }

    /// JVM-style method descriptor. A value-typed receiver contributes its
    /// leaves as leading parameters (struct methods lower to static calls);
    /// a plural return contributes only its first leaf, the rest travel
    /// through static return channels.
    pub fn method_descriptor(&self, owner: TypeId, method: &MethodDef) -> Option<String> {
        let mut out = String::from("(");
        if !method.is_static && !self.is_reference(owner) {
            for leaf in self.leaves(owner)? {
                out.push_str(&self.descriptor(leaf.ty)?);
            }
        }
        for &param in &method.params {
            for leaf in self.leaves(param)? {
                out.push_str(&self.descriptor(leaf.ty)?);
            }
        }
        out.push(')');
        let ret_leaves = self.leaves(method.ret)?;
        match ret_leaves.first() {
            None => out.push('V'),
            Some(first) => out.push_str(&self.descriptor(first.ty)?),
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(arena: &mut TypeArena, kind: BasicType, name: &str) -> TypeId {
        let id = arena.alloc_pending(name.into(), name.into(), false);
        arena.fulfill(
            id,
            TypeDef {
                name: name.into(),
                runtime_name: name.into(),
                kind: TypeDefKind::Basic(kind),
                supertype: None,
                fields: vec![],
                methods: vec![],
                generic_methods: vec![],
                is_plural: false,
                is_reference: false,
            },
        );
        id
    }

    fn pair_struct(arena: &mut TypeArena, a: TypeId, b: TypeId) -> TypeId {
        let id = arena.alloc_pending("Pair".into(), "Pair".into(), false);
        arena.fulfill(
            id,
            TypeDef {
                name: "Pair".into(),
                runtime_name: "Pair".into(),
                kind: TypeDefKind::Tuple,
                supertype: None,
                fields: vec![
                    FieldDef {
                        name: "a".into(),
                        public: true,
                        is_static: false,
                        ty: a,
                    },
                    FieldDef {
                        name: "b".into(),
                        public: true,
                        is_static: false,
                        ty: b,
                    },
                ],
                methods: vec![],
                generic_methods: vec![],
                is_plural: true,
                is_reference: false,
            },
        );
        id
    }

    #[test]
    fn plural_slots_are_the_sum_of_leaf_slots() {
        let mut arena = TypeArena::new();
        let i32_ty = basic(&mut arena, BasicType::I32, "i32");
        let bool_ty = basic(&mut arena, BasicType::Bool, "bool");
        let pair = pair_struct(&mut arena, i32_ty, bool_ty);
        let nested = pair_struct(&mut arena, pair, i32_ty);

        assert_eq!(arena.stack_slots(i32_ty), Some(1));
        assert_eq!(arena.stack_slots(pair), Some(2));
        assert_eq!(arena.stack_slots(nested), Some(3));
    }

    #[test]
    fn leaves_carry_paths_and_offsets() {
        let mut arena = TypeArena::new();
        let i32_ty = basic(&mut arena, BasicType::I32, "i32");
        let bool_ty = basic(&mut arena, BasicType::Bool, "bool");
        let pair = pair_struct(&mut arena, i32_ty, bool_ty);
        let nested = pair_struct(&mut arena, pair, i32_ty);

        let leaves = arena.leaves(nested).unwrap();
        assert_eq!(leaves.len(), 3);
        assert_eq!(leaves[0].path.as_slice(), &[0, 0]);
        assert_eq!(leaves[0].names.as_slice(), &["a", "a"]);
        assert_eq!(leaves[1].path.as_slice(), &[0, 1]);
        assert_eq!(leaves[2].path.as_slice(), &[1]);
        assert_eq!(leaves[2].offset, 2);
    }

    #[test]
    fn recursive_value_type_has_no_layout() {
        let mut arena = TypeArena::new();
        let id = arena.alloc_pending("Loop".into(), "Loop".into(), false);
        arena.fulfill(
            id,
            TypeDef {
                name: "Loop".into(),
                runtime_name: "Loop".into(),
                kind: TypeDefKind::Tuple,
                supertype: None,
                fields: vec![FieldDef {
                    name: "again".into(),
                    public: true,
                    is_static: false,
                    ty: id,
                }],
                methods: vec![],
                generic_methods: vec![],
                is_plural: true,
                is_reference: false,
            },
        );
        assert_eq!(arena.stack_slots(id), None);
        assert!(arena.leaves(id).is_none());
    }

    #[test]
    fn method_descriptor_flattens_value_receiver() {
        let mut arena = TypeArena::new();
        let i32_ty = basic(&mut arena, BasicType::I32, "i32");
        let bool_ty = basic(&mut arena, BasicType::Bool, "bool");
        let pair = pair_struct(&mut arena, i32_ty, bool_ty);

        let method = MethodDef {
            name: "sum".into(),
            runtime_name: "sum".into(),
            is_static: false,
            is_const: false,
            params: vec![i32_ty],
            ret: i32_ty,
            kind: MethodKind::Snuggle(BodyState::Pending),
        };
        assert_eq!(
            arena.method_descriptor(pair, &method).unwrap(),
            "(IZI)I".to_string()
        );
    }
}
