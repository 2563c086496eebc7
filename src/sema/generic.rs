// src/sema/generic.rs
//
// Generic specialization caches. Specialization is memoized by equality on
// the argument tuple: asking for the same definition at an equal tuple twice
// returns the identical handle. A non-generic definition is simply its own
// zero-argument specialization, which keeps the code path uniform.

use crate::frontend::Symbol;
use crate::resolver::DefId;
use crate::sema::type_arena::{TypeId, TypeIdVec};
use rustc_hash::FxHashMap;
use std::hash::Hash;

/// Shared cache shape for type and method specializations: a map keyed by
/// the argument tuple. Runtime names of specializations come from the
/// owner's per-name overload counts, not from here.
#[derive(Debug)]
pub struct SpecCache<K, V> {
    instances: FxHashMap<K, V>,
}

impl<K: Hash + Eq, V> Default for SpecCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq, V> SpecCache<K, V> {
    pub fn new() -> Self {
        Self {
            instances: FxHashMap::default(),
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.instances.get(key)
    }

    pub fn insert(&mut self, key: K, instance: V) {
        self.instances.insert(key, instance);
    }

    pub fn contains(&self, key: &K) -> bool {
        self.instances.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.instances.values()
    }
}

/// Key for a type specialization: the definition plus the concrete argument
/// tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpecKey {
    pub def: DefId,
    pub args: TypeIdVec,
}

impl SpecKey {
    pub fn new(def: DefId, args: TypeIdVec) -> Self {
        Self { def, args }
    }
}

/// Key for a generic method specialization within an already-specialized
/// owner type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSpecKey {
    pub owner: TypeId,
    pub name: Symbol,
    pub args: TypeIdVec,
}

impl MethodSpecKey {
    pub fn new(owner: TypeId, name: Symbol, args: TypeIdVec) -> Self {
        Self { owner, name, args }
    }
}

/// All type specializations produced during one compile
pub type TypeSpecCache = SpecCache<SpecKey, TypeId>;

/// Method specializations: the value is the method's index in the owner's
/// method list.
pub type MethodSpecCache = SpecCache<MethodSpecKey, usize>;

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn equal_argument_tuples_share_a_key() {
        let mut cache = TypeSpecCache::new();
        let def = DefId(3);
        let i32_ty = TypeId(0);
        let str_ty = TypeId(1);

        let key1 = SpecKey::new(def, smallvec![i32_ty]);
        let key2 = SpecKey::new(def, smallvec![str_ty]);
        let key1_dup = SpecKey::new(def, smallvec![i32_ty]);

        assert!(!cache.contains(&key1));
        cache.insert(key1.clone(), TypeId(7));

        assert!(cache.contains(&key1));
        assert!(cache.contains(&key1_dup)); // Same types = same key
        assert!(!cache.contains(&key2)); // Different types = different key
        assert_eq!(cache.get(&key1_dup), Some(&TypeId(7)));
    }
}
