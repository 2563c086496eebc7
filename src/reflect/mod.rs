// src/reflect/mod.rs
//
// The host-interop bridge. Host classes surface as compile-time types
// through a build-time registry: a manually written table mapping bridged
// types to host members and their descriptor strings. Each entry records
// what the host annotations (SnuggleAllow, SnuggleDeny, SnuggleRename,
// SnuggleStatic, SnuggleAcknowledgeGenerics) expressed on the original
// platform; members denied on the host side are simply absent from the
// table.
//
// Registry validation runs once at compiler start-up and is fatal; no user
// source is involved, so these errors carry no spans.

use crate::errors::ReflectError;
use std::collections::HashSet;

/// Host-side types a bridged member may mention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostType {
    Bool,
    I32,
    I64,
    F32,
    F64,
    Str,
    Object,
    Unit,
}

#[derive(Debug, Clone)]
pub struct HostMethod {
    /// Name on the host class
    pub name: &'static str,
    /// Snuggle-visible name, when renamed (SnuggleRename)
    pub rename: Option<&'static str>,
    /// Static on the host class (independent of singleton mode)
    pub is_static: bool,
    pub params: Vec<HostType>,
    pub ret: HostType,
    /// Host descriptor used verbatim in the invocation instruction
    pub descriptor: &'static str,
}

impl HostMethod {
    pub fn snuggle_name(&self) -> &'static str {
        self.rename.unwrap_or(self.name)
    }
}

#[derive(Debug, Clone)]
pub struct HostField {
    pub name: &'static str,
    pub ty: HostType,
    pub descriptor: &'static str,
}

#[derive(Debug, Clone)]
pub struct HostClass {
    /// Snuggle-visible name (after any class-level rename)
    pub name: &'static str,
    /// Host runtime name, slash-separated
    pub runtime_name: &'static str,
    /// Number of type parameters on the host class
    pub type_params: u32,
    /// SnuggleAcknowledgeGenerics: explicit opt-in to erasure
    pub acknowledge_generics: bool,
    /// SnuggleStatic: a process-wide instance lives in a well-known static
    /// field of the runtime class
    pub is_singleton: bool,
    /// Identifies the singleton instance slot; must be paired with
    /// `is_singleton`
    pub object_index: Option<u32>,
    /// Name of the static field holding the singleton instance
    pub instance_field: &'static str,
    pub methods: Vec<HostMethod>,
    pub fields: Vec<HostField>,
}

#[derive(Debug, Clone, Default)]
pub struct HostRegistry {
    pub classes: Vec<HostClass>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry every compile starts from: the `print` singleton.
    pub fn default_registry() -> Self {
        Self {
            classes: vec![HostClass {
                name: "print",
                runtime_name: "snuggle/runtime/Print",
                type_params: 0,
                acknowledge_generics: false,
                is_singleton: true,
                object_index: Some(0),
                instance_field: "INSTANCE",
                methods: vec![
                    HostMethod {
                        name: "println",
                        rename: None,
                        is_static: false,
                        params: vec![HostType::Str],
                        ret: HostType::Unit,
                        descriptor: "(Ljava/lang/String;)V",
                    },
                    HostMethod {
                        name: "printlnInt",
                        rename: Some("println"),
                        is_static: false,
                        params: vec![HostType::I32],
                        ret: HostType::Unit,
                        descriptor: "(I)V",
                    },
                    HostMethod {
                        name: "printlnBool",
                        rename: Some("println"),
                        is_static: false,
                        params: vec![HostType::Bool],
                        ret: HostType::Unit,
                        descriptor: "(Z)V",
                    },
                ],
                fields: vec![],
            }],
        }
    }

    pub fn add(&mut self, class: HostClass) {
        self.classes.push(class);
    }

    /// Validate every entry; invalid entries are fatal at compiler start-up.
    pub fn validate(&self) -> Result<(), ReflectError> {
        let mut seen = HashSet::new();
        for class in &self.classes {
            if !seen.insert(class.name) {
                return Err(ReflectError::DuplicateClassName {
                    name: class.name.to_string(),
                });
            }
            if class.type_params > 0 && !class.acknowledge_generics {
                return Err(ReflectError::UnacknowledgedGenerics {
                    name: class.name.to_string(),
                });
            }
            if class.is_singleton && class.object_index.is_none() {
                return Err(ReflectError::SingletonWithoutObjectIndex {
                    name: class.name.to_string(),
                });
            }
            if !class.is_singleton && class.object_index.is_some() {
                return Err(ReflectError::ObjectIndexWithoutSingleton {
                    name: class.name.to_string(),
                });
            }
            if class.is_singleton && !class.fields.is_empty() {
                return Err(ReflectError::SingletonWithFields {
                    name: class.name.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_class(name: &'static str) -> HostClass {
        HostClass {
            name,
            runtime_name: "host/Bare",
            type_params: 0,
            acknowledge_generics: false,
            is_singleton: false,
            object_index: None,
            instance_field: "INSTANCE",
            methods: vec![],
            fields: vec![],
        }
    }

    #[test]
    fn default_registry_is_valid() {
        assert!(HostRegistry::default_registry().validate().is_ok());
    }

    #[test]
    fn generic_host_class_must_acknowledge_erasure() {
        let mut registry = HostRegistry::new();
        let mut class = bare_class("List");
        class.type_params = 1;
        registry.add(class);
        assert!(matches!(
            registry.validate(),
            Err(ReflectError::UnacknowledgedGenerics { .. })
        ));

        let mut registry = HostRegistry::new();
        let mut class = bare_class("List");
        class.type_params = 1;
        class.acknowledge_generics = true;
        registry.add(class);
        assert!(registry.validate().is_ok());
    }

    #[test]
    fn singleton_pairing_is_enforced() {
        let mut registry = HostRegistry::new();
        let mut class = bare_class("Sys");
        class.is_singleton = true;
        registry.add(class);
        assert!(matches!(
            registry.validate(),
            Err(ReflectError::SingletonWithoutObjectIndex { .. })
        ));

        let mut registry = HostRegistry::new();
        let mut class = bare_class("Sys");
        class.object_index = Some(2);
        registry.add(class);
        assert!(matches!(
            registry.validate(),
            Err(ReflectError::ObjectIndexWithoutSingleton { .. })
        ));
    }

    #[test]
    fn singleton_fields_are_rejected() {
        let mut registry = HostRegistry::new();
        let mut class = bare_class("Sys");
        class.is_singleton = true;
        class.object_index = Some(0);
        class.fields.push(HostField {
            name: "out",
            ty: HostType::Object,
            descriptor: "Ljava/lang/Object;",
        });
        registry.add(class);
        assert!(matches!(
            registry.validate(),
            Err(ReflectError::SingletonWithFields { .. })
        ));
    }
}
