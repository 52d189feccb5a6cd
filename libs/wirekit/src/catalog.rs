//! Link-time registry of component type descriptors.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::component::{Classifier, Component, TypeInfo, TypeName};

/// Submitted by components via `inventory::submit!`.
pub struct ComponentRegistration(pub fn() -> Arc<TypeInfo>);

inventory::collect!(ComponentRegistration);

/// All known type descriptors, keyed by qualified name.
#[derive(Default)]
pub struct TypeCatalog {
    types: BTreeMap<TypeName, Arc<TypeInfo>>,
}

impl TypeCatalog {
    /// Collect every descriptor linked into the binary.
    pub fn discover() -> Self {
        let mut catalog = Self::default();
        for registration in ::inventory::iter::<ComponentRegistration> {
            catalog.register(registration.0());
        }
        tracing::debug!(types = catalog.len(), "Type catalog discovered");
        catalog
    }

    /// Returns false (and keeps the first entry) when the name is already taken
    /// by a different descriptor.
    pub fn register(&mut self, ty: Arc<TypeInfo>) -> bool {
        if let Some(existing) = self.types.get(ty.name()) {
            if !Arc::ptr_eq(existing, &ty) {
                tracing::warn!(name = %ty.name(), "Duplicate type registration ignored");
                return false;
            }
            return true;
        }
        self.types.insert(ty.name().clone(), ty);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TypeInfo>> {
        self.types.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &TypeName> {
        self.types.keys()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Classify every registered descriptor, dropping unmarked ones.
    pub fn classify_all(&self, classifier: &Classifier) -> Vec<Arc<Component>> {
        self.types
            .values()
            .filter_map(|ty| classifier.classify(ty))
            .collect()
    }
}
