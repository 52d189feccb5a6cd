//! Component type descriptors and their classification.
//!
//! A [`TypeInfo`] is what the runtime knows about a discovered type: its
//! fully-qualified name, its markers and its direct supertypes. The
//! [`Classifier`] turns a descriptor into a [`Component`], which is the only
//! thing the dependency tree ever looks at.

use std::borrow::Borrow;
use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::DashMap;

use crate::instance::{Arguments, Instance};
use crate::version::Version;

/// Fully-qualified name of a discovered type. This is the identity of every
/// node in the dependency tree.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName(Arc<str>);

impl TypeName {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl Borrow<str> for TypeName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TypeName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// One constructor parameter: the contract it needs, the version it was
/// written against, and whether it wants a [`Factory`](crate::Factory)
/// instead of a ready instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub target: TypeName,
    pub version: Version,
    pub lazy: bool,
}

type ConstructFn = dyn Fn(Arguments) -> anyhow::Result<Instance> + Send + Sync;

/// The single public constructor of an implementation.
#[derive(Clone)]
pub struct Constructor {
    parameters: Vec<Dependency>,
    invoke: Arc<ConstructFn>,
}

impl Constructor {
    pub fn new<F>(invoke: F) -> Self
    where
        F: Fn(Arguments) -> anyhow::Result<Instance> + Send + Sync + 'static,
    {
        Self {
            parameters: Vec::new(),
            invoke: Arc::new(invoke),
        }
    }

    /// Appends a parameter receiving a built instance of `target`.
    pub fn param(mut self, target: impl Into<TypeName>, version: Version) -> Self {
        self.parameters.push(Dependency {
            target: target.into(),
            version,
            lazy: false,
        });
        self
    }

    /// Appends a parameter receiving a factory for `target`.
    pub fn lazy_param(mut self, target: impl Into<TypeName>, version: Version) -> Self {
        self.parameters.push(Dependency {
            target: target.into(),
            version,
            lazy: true,
        });
        self
    }

    pub fn parameters(&self) -> &[Dependency] {
        &self.parameters
    }

    pub(crate) fn invoke(&self, args: Arguments) -> anyhow::Result<Instance> {
        (self.invoke)(args)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Runtime descriptor of a discovered type.
pub struct TypeInfo {
    name: TypeName,
    version: Option<Version>,
    unique: bool,
    constructor: Option<Constructor>,
    supertypes: Vec<Arc<TypeInfo>>,
}

impl TypeInfo {
    /// A type carrying the version marker: a service contract.
    pub fn contract(name: impl Into<TypeName>, version: Version) -> TypeInfoBuilder {
        TypeInfoBuilder::new(name.into()).version(version)
    }

    /// A type carrying the module marker: an implementation built through `constructor`.
    pub fn module(name: impl Into<TypeName>, constructor: Constructor) -> TypeInfoBuilder {
        TypeInfoBuilder::new(name.into()).constructor(constructor)
    }

    /// A type with no marker at all, e.g. an intermediate supertype.
    pub fn plain(name: impl Into<TypeName>) -> TypeInfoBuilder {
        TypeInfoBuilder::new(name.into())
    }

    pub fn name(&self) -> &TypeName {
        &self.name
    }

    pub fn version(&self) -> Option<Version> {
        self.version
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_module(&self) -> bool {
        self.constructor.is_some()
    }

    /// Direct supertypes, in declaration order.
    pub fn supertypes(&self) -> &[Arc<TypeInfo>] {
        &self.supertypes
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let supertypes: Vec<&TypeName> = self.supertypes.iter().map(|t| &t.name).collect();
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("unique", &self.unique)
            .field("module", &self.is_module())
            .field("supertypes", &supertypes)
            .finish()
    }
}

pub struct TypeInfoBuilder {
    info: TypeInfo,
}

impl TypeInfoBuilder {
    fn new(name: TypeName) -> Self {
        Self {
            info: TypeInfo {
                name,
                version: None,
                unique: false,
                constructor: None,
                supertypes: Vec::new(),
            },
        }
    }

    pub fn version(mut self, version: Version) -> Self {
        self.info.version = Some(version);
        self
    }

    /// Marks the contract as unique: at most one shared instance per tree.
    pub fn unique(mut self) -> Self {
        self.info.unique = true;
        self
    }

    pub fn constructor(mut self, constructor: Constructor) -> Self {
        self.info.constructor = Some(constructor);
        self
    }

    /// Declares a direct supertype (superclass or implemented interface).
    pub fn implements(mut self, supertype: &Arc<TypeInfo>) -> Self {
        self.info.supertypes.push(Arc::clone(supertype));
        self
    }

    pub fn build(self) -> Arc<TypeInfo> {
        Arc::new(self.info)
    }
}

/// An abstract, versioned capability.
#[derive(Debug, Clone)]
pub struct ServiceContract {
    ty: Arc<TypeInfo>,
    version: Version,
    unique: bool,
}

impl ServiceContract {
    pub fn type_info(&self) -> &Arc<TypeInfo> {
        &self.ty
    }

    pub fn name(&self) -> &TypeName {
        &self.ty.name
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }
}

/// A concrete type with a single constructor recipe.
#[derive(Debug, Clone)]
pub struct Implementation {
    ty: Arc<TypeInfo>,
    constructor: Constructor,
}

impl Implementation {
    pub fn type_info(&self) -> &Arc<TypeInfo> {
        &self.ty
    }

    pub fn name(&self) -> &TypeName {
        &self.ty.name
    }

    /// Declared dependencies, in constructor parameter order.
    pub fn dependencies(&self) -> &[Dependency] {
        self.constructor.parameters()
    }

    pub fn constructor(&self) -> &Constructor {
        &self.constructor
    }
}

/// Classification result for a discovered type.
#[derive(Debug, Clone)]
pub enum Component {
    Contract(ServiceContract),
    Implementation(Implementation),
}

impl Component {
    pub fn type_info(&self) -> &Arc<TypeInfo> {
        match self {
            Component::Contract(c) => &c.ty,
            Component::Implementation(i) => &i.ty,
        }
    }

    pub fn name(&self) -> &TypeName {
        &self.type_info().name
    }
}

/// Classifies type descriptors, remembering earlier results through weak
/// handles. The cache never keeps a classification alive on its own: once
/// every holder (typically the dependency tree) drops it, the next lookup
/// classifies the type again.
#[derive(Default)]
pub struct Classifier {
    cache: DashMap<TypeName, Weak<Component>>,
}

impl Classifier {
    pub fn classify(&self, ty: &Arc<TypeInfo>) -> Option<Arc<Component>> {
        if let Some(entry) = self.cache.get(&ty.name) {
            if let Some(hit) = entry.upgrade() {
                // A descriptor registered again under the same name is a different type.
                if Arc::ptr_eq(hit.type_info(), ty) {
                    return Some(hit);
                }
            }
        }

        // The module marker wins over the version marker.
        let component = if let Some(constructor) = &ty.constructor {
            Component::Implementation(Implementation {
                ty: Arc::clone(ty),
                constructor: constructor.clone(),
            })
        } else if let Some(version) = ty.version {
            Component::Contract(ServiceContract {
                ty: Arc::clone(ty),
                version,
                unique: ty.unique,
            })
        } else {
            return None;
        };

        let component = Arc::new(component);
        self.cache
            .insert(ty.name.clone(), Arc::downgrade(&component));
        Some(component)
    }

    /// Drops cache entries whose classification is no longer held anywhere.
    pub fn purge_stale(&self) -> usize {
        let before = self.cache.len();
        self.cache.retain(|_, entry| entry.strong_count() > 0);
        before - self.cache.len()
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}
