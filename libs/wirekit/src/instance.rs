//! Produced objects and the values handed to constructors.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::component::TypeName;

type View = Arc<dyn Any + Send + Sync>;

struct InstanceInner {
    type_name: &'static str,
    views: Vec<(TypeId, View)>,
}

/// A shared handle to an object produced by a constructor.
///
/// An instance exposes one or more typed views: the concrete `Arc<T>` it was
/// created from plus any trait-object views registered with
/// [`provide`](Instance::provide). Clones share identity.
#[derive(Clone)]
pub struct Instance {
    inner: Arc<InstanceInner>,
}

impl Instance {
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            inner: Arc::new(InstanceInner {
                type_name: std::any::type_name::<T>(),
                views: vec![(TypeId::of::<Arc<T>>(), Arc::new(value) as View)],
            }),
        }
    }

    /// Registers an additional view, typically `Arc<dyn Contract>`.
    ///
    /// Call this while building the instance; the returned handle is a new
    /// identity.
    pub fn provide<T: ?Sized + Send + Sync + 'static>(self, view: Arc<T>) -> Self {
        let key = TypeId::of::<Arc<T>>();
        let mut views: Vec<(TypeId, View)> = self
            .inner
            .views
            .iter()
            .filter(|(id, _)| *id != key)
            .cloned()
            .collect();
        views.push((key, Arc::new(view) as View));
        Self {
            inner: Arc::new(InstanceInner {
                type_name: self.inner.type_name,
                views,
            }),
        }
    }

    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let key = TypeId::of::<Arc<T>>();
        self.inner
            .views
            .iter()
            .find(|(id, _)| *id == key)
            .and_then(|(_, view)| view.downcast_ref::<Arc<T>>())
            .cloned()
    }

    pub fn type_name(&self) -> &'static str {
        self.inner.type_name
    }

    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.inner.type_name)
            .field("views", &self.inner.views.len())
            .finish()
    }
}

type BuildFn = dyn Fn() -> anyhow::Result<Instance> + Send + Sync;

/// A zero-argument callable producing an instance on demand.
#[derive(Clone)]
pub struct Factory {
    build: Arc<BuildFn>,
}

impl Factory {
    pub fn new<F>(build: F) -> Self
    where
        F: Fn() -> anyhow::Result<Instance> + Send + Sync + 'static,
    {
        Self {
            build: Arc::new(build),
        }
    }

    /// A factory that always hands out the same, already built instance.
    pub fn ready(instance: Instance) -> Self {
        Self::new(move || Ok(instance.clone()))
    }

    pub fn call(&self) -> anyhow::Result<Instance> {
        (self.build)()
    }

    /// Calls the factory and extracts the `Arc<T>` view.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> anyhow::Result<Arc<T>> {
        let instance = self.call()?;
        instance.get::<T>().ok_or_else(|| {
            anyhow::anyhow!(
                "instance of {} has no view of {}",
                instance.type_name(),
                std::any::type_name::<T>()
            )
        })
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Factory")
    }
}

/// Value bound to one constructor parameter.
#[derive(Debug, Clone)]
pub enum Binding {
    Immediate(Instance),
    Deferred(Factory),
    /// The dependency could not be built.
    Missing,
}

#[derive(Debug, Error)]
pub enum ArgumentError {
    #[error("{owner}: no argument at index {index}")]
    OutOfRange { owner: TypeName, index: usize },
    #[error("{owner}: argument {index} could not be constructed")]
    Missing { owner: TypeName, index: usize },
    #[error("{owner}: argument {index} is a factory, not an instance")]
    Deferred { owner: TypeName, index: usize },
    #[error("{owner}: argument {index} is an instance, not a factory")]
    Immediate { owner: TypeName, index: usize },
    #[error("{owner}: argument {index} ({actual}) has no view of {expected}")]
    WrongView {
        owner: TypeName,
        index: usize,
        actual: &'static str,
        expected: &'static str,
    },
}

/// The resolved argument array passed to a constructor, in parameter order.
#[derive(Debug)]
pub struct Arguments {
    owner: TypeName,
    bindings: Vec<Binding>,
}

impl Arguments {
    pub fn new(owner: TypeName, bindings: Vec<Binding>) -> Self {
        Self { owner, bindings }
    }

    /// The implementation being constructed.
    pub fn owner(&self) -> &TypeName {
        &self.owner
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn binding(&self, index: usize) -> Option<&Binding> {
        self.bindings.get(index)
    }

    pub fn instance(&self, index: usize) -> Result<Instance, ArgumentError> {
        match self.bindings.get(index) {
            Some(Binding::Immediate(instance)) => Ok(instance.clone()),
            Some(Binding::Deferred(_)) => Err(ArgumentError::Deferred {
                owner: self.owner.clone(),
                index,
            }),
            Some(Binding::Missing) => Err(ArgumentError::Missing {
                owner: self.owner.clone(),
                index,
            }),
            None => Err(ArgumentError::OutOfRange {
                owner: self.owner.clone(),
                index,
            }),
        }
    }

    /// The `Arc<T>` view of the instance bound at `index`.
    pub fn service<T: ?Sized + Send + Sync + 'static>(
        &self,
        index: usize,
    ) -> Result<Arc<T>, ArgumentError> {
        let instance = self.instance(index)?;
        instance.get::<T>().ok_or_else(|| ArgumentError::WrongView {
            owner: self.owner.clone(),
            index,
            actual: instance.type_name(),
            expected: std::any::type_name::<T>(),
        })
    }

    pub fn factory(&self, index: usize) -> Result<Factory, ArgumentError> {
        match self.bindings.get(index) {
            Some(Binding::Deferred(factory)) => Ok(factory.clone()),
            Some(Binding::Immediate(_)) => Err(ArgumentError::Immediate {
                owner: self.owner.clone(),
                index,
            }),
            Some(Binding::Missing) => Err(ArgumentError::Missing {
                owner: self.owner.clone(),
                index,
            }),
            None => Err(ArgumentError::OutOfRange {
                owner: self.owner.clone(),
                index,
            }),
        }
    }
}
