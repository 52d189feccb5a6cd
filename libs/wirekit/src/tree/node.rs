//! Graph nodes: contract nodes and implementation nodes.
//!
//! Node data lives in the tree's arenas and is addressed by index. The public
//! [`ServiceNode`] and [`ImplementationNode`] views borrow the owning tree, and
//! compare equal when they wrap the same type.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::component::{Component, Constructor, TypeInfo, TypeName};
use crate::instance::Instance;
use crate::version::Version;

use super::TreeState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ServiceId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ImplId(pub(crate) usize);

/// A dependency bound to its contract node.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Edge {
    pub(crate) service: ServiceId,
    pub(crate) version: Version,
    pub(crate) lazy: bool,
}

pub(crate) struct ServiceData {
    pub(crate) component: Arc<Component>,
    pub(crate) version: Version,
    pub(crate) unique: bool,
    /// Sorted by name; cycle repair may remove entries.
    pub(crate) candidates: Vec<ImplId>,
    pub(crate) preferred: Option<ImplId>,
    /// Only ever set for unique contracts.
    pub(crate) cached: Mutex<Option<Instance>>,
}

pub(crate) struct ImplData {
    pub(crate) component: Arc<Component>,
    pub(crate) constructor: Constructor,
    pub(crate) edges: Vec<Edge>,
    pub(crate) implemented: Vec<ServiceId>,
    pub(crate) last_instance: Mutex<Option<Instance>>,
    pub(crate) failed: AtomicBool,
}

impl ServiceData {
    pub(crate) fn name(&self) -> &TypeName {
        self.component.name()
    }
}

impl ImplData {
    pub(crate) fn name(&self) -> &TypeName {
        self.component.name()
    }

    pub(crate) fn has_instance(&self) -> bool {
        self.last_instance.lock().is_some()
    }

    pub(crate) fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Behaviour shared by both node kinds.
pub trait Node {
    fn type_info(&self) -> &Arc<TypeInfo>;

    fn name(&self) -> &TypeName {
        self.type_info().name()
    }
}

/// Read-only view of a contract node.
#[derive(Clone, Copy)]
pub struct ServiceNode<'t> {
    pub(crate) tree: &'t TreeState,
    pub(crate) id: ServiceId,
}

impl<'t> ServiceNode<'t> {
    fn data(&self) -> &'t ServiceData {
        &self.tree.services[self.id.0]
    }

    pub fn version(&self) -> Version {
        self.data().version
    }

    pub fn is_unique(&self) -> bool {
        self.data().unique
    }

    /// Implementations that may satisfy this contract, after cycle repair.
    pub fn implementations(&self) -> impl Iterator<Item = ImplementationNode<'t>> + 't {
        let tree = self.tree;
        self.data()
            .candidates
            .iter()
            .map(move |&id| ImplementationNode { tree, id })
    }

    pub fn preferred_implementation(&self) -> Option<ImplementationNode<'t>> {
        self.data().preferred.map(|id| ImplementationNode {
            tree: self.tree,
            id,
        })
    }

    /// The shared instance of a unique contract, once built.
    pub fn instance(&self) -> Option<Instance> {
        self.tree.shared_instance(self.id)
    }
}

impl Node for ServiceNode<'_> {
    fn type_info(&self) -> &Arc<TypeInfo> {
        self.data().component.type_info()
    }
}

impl PartialEq for ServiceNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for ServiceNode<'_> {}

impl std::fmt::Debug for ServiceNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.data();
        let candidates: Vec<&TypeName> = data
            .candidates
            .iter()
            .map(|id| self.tree.implementations[id.0].name())
            .collect();
        f.debug_struct("ServiceNode")
            .field("name", data.name())
            .field("version", &data.version)
            .field("unique", &data.unique)
            .field("candidates", &candidates)
            .finish()
    }
}

/// Read-only view of an implementation node.
#[derive(Clone, Copy)]
pub struct ImplementationNode<'t> {
    pub(crate) tree: &'t TreeState,
    pub(crate) id: ImplId,
}

impl<'t> ImplementationNode<'t> {
    fn data(&self) -> &'t ImplData {
        &self.tree.implementations[self.id.0]
    }

    /// Declared dependencies as `(contract, requested version, lazy)`, in parameter order.
    pub fn dependencies(&self) -> impl Iterator<Item = (ServiceNode<'t>, Version, bool)> + 't {
        let tree = self.tree;
        self.data().edges.iter().map(move |edge| {
            (
                ServiceNode {
                    tree,
                    id: edge.service,
                },
                edge.version,
                edge.lazy,
            )
        })
    }

    /// Contracts this implementation satisfies through its supertypes.
    pub fn implemented(&self) -> impl Iterator<Item = ServiceNode<'t>> + 't {
        let tree = self.tree;
        self.data()
            .implemented
            .iter()
            .map(move |&id| ServiceNode { tree, id })
    }

    /// The most recently constructed instance.
    pub fn last_instance(&self) -> Option<Instance> {
        self.data().last_instance.lock().clone()
    }

    /// True when construction was attempted and the constructor failed.
    pub fn construction_failed(&self) -> bool {
        self.data().has_failed()
    }
}

impl Node for ImplementationNode<'_> {
    fn type_info(&self) -> &Arc<TypeInfo> {
        self.data().component.type_info()
    }
}

impl PartialEq for ImplementationNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for ImplementationNode<'_> {}

impl std::fmt::Debug for ImplementationNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.data();
        f.debug_struct("ImplementationNode")
            .field("name", data.name())
            .field("dependencies", &data.edges.len())
            .field("has_instance", &data.has_instance())
            .finish()
    }
}
