//! # Wirekit - Component Composition Runtime
//!
//! Wirekit takes a set of discovered component types, splits them into
//! versioned **service contracts** and concrete **implementations**, wires the
//! implementations together through their constructor parameters and builds
//! every one of them exactly once per consumption policy.
//!
//! ## Features
//!
//! - **Versioned contracts**: a dependency on `1.2` is satisfied by any `1.x` contract with `x >= 2`
//! - **Unique contracts**: one shared instance across the whole graph
//! - **Cycle repair**: cycles through contracts with alternative implementations are broken automatically
//! - **Lazy dependencies**: a parameter can receive a [`Factory`] instead of a built instance
//! - **Deep graphs**: traversal and construction never recurse on the native stack
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wirekit::{Constructor, DependencyTree, Instance, TypeInfo, Version};
//!
//! trait Clock: Send + Sync {
//!     fn now(&self) -> u64;
//! }
//!
//! let clock = TypeInfo::contract("app.Clock", Version::new(1, 0)).unique().build();
//! let system_clock = TypeInfo::module(
//!     "app.SystemClock",
//!     Constructor::new(|_args| {
//!         let clock = Arc::new(SystemClock);
//!         Ok(Instance::from_arc(clock.clone()).provide::<dyn Clock>(clock))
//!     }),
//! )
//! .implements(&clock)
//! .build();
//!
//! let classifier = wirekit::Classifier::default();
//! let tree = DependencyTree::builder(logger)
//!     .extend([clock, system_clock].iter().filter_map(|t| classifier.classify(t)))
//!     .build()?;
//! tree.instantiate_all()?;
//! let clock = tree.service_instance("app.Clock").and_then(|i| i.get::<dyn Clock>());
//! ```

pub use anyhow::Result;

// Re-export inventory so components can self-register without a direct dependency
pub use inventory;

pub mod catalog;
pub mod component;
pub mod instance;
pub mod logging;
pub mod manifest;
pub mod tree;
pub mod version;

pub use catalog::{ComponentRegistration, TypeCatalog};
pub use component::{
    Classifier, Component, Constructor, Dependency, Implementation, ServiceContract, TypeInfo,
    TypeInfoBuilder, TypeName,
};
pub use instance::{ArgumentError, Arguments, Binding, Factory, Instance};
pub use logging::{Level, LogMessage, Logger, NamedLogger};
pub use manifest::{Manifest, ManifestError};
pub use tree::{
    DependencyTree, DependencyTreeBuilder, ImplementationNode, Mismatch, Node, ServiceNode,
    TreeError, TreeOptions,
};
pub use version::Version;
