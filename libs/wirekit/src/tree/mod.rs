//! The dependency tree: node registries, build-time validation and repair,
//! and the instantiation entry points.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::component::{Component, TypeInfo, TypeName};
use crate::instance::{Factory, Instance};
use crate::logging::{Level, Logger};

mod cycles;
mod error;
mod instantiate;
mod node;


pub use error::{Mismatch, TreeError};
pub use node::{ImplementationNode, Node, ServiceNode};

use cycles::{Graph, Vertex};
use node::{Edge, ImplData, ImplId, ServiceData, ServiceId};

/// Knobs applied while building and instantiating a tree.
#[derive(Debug, Clone, Default)]
pub struct TreeOptions {
    /// Abort `instantiate_all` on the first constructor failure instead of
    /// logging it and leaving the node without an instance.
    pub strict_construction: bool,
    /// Contract name -> implementation name. Used as the preferred
    /// implementation when it is still a candidate after cycle repair.
    pub preferred: HashMap<TypeName, TypeName>,
}

pub(crate) struct TreeState {
    pub(crate) logger: Arc<dyn Logger>,
    pub(crate) options: TreeOptions,
    pub(crate) services: Vec<ServiceData>,
    pub(crate) implementations: Vec<ImplData>,
    service_index: HashMap<TypeName, ServiceId>,
    implementation_index: HashMap<TypeName, ImplId>,
    repaired: Vec<(TypeName, TypeName)>,
}

/// A fully validated component graph.
pub struct DependencyTree {
    state: Arc<TreeState>,
}

impl std::fmt::Debug for DependencyTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let contracts: Vec<&TypeName> = self.state.services.iter().map(|s| s.name()).collect();
        let implementations: Vec<&TypeName> =
            self.state.implementations.iter().map(|i| i.name()).collect();
        f.debug_struct("DependencyTree")
            .field("contracts", &contracts)
            .field("implementations", &implementations)
            .field("repaired_edges", &self.state.repaired.len())
            .finish()
    }
}

impl DependencyTree {
    pub fn builder(logger: Arc<dyn Logger>) -> DependencyTreeBuilder {
        DependencyTreeBuilder {
            logger,
            options: TreeOptions::default(),
            components: Vec::new(),
        }
    }

    /// Builds every implementation that has no instance yet. Calling it again
    /// after it completed is a no-op.
    pub fn instantiate_all(&self) -> Result<(), TreeError> {
        self.state.instantiate_all()
    }

    /// Pre-populates an implementation's instance before `instantiate_all`.
    pub fn seed_instance(&self, implementation: &str, instance: Instance) -> Result<(), TreeError> {
        let id = self
            .state
            .implementation_index
            .get(implementation)
            .copied()
            .ok_or_else(|| TreeError::UnknownImplementation(implementation.into()))?;
        let data = &self.state.implementations[id.0];
        self.state.logger.log(
            Level::Debug,
            &format!("Seeding instance of {}", data.name()),
        );
        *data.last_instance.lock() = Some(instance);
        Ok(())
    }

    /// The shared instance of a unique contract, once it has been built.
    pub fn service_instance(&self, contract: &str) -> Option<Instance> {
        let id = self.state.service_index.get(contract)?;
        self.state.shared_instance(*id)
    }

    /// A factory producing instances of `contract` the same way a lazy
    /// constructor parameter would.
    pub fn factory(&self, contract: &str) -> Option<Factory> {
        let id = self.state.service_index.get(contract)?;
        Some(self.state.deferred(*id, TypeName::from("<host>")))
    }

    pub fn service_node(&self, contract: &str) -> Option<ServiceNode<'_>> {
        let id = *self.state.service_index.get(contract)?;
        Some(ServiceNode {
            tree: &self.state,
            id,
        })
    }

    pub fn implementation_node(&self, implementation: &str) -> Option<ImplementationNode<'_>> {
        let id = *self.state.implementation_index.get(implementation)?;
        Some(ImplementationNode {
            tree: &self.state,
            id,
        })
    }

    /// Contracts ordered by name.
    pub fn contracts(&self) -> impl Iterator<Item = ServiceNode<'_>> {
        let tree: &TreeState = &self.state;
        (0..tree.services.len()).map(move |i| ServiceNode {
            tree,
            id: ServiceId(i),
        })
    }

    /// Implementations ordered by name.
    pub fn implementations(&self) -> impl Iterator<Item = ImplementationNode<'_>> {
        let tree: &TreeState = &self.state;
        (0..tree.implementations.len()).map(move |i| ImplementationNode {
            tree,
            id: ImplId(i),
        })
    }

    /// `(contract, implementation)` candidate edges dropped to break cycles.
    pub fn repaired_edges(&self) -> &[(TypeName, TypeName)] {
        &self.state.repaired
    }
}

/// Collects classified components, then validates and wires them in `build`.
pub struct DependencyTreeBuilder {
    logger: Arc<dyn Logger>,
    options: TreeOptions,
    components: Vec<Arc<Component>>,
}

impl DependencyTreeBuilder {
    pub fn options(mut self, options: TreeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn add(mut self, component: Arc<Component>) -> Self {
        self.components.push(component);
        self
    }

    pub fn extend(mut self, components: impl IntoIterator<Item = Arc<Component>>) -> Self {
        self.components.extend(components);
        self
    }

    /// Registers nodes, resolves dependencies, checks versions, repairs cycles
    /// and picks preferred implementations.
    pub fn build(self) -> Result<DependencyTree, TreeError> {
        let DependencyTreeBuilder {
            logger,
            options,
            mut components,
        } = self;
        logger.log(Level::Info, "Building the dependency tree");

        // Name order keeps candidate lists and preferred choices reproducible.
        components.sort_by(|a, b| a.name().cmp(b.name()));

        let mut services: Vec<ServiceData> = Vec::new();
        let mut implementations: Vec<ImplData> = Vec::new();
        let mut service_index: HashMap<TypeName, ServiceId> = HashMap::new();
        let mut implementation_index: HashMap<TypeName, ImplId> = HashMap::new();

        // 1) register nodes
        for component in components {
            let name = component.name().clone();
            if service_index.contains_key(&name) || implementation_index.contains_key(&name) {
                logger.log(Level::Debug, &format!("Skipping duplicate component {name}"));
                continue;
            }
            logger.log(Level::Debug, &format!("Creating node for {name}"));
            match &*component {
                Component::Contract(contract) => {
                    let (version, unique) = (contract.version(), contract.is_unique());
                    service_index.insert(name, ServiceId(services.len()));
                    services.push(ServiceData {
                        component,
                        version,
                        unique,
                        candidates: Vec::new(),
                        preferred: None,
                        cached: Mutex::new(None),
                    });
                }
                Component::Implementation(implementation) => {
                    let constructor = implementation.constructor().clone();
                    implementation_index.insert(name, ImplId(implementations.len()));
                    implementations.push(ImplData {
                        component,
                        constructor,
                        edges: Vec::new(),
                        implemented: Vec::new(),
                        last_instance: Mutex::new(None),
                        failed: AtomicBool::new(false),
                    });
                }
            }
        }

        // 2) resolve dependency targets
        for data in implementations.iter_mut() {
            let mut edges = Vec::with_capacity(data.constructor.parameters().len());
            for dependency in data.constructor.parameters() {
                let Some(&service) = service_index.get(&dependency.target) else {
                    logger.log(
                        Level::Error,
                        &format!(
                            "{} depends on unknown contract {}",
                            data.name(),
                            dependency.target
                        ),
                    );
                    return Err(TreeError::UnresolvedDependency {
                        implementation: data.name().clone(),
                        contract: dependency.target.clone(),
                    });
                };
                edges.push(Edge {
                    service,
                    version: dependency.version,
                    lazy: dependency.lazy,
                });
            }
            data.edges = edges;
        }

        // 3) version gate: report every mismatch, then fail
        let mismatches = check_versions(&services, &implementations, logger.as_ref());
        if !mismatches.is_empty() {
            logger.log(
                Level::Error,
                "Shutting down due to mismatching dependency versions",
            );
            return Err(TreeError::VersionMismatch { mismatches });
        }

        // 4) contracts satisfied through supertypes, and the reverse candidate sets
        for data in implementations.iter_mut() {
            data.implemented = satisfied_contracts(data.component.type_info(), &service_index);
        }
        for (index, data) in implementations.iter().enumerate() {
            for service in &data.implemented {
                services[service.0].candidates.push(ImplId(index));
            }
        }

        // 5) cycle detection and repair
        let repaired = repair_cycles(&mut services, &implementations, logger.as_ref())?;

        // 6) preferred implementations
        for service in services.iter_mut() {
            service.preferred = choose_preferred(service, &implementations, &options, logger.as_ref());
        }

        logger.log(
            Level::Info,
            &format!(
                "Dependency tree built: {} contracts, {} implementations",
                services.len(),
                implementations.len()
            ),
        );

        Ok(DependencyTree {
            state: Arc::new(TreeState {
                logger,
                options,
                services,
                implementations,
                service_index,
                implementation_index,
                repaired,
            }),
        })
    }
}

fn check_versions(
    services: &[ServiceData],
    implementations: &[ImplData],
    logger: &dyn Logger,
) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();
    for data in implementations {
        for edge in &data.edges {
            let service = &services[edge.service.0];
            if service.version.satisfies(edge.version) {
                continue;
            }
            let mismatch = Mismatch {
                implementation: data.name().clone(),
                contract: service.name().clone(),
                advertised: service.version,
                requested: edge.version,
            };
            logger.log(
                Level::Error,
                &format!(
                    "Mismatching dependency for module {}: {} available {}, needed {}",
                    mismatch.implementation, mismatch.contract, mismatch.advertised, mismatch.requested
                ),
            );
            mismatches.push(mismatch);
        }
    }
    mismatches
}

/// Breadth-first walk over the supertype graph, keeping registered contracts.
fn satisfied_contracts(
    ty: &Arc<TypeInfo>,
    service_index: &HashMap<TypeName, ServiceId>,
) -> Vec<ServiceId> {
    let mut queue: VecDeque<&Arc<TypeInfo>> = VecDeque::from([ty]);
    let mut seen: HashSet<&TypeName> = HashSet::new();
    let mut found = Vec::new();

    while let Some(current) = queue.pop_front() {
        if !seen.insert(current.name()) {
            continue;
        }
        if let Some(&id) = service_index.get(current.name()) {
            found.push(id);
        }
        queue.extend(current.supertypes());
    }

    found.sort();
    found
}

fn repair_cycles(
    services: &mut [ServiceData],
    implementations: &[ImplData],
    logger: &dyn Logger,
) -> Result<Vec<(TypeName, TypeName)>, TreeError> {
    let edges: Vec<Vec<Edge>> = implementations.iter().map(|d| d.edges.clone()).collect();
    let mut candidates: Vec<Vec<ImplId>> = services
        .iter_mut()
        .map(|s| std::mem::take(&mut s.candidates))
        .collect();

    let outcome = Graph {
        edges: &edges,
        candidates: &mut candidates,
    }
    .repair((0..implementations.len()).map(ImplId));

    for (service, reduced) in services.iter_mut().zip(candidates) {
        service.candidates = reduced;
    }

    match outcome {
        Ok(removals) => Ok(removals
            .into_iter()
            .map(|removal| {
                let contract = services[removal.service.0].name().clone();
                let implementation = implementations[removal.implementation.0].name().clone();
                logger.log(
                    Level::Warning,
                    &format!(
                        "Breaking cyclic dependency: {contract} will not be provided by {implementation}"
                    ),
                );
                (contract, implementation)
            })
            .collect()),
        Err(cycle) => {
            let path: Vec<TypeName> = cycle
                .into_iter()
                .map(|vertex| match vertex {
                    Vertex::Implementation(id) => implementations[id.0].name().clone(),
                    Vertex::Service(id) => services[id.0].name().clone(),
                })
                .collect();
            let error = TreeError::CyclicDependency { path };
            logger.log(Level::Error, &error.to_string());
            Err(error)
        }
    }
}

fn choose_preferred(
    service: &ServiceData,
    implementations: &[ImplData],
    options: &TreeOptions,
    logger: &dyn Logger,
) -> Option<ImplId> {
    let configured = options.preferred.get(service.name()).and_then(|wanted| {
        let found = service
            .candidates
            .iter()
            .copied()
            .find(|id| implementations[id.0].name() == wanted);
        if found.is_none() {
            logger.log(
                Level::Warning,
                &format!(
                    "Configured implementation {wanted} of {} is not a candidate; using the default choice",
                    service.name()
                ),
            );
        }
        found
    });

    let chosen = configured.or_else(|| service.candidates.first().copied());
    match chosen {
        Some(id) => logger.log(
            Level::Debug,
            &format!(
                "Preferred implementation of {} is {}",
                service.name(),
                implementations[id.0].name()
            ),
        ),
        None => logger.log(
            Level::Debug,
            &format!("No implementation available for {}", service.name()),
        ),
    }
    chosen
}
