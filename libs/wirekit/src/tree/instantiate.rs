//! Iterative construction of implementation nodes.
//!
//! Building an implementation first builds every non-lazy dependency that has
//! no shared instance yet. The pending work is kept on an explicit stack of
//! frames, one per implementation being assembled, so dependency depth is
//! bounded by heap memory rather than the native stack.

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use std::time::Instant;

use anyhow::anyhow;

use crate::component::TypeName;
use crate::instance::{Arguments, Binding, Factory, Instance};
use crate::logging::Level;

use super::node::{Edge, ImplId, ServiceId};
use super::{TreeError, TreeState};

/// Where a construction was requested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// `instantiate_all`; the root's instance is recorded on its node.
    TopLevel,
    /// A lazy factory; the root's instance belongs to the caller only.
    Deferred,
}

struct BuildFrame {
    node: ImplId,
    /// Bound arguments so far; its length is the index of the next parameter.
    args: Vec<Binding>,
}

impl BuildFrame {
    fn new(node: ImplId) -> Self {
        Self {
            node,
            args: Vec::new(),
        }
    }
}

struct Build {
    instance: Option<Instance>,
    /// The first failure met anywhere in the build, root included.
    failure: Option<TreeError>,
}

enum Step {
    Bind(Binding),
    Descend(ImplId),
}

impl TreeState {
    /// The instance every consumer of a unique contract shares. Adopts the
    /// preferred implementation's instance if it was built or seeded earlier.
    pub(crate) fn shared_instance(&self, service: ServiceId) -> Option<Instance> {
        let data = &self.services[service.0];
        if !data.unique {
            return None;
        }
        let mut cached = data.cached.lock();
        if cached.is_none() {
            let preferred = data.preferred?;
            *cached = self.implementations[preferred.0].last_instance.lock().clone();
        }
        cached.clone()
    }

    pub(crate) fn instantiate_all(self: &Arc<Self>) -> Result<(), TreeError> {
        let started = Instant::now();

        for index in 0..self.implementations.len() {
            let data = &self.implementations[index];
            if data.has_instance() || data.has_failed() {
                continue;
            }
            let build = self.construct(ImplId(index), Origin::TopLevel);
            if let Some(failure) = build.failure {
                if self.options.strict_construction {
                    self.logger.log(
                        Level::Error,
                        &format!("Aborting instantiation: {failure}"),
                    );
                    return Err(failure);
                }
            }
        }

        let built = self
            .implementations
            .iter()
            .filter(|d| d.has_instance())
            .count();
        let failed = self
            .implementations
            .iter()
            .filter(|d| d.has_failed())
            .count();
        if failed > 0 {
            self.logger.log(
                Level::Warning,
                &format!("{failed} implementation(s) could not be constructed"),
            );
        }
        self.logger.log(
            Level::Info,
            &format!(
                "Instantiated {built} of {} implementations. Took {:.3} milliseconds",
                self.implementations.len(),
                started.elapsed().as_secs_f64() * 1000.0
            ),
        );
        Ok(())
    }

    /// A factory building `service` on each call, or handing out the shared
    /// instance of a unique contract.
    pub(crate) fn deferred(self: &Arc<Self>, service: ServiceId, required_by: TypeName) -> Factory {
        let tree: Weak<TreeState> = Arc::downgrade(self);
        Factory::new(move || {
            let tree = tree
                .upgrade()
                .ok_or_else(|| anyhow!("dependency tree was dropped before the factory ran"))?;
            tree.provide(service, &required_by)
        })
    }

    fn provide(self: &Arc<Self>, service: ServiceId, required_by: &TypeName) -> anyhow::Result<Instance> {
        if let Some(shared) = self.shared_instance(service) {
            return Ok(shared);
        }
        let data = &self.services[service.0];
        let Some(target) = data.preferred else {
            return Err(TreeError::NoImplementation {
                contract: data.name().clone(),
                required_by: required_by.clone(),
            }
            .into());
        };
        let implementation = &self.implementations[target.0];
        if implementation.has_failed() {
            self.logger.log(
                Level::Debug,
                &format!(
                    "{required_by} gets no {}: its implementation failed earlier",
                    data.name()
                ),
            );
            return Err(TreeError::Construction {
                implementation: implementation.name().clone(),
                source: anyhow!("an earlier attempt failed"),
            }
            .into());
        }

        let build = self.construct(target, Origin::Deferred);
        match (build.instance, build.failure) {
            (Some(_), Some(failure)) if self.options.strict_construction => Err(failure.into()),
            (Some(instance), _) => Ok(instance),
            (None, Some(failure)) => Err(failure.into()),
            (None, None) => Err(anyhow!(
                "failed to create an instance of {}",
                self.implementations[target.0].name()
            )),
        }
    }

    /// Builds `root` and whatever it needs that isn't shared yet.
    fn construct(self: &Arc<Self>, root: ImplId, origin: Origin) -> Build {
        let mut stack = vec![BuildFrame::new(root)];
        let mut in_progress: HashSet<ImplId> = HashSet::from([root]);
        let mut failure: Option<TreeError> = None;

        while let Some(top) = stack.last() {
            let (node, cursor) = (top.node, top.args.len());

            if let Some(&edge) = self.implementations[node.0].edges.get(cursor) {
                match self.step(edge, node, &in_progress, &mut failure) {
                    Step::Bind(binding) => {
                        if let Some(top) = stack.last_mut() {
                            top.args.push(binding);
                        }
                    }
                    Step::Descend(target) => {
                        in_progress.insert(target);
                        stack.push(BuildFrame::new(target));
                    }
                }
                continue;
            }

            let Some(frame) = stack.pop() else { break };
            in_progress.remove(&frame.node);
            let record = origin == Origin::TopLevel || !stack.is_empty();
            let instance = self.invoke(frame, record, &mut failure);

            match stack.last_mut() {
                Some(parent) => parent
                    .args
                    .push(instance.map_or(Binding::Missing, Binding::Immediate)),
                None => return Build { instance, failure },
            }
        }

        Build {
            instance: None,
            failure,
        }
    }

    /// Decides how to satisfy one dependency edge of `owner`.
    fn step(
        self: &Arc<Self>,
        edge: Edge,
        owner: ImplId,
        in_progress: &HashSet<ImplId>,
        failure: &mut Option<TreeError>,
    ) -> Step {
        if let Some(shared) = self.shared_instance(edge.service) {
            return Step::Bind(if edge.lazy {
                Binding::Deferred(Factory::ready(shared))
            } else {
                Binding::Immediate(shared)
            });
        }

        let owner_name = self.implementations[owner.0].name();
        if edge.lazy {
            return Step::Bind(Binding::Deferred(
                self.deferred(edge.service, owner_name.clone()),
            ));
        }

        let service = &self.services[edge.service.0];
        match service.preferred {
            Some(target) if in_progress.contains(&target) => {
                // Cycle repair keeps this from happening; refuse rather than loop.
                let target_name = self.implementations[target.0].name();
                self.logger.log(
                    Level::Error,
                    &format!(
                        "{owner_name} needs {} through {target_name}, which is still being built",
                        service.name()
                    ),
                );
                failure.get_or_insert_with(|| TreeError::CyclicDependency {
                    path: vec![owner_name.clone(), service.name().clone(), target_name.clone()],
                });
                Step::Bind(Binding::Missing)
            }
            Some(target) if self.implementations[target.0].has_failed() => {
                self.logger.log(
                    Level::Debug,
                    &format!(
                        "{owner_name} gets no {}: its implementation failed earlier",
                        service.name()
                    ),
                );
                Step::Bind(Binding::Missing)
            }
            Some(target) => Step::Descend(target),
            None => {
                self.logger.log(
                    Level::Error,
                    &format!(
                        "No implementation of {} available for {owner_name}",
                        service.name()
                    ),
                );
                failure.get_or_insert_with(|| TreeError::NoImplementation {
                    contract: service.name().clone(),
                    required_by: owner_name.clone(),
                });
                Step::Bind(Binding::Missing)
            }
        }
    }

    /// Runs one constructor with its bound arguments.
    fn invoke(
        &self,
        frame: BuildFrame,
        record: bool,
        failure: &mut Option<TreeError>,
    ) -> Option<Instance> {
        let data = &self.implementations[frame.node.0];
        self.logger.log(
            Level::Debug,
            &format!("Creating an instance of {}", data.name()),
        );

        match data
            .constructor
            .invoke(Arguments::new(data.name().clone(), frame.args))
        {
            Ok(instance) => {
                let mut seeds_unique = false;
                for &service in &data.implemented {
                    let contract = &self.services[service.0];
                    if contract.unique && contract.preferred == Some(frame.node) {
                        seeds_unique = true;
                        contract
                            .cached
                            .lock()
                            .get_or_insert_with(|| instance.clone());
                    }
                }
                // A unique contract's instance always lands on its node, so a
                // later top-level pass does not build a second one.
                if record || seeds_unique {
                    *data.last_instance.lock() = Some(instance.clone());
                }
                Some(instance)
            }
            Err(source) => {
                data.failed.store(true, Ordering::Relaxed);
                self.logger.log_with_cause(
                    Level::Error,
                    &format!("Failed to create an instance of {}", data.name()),
                    &source,
                );
                if failure.is_none() {
                    *failure = Some(TreeError::Construction {
                        implementation: data.name().clone(),
                        source,
                    });
                }
                None
            }
        }
    }
}
