//! Cycle detection and repair over the implementation/contract graph.
//!
//! Edges alternate: an implementation points at the contracts it depends on,
//! a contract points at its candidate implementations. The walk is an
//! explicit-stack DFS so graph depth never touches the native stack.

use std::collections::HashSet;

use super::node::{Edge, ImplId, ServiceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Vertex {
    Implementation(ImplId),
    Service(ServiceId),
}

struct Frame {
    vertex: Vertex,
    cursor: usize,
}

/// A candidate edge dropped to break a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Removal {
    pub(crate) service: ServiceId,
    pub(crate) implementation: ImplId,
}

pub(crate) struct Graph<'a> {
    pub(crate) edges: &'a [Vec<Edge>],
    pub(crate) candidates: &'a mut [Vec<ImplId>],
}

impl Graph<'_> {
    fn advance(&self, frame: &mut Frame) -> Option<Vertex> {
        let next = match frame.vertex {
            Vertex::Implementation(id) => self.edges[id.0]
                .get(frame.cursor)
                .map(|edge| Vertex::Service(edge.service)),
            Vertex::Service(id) => self.candidates[id.0]
                .get(frame.cursor)
                .map(|&imp| Vertex::Implementation(imp)),
        };
        if next.is_some() {
            frame.cursor += 1;
        }
        next
    }

    /// Walks the graph from every root, removing one candidate edge per cycle
    /// found. On a revisit, the breakable edge closest to the revisit is
    /// removed: the last contract on the cycle that still has more than one
    /// candidate. If no contract on the cycle has an alternative, the cycle
    /// is returned as the error.
    pub(crate) fn repair(
        &mut self,
        roots: impl IntoIterator<Item = ImplId>,
    ) -> Result<Vec<Removal>, Vec<Vertex>> {
        let mut finished: HashSet<Vertex> = HashSet::new();
        let mut removals = Vec::new();

        for root in roots {
            let root = Vertex::Implementation(root);
            if finished.contains(&root) {
                continue;
            }

            let mut path = vec![Frame {
                vertex: root,
                cursor: 0,
            }];
            let mut on_path: HashSet<Vertex> = HashSet::from([root]);

            while let Some(top) = path.last_mut() {
                let Some(next) = self.advance(top) else {
                    if let Some(done) = path.pop() {
                        on_path.remove(&done.vertex);
                        finished.insert(done.vertex);
                    }
                    continue;
                };

                if finished.contains(&next) {
                    continue;
                }
                if on_path.insert(next) {
                    path.push(Frame {
                        vertex: next,
                        cursor: 0,
                    });
                    continue;
                }

                // Revisit: the cycle is path[start..] closed by the edge top -> next.
                let start = path.iter().position(|f| f.vertex == next).unwrap_or(0);
                let breakable = (start..path.len()).rev().find_map(|at| match path[at].vertex {
                    Vertex::Service(s) if self.candidates[s.0].len() > 1 => Some((at, s)),
                    _ => None,
                });

                let Some((at, service)) = breakable else {
                    let mut cycle: Vec<Vertex> = path[start..].iter().map(|f| f.vertex).collect();
                    cycle.push(next);
                    return Err(cycle);
                };

                // The contract's cursor sits one past the edge leading up the cycle.
                let frame = &mut path[at];
                frame.cursor -= 1;
                let implementation = self.candidates[service.0].remove(frame.cursor);
                removals.push(Removal {
                    service,
                    implementation,
                });

                for unwound in path.drain(at + 1..) {
                    on_path.remove(&unwound.vertex);
                }
            }
        }

        Ok(removals)
    }
}
