//! Whole-table consistency analysis for tkt
//!
//! Uses petgraph to find parent cycles and dangling parent references in a
//! loaded table. The store never writes either, but hand-edited files and
//! deletes of tickets with children can leave them behind.

use crate::{Snapshot, TicketId};
use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use std::collections::HashMap;

/// A child whose parent id points nowhere
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DanglingRef {
    pub child: TicketId,
    pub missing_parent: TicketId,
}

/// Result of a consistency check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub tickets: usize,
    pub roots: usize,
    pub dangling: Vec<DanglingRef>,
    pub cycles: Vec<Vec<TicketId>>,
}

impl IntegrityReport {
    pub fn is_consistent(&self) -> bool {
        self.dangling.is_empty() && self.cycles.is_empty()
    }
}

/// Parent -> child graph of a snapshot
pub struct TicketGraph {
    graph: DiGraph<TicketId, ()>,
    dangling: Vec<DanglingRef>,
    roots: usize,
}

impl TicketGraph {
    /// Build a graph from a snapshot
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map: HashMap<TicketId, NodeIndex> = HashMap::new();

        for ticket in snapshot.tickets() {
            let idx = graph.add_node(ticket.id);
            node_map.insert(ticket.id, idx);
        }

        let mut dangling = Vec::new();
        let mut roots = 0;
        for ticket in snapshot.tickets() {
            let Some(parent_id) = ticket.parent_id else {
                roots += 1;
                continue;
            };
            match node_map.get(&parent_id) {
                Some(&parent_idx) => {
                    graph.add_edge(parent_idx, node_map[&ticket.id], ());
                }
                None => dangling.push(DanglingRef {
                    child: ticket.id,
                    missing_parent: parent_id,
                }),
            }
        }

        Self {
            graph,
            dangling,
            roots,
        }
    }

    /// Check if the graph has cycles
    pub fn has_cycles(&self) -> bool {
        !self.find_cycles().is_empty()
    }

    /// Get all cycles in the graph, each as sorted ticket ids
    pub fn find_cycles(&self) -> Vec<Vec<TicketId>> {
        let mut cycles: Vec<Vec<TicketId>> = kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.has_self_loop(scc[0]))
            .map(|scc| {
                let mut ids: Vec<_> = scc.into_iter().map(|idx| self.graph[idx]).collect();
                ids.sort();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }

    fn has_self_loop(&self, node: NodeIndex) -> bool {
        self.graph.edges(node).any(|e| e.target() == node)
    }

    pub fn report(&self) -> IntegrityReport {
        IntegrityReport {
            tickets: self.graph.node_count(),
            roots: self.roots,
            dangling: self.dangling.clone(),
            cycles: self.find_cycles(),
        }
    }
}
