//! Read-side tree view over a snapshot
//!
//! Nothing here is cached: every answer is derived from the borrowed table,
//! so it reflects exactly the snapshot it was built from. Walks are bounded
//! by the ticket count so inconsistent data on disk cannot hang a query.
//! No walk recurses; nested [`TicketNode`] views are capped at
//! [`MAX_TREE_DEPTH`] levels.

use crate::{Error, Result, Snapshot, Ticket, TicketId, TicketNode};
use std::collections::{HashMap, HashSet, VecDeque};

/// Deepest nesting [`Navigator::subtree`] will build, counting the root as 1
pub const MAX_TREE_DEPTH: usize = 256;

pub struct Navigator<'a> {
    snapshot: &'a Snapshot,
}

impl<'a> Navigator<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        Self { snapshot }
    }

    fn require(&self, id: TicketId) -> Result<&'a Ticket> {
        self.snapshot.get(id).ok_or(Error::NotFound(id))
    }

    /// Tickets without a parent, in id order
    pub fn roots(&self) -> Vec<&'a Ticket> {
        self.snapshot.tickets().filter(|t| t.is_root()).collect()
    }

    /// Direct children of `id`, in id order
    ///
    /// Fails when `id` itself does not exist, even if tickets still point
    /// at it.
    pub fn children_of(&self, id: TicketId) -> Result<Vec<&'a Ticket>> {
        self.require(id)?;
        Ok(self.children_unchecked(id))
    }

    fn children_unchecked(&self, id: TicketId) -> Vec<&'a Ticket> {
        self.snapshot
            .tickets()
            .filter(|t| t.parent_id == Some(id))
            .collect()
    }

    /// Parent id -> children in id order, for walks that visit many nodes
    fn child_index(&self) -> HashMap<TicketId, Vec<&'a Ticket>> {
        let mut index: HashMap<TicketId, Vec<&'a Ticket>> = HashMap::new();
        for ticket in self.snapshot.tickets() {
            if let Some(parent) = ticket.parent_id {
                index.entry(parent).or_default().push(ticket);
            }
        }
        index
    }

    /// Parent chain of `id`, nearest first
    pub fn ancestors(&self, id: TicketId) -> Result<Vec<&'a Ticket>> {
        let start = self.require(id)?;
        let mut seen = HashSet::from([id]);
        let mut chain = Vec::new();
        let mut next = start.parent_id;

        while let Some(parent_id) = next {
            if !seen.insert(parent_id) || chain.len() >= self.snapshot.len() {
                break;
            }
            let Some(parent) = self.snapshot.get(parent_id) else {
                break;
            };
            chain.push(parent);
            next = parent.parent_id;
        }
        Ok(chain)
    }

    /// Every ticket below `id`, breadth first
    pub fn descendants(&self, id: TicketId) -> Result<Vec<&'a Ticket>> {
        self.require(id)?;
        let index = self.child_index();
        let mut seen = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);
        let mut out = Vec::new();

        while let Some(current) = queue.pop_front() {
            for &child in index.get(&current).into_iter().flatten() {
                if seen.insert(child.id) {
                    out.push(child);
                    queue.push_back(child.id);
                }
            }
        }
        Ok(out)
    }

    /// Nested view of `id` and everything below it
    ///
    /// Fails with [`Error::TooDeep`] when the tree below `id` nests more
    /// than [`MAX_TREE_DEPTH`] levels; `ancestors` and `descendants` have
    /// no such limit.
    pub fn subtree(&self, id: TicketId) -> Result<TicketNode> {
        let root = self.require(id)?;
        let index = self.child_index();

        // Breadth-first into a flat arena: (ticket, arena index of parent)
        let mut arena: Vec<(&'a Ticket, Option<usize>)> = vec![(root, None)];
        let mut depth = vec![1usize];
        let mut seen = HashSet::from([id]);
        let mut next = 0;
        while next < arena.len() {
            let current = arena[next].0.id;
            for &child in index.get(&current).into_iter().flatten() {
                if !seen.insert(child.id) {
                    continue;
                }
                if depth[next] >= MAX_TREE_DEPTH {
                    return Err(Error::TooDeep {
                        id,
                        limit: MAX_TREE_DEPTH,
                    });
                }
                arena.push((child, Some(next)));
                depth.push(depth[next] + 1);
            }
            next += 1;
        }

        // Children always sit after their parent, so assembling back to
        // front finishes every node before it is attached.
        let mut children: Vec<Vec<TicketNode>> = vec![Vec::new(); arena.len()];
        for slot in (1..arena.len()).rev() {
            let (ticket, parent) = arena[slot];
            let mut kids = std::mem::take(&mut children[slot]);
            kids.reverse();
            let node = TicketNode {
                ticket: ticket.clone(),
                children: kids,
            };
            if let Some(parent) = parent {
                children[parent].push(node);
            }
        }

        let mut kids = std::mem::take(&mut children[0]);
        kids.reverse();
        Ok(TicketNode {
            ticket: root.clone(),
            children: kids,
        })
    }

    /// Tickets whose parent no longer exists
    pub fn orphans(&self) -> Vec<&'a Ticket> {
        self.snapshot
            .tickets()
            .filter(|t| t.parent_id.is_some_and(|p| !self.snapshot.contains(p)))
            .collect()
    }
}
