//! Ticket data model for tkt
//!
//! One flat collection of tickets. Hierarchy is expressed only through
//! `parent_id`; a ticket owns neither its parent nor its children.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ticket identifier
///
/// Assigned from a monotonically increasing sequence, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub u64);

impl std::str::FromStr for TicketId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(TicketId)
            .map_err(|_| crate::Error::InvalidId(s.to_string()))
    }
}

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A task record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// Stable identifier
    pub id: TicketId,

    /// Non-empty title
    pub title: String,

    /// Completion flag
    #[serde(default)]
    pub is_completed: bool,

    /// Parent ticket, `None` for roots
    #[serde(default)]
    pub parent_id: Option<TicketId>,

    /// When the ticket was created
    pub created_at: DateTime<Utc>,

    /// When the ticket was last changed
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Create a new root ticket
    pub fn new(id: TicketId, title: String, is_completed: bool) -> Self {
        let now = Utc::now();
        Self {
            id,
            title,
            is_completed,
            parent_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mark = if self.is_completed { "x" } else { " " };
        write!(f, "{} [{}] {}", self.id, mark, self.title)
    }
}

/// A ticket together with its nested children
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketNode {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub children: Vec<TicketNode>,
}

impl TicketNode {
    /// Number of tickets in this subtree, including the root
    pub fn size(&self) -> usize {
        let mut stack = vec![self];
        let mut count = 0;
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(&node.children);
        }
        count
    }
}
