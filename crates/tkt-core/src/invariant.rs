//! Write-time checks shared by the store's mutations

use crate::{Error, Result, Snapshot, TicketId};

/// Validate a title and return it trimmed
pub fn validate_title(title: &str, max_len: usize) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("title must not be empty".to_string()));
    }
    let len = trimmed.chars().count();
    if len > max_len {
        return Err(Error::Validation(format!(
            "title is {len} characters, limit is {max_len}"
        )));
    }
    Ok(trimmed.to_string())
}

/// Would parenting `child` under `new_parent` close a cycle?
///
/// Walks the ancestor chain from `new_parent` looking for `child`. The walk
/// stops at a root, a dangling parent, or a revisited node, and never takes
/// more steps than there are tickets.
pub fn would_cycle(snapshot: &Snapshot, child: TicketId, new_parent: TicketId) -> bool {
    if child == new_parent {
        return true;
    }

    let mut current = Some(new_parent);
    for _ in 0..=snapshot.len() {
        let Some(id) = current else {
            return false;
        };
        if id == child {
            return true;
        }
        current = snapshot.get(id).and_then(|t| t.parent_id);
        if current == Some(new_parent) {
            // Existing loop above new_parent that does not contain child.
            return false;
        }
    }
    false
}
