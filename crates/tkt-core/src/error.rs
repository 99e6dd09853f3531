//! Error types for tkt

use crate::TicketId;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Ticket not found: {0}")]
    NotFound(TicketId),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Parenting {child} under {parent} would create a cycle")]
    Cycle { child: TicketId, parent: TicketId },

    #[error("Tree below {id} nests deeper than {limit} levels; show a lower ticket instead")]
    TooDeep { id: TicketId, limit: usize },

    #[error("Invalid ticket ID: {0}")]
    InvalidId(String),

    #[error("Store not initialized. Run 'tkt init' first.")]
    NotInitialized,

    #[error("Store already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Timed out after {waited:?} waiting for {}", .path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("Store lock poisoned by a failed writer")]
    Poisoned,
}

/// Coarse classification used by transports to pick a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Cycle,
    Storage,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Validation(_) | Error::InvalidId(_) | Error::TooDeep { .. } => {
                ErrorKind::Validation
            }
            Error::Cycle { .. } => ErrorKind::Cycle,
            Error::NotInitialized
            | Error::AlreadyInitialized(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Config(_)
            | Error::LockTimeout { .. }
            | Error::Poisoned => ErrorKind::Storage,
        }
    }
}
