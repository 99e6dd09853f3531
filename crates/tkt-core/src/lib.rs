//! tkt-core: Core library for the tkt ticket store
//!
//! Tickets form a forest through optional parent references. The store
//! keeps that forest free of cycles and of newly written dangling parents;
//! the navigator derives roots, children and subtrees from it.

pub mod config;
pub mod error;
pub mod integrity;
pub mod invariant;
pub mod lock;
pub mod navigator;
pub mod storage;
pub mod store;
pub mod ticket;

pub use config::{ApiConfig, BackendKind, Config, StorageConfig};
pub use error::{Error, ErrorKind};
pub use integrity::{DanglingRef, IntegrityReport, TicketGraph};
pub use lock::{LockMode, StoreLock};
pub use navigator::{MAX_TREE_DEPTH, Navigator};
pub use storage::{Backend, JsonlBackend, MemoryBackend, Snapshot};
pub use store::{Deletion, TicketStore};
pub use ticket::{Ticket, TicketId, TicketNode};

/// Result type for tkt operations
pub type Result<T> = std::result::Result<T, Error>;
