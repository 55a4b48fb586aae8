//! Core types shared across the Garrison fleet manager
//!
//! This crate provides the foundation types used by the file management
//! engine and the server lifecycle orchestrator: identifiers, the server
//! status state machine, file/scenario metadata snapshots, change events,
//! and the uniform operation result returned to remote callers.
//!
//! ## Design Principles
//!
//! - **Type Safety**: wrapper types prevent id confusion and keep the set of
//!   logical file directories closed.
//! - **Immutability**: metadata records and events are snapshots; a file
//!   change produces a new record, never an in-place mutation.
//! - **Serialization**: everything a remote viewer can observe supports JSON
//!   serialization.

mod events;
mod files;
mod id;
mod result;
mod status;

pub use events::{ChangeKind, FilesChangedEvent, ScenariosChangedEvent, StatusChange};
pub use files::{DirectoryKind, FileMetaData, LOG_EXTENSION, SAVE_EXTENSION, ScenarioMetaData};
pub use id::ServerId;
pub use result::{ErrorKey, OpError, OpResult};
pub use status::ServerStatus;
