//! Sandboxed file management for the Garrison fleet
//!
//! This crate owns every byte of save/log/scenario data on disk. It is built
//! from four pieces, leaf-first:
//!
//! * [`PathSandbox`] - resolves a (directory, filename) pair to an absolute
//!   path and rejects anything escaping the configured root.
//! * [`metadata`] - projects filesystem entries into immutable
//!   [`FileMetaData`]/[`ScenarioMetaData`] snapshots.
//! * [`FileNotifier`] - one broadcast channel per logical file category,
//!   decoupling file mutation from subscribers.
//! * [`FileManager`] - upload, delete, move, copy, and rename operations
//!   plus the read-only queries, with per-item error aggregation.
//!
//! All mutation operations complete their filesystem work synchronously with
//! respect to the caller, then publish change events without waiting on any
//! subscriber.
//!
//! [`FileMetaData`]: garrison_types::FileMetaData
//! [`ScenarioMetaData`]: garrison_types::ScenarioMetaData

mod engine;
pub mod metadata;
mod notifier;
mod sandbox;

pub use engine::{FileManager, FileUpload};
pub use notifier::FileNotifier;
pub use sandbox::{PathSandbox, ResolvedDirectory, SandboxError};
