//! Server lifecycle orchestration for the Garrison fleet
//!
//! Owns the per-server state machine and everything scoped to a single
//! managed server: current status, settings, selected mod pack, installed
//! version. Every server has its own async lock; operations against
//! different servers never block one another, and the orchestrator is the
//! sole writer of server status.
//!
//! The actual game process is an external collaborator reached through the
//! [`ProcessDriver`] trait; long-running driver actions run outside the
//! server lock, under an explicit timeout, so status reads never stall
//! behind an install or resume.

mod lifecycle;
mod process;
mod refresh;
mod registry;
mod settings;
mod versions;

pub use lifecycle::ServerOrchestrator;
pub use process::{DriverError, ProcessDriver};
pub use refresh::{branch_from_ref, ScenarioRefresher};
pub use registry::{ServerHandle, ServerRegistry, ServerState};
pub use settings::{EditableServerSettings, ExtraServerSettings};
pub use versions::{VersionCache, VersionSource};
