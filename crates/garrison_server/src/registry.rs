//! Per-server state and the registry that owns it
//!
//! One [`ServerHandle`] per registered server id, holding that server's
//! mutable state behind its own async mutex. The registry map itself uses
//! lock-free reads so looking up one server never contends with operations
//! on another.

use crate::settings::{EditableServerSettings, ExtraServerSettings};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use garrison_types::{ServerId, ServerStatus};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Mutable state scoped to one server, guarded by that server's lock.
#[derive(Debug, Clone)]
pub struct ServerState {
    pub status: ServerStatus,
    /// Watermark for the periodic temp-save sweep.
    pub last_temp_files_checked: DateTime<Utc>,
    pub settings: EditableServerSettings,
    pub extra_settings: ExtraServerSettings,
    pub mod_pack: Option<String>,
    /// Version recorded by the last successful install.
    pub version: Option<String>,
}

impl ServerState {
    fn new() -> Self {
        Self {
            status: ServerStatus::Unknown,
            last_temp_files_checked: Utc::now(),
            settings: EditableServerSettings::default(),
            extra_settings: ExtraServerSettings::default(),
            mod_pack: None,
            version: None,
        }
    }
}

/// One managed server: its id plus lock-guarded state.
#[derive(Debug)]
pub struct ServerHandle {
    id: ServerId,
    state: Mutex<ServerState>,
}

impl ServerHandle {
    pub fn id(&self) -> &ServerId {
        &self.id
    }

    /// Acquires this server's lock. Hold it only across the state
    /// check-and-transition, never across external process interaction.
    pub async fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().await
    }
}

/// Registry mapping server ids to their handles.
///
/// Entries are created at registration and live until explicit teardown;
/// handles are shared by `Arc` so an in-flight operation survives a
/// concurrent deregistration.
#[derive(Debug, Default)]
pub struct ServerRegistry {
    servers: DashMap<ServerId, Arc<ServerHandle>>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the given ids, skipping any already present.
    pub fn with_servers(ids: impl IntoIterator<Item = ServerId>) -> Self {
        let registry = Self::new();
        for id in ids {
            registry.register(id);
        }
        registry
    }

    /// Registers a server id, creating fresh state. Registering an existing
    /// id is a no-op so state is never silently reset.
    pub fn register(&self, id: ServerId) -> Arc<ServerHandle> {
        self.servers
            .entry(id.clone())
            .or_insert_with(|| {
                Arc::new(ServerHandle {
                    id,
                    state: Mutex::new(ServerState::new()),
                })
            })
            .clone()
    }

    pub fn get(&self, id: &ServerId) -> Option<Arc<ServerHandle>> {
        self.servers.get(id).map(|entry| entry.clone())
    }

    pub fn is_valid_server_id(&self, id: &ServerId) -> bool {
        self.servers.contains_key(id)
    }

    /// Removes a server from the registry. Operations already holding the
    /// handle finish normally; new lookups fail with unknown-server.
    pub fn deregister(&self, id: &ServerId) -> bool {
        self.servers.remove(id).is_some()
    }

    pub fn ids(&self) -> Vec<ServerId> {
        self.servers.iter().map(|entry| entry.key().clone()).collect()
    }
}
