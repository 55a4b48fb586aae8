//! Server settings and their on-disk persistence
//!
//! Two settings records per server: the web-editable game settings and the
//! extra wrapper behavior toggles. Both live in server state under the
//! server's lock and persist as pretty JSON beside the server's data,
//! written to a temp file, fsynced, then atomically renamed into place.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::io;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::info;

pub const SETTINGS_FILE: &str = "server-settings.json";
pub const EXTRA_SETTINGS_FILE: &str = "server-extra-settings.json";

/// Game settings editable from the web interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditableServerSettings {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub max_players: u32,
    pub game_password: String,
    pub admins: Vec<String>,
    /// Autosave interval in minutes.
    pub autosave_interval: u32,
    pub autosave_slots: u32,
    pub non_blocking_saving: bool,
    pub public_visible: bool,
}

impl Default for EditableServerSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            tags: Vec::new(),
            max_players: 0,
            game_password: String::new(),
            admins: Vec::new(),
            autosave_interval: 5,
            autosave_slots: 20,
            non_blocking_saving: true,
            public_visible: true,
        }
    }
}

/// Wrapper behavior toggles outside the game's own settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraServerSettings {
    /// Relay in-game chat to external channels.
    pub relay_chat: bool,
    /// Relay external channel messages into the game.
    pub relay_external_messages: bool,
    /// Restart the process automatically after a crash.
    pub auto_restart: bool,
}

impl Default for ExtraServerSettings {
    fn default() -> Self {
        Self {
            relay_chat: true,
            relay_external_messages: true,
            auto_restart: false,
        }
    }
}

/// Writes a settings record as pretty JSON via temp file + atomic rename.
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let temp_path = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&temp_path).await?;
    file.write_all(json.as_bytes()).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&temp_path, path).await?;
    info!(path = %path.display(), "wrote settings");
    Ok(())
}

/// Reads a settings record, falling back to defaults when the file does not
/// exist yet. Corrupt contents are an error, not a silent reset.
pub async fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> io::Result<T> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => serde_json::from_str(&contents)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn settings_round_trip_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);

        let mut settings = EditableServerSettings::default();
        settings.name = "public alpha".to_string();
        settings.admins = vec!["grilledham".to_string()];

        write_json_atomic(&path, &settings).await.unwrap();
        let loaded: EditableServerSettings = read_json_or_default(&path).await.unwrap();
        assert_eq!(loaded, settings);

        // No temp file left behind.
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let loaded: ExtraServerSettings =
            read_json_or_default(&dir.path().join(EXTRA_SETTINGS_FILE))
                .await
                .unwrap();
        assert_eq!(loaded, ExtraServerSettings::default());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error_not_a_reset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let result: io::Result<EditableServerSettings> = read_json_or_default(&path).await;
        assert!(result.is_err());
    }
}
