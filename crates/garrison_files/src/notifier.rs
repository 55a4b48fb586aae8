//! Change-event fan-out
//!
//! One broadcast channel per logical file category plus one for scenarios.
//! Publishing never waits on subscribers: a send is a non-blocking handoff
//! to the channel, so a slow consumer can only lag itself (dropping its own
//! oldest messages), never the mutation path or other subscribers.

use garrison_types::{DirectoryKind, FilesChangedEvent, ScenariosChangedEvent};
use tokio::sync::broadcast;
use tracing::trace;

const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Typed publish/subscribe channels for file and scenario changes.
#[derive(Debug)]
pub struct FileNotifier {
    temp_saves: broadcast::Sender<FilesChangedEvent>,
    local_saves: broadcast::Sender<FilesChangedEvent>,
    global_saves: broadcast::Sender<FilesChangedEvent>,
    logs: broadcast::Sender<FilesChangedEvent>,
    chat_logs: broadcast::Sender<FilesChangedEvent>,
    scenarios: broadcast::Sender<ScenariosChangedEvent>,
}

impl FileNotifier {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Capacity applies per channel; a subscriber further behind than this
    /// loses its oldest pending events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            temp_saves: broadcast::channel(capacity).0,
            local_saves: broadcast::channel(capacity).0,
            global_saves: broadcast::channel(capacity).0,
            logs: broadcast::channel(capacity).0,
            chat_logs: broadcast::channel(capacity).0,
            scenarios: broadcast::channel(capacity).0,
        }
    }

    pub fn subscribe_temp_saves(&self) -> broadcast::Receiver<FilesChangedEvent> {
        self.temp_saves.subscribe()
    }

    pub fn subscribe_local_saves(&self) -> broadcast::Receiver<FilesChangedEvent> {
        self.local_saves.subscribe()
    }

    pub fn subscribe_global_saves(&self) -> broadcast::Receiver<FilesChangedEvent> {
        self.global_saves.subscribe()
    }

    pub fn subscribe_logs(&self) -> broadcast::Receiver<FilesChangedEvent> {
        self.logs.subscribe()
    }

    pub fn subscribe_chat_logs(&self) -> broadcast::Receiver<FilesChangedEvent> {
        self.chat_logs.subscribe()
    }

    pub fn subscribe_scenarios(&self) -> broadcast::Receiver<ScenariosChangedEvent> {
        self.scenarios.subscribe()
    }

    /// Publishes a file change on the channel for its category. Categories
    /// without a dedicated save/log channel (scenarios) are ignored here;
    /// scenario changes go through [`publish_scenarios`].
    ///
    /// [`publish_scenarios`]: FileNotifier::publish_scenarios
    pub fn publish_files(&self, kind: DirectoryKind, event: FilesChangedEvent) {
        let channel = match kind {
            DirectoryKind::TempSaves => &self.temp_saves,
            DirectoryKind::LocalSaves => &self.local_saves,
            DirectoryKind::GlobalSaves => &self.global_saves,
            DirectoryKind::Logs => &self.logs,
            DirectoryKind::ChatLogs => &self.chat_logs,
            DirectoryKind::Scenarios => return,
        };

        // A send with no subscribers is not an error; nobody is watching.
        let receivers = channel.send(event).unwrap_or(0);
        trace!(%kind, receivers, "published file change");
    }

    pub fn publish_scenarios(&self, event: ScenariosChangedEvent) {
        let receivers = self.scenarios.send(event).unwrap_or(0);
        trace!(receivers, "published scenario change");
    }
}

impl Default for FileNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garrison_types::{ChangeKind, ScenarioMetaData, ServerId};

    #[tokio::test]
    async fn publish_reaches_only_the_matching_channel() {
        let notifier = FileNotifier::new();
        let mut local = notifier.subscribe_local_saves();
        let mut temp = notifier.subscribe_temp_saves();

        notifier.publish_files(
            DirectoryKind::LocalSaves,
            FilesChangedEvent::created(ServerId::new("1"), Vec::new()),
        );

        let ev = local.recv().await.unwrap();
        assert_eq!(ev.kind, ChangeKind::Create);
        assert!(temp.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_block_or_panic() {
        let notifier = FileNotifier::new();
        notifier.publish_files(
            DirectoryKind::GlobalSaves,
            FilesChangedEvent::deleted(ServerId::global(), Vec::new()),
        );
        notifier.publish_scenarios(ScenariosChangedEvent {
            kind: ChangeKind::Create,
            scenarios: vec![ScenarioMetaData {
                name: "freeplay".to_string(),
                created_time: chrono::Utc::now(),
                last_modified_time: chrono::Utc::now(),
            }],
        });
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_event() {
        let notifier = FileNotifier::new();
        let mut first = notifier.subscribe_global_saves();
        let mut second = notifier.subscribe_global_saves();

        notifier.publish_files(
            DirectoryKind::GlobalSaves,
            FilesChangedEvent::created(ServerId::global(), Vec::new()),
        );

        assert!(first.recv().await.is_ok());
        assert!(second.recv().await.is_ok());
    }
}
