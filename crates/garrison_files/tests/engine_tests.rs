//! Integration tests for the file management engine
//!
//! These exercise the full sandbox + engine + notifier path against a real
//! temporary directory: upload round-trips, batch partial failure, rename
//! collision handling, and the event pairing emitted by moves.

use garrison_files::{FileManager, FileNotifier, FileUpload, PathSandbox};
use garrison_types::{ChangeKind, ErrorKey, ServerId};
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::time::{timeout, Duration};

fn test_manager(ids: &[&str]) -> (TempDir, FileManager) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let sandbox = PathSandbox::new(
        dir.path(),
        ids.iter().map(|id| ServerId::new(*id)).collect(),
    )
    .expect("failed to create sandbox");
    let manager = FileManager::new(Arc::new(sandbox), Arc::new(FileNotifier::new()));
    (dir, manager)
}

fn upload(name: &str, content: &'static [u8]) -> FileUpload {
    FileUpload::new(name, Cursor::new(content))
}

#[tokio::test]
async fn queries_create_missing_directories_and_return_empty() {
    let (dir, manager) = test_manager(&["1"]);
    let id = ServerId::new("1");

    assert!(manager.get_local_save_files(&id).await.is_empty());
    assert!(manager.get_temp_save_files(&id).await.is_empty());
    assert!(manager.get_global_save_files().await.is_empty());
    assert!(manager.get_scenarios().await.is_empty());

    assert!(dir.path().join("1/local_saves").is_dir());
    assert!(dir.path().join("1/temp_saves").is_dir());
    assert!(dir.path().join("global_saves").is_dir());
    assert!(dir.path().join("scenarios").is_dir());
}

#[tokio::test]
async fn upload_round_trip() {
    let (_dir, manager) = test_manager(&["1"]);
    let id = ServerId::new("1");

    let result = manager
        .upload_files(&id, vec![upload("save1.zip", b"unique-content")])
        .await;
    assert!(result.is_ok(), "upload failed: {:?}", result.errors);

    let files = manager.get_local_save_files(&id).await;
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "save1.zip");
    assert_eq!(files[0].size, b"unique-content".len() as u64);
    assert_eq!(files[0].directory, "1/local_saves");
}

#[tokio::test]
async fn upload_rejects_bad_names_before_io() {
    let (dir, manager) = test_manager(&["1"]);
    let id = ServerId::new("1");

    let result = manager
        .upload_files(
            &id,
            vec![
                upload("", b"x"),
                upload("has space.zip", b"x"),
                upload("not-a-save.tar", b"x"),
                upload("ok.zip", b"x"),
            ],
        )
        .await;

    assert!(!result.is_ok());
    assert_eq!(result.errors.len(), 3);
    assert!(result
        .errors
        .iter()
        .all(|e| e.key == ErrorKey::InvalidFileName));

    // Only the valid file landed on disk.
    let files = manager.get_local_save_files(&id).await;
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "ok.zip");
    assert!(!dir.path().join("1/local_saves/has space.zip").exists());
}

#[tokio::test]
async fn upload_collision_reports_already_exists() {
    let (_dir, manager) = test_manager(&["1"]);
    let id = ServerId::new("1");

    assert!(manager
        .upload_files(&id, vec![upload("a.zip", b"first")])
        .await
        .is_ok());

    let result = manager.upload_files(&id, vec![upload("a.zip", b"second")]).await;
    assert!(!result.is_ok());
    assert_eq!(result.errors[0].key, ErrorKey::FileAlreadyExists);

    // Original content untouched.
    let files = manager.get_local_save_files(&id).await;
    assert_eq!(files[0].size, b"first".len() as u64);
}

#[tokio::test]
async fn batch_delete_partial_failure() {
    let (dir, manager) = test_manager(&["1"]);
    let id = ServerId::new("1");
    manager
        .upload_files(&id, vec![upload("x.zip", b"x")])
        .await;

    // Subscribed after the upload, so the first event seen is the delete.
    let mut local_events = manager.notifier().subscribe_local_saves();

    let result = manager
        .delete_files(
            &id,
            vec!["local_saves/x.zip".to_string(), "local_saves/missing.zip".to_string()],
        )
        .await;

    assert!(!result.is_ok());
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].key, ErrorKey::MissingFile);
    assert!(!dir.path().join("1/local_saves/x.zip").exists());

    // The successful deletion still produced its event.
    let ev = timeout(Duration::from_secs(1), local_events.recv())
        .await
        .expect("timed out waiting for delete event")
        .expect("delete event");
    assert_eq!(ev.kind, ChangeKind::Delete);
    assert_eq!(ev.old_files.len(), 1);
    assert_eq!(ev.old_files[0].name, "x.zip");
}

#[tokio::test]
async fn delete_spanning_categories_emits_one_event_per_category() {
    let (dir, manager) = test_manager(&["1"]);
    let id = ServerId::new("1");
    manager.upload_files(&id, vec![upload("a.zip", b"a")]).await;
    tokio::fs::create_dir_all(dir.path().join("1/temp_saves"))
        .await
        .unwrap();
    tokio::fs::write(dir.path().join("1/temp_saves/t.zip"), b"t")
        .await
        .unwrap();

    let mut local_events = manager.notifier().subscribe_local_saves();
    let mut temp_events = manager.notifier().subscribe_temp_saves();

    let result = manager
        .delete_files(
            &id,
            vec!["local_saves/a.zip".to_string(), "temp_saves/t.zip".to_string()],
        )
        .await;
    assert!(result.is_ok());

    let local_ev = local_events.recv().await.unwrap();
    assert_eq!(local_ev.old_files[0].name, "a.zip");
    let temp_ev = temp_events.recv().await.unwrap();
    assert_eq!(temp_ev.old_files[0].name, "t.zip");
}

#[tokio::test]
async fn move_to_global_emits_paired_events() {
    let (dir, manager) = test_manager(&["1"]);
    let id = ServerId::new("1");
    manager.upload_files(&id, vec![upload("a.zip", b"payload")]).await;

    let mut local_events = manager.notifier().subscribe_local_saves();
    let mut global_events = manager.notifier().subscribe_global_saves();

    let result = manager
        .move_files(&id, "global_saves", vec!["local_saves/a.zip".to_string()])
        .await;
    assert!(result.is_ok(), "move failed: {:?}", result.errors);

    assert!(!dir.path().join("1/local_saves/a.zip").exists());
    assert!(dir.path().join("global_saves/a.zip").exists());

    let delete_ev = local_events.recv().await.unwrap();
    assert_eq!(delete_ev.kind, ChangeKind::Delete);
    assert_eq!(delete_ev.server_id, id);
    assert_eq!(delete_ev.old_files[0].name, "a.zip");
    assert_eq!(delete_ev.old_files[0].directory, "1/local_saves");

    let create_ev = global_events.recv().await.unwrap();
    assert_eq!(create_ev.kind, ChangeKind::Create);
    assert!(create_ev.server_id.is_global());
    assert_eq!(create_ev.new_files[0].name, "a.zip");
    assert_eq!(create_ev.new_files[0].directory, "global_saves");
}

#[tokio::test]
async fn move_into_scenarios_succeeds_without_event() {
    let (dir, manager) = test_manager(&["1"]);
    let id = ServerId::new("1");
    manager.upload_files(&id, vec![upload("a.zip", b"x")]).await;

    let mut scenario_events = manager.notifier().subscribe_scenarios();

    let result = manager
        .move_files(&id, "scenarios", vec!["local_saves/a.zip".to_string()])
        .await;
    assert!(result.is_ok());
    assert!(dir.path().join("scenarios/a.zip").exists());
    assert!(scenario_events.try_recv().is_err());
}

#[tokio::test]
async fn log_directories_are_not_valid_destinations() {
    let (dir, manager) = test_manager(&["1"]);
    let id = ServerId::new("1");
    manager.upload_files(&id, vec![upload("a.zip", b"x")]).await;

    for destination in ["logs", "chat_logs", "1/logs"] {
        let result = manager
            .move_files(&id, destination, vec!["local_saves/a.zip".to_string()])
            .await;
        assert!(!result.is_ok(), "{destination} must be refused");
        assert_eq!(result.errors[0].key, ErrorKey::InvalidDirectory);
    }

    let result = manager
        .copy_files(&id, "logs", vec!["local_saves/a.zip".to_string()])
        .await;
    assert!(!result.is_ok());
    assert_eq!(result.errors[0].key, ErrorKey::InvalidDirectory);

    // The source never moved.
    assert!(dir.path().join("1/local_saves/a.zip").exists());
}

#[tokio::test]
async fn move_collision_leaves_both_files() {
    let (dir, manager) = test_manager(&["1"]);
    let id = ServerId::new("1");
    manager.upload_files(&id, vec![upload("a.zip", b"local")]).await;
    tokio::fs::create_dir_all(dir.path().join("global_saves"))
        .await
        .unwrap();
    tokio::fs::write(dir.path().join("global_saves/a.zip"), b"global")
        .await
        .unwrap();

    let result = manager
        .move_files(&id, "global_saves", vec!["local_saves/a.zip".to_string()])
        .await;

    assert!(!result.is_ok());
    assert_eq!(result.errors[0].key, ErrorKey::FileAlreadyExists);
    assert!(dir.path().join("1/local_saves/a.zip").exists());
    assert_eq!(
        tokio::fs::read(dir.path().join("global_saves/a.zip")).await.unwrap(),
        b"global"
    );
}

#[tokio::test]
async fn copy_preserves_source_and_modified_time() {
    let (dir, manager) = test_manager(&["1"]);
    let id = ServerId::new("1");
    manager.upload_files(&id, vec![upload("a.zip", b"payload")]).await;

    let source_meta = tokio::fs::metadata(dir.path().join("1/local_saves/a.zip"))
        .await
        .unwrap();

    let result = manager
        .copy_files(&id, "global_saves", vec!["local_saves/a.zip".to_string()])
        .await;
    assert!(result.is_ok(), "copy failed: {:?}", result.errors);

    assert!(dir.path().join("1/local_saves/a.zip").exists());
    let copy_meta = tokio::fs::metadata(dir.path().join("global_saves/a.zip"))
        .await
        .unwrap();
    assert_eq!(copy_meta.len(), source_meta.len());
    assert_eq!(
        copy_meta.modified().unwrap(),
        source_meta.modified().unwrap()
    );
}

#[tokio::test]
async fn rename_collision_fails_and_leaves_files_untouched() {
    let (dir, manager) = test_manager(&["1"]);
    let id = ServerId::new("1");
    manager
        .upload_files(&id, vec![upload("a.zip", b"aaa"), upload("b.zip", b"bb")])
        .await;

    let result = manager.rename_file(&id, "local_saves", "a.zip", "b.zip").await;
    assert!(!result.is_ok());
    assert_eq!(result.errors[0].key, ErrorKey::FileAlreadyExists);

    assert_eq!(
        tokio::fs::read(dir.path().join("1/local_saves/a.zip")).await.unwrap(),
        b"aaa"
    );
    assert_eq!(
        tokio::fs::read(dir.path().join("1/local_saves/b.zip")).await.unwrap(),
        b"bb"
    );
}

#[tokio::test]
async fn rename_appends_save_extension_and_emits_pair() {
    let (dir, manager) = test_manager(&["1"]);
    let id = ServerId::new("1");
    manager.upload_files(&id, vec![upload("a.zip", b"x")]).await;

    let mut local_events = manager.notifier().subscribe_local_saves();

    let result = manager.rename_file(&id, "local_saves", "a.zip", "renamed").await;
    assert!(result.is_ok(), "rename failed: {:?}", result.errors);
    assert!(dir.path().join("1/local_saves/renamed.zip").exists());

    let ev = local_events.recv().await.unwrap();
    assert_eq!(ev.kind, ChangeKind::Rename);
    assert_eq!(ev.old_files.len(), 1);
    assert_eq!(ev.new_files.len(), 1);
    assert_eq!(ev.old_files[0].name, "a.zip");
    assert_eq!(ev.new_files[0].name, "renamed.zip");
}

#[tokio::test]
async fn traversal_paths_are_rejected_with_invalid_directory() {
    let (dir, manager) = test_manager(&["1"]);
    let id = ServerId::new("1");

    let result = manager
        .delete_files(&id, vec!["../outside/x.zip".to_string()])
        .await;
    assert!(!result.is_ok());
    assert_eq!(result.errors[0].key, ErrorKey::InvalidDirectory);

    // Unknown categories surface identically.
    let result = manager
        .delete_files(&id, vec!["mods/x.zip".to_string()])
        .await;
    assert_eq!(result.errors[0].key, ErrorKey::InvalidDirectory);

    assert!(!dir.path().join("outside").exists());
}

#[tokio::test]
async fn save_file_lookup_enforces_extension_and_existence() {
    let (_dir, manager) = test_manager(&["1"]);
    let id = ServerId::new("1");
    manager.upload_files(&id, vec![upload("a.zip", b"x")]).await;

    assert!(manager.get_save_file(&id, "local_saves", "a.zip").await.is_some());
    assert!(manager.get_save_file(&id, "local_saves", "missing.zip").await.is_none());
    assert!(manager.get_save_file(&id, "logs", "a.zip").await.is_none());
    assert!(manager
        .get_save_file(&id, "local_saves", "../../a.zip")
        .await
        .is_none());
}

#[tokio::test]
async fn log_file_lookup_serves_current_and_rotated_logs() {
    let (dir, manager) = test_manager(&["1"]);
    let id = ServerId::new("1");

    tokio::fs::create_dir_all(dir.path().join("1/logs")).await.unwrap();
    tokio::fs::write(dir.path().join("1/current.log"), b"live").await.unwrap();
    tokio::fs::write(dir.path().join("1/logs/old.log"), b"old").await.unwrap();
    tokio::fs::write(dir.path().join("1/logs/notes.txt"), b"n").await.unwrap();

    assert!(manager.get_log_file("1", "current.log").await.is_some());
    assert!(manager.get_log_file("1/logs", "old.log").await.is_some());
    assert!(manager.get_log_file("1/logs", "notes.txt").await.is_none());
    assert!(manager.get_log_file("2/logs", "old.log").await.is_none());

    let logs = manager.get_logs(&id).await;
    assert_eq!(logs[0].name, "current.log");
    assert!(logs.iter().any(|l| l.name == "old.log"));
    assert!(logs.iter().all(|l| l.name != "notes.txt"));
}

#[tokio::test]
async fn scenario_notification_carries_catalogue() {
    let (dir, manager) = test_manager(&["1"]);
    tokio::fs::create_dir_all(dir.path().join("scenarios/freeplay"))
        .await
        .unwrap();

    let mut scenario_events = manager.notifier().subscribe_scenarios();
    manager.notify_scenarios_changed().await;

    let ev = scenario_events.recv().await.unwrap();
    assert_eq!(ev.kind, ChangeKind::Create);
    assert_eq!(ev.scenarios.len(), 1);
    assert_eq!(ev.scenarios[0].name, "freeplay");
}
