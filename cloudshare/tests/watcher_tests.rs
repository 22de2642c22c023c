use std::time::Duration;

use cloudshare::watcher::{DirectoryWatcher, EventSource, WatchEventKind};
use tokio::time::timeout;

const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

#[tokio::test]
async fn test_creates_missing_directory() {
    let root = tempfile::tempdir().unwrap();
    let path = root.path().join("nested").join("shots");

    let watcher = DirectoryWatcher::new(&path).unwrap();

    assert!(path.is_dir());
    assert_eq!(watcher.path(), path.as_path());
}

#[tokio::test]
async fn test_hidden_files_never_surface() {
    let root = tempfile::tempdir().unwrap();
    let mut watcher = DirectoryWatcher::new(root.path()).unwrap();

    std::fs::write(root.path().join(".DS_Store"), b"junk").unwrap();
    std::fs::write(root.path().join("capture.png"), PNG_HEADER).unwrap();

    let event = timeout(Duration::from_secs(10), watcher.next_event())
        .await
        .expect("no watch event within 10s")
        .expect("watch stream ended");

    assert_eq!(event.kind, WatchEventKind::Create);
    assert_eq!(
        event.path.file_name().and_then(|name| name.to_str()),
        Some("capture.png")
    );
}

#[tokio::test]
async fn test_renamed_screenshot_surfaces_once() {
    let root = tempfile::tempdir().unwrap();
    let mut watcher = DirectoryWatcher::new(root.path()).unwrap();

    let temp = root.path().join(".Screenshot 1.png");
    std::fs::write(&temp, PNG_HEADER).unwrap();
    std::fs::rename(&temp, root.path().join("capture.png")).unwrap();

    let event = timeout(Duration::from_secs(10), watcher.next_event())
        .await
        .expect("no watch event within 10s")
        .expect("watch stream ended");
    assert_eq!(
        event.path.file_name().and_then(|name| name.to_str()),
        Some("capture.png")
    );

    // A rename is reported once, not once per notification
    assert!(timeout(Duration::from_millis(500), watcher.next_event())
        .await
        .is_err());
}

#[tokio::test]
async fn test_file_moved_in_from_elsewhere_surfaces() {
    let root = tempfile::tempdir().unwrap();
    let elsewhere = tempfile::tempdir().unwrap();
    let mut watcher = DirectoryWatcher::new(root.path()).unwrap();

    let source = elsewhere.path().join("moved.png");
    std::fs::write(&source, PNG_HEADER).unwrap();
    std::fs::rename(&source, root.path().join("moved.png")).unwrap();

    let event = timeout(Duration::from_secs(10), watcher.next_event())
        .await
        .expect("no watch event within 10s")
        .expect("watch stream ended");
    assert_eq!(event.kind, WatchEventKind::Create);
    assert_eq!(
        event.path.file_name().and_then(|name| name.to_str()),
        Some("moved.png")
    );
}
