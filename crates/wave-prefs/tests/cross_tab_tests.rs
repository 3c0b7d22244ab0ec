use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use wave_prefs::{
    ChangeSource, CollapsePreferences, FileStorage, InlineCommentsVisibility, SharedStorage,
    COLLAPSE_KEY,
};

#[tokio::test]
async fn test_write_in_one_tab_reaches_the_other() {
    let shared = SharedStorage::new();
    let tab_a = CollapsePreferences::new(Arc::new(shared.tab()));
    let tab_b = CollapsePreferences::new(Arc::new(shared.tab()));
    let mut rx_a = tab_a.subscribe();
    let mut rx_b = tab_b.subscribe();

    tab_a.set_collapsed("b1", true);

    let local = rx_a.recv().await.unwrap();
    assert_eq!(local.source, ChangeSource::Local);

    let remote = timeout(Duration::from_secs(1), rx_b.recv())
        .await
        .expect("tab b notified")
        .unwrap();
    assert_eq!(remote.source, ChangeSource::Storage);
    assert_eq!(remote.blip_id.as_str(), "b1");
    assert!(remote.value.0);
    assert!(tab_b.is_collapsed(&"b1".into()));

    // the writer never hears its own write back
    assert!(timeout(Duration::from_millis(50), rx_a.recv()).await.is_err());
}

#[tokio::test]
async fn test_cleared_document_notifies_defaults() {
    let shared = SharedStorage::new();
    let tab_a = CollapsePreferences::new(Arc::new(shared.tab()));
    let tab_b = CollapsePreferences::new(Arc::new(shared.tab()));
    let mut rx_b = tab_b.subscribe();

    tab_a.set_collapsed("b1", true);
    let _ = timeout(Duration::from_secs(1), rx_b.recv()).await.unwrap();

    shared.remove(COLLAPSE_KEY);
    let reset = timeout(Duration::from_secs(1), rx_b.recv())
        .await
        .expect("reset notified")
        .unwrap();
    assert_eq!(reset.source, ChangeSource::Storage);
    assert!(!reset.value.0);
    assert!(!tab_b.is_collapsed(&"b1".into()));
}

#[tokio::test]
async fn test_other_keys_are_ignored() {
    let shared = SharedStorage::new();
    let collapse = CollapsePreferences::new(Arc::new(shared.tab()));
    let visibility = InlineCommentsVisibility::new(Arc::new(shared.tab()));
    let mut rx = collapse.subscribe();

    visibility.set_visible("b1", false);
    assert!(timeout(Duration::from_millis(50), rx.recv()).await.is_err());
}

#[test]
fn test_file_storage_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.json");

    let first = InlineCommentsVisibility::new(Arc::new(FileStorage::new(&path)));
    first.set_visible("b7", false);
    drop(first);

    let second = InlineCommentsVisibility::new(Arc::new(FileStorage::new(&path)));
    assert_eq!(second.stored(&"b7".into()), Some(false));
}
