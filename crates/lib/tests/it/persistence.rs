//! InMemory snapshots on disk.

use std::sync::Arc;

use positions::{CollectionKey, InMemory, Item, OrderingConfig, Session};
use tempfile::tempdir;

use crate::helpers::*;

#[tokio::test]
async fn snapshot_survives_a_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("items.json");
    let root = CollectionKey::root();

    let store = Arc::new(InMemory::new());
    {
        let session = Session::new(store.clone(), OrderingConfig::default()).unwrap();
        populate(&session, &root, &["a", "b", "c"]).await;
        let mut c = load(&session, "c").await;
        c.set_position(0);
        session.save(&mut c).await.unwrap();
    }
    store.save_to_file(&path).await.unwrap();

    let restored = Arc::new(InMemory::load_from_file(&path).await.unwrap());
    assert_eq!(restored.len().await, 3);
    let session = Session::new(restored, OrderingConfig::default()).unwrap();
    assert_eq!(order(&session, &root).await, ["c", "a", "b"]);

    // The restored store keeps working.
    let mut d = Item::new("d", root.clone());
    d.set_position(1);
    session.save(&mut d).await.unwrap();
    assert_eq!(order(&session, &root).await, ["c", "d", "a", "b"]);
}

#[tokio::test]
async fn missing_snapshot_is_an_empty_store() {
    let dir = tempdir().unwrap();
    let store = InMemory::load_from_file(dir.path().join("absent.json"))
        .await
        .unwrap();
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn unknown_snapshot_version_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("future.json");
    tokio::fs::write(&path, r#"{"_v": 9, "rows": {}}"#)
        .await
        .unwrap();

    let err = InMemory::load_from_file(&path).await.unwrap_err();
    assert!(err.is_io_error());
}
