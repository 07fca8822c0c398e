//! Gap closure after deletes.

use positions::{CollectionKey, Item, ItemId, OrderingConfig};

use crate::helpers::*;

#[tokio::test]
async fn delete_from_the_middle() {
    let (session, _) = test_session(OrderingConfig::default()).await;
    let root = CollectionKey::root();
    populate(&session, &root, &["a", "b", "c", "d", "e"]).await;

    let mut c = load(&session, "c").await;
    assert!(session.delete(&mut c).await.unwrap());

    assert_eq!(order(&session, &root).await, ["a", "b", "d", "e"]);
    let err = session.load(&ItemId::from("c")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn delete_first_and_last() {
    let (session, _) = test_session(OrderingConfig::default()).await;
    let root = CollectionKey::root();
    populate(&session, &root, &["a", "b", "c"]).await;

    session.delete(&mut load(&session, "c").await).await.unwrap();
    assert_eq!(order(&session, &root).await, ["a", "b"]);

    session.delete(&mut load(&session, "a").await).await.unwrap();
    assert_eq!(order(&session, &root).await, ["b"]);

    session.delete(&mut load(&session, "b").await).await.unwrap();
    assert!(order(&session, &root).await.is_empty());
}

#[tokio::test]
async fn delete_uses_the_persisted_row() {
    let (session, _) = test_session(keyed_config()).await;
    populate(&session, &list(1), &["a0", "a1", "a2"]).await;
    populate(&session, &list(2), &["b0", "b1"]).await;

    // Unsaved edits on the handle do not redirect the gap closure.
    let mut a1 = load(&session, "a1").await;
    a1.set_collection(list(2));
    a1.set_position(0);
    assert!(session.delete(&mut a1).await.unwrap());
    assert_eq!(a1.collection(), &list(1));

    assert_eq!(order(&session, &list(1)).await, ["a0", "a2"]);
    assert_eq!(order(&session, &list(2)).await, ["b0", "b1"]);
}

#[tokio::test]
async fn delete_of_unsaved_item_is_a_no_op() {
    let (session, _) = test_session(OrderingConfig::default()).await;
    let root = CollectionKey::root();
    populate(&session, &root, &["a", "b"]).await;

    let mut ghost = Item::new("ghost", root.clone());
    assert!(!session.delete(&mut ghost).await.unwrap());
    assert_eq!(order(&session, &root).await, ["a", "b"]);
}

#[tokio::test]
async fn delete_only_touches_its_collection() {
    let (session, _) = test_session(keyed_config()).await;
    populate(&session, &list(1), &["a0", "a1", "a2"]).await;
    populate(&session, &list(2), &["b0", "b1", "b2"]).await;

    session
        .delete(&mut load(&session, "a0").await)
        .await
        .unwrap();

    assert_eq!(order(&session, &list(1)).await, ["a1", "a2"]);
    assert_eq!(order(&session, &list(2)).await, ["b0", "b1", "b2"]);
}

#[tokio::test]
async fn delete_stamps_the_shifted_rows() {
    let config = OrderingConfig::default().auto_refresh("updated");
    let (session, clock) = test_session(config).await;
    let root = CollectionKey::root();
    populate(&session, &root, &["a", "b", "c"]).await;
    let before = load(&session, "a").await.stamp("updated");
    clock.advance(1_000);

    session.delete(&mut load(&session, "a").await).await.unwrap();

    for id in ["b", "c"] {
        assert_ne!(load(&session, id).await.stamp("updated"), before);
    }
}

#[tokio::test]
async fn reinsert_after_delete() {
    let (session, _) = test_session(OrderingConfig::default()).await;
    let root = CollectionKey::root();
    populate(&session, &root, &["a", "b", "c"]).await;

    let mut b = load(&session, "b").await;
    session.delete(&mut b).await.unwrap();

    let mut again = Item::new("b", root.clone());
    again.set_position(0);
    let saved = session.save(&mut again).await.unwrap();
    assert!(saved.created);
    assert_eq!(order(&session, &root).await, ["b", "a", "c"]);
}
