//! Inserts and moves through a [`Session`](positions::Session).

use positions::{Clock, CollectionKey, FieldValue, Item, OrderingConfig, Saved, ValueKind};

use crate::helpers::*;

#[tokio::test]
async fn appends_by_default() {
    let (session, _) = test_session(OrderingConfig::default()).await;
    let root = CollectionKey::root();

    let mut a = Item::new("a", root.clone());
    let saved = session.save(&mut a).await.unwrap();
    assert_eq!(
        saved,
        Saved {
            created: true,
            position: 0
        }
    );

    populate(&session, &root, &["b", "c"]).await;
    assert_eq!(order(&session, &root).await, ["a", "b", "c"]);
}

#[tokio::test]
async fn insert_in_the_middle() {
    let (session, _) = test_session(OrderingConfig::default()).await;
    let root = CollectionKey::root();
    populate(&session, &root, &["a", "b", "c", "d", "e"]).await;

    let mut x = Item::new("x", root.clone());
    x.set_position(2);
    let saved = session.save(&mut x).await.unwrap();
    assert_eq!(saved.position, 2);
    assert_eq!(x.position(), 2);

    assert_eq!(order(&session, &root).await, ["a", "b", "x", "c", "d", "e"]);
}

#[tokio::test]
async fn insert_at_front_and_far_past_the_end() {
    let (session, _) = test_session(OrderingConfig::default()).await;
    let root = CollectionKey::root();
    populate(&session, &root, &["a", "b"]).await;

    let mut front = Item::new("front", root.clone());
    front.set_position(0);
    session.save(&mut front).await.unwrap();

    let mut back = Item::new("back", root.clone());
    back.set_position(1_000);
    assert_eq!(session.save(&mut back).await.unwrap().position, 3);

    assert_eq!(order(&session, &root).await, ["front", "a", "b", "back"]);
}

#[tokio::test]
async fn negative_positions_count_from_the_end() {
    let (session, _) = test_session(OrderingConfig::default()).await;
    let root = CollectionKey::root();
    populate(&session, &root, &["a", "b", "c", "d", "e"]).await;

    let mut c = load(&session, "c").await;
    c.set_position(-1);
    assert_eq!(session.save(&mut c).await.unwrap().position, 4);
    assert_eq!(order(&session, &root).await, ["a", "b", "d", "e", "c"]);

    let mut c = load(&session, "c").await;
    c.set_position(-7);
    assert_eq!(session.save(&mut c).await.unwrap().position, 0);
    assert_eq!(order(&session, &root).await, ["c", "a", "b", "d", "e"]);
}

#[tokio::test]
async fn move_forward_and_back() {
    let (session, _) = test_session(OrderingConfig::default()).await;
    let root = CollectionKey::root();
    populate(&session, &root, &["a", "b", "c", "d"]).await;

    let mut a = load(&session, "a").await;
    a.set_position(2);
    let saved = session.save(&mut a).await.unwrap();
    assert!(!saved.created);
    assert_eq!(order(&session, &root).await, ["b", "c", "a", "d"]);

    // The same item can be moved again without reloading.
    a.set_position(0);
    session.save(&mut a).await.unwrap();
    assert_eq!(order(&session, &root).await, ["a", "b", "c", "d"]);
}

#[tokio::test]
async fn resave_is_a_no_op() {
    let config = OrderingConfig::default().auto_refresh("updated");
    let (session, clock) = test_session(config).await;
    let root = CollectionKey::root();
    populate(&session, &root, &["a", "b", "c"]).await;
    clock.advance(60_000);

    let mut b = load(&session, "b").await;
    let saved = session.save(&mut b).await.unwrap();
    assert_eq!(saved.position, 1);

    // Only the saved item itself picks up the new stamp.
    for id in ["a", "c"] {
        let item = load(&session, id).await;
        assert_eq!(item.stamp("updated"), Some(clock.now_millis() - 60_000));
    }
    assert_eq!(load(&session, "b").await.stamp("updated"), Some(clock.now_millis()));
    assert_eq!(order(&session, &root).await, ["a", "b", "c"]);
}

#[tokio::test]
async fn shifted_neighbours_are_stamped() {
    let config = OrderingConfig::default().auto_refresh("updated");
    let (session, clock) = test_session(config).await;
    let root = CollectionKey::root();
    populate(&session, &root, &["a", "b", "c"]).await;
    let before = clock.now_millis();
    clock.advance(5);

    let mut x = Item::new("x", root.clone());
    x.set_position(1);
    session.save(&mut x).await.unwrap();

    assert_eq!(load(&session, "a").await.stamp("updated"), Some(before));
    for id in ["x", "b", "c"] {
        assert_eq!(load(&session, id).await.stamp("updated"), Some(before + 5));
    }
}

#[tokio::test]
async fn move_to_another_collection() {
    let (session, _) = test_session(keyed_config()).await;
    populate(&session, &list(1), &["a0", "a1", "a2", "a3", "a4"]).await;
    populate(&session, &list(2), &["b0", "b1", "b2"]).await;

    let mut a3 = load(&session, "a3").await;
    a3.set_collection(list(2));
    a3.set_position(2);
    let saved = session.save(&mut a3).await.unwrap();
    assert_eq!(saved.position, 2);
    assert!(!saved.created);

    assert_eq!(order(&session, &list(1)).await, ["a0", "a1", "a2", "a4"]);
    assert_eq!(order(&session, &list(2)).await, ["b0", "b1", "a3", "b2"]);
}

#[tokio::test]
async fn move_to_another_collection_appends_without_request() {
    let (session, _) = test_session(keyed_config()).await;
    populate(&session, &list(1), &["a0", "a1"]).await;
    populate(&session, &list(2), &["b0"]).await;

    let mut a0 = load(&session, "a0").await;
    a0.set_collection(list(2));
    assert_eq!(session.save(&mut a0).await.unwrap().position, 1);

    assert_eq!(order(&session, &list(1)).await, ["a1"]);
    assert_eq!(order(&session, &list(2)).await, ["b0", "a0"]);
}

#[tokio::test]
async fn move_into_an_empty_collection() {
    let (session, _) = test_session(keyed_config()).await;
    populate(&session, &list(1), &["a0", "a1", "a2"]).await;

    let mut a1 = load(&session, "a1").await;
    a1.set_collection(list(9));
    a1.set_position(4);
    assert_eq!(session.save(&mut a1).await.unwrap().position, 0);

    assert_eq!(order(&session, &list(1)).await, ["a0", "a2"]);
    assert_eq!(order(&session, &list(9)).await, ["a1"]);
}

#[tokio::test]
async fn collections_with_text_and_null_keys() {
    let config = OrderingConfig::new("cards")
        .collection("board", ValueKind::Text)
        .collection("lane", ValueKind::Integer);
    let (session, _) = test_session(config).await;
    let todo = CollectionKey::new([FieldValue::from("todo"), FieldValue::Null]);
    let done = CollectionKey::new([FieldValue::from("todo"), FieldValue::from(1i64)]);

    populate(&session, &todo, &["t0", "t1"]).await;
    populate(&session, &done, &["d0"]).await;

    let mut t1 = load(&session, "t1").await;
    assert_eq!(t1.collection(), &todo);
    t1.set_position(0);
    session.save(&mut t1).await.unwrap();

    assert_eq!(order(&session, &todo).await, ["t1", "t0"]);
    assert_eq!(order(&session, &done).await, ["d0"]);
}

#[tokio::test]
async fn list_returns_items_in_order() {
    let (session, _) = test_session(OrderingConfig::default()).await;
    let root = CollectionKey::root();
    populate(&session, &root, &["a", "b", "c"]).await;
    let mut c = load(&session, "c").await;
    c.set_position(0);
    session.save(&mut c).await.unwrap();

    let items = session.list(&root).await.unwrap();
    let listed: Vec<_> = items.iter().map(|i| (i.id().as_str(), i.position())).collect();
    assert_eq!(listed, [("c", 0), ("a", 1), ("b", 2)]);
}
