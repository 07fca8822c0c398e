//! Custom lifecycle subscribers alongside the position field.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use positions::{
    CollectionKey, Item, LifecycleHook, OrderingConfig, PositionRange, Result, Store, StoreError,
};

use crate::helpers::*;

/// Records the collection order it observes on every event.
#[derive(Default)]
struct Observer {
    seen: Mutex<Vec<String>>,
}

impl Observer {
    async fn snapshot(&self, store: &dyn Store, event: &str, item: &Item) -> Result<()> {
        let rows = store
            .read(item.collection(), PositionRange::all())
            .await?;
        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        self.seen
            .lock()
            .unwrap()
            .push(format!("{event} {}: {}", item.id(), ids.join(",")));
        Ok(())
    }
}

#[async_trait]
impl LifecycleHook for Observer {
    async fn before_record_deleted(&self, store: &dyn Store, item: &mut Item) -> Result<()> {
        self.snapshot(store, "before-delete", item).await
    }

    async fn after_record_deleted(&self, store: &dyn Store, item: &mut Item) -> Result<()> {
        self.snapshot(store, "after-delete", item).await
    }

    async fn after_record_saved(
        &self,
        store: &dyn Store,
        item: &mut Item,
        created: bool,
    ) -> Result<()> {
        let event = if created { "created" } else { "updated" };
        self.snapshot(store, event, item).await
    }
}

#[tokio::test]
async fn subscribers_run_after_the_position_field() {
    let (mut session, _) = test_session(OrderingConfig::default()).await;
    let observer = Arc::new(Observer::default());
    session.subscribe(observer.clone());
    let root = CollectionKey::root();

    populate(&session, &root, &["a", "b"]).await;
    let mut x = Item::new("x", root.clone());
    x.set_position(0);
    session.save(&mut x).await.unwrap();
    session.delete(&mut load(&session, "a").await).await.unwrap();

    assert_eq!(
        *observer.seen.lock().unwrap(),
        [
            "created a: a",
            "created b: a,b",
            "created x: x,a,b",
            "before-delete a: x,a,b",
            "after-delete a: x,b",
        ]
    );
}

struct Veto;

#[async_trait]
impl LifecycleHook for Veto {
    async fn before_record_deleted(&self, _store: &dyn Store, item: &mut Item) -> Result<()> {
        Err(StoreError::InvalidRow {
            reason: format!("{} is pinned", item.id()),
        }
        .into())
    }
}

#[tokio::test]
async fn failing_hook_aborts_the_delete() {
    let (mut session, _) = test_session(OrderingConfig::default()).await;
    session.subscribe(Arc::new(Veto));
    let root = CollectionKey::root();
    populate(&session, &root, &["a", "b"]).await;

    let err = session
        .delete(&mut load(&session, "a").await)
        .await
        .unwrap_err();
    assert!(err.is_store_error());
    assert_eq!(order(&session, &root).await, ["a", "b"]);
}

struct RejectInserts;

#[async_trait]
impl LifecycleHook for RejectInserts {
    async fn after_record_saved(
        &self,
        _store: &dyn Store,
        item: &mut Item,
        created: bool,
    ) -> Result<()> {
        if !created {
            return Ok(());
        }
        Err(StoreError::InvalidRow {
            reason: format!("{} arrived after the cutoff", item.id()),
        }
        .into())
    }
}

#[tokio::test]
async fn failing_hook_rolls_back_the_save_and_its_shifts() {
    let (mut session, _) = test_session(OrderingConfig::default()).await;
    let root = CollectionKey::root();
    populate(&session, &root, &["a", "b"]).await;
    session.subscribe(Arc::new(RejectInserts));

    // The position field has already shifted a and b when the hook fails.
    let mut x = Item::new("x", root.clone());
    x.set_position(0);
    assert!(session.save(&mut x).await.is_err());
    assert_eq!(order(&session, &root).await, ["a", "b"]);

    // Updates still go through.
    let mut b = load(&session, "b").await;
    b.set_position(0);
    session.save(&mut b).await.unwrap();
    assert_eq!(order(&session, &root).await, ["b", "a"]);
}
