use std::sync::Arc;

use positions::{
    CollectionKey, FixedClock, InMemory, Item, ItemId, OrderingConfig, PositionRange, Session,
    Store, ValueKind,
};

// ==========================
// CORE TEST FACTORIES
// ==========================
// These are the foundation for all test setup. They provide a single point of change
// for store matrix testing via TEST_BACKEND env var.

/// Creates a test store based on TEST_BACKEND env var.
///
/// Supported values:
/// - "inmemory" or unset: InMemory store (default)
/// - "sqlite": SQLite in-memory store (requires `sqlite` feature)
/// - "postgres": PostgreSQL store (requires `postgres` feature and TEST_POSTGRES_URL)
///
/// SQL stores get a uniquely named table so tests sharing a database do not
/// see each other's rows.
///
/// # Panics
/// Panics if TEST_BACKEND names a store whose feature is not enabled.
///
/// # Example
/// ```bash
/// # Run tests with InMemory (default)
/// cargo test
///
/// # Run tests with SQLite
/// TEST_BACKEND=sqlite cargo test
///
/// # Run tests with PostgreSQL
/// TEST_BACKEND=postgres TEST_POSTGRES_URL="postgres://localhost/positions_test" \
///   cargo test --features postgres
/// ```
pub async fn test_store(config: &OrderingConfig) -> Arc<dyn Store> {
    match std::env::var("TEST_BACKEND").as_deref() {
        Ok("sqlite") => {
            #[cfg(feature = "sqlite")]
            {
                use positions::store::sql::SqlStore;
                Arc::new(
                    SqlStore::sqlite_in_memory(isolated(config))
                        .await
                        .expect("Failed to create SQLite store"),
                )
            }
            #[cfg(not(feature = "sqlite"))]
            {
                let _ = config;
                panic!("TEST_BACKEND=sqlite requires the 'sqlite' feature to be enabled")
            }
        }
        Ok("postgres") => {
            #[cfg(feature = "postgres")]
            {
                use positions::store::sql::SqlStore;
                let url = std::env::var("TEST_POSTGRES_URL")
                    .unwrap_or_else(|_| "postgres://localhost/positions_test".to_string());
                Arc::new(
                    SqlStore::connect_postgres(&url, isolated(config))
                        .await
                        .expect("Failed to connect to PostgreSQL"),
                )
            }
            #[cfg(not(feature = "postgres"))]
            {
                let _ = config;
                panic!("TEST_BACKEND=postgres requires the 'postgres' feature to be enabled")
            }
        }
        Ok("inmemory") | Ok("") | Err(_) => Arc::new(InMemory::new()),
        Ok(other) => {
            panic!("Unknown TEST_BACKEND value: {other}. Supported: inmemory, sqlite, postgres")
        }
    }
}

#[allow(dead_code)]
fn isolated(config: &OrderingConfig) -> OrderingConfig {
    let mut config = config.clone();
    config.table = format!("{}_{}", config.table, ItemId::generate());
    config
}

/// Creates a session over a fresh test store.
///
/// Uses a [`FixedClock`] for controllable auto-refresh stamps.
pub async fn test_session(config: OrderingConfig) -> (Session, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::default());
    let store = test_store(&config).await;
    let session =
        Session::with_clock(store, config, clock.clone()).expect("Failed to create session");
    (session, clock)
}

/// Configuration with a single integer collection column named `list`.
pub fn keyed_config() -> OrderingConfig {
    OrderingConfig::new("items").collection("list", ValueKind::Integer)
}

/// Collection key for list `n` under [`keyed_config`].
pub fn list(n: i64) -> CollectionKey {
    CollectionKey::new([n])
}

// ==========================
// ASSERTION HELPERS
// ==========================

/// Saves a fresh item for each id, appending in order.
pub async fn populate(session: &Session, collection: &CollectionKey, ids: &[&str]) {
    for id in ids {
        let mut item = Item::new(*id, collection.clone());
        session.save(&mut item).await.expect("Failed to save item");
    }
}

/// Ids of `collection` in position order.
///
/// Panics if the positions are not exactly `0..N`.
pub async fn order(session: &Session, collection: &CollectionKey) -> Vec<String> {
    let rows = session
        .store()
        .read(collection, PositionRange::all())
        .await
        .expect("Failed to read collection");
    for (expected, row) in rows.iter().enumerate() {
        assert_eq!(
            row.position, expected as i64,
            "collection {collection} is not contiguous at {}",
            row.id
        );
    }
    rows.into_iter().map(|row| row.id.to_string()).collect()
}

/// Loads an item by id string.
pub async fn load(session: &Session, id: &str) -> Item {
    session
        .load(&ItemId::from(id))
        .await
        .expect("Failed to load item")
}
