//! Configuration as seen by a host setting up a session.

use std::sync::Arc;

use positions::{CollectionKey, ConfigError, Error, InMemory, OrderingConfig, Session, ValueKind};

use crate::helpers::*;

#[test]
fn unique_position_field_is_refused() {
    let config = OrderingConfig::new("tasks").field("rank").unique(true);
    let err = Session::new(Arc::new(InMemory::new()), config).unwrap_err();
    match err {
        Error::Config(ref e) => assert!(e.is_uniqueness_error()),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn position_in_unique_together_is_refused() {
    let config = keyed_config().unique_together(["list", "position"]);
    let err = Session::new(Arc::new(InMemory::new()), config).unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::UniqueTogether { ref constraint, .. })
            if constraint == &["list", "position"]
    ));
}

#[test]
fn unique_together_without_position_is_accepted() {
    let config = keyed_config()
        .auto_refresh("updated")
        .unique_together(["list", "updated"]);
    assert!(Session::new(Arc::new(InMemory::new()), config).is_ok());
}

#[tokio::test]
async fn json_configuration_drives_a_session() {
    let config = OrderingConfig::from_json(
        r#"{
            "table": "tracks",
            "field": "track_number",
            "collection": [{ "name": "album", "kind": "text" }],
            "auto_refresh": ["modified"]
        }"#,
    )
    .unwrap();
    assert_eq!(config.collection[0].kind, ValueKind::Text);
    assert_eq!(config.id_column, "id");

    let (session, _) = test_session(config).await;
    let album = CollectionKey::new(["blue"]);
    populate(&session, &album, &["t1", "t2"]).await;
    assert_eq!(order(&session, &album).await, ["t1", "t2"]);
}

#[test]
fn malformed_json_is_a_config_error() {
    let err = OrderingConfig::from_json("{ \"table\": 3 }").unwrap_err();
    assert!(!err.is_uniqueness_error());
    assert!(Error::from(err).is_config_error());
}
