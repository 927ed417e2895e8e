mod common;

use common::{count, in_memory_db, init_tracing, Counter, CounterEvent, COUNTER_KEY};
use projectionkit::{identity, ProjectionError, ProjectionMessageHandler, Version};
use projectionkit_redb::{bind, create_schema, drop_schema, Adaptor};
use projectionkit_testing::{RecordingCompactScope, RecordingEventScope};

#[tokio::test]
async fn handler_writes_commit_with_the_version() {
    init_tracing();
    let db = in_memory_db();
    let adaptor = Adaptor::new(db.clone(), Counter).expect("valid identity");
    let scope = RecordingEventScope::new();

    let applied = adaptor
        .handle_event(
            b"R",
            &Version::absent(),
            &Version::from("V1"),
            &scope,
            &CounterEvent::Incremented("clicks"),
        )
        .await
        .expect("first delivery");
    let redelivered = adaptor
        .handle_event(
            b"R",
            &Version::absent(),
            &Version::from("V1"),
            &scope,
            &CounterEvent::Incremented("clicks"),
        )
        .await
        .expect("redelivery");

    assert!(applied);
    assert!(!redelivered);
    assert_eq!(count(&db, "clicks"), Some(1));
    assert_eq!(
        adaptor.resource_version(b"R").await.expect("version"),
        Version::from("V1")
    );
}

#[tokio::test]
async fn handler_error_rolls_back_version_and_writes() {
    let db = in_memory_db();
    let adaptor = Adaptor::new(db.clone(), Counter).expect("valid identity");

    let result = adaptor
        .handle_event(
            b"R",
            &Version::absent(),
            &Version::from("V1"),
            &RecordingEventScope::new(),
            &CounterEvent::Poisoned("clicks"),
        )
        .await;

    assert!(matches!(result, Err(ProjectionError::Handler(_))));
    assert_eq!(
        adaptor.resource_version(b"R").await.expect("version"),
        Version::absent()
    );
    assert_eq!(count(&db, "clicks"), None);
}

#[tokio::test]
async fn close_resource_is_idempotent() {
    let adaptor = Adaptor::new(in_memory_db(), Counter).expect("valid identity");

    adaptor.close_resource(b"never-seen").await.expect("first close");
    adaptor.close_resource(b"never-seen").await.expect("second close");

    assert_eq!(
        adaptor.resource_version(b"never-seen").await.expect("version"),
        Version::absent()
    );
}

#[tokio::test]
async fn compact_runs_against_the_database() {
    let db = in_memory_db();
    let adaptor = Adaptor::new(db.clone(), Counter).expect("valid identity");
    let event_scope = RecordingEventScope::new();
    let _ = adaptor
        .handle_event(
            b"R",
            &Version::absent(),
            &Version::from("V1"),
            &event_scope,
            &CounterEvent::Incremented("once"),
        )
        .await
        .expect("delivery");
    let compact_scope = RecordingCompactScope::new();

    adaptor.compact(&compact_scope).await.expect("compaction");

    assert_eq!(count(&db, "once"), None);
    assert_eq!(compact_scope.messages(), vec!["dropped single counts".to_owned()]);
}

#[tokio::test]
async fn schema_lifecycle_is_idempotent_and_drops_records() {
    let db = in_memory_db();
    let adaptor = Adaptor::new(db.clone(), Counter).expect("valid identity");

    create_schema(&db, adaptor.key()).expect("first create");
    create_schema(&db, adaptor.key()).expect("second create");
    let _ = adaptor
        .handle_event(
            b"R",
            &Version::absent(),
            &Version::from("V1"),
            &RecordingEventScope::new(),
            &CounterEvent::Incremented("clicks"),
        )
        .await
        .expect("delivery");

    drop_schema(&db, adaptor.key()).expect("first drop");
    drop_schema(&db, adaptor.key()).expect("second drop");

    assert_eq!(
        adaptor.resource_version(b"R").await.expect("version"),
        Version::absent()
    );
}

#[tokio::test]
async fn binding_without_a_database_is_unbound() {
    let binding = bind(None, Counter).expect("valid identity");

    let result = ProjectionMessageHandler::<CounterEvent>::resource_version(&binding, b"R").await;

    assert!(matches!(result, Err(ProjectionError::NotBound)));
    assert_eq!(
        identity::key(&binding).expect("identity").to_string(),
        COUNTER_KEY
    );
}
