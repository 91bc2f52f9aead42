//! Integration tests for `PgEventRepository` and `PgEventBufferRepository`.

use chrono::{Duration, Utc};
use crm_core::buffer::{EventBufferEntry, EventBufferRepository};
use crm_core::error::DomainError;
use crm_core::event::{EventMetadata, StreamId};
use crm_core::repository::{EventRepository, StoredEvent};
use crm_event_store::pg_event_buffer_repository::PgEventBufferRepository;
use crm_event_store::pg_event_repository::PgEventRepository;
use sqlx::PgPool;
use uuid::Uuid;

fn new_stream() -> StreamId {
    StreamId::new("acme", "opportunity", Uuid::new_v4().to_string())
}

/// Helper to build a `StoredEvent` with sensible defaults.
fn make_stored_event(stream: &StreamId, version: i64) -> StoredEvent {
    StoredEvent {
        event_id: stream.event_id(version),
        stream: stream.clone(),
        event_type: "V1_OPPORTUNITY_UPDATE".to_string(),
        schema_version: 1,
        version,
        payload: serde_json::json!({"name": "Renewal Q3"}),
        metadata: EventMetadata {
            tenant: stream.tenant.clone(),
            user_id: "u-1".to_string(),
            app_source: "web".to_string(),
            correlation_id: Uuid::new_v4(),
            causation_id: Uuid::new_v4(),
        },
        occurred_at: Utc::now(),
    }
}

// --- load_events ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_load_events_returns_empty_vec_for_nonexistent_stream(pool: PgPool) {
    let repo = PgEventRepository::new(pool);

    let events = repo.load_events(&new_stream()).await.unwrap();

    assert!(events.is_empty());
}

// --- append_events + load_events ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_append_and_load_single_event(pool: PgPool) {
    let repo = PgEventRepository::new(pool);
    let stream = new_stream();
    let event = make_stored_event(&stream, 1);

    repo.append_events(&stream, 0, std::slice::from_ref(&event))
        .await
        .unwrap();

    let loaded = repo.load_events(&stream).await.unwrap();
    assert_eq!(loaded.len(), 1);

    let e = &loaded[0];
    assert_eq!(e.event_id, event.event_id);
    assert_eq!(e.stream, stream);
    assert_eq!(e.event_type, event.event_type);
    assert_eq!(e.payload, event.payload);
    assert_eq!(e.version, 1);
    assert_eq!(e.metadata, event.metadata);
    // TIMESTAMPTZ keeps microseconds.
    assert_eq!(
        e.occurred_at.timestamp_micros(),
        event.occurred_at.timestamp_micros()
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_sequential_appends_with_correct_expected_version(pool: PgPool) {
    let repo = PgEventRepository::new(pool);
    let stream = new_stream();

    repo.append_events(
        &stream,
        0,
        &[make_stored_event(&stream, 1), make_stored_event(&stream, 2)],
    )
    .await
    .unwrap();
    repo.append_events(&stream, 2, &[make_stored_event(&stream, 3)])
        .await
        .unwrap();

    let loaded = repo.load_events(&stream).await.unwrap();
    let versions: Vec<i64> = loaded.iter().map(|e| e.version).collect();
    assert_eq!(versions, vec![1, 2, 3]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_stream_isolation_by_tenant(pool: PgPool) {
    let repo = PgEventRepository::new(pool);
    let acme = new_stream();
    let globex = StreamId::new("globex", &acme.aggregate_type, &acme.aggregate_id);

    repo.append_events(&acme, 0, &[make_stored_event(&acme, 1)])
        .await
        .unwrap();
    repo.append_events(&globex, 0, &[make_stored_event(&globex, 1)])
        .await
        .unwrap();

    assert_eq!(repo.load_events(&acme).await.unwrap().len(), 1);
    assert_eq!(repo.load_events(&globex).await.unwrap()[0].stream, globex);
}

// --- concurrency ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_stale_expected_version_is_rejected(pool: PgPool) {
    let repo = PgEventRepository::new(pool);
    let stream = new_stream();
    repo.append_events(
        &stream,
        0,
        &[make_stored_event(&stream, 1), make_stored_event(&stream, 2)],
    )
    .await
    .unwrap();

    let result = repo
        .append_events(&stream, 0, &[make_stored_event(&stream, 3)])
        .await;

    match result {
        Err(DomainError::WrongExpectedVersion {
            stream: conflict_stream,
            expected,
            actual,
        }) => {
            assert_eq!(conflict_stream, stream);
            assert_eq!(expected, 0);
            assert_eq!(actual, 2);
        }
        other => panic!("expected WrongExpectedVersion, got {other:?}"),
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_concurrent_appends_have_exactly_one_winner(pool: PgPool) {
    let repo = PgEventRepository::new(pool);
    let stream = new_stream();
    let first = [make_stored_event(&stream, 1)];
    let second = [make_stored_event(&stream, 1)];

    let (a, b) = tokio::join!(
        repo.append_events(&stream, 0, &first),
        repo.append_events(&stream, 0, &second),
    );

    assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);
    let loser = if a.is_err() { a } else { b };
    assert!(matches!(
        loser,
        Err(DomainError::WrongExpectedVersion { .. })
    ));
    assert_eq!(repo.load_events(&stream).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_streams_with_hyphenated_parts_do_not_collide(pool: PgPool) {
    // Arrange
    let repo = PgEventRepository::new(pool);
    let first = StreamId::new("acme", "user", "x-1");
    let second = StreamId::new("acme-x", "user", "1");
    repo.append_events(&first, 0, &[make_stored_event(&first, 1)])
        .await
        .unwrap();

    // Act
    let result = repo
        .append_events(&second, 0, &[make_stored_event(&second, 1)])
        .await;

    // Assert
    assert!(result.is_ok(), "unexpected error: {result:?}");
    assert_eq!(repo.load_events(&first).await.unwrap().len(), 1);
    assert_eq!(repo.load_events(&second).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_duplicate_event_id_is_not_reported_as_conflict(pool: PgPool) {
    let repo = PgEventRepository::new(pool);
    let first = new_stream();
    let second = new_stream();
    let original = make_stored_event(&first, 1);
    repo.append_events(&first, 0, std::slice::from_ref(&original))
        .await
        .unwrap();
    let mut copy = make_stored_event(&second, 1);
    copy.event_id = original.event_id;

    let result = repo.append_events(&second, 0, &[copy]).await;

    match result {
        Err(DomainError::Infrastructure(_)) => {}
        other => panic!("expected Infrastructure, got {other:?}"),
    }
    assert!(repo.load_events(&second).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_append_empty_events_is_noop(pool: PgPool) {
    let repo = PgEventRepository::new(pool);
    let stream = new_stream();

    repo.append_events(&stream, 0, &[]).await.unwrap();

    assert!(repo.load_events(&stream).await.unwrap().is_empty());
}

// --- event buffer ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_buffer_returns_due_entries_and_deletes_them(pool: PgPool) {
    let buffer = PgEventBufferRepository::new(pool);
    let stream = new_stream();
    let now = Utc::now();
    let event = make_stored_event(&stream, 1);
    let due = EventBufferEntry::for_event(&event, now - Duration::seconds(30), now).unwrap();
    let pending = EventBufferEntry::for_event(&event, now + Duration::minutes(10), now).unwrap();
    buffer.insert(&due).await.unwrap();
    buffer.insert(&pending).await.unwrap();

    let expired = buffer.get_expired(now).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id, due.id);
    assert_eq!(expired[0].event().unwrap().event_id, event.event_id);

    buffer.delete(due.id).await.unwrap();
    assert!(buffer.get_expired(now).await.unwrap().is_empty());
}
