//! Integration tests: account commands → repository → dispatcher → account report.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{
    Account, AccountEvent, Aggregate, BoxError, CqrsContext, CreateAccount, DomainError, EventHandler,
    RenameAccount, account,
};
use event_store::{EventEnvelope, EventStore, InMemoryEventStore};
use projections::{AccountReportView, Projection, ReadModel, subscribe_projection};
use tokio::sync::Mutex;

fn setup() -> (CqrsContext<InMemoryEventStore>, AccountReportView) {
    let view = AccountReportView::new();
    let mut builder = CqrsContext::builder(InMemoryEventStore::new());
    subscribe_projection(builder.dispatcher_mut(), Arc::new(view.clone()));
    let context = account::register(builder, 3).build().unwrap();
    (context, view)
}

/// Records every event it receives, optionally failing each time.
#[derive(Default)]
struct Recorder {
    fail: bool,
    seen: Mutex<Vec<(String, u64)>>,
}

#[async_trait]
impl EventHandler for Recorder {
    fn name(&self) -> &str {
        if self.fail { "failing" } else { "recorder" }
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<(), BoxError> {
        self.seen
            .lock()
            .await
            .push((event.event_type.clone(), event.sequence));
        if self.fail {
            return Err("read store unavailable".into());
        }
        Ok(())
    }
}

#[tokio::test]
async fn create_account_produces_one_named_row() {
    let (context, view) = setup();

    let id = context
        .send(CreateAccount::new("Darren", "Cauthon"))
        .await
        .unwrap();

    let rows = view.rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, id);
    assert_eq!(rows[0].name.as_deref(), Some("Darren Cauthon"));
    assert_eq!(view.position().await.events_processed, 2);
}

#[tokio::test]
async fn rename_updates_the_existing_row() {
    let (context, view) = setup();
    let id = context
        .send(CreateAccount::new("Darren", "Cauthon"))
        .await
        .unwrap();

    context
        .send(RenameAccount::new(id, "Dee", "Cauthon"))
        .await
        .unwrap();

    assert_eq!(view.count(), 1);
    assert_eq!(view.get(id).await.unwrap().name.as_deref(), Some("Dee Cauthon"));
}

#[tokio::test]
async fn rows_are_kept_per_account() {
    let (context, view) = setup();

    let first = context.send(CreateAccount::new("Ada", "Lovelace")).await.unwrap();
    let second = context.send(CreateAccount::new("Alan", "Turing")).await.unwrap();

    assert_eq!(view.count(), 2);
    assert_eq!(view.get(first).await.unwrap().name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(view.get(second).await.unwrap().name.as_deref(), Some("Alan Turing"));
}

#[tokio::test]
async fn subscribers_see_events_in_sequence_order() {
    let recorder = Arc::new(Recorder::default());
    let mut builder = CqrsContext::builder(InMemoryEventStore::new());
    for event_type in Account::event_types() {
        builder = builder.subscribe(*event_type, recorder.clone());
    }
    let context = account::register(builder, 3).build().unwrap();

    context
        .send(CreateAccount::new("Darren", "Cauthon"))
        .await
        .unwrap();

    assert_eq!(
        *recorder.seen.lock().await,
        vec![
            (AccountEvent::ACCOUNT_CREATED.to_string(), 0),
            (AccountEvent::NAME_SET.to_string(), 1),
        ]
    );
}

#[tokio::test]
async fn failing_projection_does_not_block_the_next_one() {
    let failing = Arc::new(Recorder {
        fail: true,
        ..Recorder::default()
    });
    let view = AccountReportView::new();

    let mut builder = CqrsContext::builder(InMemoryEventStore::new());
    builder = builder.subscribe(AccountEvent::ACCOUNT_CREATED, failing.clone());
    builder = builder.subscribe(AccountEvent::NAME_SET, failing.clone());
    subscribe_projection(builder.dispatcher_mut(), Arc::new(view.clone()));
    let context = account::register(builder, 3).build().unwrap();

    let err = context
        .send(CreateAccount::new("Darren", "Cauthon"))
        .await
        .unwrap_err();

    let DomainError::ProjectionFailure(failure) = err else {
        panic!("expected a projection failure, got {err:?}");
    };
    assert_eq!(failure.subscribers().collect::<Vec<_>>(), vec!["failing", "failing"]);

    // Both events were committed and the second subscriber still saw them.
    assert_eq!(context.store().event_count().await, 2);
    assert_eq!(failing.seen.lock().await.len(), 2);
    let rows = view.rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name.as_deref(), Some("Darren Cauthon"));
    let history = context.store().load_events(rows[0].id).await.unwrap();
    assert_eq!(history.len(), 2);

    // The new account's id is still recoverable from the failure.
    assert!(failure.failures.iter().all(|f| f.aggregate_id == rows[0].id));
}

#[tokio::test]
async fn saving_without_changes_publishes_nothing() {
    let (context, view) = setup();
    let id = context
        .send(CreateAccount::new("Darren", "Cauthon"))
        .await
        .unwrap();

    let mut loaded = context.repository().load::<Account>(id).await.unwrap();
    context.repository().save(&mut loaded).await.unwrap();

    assert_eq!(view.position().await.events_processed, 2);
}
