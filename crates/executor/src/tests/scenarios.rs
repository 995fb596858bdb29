//! End-to-end pipeline scenarios: intake through worker against scripted
//! venues, a recording history, the real hub and a stub chain.

use {
    crate::{
        hub::{Hub, Subscription},
        intake::Intake,
        rate_limit::FixedWindow,
        tests::support::{InMemoryQueue, RecordingHistory, StubSubmitter},
        worker::Worker,
    },
    chain::{Cluster, Wallet},
    dex::{Venue, fake::Fake},
    model::{OrderJob, Status, StatusMessage},
    queue::JobHandler,
    serde_json::json,
    solana_sdk::signature::Keypair,
    std::{sync::Arc, time::Duration},
};

const EXPLORER: &str = "https://explorer.solana.com";

struct Harness {
    worker: Worker,
    history: Arc<RecordingHistory>,
    hub: Arc<Hub>,
    queue: Arc<InMemoryQueue>,
    intake: Intake,
    signature: String,
}

fn harness(venues: Vec<Venue>) -> Harness {
    harness_with(venues, StubSubmitter::confirming())
}

fn harness_with(venues: Vec<Venue>, submitter: StubSubmitter) -> Harness {
    let history = Arc::new(RecordingHistory::default());
    let hub = Arc::new(Hub::new());
    let queue = Arc::new(InMemoryQueue::default());
    let signature = submitter.signature.to_string();
    let worker = Worker::new(
        router::Router::new(venues, Duration::from_millis(100), 100),
        history.clone(),
        hub.clone(),
        Arc::new(submitter),
        Arc::new(Wallet::from_keypair(Keypair::new())),
        Arc::new(FixedWindow::per_minute(1_000)),
        EXPLORER.to_string(),
        Cluster::Devnet,
    );
    let intake = Intake::new(history.clone(), queue.clone(), hub.clone());
    Harness {
        worker,
        history,
        hub,
        queue,
        intake,
        signature,
    }
}

fn order_payload() -> serde_json::Value {
    json!({
        "tokenIn": "So11111111111111111111111111111111111111112",
        "tokenOut": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
        "amount": 1_000_000,
        "orderType": "market",
    })
}

async fn submit_and_dequeue(harness: &Harness) -> OrderJob {
    harness.intake.submit(&order_payload()).await.unwrap();
    harness.queue.jobs.lock().unwrap().pop().unwrap()
}

fn drain(subscription: &mut Subscription) -> Vec<StatusMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = subscription.receiver.try_recv() {
        messages.push(message);
    }
    messages
}

#[tokio::test]
async fn happy_path_through_a_single_venue() {
    let venue = Fake::new("V1").quoting(2_000_000);
    let harness = harness(vec![Venue::Fake(venue)]);

    let mut job = submit_and_dequeue(&harness).await;
    let mut subscription = harness.hub.attach(&job.order_id);

    harness.worker.process(&mut job).await.unwrap();

    let link = format!("{EXPLORER}/tx/{}?cluster=devnet", harness.signature);
    let messages = drain(&mut subscription);
    assert_eq!(
        messages.iter().map(|m| m.status).collect::<Vec<_>>(),
        [
            Status::Pending,
            Status::Queued,
            Status::Routing,
            Status::Building,
            Status::Submitted,
            Status::Confirmed,
        ],
    );
    assert_eq!(messages[0].detail.as_deref(), Some("Order accepted"));
    assert_eq!(messages[4].detail.as_deref(), Some(harness.signature.as_str()));
    assert_eq!(messages[4].link.as_deref(), Some(link.as_str()));
    assert_eq!(messages[5].detail.as_deref(), Some(harness.signature.as_str()));
    assert_eq!(messages[5].link.as_deref(), Some(link.as_str()));

    let last = harness.history.last_record(&job.order_id).unwrap();
    assert_eq!(last.status, Status::Confirmed);
    assert_eq!(last.tx_hash.as_deref(), Some(harness.signature.as_str()));
    assert_eq!(last.executed_amount, Some(2_000_000));

    let decisions = harness.history.decisions.lock().unwrap();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].1.venue, "V1");
    assert_eq!(decisions[0].1.estimated_out, 2_000_000);
    assert_eq!(decisions[0].1.min_out, 1_980_000);
}

#[tokio::test]
async fn the_better_of_two_venues_wins_and_builds() {
    let v1 = Fake::new("V1").quoting(2_000_000);
    let v2 = Fake::new("V2").quoting(1_800_000);
    let harness = harness(vec![Venue::Fake(v1.clone()), Venue::Fake(v2.clone())]);

    let mut job = submit_and_dequeue(&harness).await;
    harness.worker.process(&mut job).await.unwrap();

    assert_eq!(v1.quote_calls(), 1);
    assert_eq!(v2.quote_calls(), 1);
    assert_eq!(v1.build_calls(), 1);
    assert_eq!(v2.build_calls(), 0);
    let decisions = harness.history.decisions.lock().unwrap();
    assert_eq!(decisions[0].1.venue, "V1");
}

#[tokio::test]
async fn a_failing_venue_falls_back_to_the_other() {
    let v1 = Fake::new("V1").failing_quotes(dex::Error::Transport("down".to_string()));
    let v2 = Fake::new("V2").quoting(1_600_000);
    let harness = harness(vec![Venue::Fake(v1), Venue::Fake(v2.clone())]);

    let mut job = submit_and_dequeue(&harness).await;
    harness.worker.process(&mut job).await.unwrap();

    assert_eq!(v2.build_calls(), 1);
    let last = harness.history.last_record(&job.order_id).unwrap();
    assert_eq!(last.status, Status::Confirmed);
    assert_eq!(last.executed_amount, Some(1_600_000));
}

#[tokio::test]
async fn both_venues_failing_fails_the_order() {
    let v1 = Fake::new("V1").failing_quotes(dex::Error::Transport("down".to_string()));
    let v2 = Fake::new("V2").failing_quotes(dex::Error::StaleData("stale".to_string()));
    let harness = harness(vec![Venue::Fake(v1), Venue::Fake(v2)]);

    let mut job = submit_and_dequeue(&harness).await;
    let mut subscription = harness.hub.attach(&job.order_id);

    harness.worker.process(&mut job).await.unwrap_err();

    let messages = drain(&mut subscription);
    let terminal = messages.last().unwrap();
    assert_eq!(terminal.status, Status::Failed);
    assert!(
        terminal
            .detail
            .as_deref()
            .unwrap()
            .starts_with("Unable to fetch quotes"),
    );
    assert!(terminal.detail.as_deref().unwrap().contains("down"));
    assert!(terminal.detail.as_deref().unwrap().contains("stale"));

    let last = harness.history.last_record(&job.order_id).unwrap();
    assert_eq!(last.status, Status::Failed);
    assert!(last.last_error.is_some());
    assert!(job.last_error.is_some());
    assert!(!messages.iter().any(|m| m.status == Status::Submitted));
}

#[tokio::test]
async fn a_late_subscriber_replays_the_whole_lifecycle() {
    let venue = Fake::new("V1").quoting(2_000_000);
    let harness = harness(vec![Venue::Fake(venue)]);

    let mut job = submit_and_dequeue(&harness).await;
    harness.worker.process(&mut job).await.unwrap();

    // Nobody was listening; everything is in the backlog.
    let mut subscription = harness.hub.attach(&job.order_id);
    let messages = drain(&mut subscription);
    assert_eq!(
        messages.iter().map(|m| m.status).collect::<Vec<_>>(),
        [
            Status::Pending,
            Status::Queued,
            Status::Routing,
            Status::Building,
            Status::Submitted,
            Status::Confirmed,
        ],
    );
    assert!(subscription.receiver.try_recv().is_err());
}

#[tokio::test]
async fn redelivery_does_not_duplicate_lifecycle_entries() {
    let venue = Fake::new("V1").quoting(2_000_000);
    let harness = harness(vec![Venue::Fake(venue)]);

    let mut job = submit_and_dequeue(&harness).await;
    harness.worker.process(&mut job).await.unwrap();
    // The queue redelivers the same job; the emitted set on the payload
    // suppresses every already-recorded status.
    harness.worker.process(&mut job).await.unwrap();

    let statuses = harness.history.statuses_for(&job.order_id);
    for status in [
        Status::Queued,
        Status::Routing,
        Status::Building,
        Status::Submitted,
        Status::Confirmed,
    ] {
        assert_eq!(
            statuses.iter().filter(|s| **s == status).count(),
            1,
            "{status} recorded more than once",
        );
    }
}

#[tokio::test]
async fn submit_failure_fails_the_order_before_submitted() {
    let venue = Fake::new("V1").quoting(2_000_000);
    let harness = harness_with(vec![Venue::Fake(venue)], StubSubmitter::failing_submit());

    let mut job = submit_and_dequeue(&harness).await;
    harness.worker.process(&mut job).await.unwrap_err();

    let statuses = harness.history.statuses_for(&job.order_id);
    assert!(!statuses.contains(&Status::Submitted));
    assert_eq!(*statuses.last().unwrap(), Status::Failed);
}

#[tokio::test]
async fn confirm_failure_fails_the_order_after_submitted() {
    let venue = Fake::new("V1").quoting(2_000_000);
    let harness = harness_with(vec![Venue::Fake(venue)], StubSubmitter::failing_confirm());

    let mut job = submit_and_dequeue(&harness).await;
    harness.worker.process(&mut job).await.unwrap_err();

    let statuses = harness.history.statuses_for(&job.order_id);
    assert!(statuses.contains(&Status::Submitted));
    assert!(!statuses.contains(&Status::Confirmed));
    assert_eq!(*statuses.last().unwrap(), Status::Failed);
    assert_eq!(job.last_tx_signature.as_deref(), Some(harness.signature.as_str()));
}

#[tokio::test]
async fn build_failure_on_a_bad_direction_is_permanent() {
    let venue = Fake::new("V1")
        .quoting(2_000_000)
        .failing_builds(dex::Error::InvalidDirection);
    let harness = harness(vec![Venue::Fake(venue)]);

    let mut job = submit_and_dequeue(&harness).await;
    let err = harness.worker.process(&mut job).await.unwrap_err();
    assert!(err.is::<queue::Permanent>());
}

#[tokio::test]
async fn invalid_orders_are_not_enqueued() {
    let harness = harness(vec![]);
    let err = harness
        .intake
        .submit(&json!({"tokenIn": "", "tokenOut": "", "amount": 0}))
        .await
        .unwrap_err();
    assert!(matches!(err, crate::intake::Error::Validation { .. }));
    assert!(harness.queue.jobs.lock().unwrap().is_empty());
    assert!(harness.history.inserted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn enqueue_failure_surfaces_as_internal_and_stays_silent() {
    let history = Arc::new(RecordingHistory::default());
    let hub = Arc::new(Hub::new());
    let intake = Intake::new(history.clone(), Arc::new(InMemoryQueue::failing()), hub.clone());

    let err = intake.submit(&order_payload()).await.unwrap_err();
    assert!(matches!(err, crate::intake::Error::Internal(_)));

    // No pending delivery happened: a fresh subscriber sees an empty
    // backlog for whatever id the order got.
    let order_id = history.inserted.lock().unwrap()[0].order_id.clone();
    let mut subscription = hub.attach(&order_id);
    assert!(subscription.receiver.try_recv().is_err());
}

#[tokio::test]
async fn exhausted_jobs_write_a_terminal_failed_row() {
    let venue = Fake::new("V1").failing_quotes(dex::Error::Transport("down".to_string()));
    let harness = harness(vec![Venue::Fake(venue)]);

    let mut job = submit_and_dequeue(&harness).await;
    harness.worker.process(&mut job).await.unwrap_err();
    harness
        .worker
        .on_exhausted(&job, "Unable to fetch quotes: V1: venue transport error: down")
        .await;

    let records: Vec<_> = harness
        .history
        .statuses
        .lock()
        .unwrap()
        .iter()
        .filter(|record| record.order_id == job.order_id && record.status == Status::Failed)
        .cloned()
        .collect();
    // One from the attempt, one from the exhausted hook.
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|record| record.last_error.is_some()));
}
