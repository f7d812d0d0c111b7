//! Progress-and-Final Integration Tests
//!
//! Progress is forwarded until the first completion; the completion payload
//! is the result.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_test::{assert_pending, assert_ready, task};

use signalflow::domain::{FinalSummary, ProgressUpdate};
use signalflow::{
    activity_fn, progress_and_final, sync_call, HistoryEventType, Signal, WorkflowContext,
};

const PROGRESS: Signal<ProgressUpdate> = Signal::new("progress");
const COMPLETION: Signal<FinalSummary> = Signal::new("completion");

type Recorded = Arc<Mutex<Vec<String>>>;

fn recorder() -> Recorded {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(recorded: &Recorded) -> Vec<String> {
    recorded.lock().unwrap().clone()
}

#[derive(Debug, thiserror::Error)]
#[error("search quota exhausted")]
struct QuotaExhausted;

#[tokio::test]
async fn test_rental_search_end_to_end() {
    let (mut ctx, sender) = WorkflowContext::new("wf-rental-search");
    let started = recorder();
    let progress = recorder();

    let started_log = started.clone();
    let progress_log = progress.clone();
    let mut search = progress_and_final(
        activity_fn("start_search", |_: ()| async move { Ok("job-42".to_string()) }),
        PROGRESS,
        COMPLETION,
    )
    .on_started(move |job: String| started_log.lock().unwrap().push(job))
    .on_progress(move |p: ProgressUpdate| progress_log.lock().unwrap().push(p.message));

    let driver = tokio::spawn(async move {
        for message in ["found 3 listings", "found 7 listings"] {
            tokio::time::sleep(Duration::from_millis(10)).await;
            sender.send(&PROGRESS, &ProgressUpdate::new(message)).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        sender
            .send(&COMPLETION, &FinalSummary::new("done, 7 listings"))
            .unwrap();
    });

    let result = search.call(&mut ctx, ()).await.unwrap();
    driver.await.unwrap();

    assert_eq!(result, FinalSummary::new("done, 7 listings"));
    assert_eq!(entries(&started), vec!["job-42"]);
    assert_eq!(entries(&progress), vec!["found 3 listings", "found 7 listings"]);
}

#[tokio::test]
async fn test_progress_forwarded_in_delivery_order() {
    let (mut ctx, sender) = WorkflowContext::new("wf-progress-order");
    let progress = recorder();

    let messages: Vec<String> = (1..=5).map(|i| format!("page {}", i)).collect();
    for message in &messages {
        sender.send(&PROGRESS, &ProgressUpdate::new(message.clone())).unwrap();
    }
    sender.send(&COMPLETION, &FinalSummary::new("5 pages")).unwrap();

    let log = progress.clone();
    let mut search = progress_and_final(
        activity_fn("start_search", |_: ()| async move { Ok(()) }),
        PROGRESS,
        COMPLETION,
    )
    .on_progress(move |p: ProgressUpdate| log.lock().unwrap().push(p.message));

    let result = search.call(&mut ctx, ()).await.unwrap();

    assert_eq!(result.summary, "5 pages");
    assert_eq!(entries(&progress), messages);
}

#[tokio::test]
async fn test_completion_before_start_resolves() {
    let (mut ctx, sender) = WorkflowContext::new("wf-early-final");
    sender.send(&COMPLETION, &FinalSummary::new("cached result")).unwrap();

    let started = recorder();
    let log = started.clone();
    let mut search = progress_and_final(
        activity_fn("start_search", |_: ()| async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok("job-7".to_string())
        }),
        PROGRESS,
        COMPLETION,
    )
    .on_started(move |job: String| log.lock().unwrap().push(job));

    let result = search.call(&mut ctx, ()).await.unwrap();

    assert_eq!(result, FinalSummary::new("cached result"));
    assert_eq!(entries(&started), vec!["job-7"]);
}

#[tokio::test]
async fn test_progress_after_completion_dropped() {
    let (mut ctx, sender) = WorkflowContext::new("wf-late-progress");
    sender.send(&PROGRESS, &ProgressUpdate::new("found 3 listings")).unwrap();
    sender.send(&COMPLETION, &FinalSummary::new("done")).unwrap();
    sender.send(&PROGRESS, &ProgressUpdate::new("found 9 listings")).unwrap();

    let progress = recorder();
    let log = progress.clone();
    let mut search = progress_and_final(
        activity_fn("start_search", |_: ()| async move { Ok(()) }),
        PROGRESS,
        COMPLETION,
    )
    .on_progress(move |p: ProgressUpdate| log.lock().unwrap().push(p.message));

    search.call(&mut ctx, ()).await.unwrap();

    assert_eq!(entries(&progress), vec!["found 3 listings"]);
    assert_eq!(ctx.history().delivered("progress").len(), 2);
}

#[tokio::test]
async fn test_second_completion_ignored() {
    let (mut ctx, sender) = WorkflowContext::new("wf-double-final");
    sender.send(&COMPLETION, &FinalSummary::new("first")).unwrap();
    sender.send(&COMPLETION, &FinalSummary::new("second")).unwrap();

    let mut search = progress_and_final(
        activity_fn("start_search", |_: ()| async move { Ok(()) }),
        PROGRESS,
        COMPLETION,
    );

    let result = search.call(&mut ctx, ()).await.unwrap();

    assert_eq!(result, FinalSummary::new("first"));
    assert_eq!(ctx.history().delivered("completion").len(), 2);
}

#[tokio::test]
async fn test_zero_progress() {
    let (mut ctx, sender) = WorkflowContext::new("wf-no-progress");
    sender.send(&COMPLETION, &FinalSummary::new("nothing found")).unwrap();

    let progress = recorder();
    let log = progress.clone();
    let mut search = progress_and_final(
        activity_fn("start_search", |_: ()| async move { Ok(()) }),
        PROGRESS,
        COMPLETION,
    )
    .on_progress(move |p: ProgressUpdate| log.lock().unwrap().push(p.message));

    let result = search.call(&mut ctx, ()).await.unwrap();

    assert_eq!(result.summary, "nothing found");
    assert!(entries(&progress).is_empty());
}

#[tokio::test]
async fn test_activity_failure_skips_on_started() {
    let (mut ctx, _sender) = WorkflowContext::new("wf-progress-failure");
    let started = recorder();
    let log = started.clone();

    let mut search = progress_and_final(
        activity_fn("start_search", |_: ()| async move {
            Err::<String, _>(anyhow::Error::new(QuotaExhausted))
        }),
        PROGRESS,
        COMPLETION,
    )
    .on_started(move |job: String| log.lock().unwrap().push(job));

    let err = search.call(&mut ctx, ()).await.unwrap_err();

    assert!(err.downcast_ref::<QuotaExhausted>().is_some());
    assert!(entries(&started).is_empty());
    assert_eq!(ctx.history().count(HistoryEventType::ConditionSatisfied), 0);
}

#[test]
fn test_each_invocation_has_fresh_state() {
    let (mut ctx, sender) = WorkflowContext::new("wf-two-searches");
    let mut search = progress_and_final(
        activity_fn("start_search", |_: ()| async move { Ok(()) }),
        PROGRESS,
        COMPLETION,
    );

    sender.send(&COMPLETION, &FinalSummary::new("first search")).unwrap();
    let first = assert_ready!(task::spawn(search.call(&mut ctx, ())).poll()).unwrap();

    let mut next = task::spawn(search.call(&mut ctx, ()));
    assert_pending!(next.poll());
    sender.send(&COMPLETION, &FinalSummary::new("second search")).unwrap();
    let second = assert_ready!(next.poll()).unwrap();
    drop(next);

    assert_eq!(first.summary, "first search");
    assert_eq!(second.summary, "second search");
    assert_eq!(ctx.history().count(HistoryEventType::ActivityScheduled), 2);
}

#[test]
fn test_late_duplicate_completion_does_not_end_next_search() {
    let (mut ctx, sender) = WorkflowContext::new("wf-search-cycles");
    let mut search = progress_and_final(
        activity_fn("start_search", |_: ()| async move { Ok(()) }),
        PROGRESS,
        COMPLETION,
    );

    sender.send(&COMPLETION, &FinalSummary::new("first")).unwrap();
    let first = assert_ready!(task::spawn(search.call(&mut ctx, ())).poll()).unwrap();

    // The search service repeats its completion after the first cycle returned.
    sender.send(&COMPLETION, &FinalSummary::new("first (repeated)")).unwrap();

    let mut next = task::spawn(search.call(&mut ctx, ()));
    assert_pending!(next.poll());

    sender.send(&COMPLETION, &FinalSummary::new("second")).unwrap();
    let second = assert_ready!(next.poll()).unwrap();
    drop(next);

    assert_eq!(first.summary, "first");
    assert_eq!(second.summary, "second");

    let discarded: Vec<_> = ctx
        .history()
        .events()
        .iter()
        .filter(|e| e.event_type == HistoryEventType::SignalDiscarded)
        .collect();
    assert_eq!(discarded.len(), 1);
    assert_eq!(
        discarded[0].payload,
        Some(serde_json::json!({"summary": "first (repeated)"}))
    );
}

#[test]
fn test_duplicate_arriving_during_other_work_is_discarded() {
    let (mut ctx, sender) = WorkflowContext::new("wf-search-then-lookup");
    let mut search = progress_and_final(
        activity_fn("start_search", |_: ()| async move { Ok(()) }),
        PROGRESS,
        COMPLETION,
    );
    let lookup = sync_call(activity_fn("count_listings", |_: ()| async move { Ok(7) }));

    sender.send(&COMPLETION, &FinalSummary::new("first")).unwrap();
    assert_ready!(task::spawn(search.call(&mut ctx, ())).poll()).unwrap();

    sender.send(&COMPLETION, &FinalSummary::new("first (repeated)")).unwrap();
    let count = assert_ready!(task::spawn(lookup.call(&mut ctx, ())).poll()).unwrap();

    assert_eq!(count, 7);
    assert_eq!(ctx.buffered(), 0, "duplicate not kept for the next search");
    assert_eq!(ctx.history().count(HistoryEventType::SignalDiscarded), 1);
}
