use super::*;

use shared::error::ErrorCode;

use crate::doubles::{sample_tickets, settle_until, ScriptedAssign};

fn queue_with(
    tickets: Vec<Ticket>,
    assign: Arc<ScriptedAssign>,
    timeout: Duration,
) -> (Arc<TicketQueue>, broadcast::Receiver<SessionEvent>) {
    let (events, rx) = broadcast::channel(64);
    (TicketQueue::new(tickets, assign, timeout, events), rx)
}

fn ids(tickets: &[Ticket]) -> Vec<&str> {
    tickets.iter().map(|ticket| ticket.id.as_str()).collect()
}

#[tokio::test]
async fn assigning_two_of_five_leaves_three() {
    let assign = Arc::new(ScriptedAssign::assigning(&["4489", "4488"]));
    let (queue, mut rx) = queue_with(sample_tickets(5), assign.clone(), Duration::from_secs(5));

    let outcome = queue
        .auto_assign()
        .await
        .expect("assign")
        .completed()
        .expect("dispatched");

    assert_eq!(outcome.assigned_delta, 2);
    assert_eq!(outcome.tickets_remaining, 3);
    assert_eq!(
        outcome.assigned_ids,
        vec![TicketId::new("4489"), TicketId::new("4488")]
    );
    assert_eq!(ids(&queue.tickets().await), vec!["4492", "4491", "4490"]);
    assert_eq!(
        queue.bulk_state().await,
        BulkAssignState {
            in_flight: false,
            assigned_count: 2,
        }
    );

    let event = rx.try_recv().expect("event");
    assert_eq!(
        event,
        SessionEvent::BulkAssigned {
            assigned: 2,
            total_assigned: 2,
            remaining: 3,
        }
    );
    assert_eq!(
        event.toast_text().as_deref(),
        Some("2 Tickets assigned to you by Risa AI.")
    );
}

#[tokio::test]
async fn assigned_count_accumulates_by_tickets_actually_removed() {
    // The service names one id that is not queued; only queued tickets count.
    let assign = Arc::new(ScriptedAssign::assigning(&["4492", "9999"]));
    let (queue, _rx) = queue_with(sample_tickets(3), assign.clone(), Duration::from_secs(5));

    let first = queue.auto_assign().await.expect("assign");
    assert_eq!(first.completed().map(|o| o.assigned_delta), Some(1));
    assert_eq!(queue.len().await, 2);

    let second = queue.auto_assign().await.expect("assign");
    assert_eq!(second.completed().map(|o| o.assigned_delta), Some(0));
    assert_eq!(queue.len().await, 2);
    assert_eq!(queue.bulk_state().await.assigned_count, 1);
    assert_eq!(assign.call_count(), 2);
}

#[tokio::test]
async fn failed_assignment_leaves_queue_unchanged() {
    let assign = Arc::new(ScriptedAssign::failing("routing engine down"));
    let (queue, mut rx) = queue_with(sample_tickets(5), assign, Duration::from_secs(5));
    let before = queue.tickets().await;

    let err = queue.auto_assign().await.expect_err("must fail");
    assert!(err.to_string().contains("routing engine down"));

    assert_eq!(queue.tickets().await, before);
    assert_eq!(queue.bulk_state().await, BulkAssignState::default());
    match rx.try_recv().expect("event") {
        SessionEvent::OperationFailed {
            operation,
            ticket_id,
            error,
        } => {
            assert_eq!(operation, Operation::AutoAssign);
            assert_eq!(ticket_id, None);
            assert_eq!(error.code, ErrorCode::CollaboratorFailure);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_invocation_is_rejected_while_in_flight() {
    let assign = Arc::new(ScriptedAssign::assigning(&["4492"]).gated());
    let (queue, _rx) = queue_with(sample_tickets(5), assign.clone(), Duration::from_secs(5));

    let pending = tokio::spawn({
        let queue = Arc::clone(&queue);
        async move { queue.auto_assign().await }
    });
    settle_until(|| {
        let queue = Arc::clone(&queue);
        async move { queue.bulk_state().await.in_flight }
    })
    .await;

    assert_eq!(
        queue.auto_assign().await.expect("rejected"),
        Dispatch::Rejected(Rejection::InFlight)
    );
    // Nothing is removed before the batch completes.
    assert_eq!(queue.len().await, 5);

    assign.gate.release_one();
    let outcome = pending
        .await
        .expect("join")
        .expect("assign")
        .completed()
        .expect("dispatched");
    assert_eq!(outcome.assigned_delta, 1);
    assert_eq!(queue.len().await, 4);
    assert_eq!(assign.call_count(), 1);
    assert!(!queue.bulk_state().await.in_flight);
}

#[tokio::test(start_paused = true)]
async fn assignment_timeout_clears_in_flight() {
    let assign = Arc::new(ScriptedAssign::assigning(&["4492"]).gated());
    let (queue, _rx) = queue_with(sample_tickets(2), assign, Duration::from_millis(100));

    let err = queue.auto_assign().await.expect_err("must time out");
    assert_eq!(err.operation(), Some(Operation::AutoAssign));
    assert!(matches!(err, DeskError::TimedOut { .. }));
    assert_eq!(queue.len().await, 2);
    assert!(!queue.bulk_state().await.in_flight);
}

#[tokio::test]
async fn find_looks_up_queued_tickets() {
    let assign = Arc::new(ScriptedAssign::default());
    let (queue, _rx) = queue_with(sample_tickets(2), assign, Duration::from_secs(5));
    assert!(queue.find(&TicketId::new("4491")).await.is_some());
    assert!(queue.find(&TicketId::new("1")).await.is_none());
    assert!(!queue.is_empty().await);
}

#[tokio::test]
async fn critical_count_tracks_removals() {
    let assign = Arc::new(ScriptedAssign::assigning(&["4492"]));
    let (queue, _rx) = queue_with(sample_tickets(5), assign, Duration::from_secs(5));
    // 4492 and 4488 are critical in the sample queue.
    assert_eq!(queue.critical_count().await, 2);

    queue.auto_assign().await.expect("assign");
    assert_eq!(queue.critical_count().await, 1);
}

#[tokio::test]
async fn panicking_assignment_with_a_dropped_caller_clears_in_flight() {
    let assign = Arc::new(
        ScriptedAssign::assigning(&["4492"])
            .gated()
            .panicking_once(),
    );
    let (queue, mut rx) = queue_with(sample_tickets(3), assign.clone(), Duration::from_secs(5));

    let caller = tokio::spawn({
        let queue = Arc::clone(&queue);
        async move { queue.auto_assign().await }
    });
    settle_until(|| {
        let assign = Arc::clone(&assign);
        async move { assign.call_count() == 1 }
    })
    .await;
    caller.abort();
    assert!(caller.await.expect_err("aborted").is_cancelled());

    assign.gate.release_one();
    settle_until(|| {
        let queue = Arc::clone(&queue);
        async move { !queue.bulk_state().await.in_flight }
    })
    .await;
    assert_eq!(queue.len().await, 3);
    assert!(matches!(
        rx.try_recv().expect("event"),
        SessionEvent::OperationFailed {
            operation: Operation::AutoAssign,
            ..
        }
    ));

    assign.gate.release_one();
    let retried = queue.auto_assign().await.expect("retry");
    assert_eq!(retried.completed().map(|o| o.assigned_delta), Some(1));
}
