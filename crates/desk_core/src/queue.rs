use std::{sync::Arc, time::Duration};

use shared::{
    domain::{Ticket, TicketId, Urgency},
    protocol::{Operation, SessionEvent},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    call_collaborator, join_completion, AssignmentResult, AssignmentService, DeskError, Dispatch,
    Rejection,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkAssignState {
    pub in_flight: bool,
    /// Cumulative across every completed batch of this queue.
    pub assigned_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignOutcome {
    pub assigned_ids: Vec<TicketId>,
    pub assigned_delta: usize,
    pub tickets_remaining: usize,
}

struct QueueState {
    tickets: Vec<Ticket>,
    bulk: BulkAssignState,
}

pub struct TicketQueue {
    assignment: Arc<dyn AssignmentService>,
    timeout: Duration,
    events: broadcast::Sender<SessionEvent>,
    inner: Mutex<QueueState>,
}

impl TicketQueue {
    pub fn new(
        tickets: Vec<Ticket>,
        assignment: Arc<dyn AssignmentService>,
        timeout: Duration,
        events: broadcast::Sender<SessionEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            assignment,
            timeout,
            events,
            inner: Mutex::new(QueueState {
                tickets,
                bulk: BulkAssignState::default(),
            }),
        })
    }

    pub async fn tickets(&self) -> Vec<Ticket> {
        self.inner.lock().await.tickets.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.tickets.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.tickets.is_empty()
    }

    pub async fn find(&self, ticket_id: &TicketId) -> Option<Ticket> {
        self.inner
            .lock()
            .await
            .tickets
            .iter()
            .find(|ticket| &ticket.id == ticket_id)
            .cloned()
    }

    pub async fn critical_count(&self) -> usize {
        self.inner
            .lock()
            .await
            .tickets
            .iter()
            .filter(|ticket| ticket.urgency == Urgency::Critical)
            .count()
    }

    pub async fn bulk_state(&self) -> BulkAssignState {
        self.inner.lock().await.bulk
    }

    /// The queue is rewritten once, after the service answers; on failure it
    /// is left untouched.
    pub async fn auto_assign(self: &Arc<Self>) -> Result<Dispatch<AssignOutcome>, DeskError> {
        let batch = {
            let mut guard = self.inner.lock().await;
            if guard.bulk.in_flight {
                debug!("queue: auto-assign already in flight");
                return Ok(Dispatch::Rejected(Rejection::InFlight));
            }
            guard.bulk.in_flight = true;
            guard.tickets.clone()
        };

        info!(queued = batch.len(), "queue: auto-assign dispatched");
        let queue = Arc::clone(self);
        let task = tokio::spawn(async move {
            let outcome = call_collaborator(
                Operation::AutoAssign,
                queue.timeout,
                queue.assignment.assign(&batch),
            )
            .await;
            queue.finish_assign(outcome).await
        });

        join_completion(Operation::AutoAssign, task)
            .await
            .map(Dispatch::Completed)
    }

    async fn finish_assign(
        &self,
        outcome: Result<AssignmentResult, DeskError>,
    ) -> Result<AssignOutcome, DeskError> {
        let mut guard = self.inner.lock().await;
        guard.bulk.in_flight = false;
        match outcome {
            Ok(result) => {
                let mut assigned_ids = Vec::new();
                guard.tickets.retain(|ticket| {
                    if result.assigned_ids.contains(&ticket.id) {
                        assigned_ids.push(ticket.id.clone());
                        false
                    } else {
                        true
                    }
                });
                let assigned_delta = assigned_ids.len();
                guard.bulk.assigned_count += assigned_delta;
                let total_assigned = guard.bulk.assigned_count;
                let tickets_remaining = guard.tickets.len();
                drop(guard);

                info!(
                    assigned = assigned_delta,
                    total_assigned,
                    remaining = tickets_remaining,
                    "queue: auto-assign completed"
                );
                let _ = self.events.send(SessionEvent::BulkAssigned {
                    assigned: assigned_delta,
                    total_assigned,
                    remaining: tickets_remaining,
                });
                Ok(AssignOutcome {
                    assigned_ids,
                    assigned_delta,
                    tickets_remaining,
                })
            }
            Err(err) => {
                drop(guard);
                warn!(error = %err, "queue: auto-assign failed; queue unchanged");
                let _ = self.events.send(SessionEvent::OperationFailed {
                    operation: Operation::AutoAssign,
                    ticket_id: None,
                    error: err.report(),
                });
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/queue_tests.rs"]
mod tests;
