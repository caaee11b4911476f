use std::{sync::Arc, time::Duration};

use chrono::Utc;
use shared::{
    domain::{LifecyclePhase, Ticket, ToolKind},
    protocol::{Operation, SessionEvent},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    call_collaborator, join_completion, Collaborators, DeskError, Dispatch, KnowledgeBaseSearch,
    Rejection, SendService, ToolFeed,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketConversationState {
    pub phase: LifecyclePhase,
    pub draft: String,
    pub active_tool: Option<ToolKind>,
    /// Empty until the active tool's payload (or KB answer) arrives.
    pub tool_content: String,
    pub kb_query: String,
    pub kb_search_in_flight: bool,
}

struct ConversationInner {
    state: TicketConversationState,
    // Fetches that finish under an older generation are discarded.
    tool_generation: u64,
}

pub struct TicketLifecycle {
    ticket: Ticket,
    send: Arc<dyn SendService>,
    knowledge_base: Arc<dyn KnowledgeBaseSearch>,
    tools: Arc<dyn ToolFeed>,
    timeout: Duration,
    events: broadcast::Sender<SessionEvent>,
    inner: Mutex<ConversationInner>,
}

impl TicketLifecycle {
    pub fn new(
        ticket: Ticket,
        collaborators: &Collaborators,
        timeout: Duration,
        events: broadcast::Sender<SessionEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            ticket,
            send: Arc::clone(&collaborators.send),
            knowledge_base: Arc::clone(&collaborators.knowledge_base),
            tools: Arc::clone(&collaborators.tools),
            timeout,
            events,
            inner: Mutex::new(ConversationInner {
                state: TicketConversationState::default(),
                tool_generation: 0,
            }),
        })
    }

    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    pub async fn snapshot(&self) -> TicketConversationState {
        self.inner.lock().await.state.clone()
    }

    pub async fn phase(&self) -> LifecyclePhase {
        self.inner.lock().await.state.phase
    }

    pub async fn draft(&self) -> String {
        self.inner.lock().await.state.draft.clone()
    }

    pub async fn edit_draft(&self, text: impl Into<String>) -> Dispatch<()> {
        let mut guard = self.inner.lock().await;
        match guard.state.phase {
            LifecyclePhase::Draft => {
                guard.state.draft = text.into();
                Dispatch::Completed(())
            }
            LifecyclePhase::Sending => Dispatch::Rejected(Rejection::InFlight),
            LifecyclePhase::Sent => Dispatch::Rejected(Rejection::AlreadySent),
        }
    }

    /// A failed send returns the ticket to `draft`.
    pub async fn approve_and_send(self: &Arc<Self>) -> Result<Dispatch<()>, DeskError> {
        let draft = {
            let mut guard = self.inner.lock().await;
            match guard.state.phase {
                LifecyclePhase::Draft => {}
                LifecyclePhase::Sending => {
                    debug!(ticket_id = %self.ticket.id, "ticket: send already in flight");
                    return Ok(Dispatch::Rejected(Rejection::InFlight));
                }
                LifecyclePhase::Sent => {
                    debug!(ticket_id = %self.ticket.id, "ticket: reply already sent");
                    return Ok(Dispatch::Rejected(Rejection::AlreadySent));
                }
            }
            guard.state.phase = LifecyclePhase::Sending;
            guard.state.draft.clone()
        };

        info!(ticket_id = %self.ticket.id, "ticket: sending reply");
        let machine = Arc::clone(self);
        let task = tokio::spawn(async move {
            let outcome = call_collaborator(
                Operation::SendReply,
                machine.timeout,
                machine.send.send(&machine.ticket.id, &draft),
            )
            .await;
            machine.finish_send(outcome).await
        });

        join_completion(Operation::SendReply, task)
            .await
            .map(Dispatch::Completed)
    }

    async fn finish_send(&self, outcome: Result<(), DeskError>) -> Result<(), DeskError> {
        let mut guard = self.inner.lock().await;
        match outcome {
            Ok(()) => {
                guard.state.phase = LifecyclePhase::Sent;
                drop(guard);
                info!(ticket_id = %self.ticket.id, "ticket: reply sent");
                self.publish(SessionEvent::ReplySent {
                    ticket_id: self.ticket.id.clone(),
                    sent_at: Utc::now(),
                });
                Ok(())
            }
            Err(err) => {
                guard.state.phase = LifecyclePhase::Draft;
                drop(guard);
                warn!(ticket_id = %self.ticket.id, error = %err, "ticket: send failed; back to draft");
                self.publish_failure(&err);
                Err(err)
            }
        }
    }

    /// Selecting the active tool again (or `None`) closes the panel. Returns
    /// the tool that is active afterwards.
    pub async fn select_tool(
        self: &Arc<Self>,
        tool: Option<ToolKind>,
    ) -> Result<Option<ToolKind>, DeskError> {
        let (tool, generation, previous) = {
            let mut guard = self.inner.lock().await;
            let previous = (guard.state.active_tool, guard.state.tool_content.clone());
            guard.tool_generation += 1;
            guard.state.tool_content.clear();

            let Some(tool) = tool.filter(|tool| guard.state.active_tool != Some(*tool)) else {
                guard.state.active_tool = None;
                debug!(ticket_id = %self.ticket.id, "ticket: tool panel closed");
                return Ok(None);
            };
            guard.state.active_tool = Some(tool);
            if !tool.fetches_on_select() {
                debug!(ticket_id = %self.ticket.id, "ticket: knowledge base armed");
                return Ok(Some(tool));
            }
            (tool, guard.tool_generation, previous)
        };

        let machine = Arc::clone(self);
        let task = tokio::spawn(async move {
            let outcome = call_collaborator(
                Operation::FetchTool,
                machine.timeout,
                machine.tools.fetch(tool, &machine.ticket),
            )
            .await;
            machine.finish_tool_fetch(tool, generation, previous, outcome).await
        });

        join_completion(Operation::FetchTool, task).await
    }

    async fn finish_tool_fetch(
        &self,
        tool: ToolKind,
        generation: u64,
        previous: (Option<ToolKind>, String),
        outcome: Result<String, DeskError>,
    ) -> Result<Option<ToolKind>, DeskError> {
        let mut guard = self.inner.lock().await;
        let current = guard.tool_generation == generation;
        match outcome {
            Ok(content) => {
                if !current {
                    debug!(ticket_id = %self.ticket.id, tool = tool.label(), "ticket: stale tool payload dropped");
                    return Ok(guard.state.active_tool);
                }
                guard.state.tool_content = content;
                drop(guard);
                self.publish(SessionEvent::ToolLoaded {
                    ticket_id: self.ticket.id.clone(),
                    tool,
                });
                Ok(Some(tool))
            }
            Err(err) => {
                if current {
                    let (active_tool, tool_content) = previous;
                    guard.state.active_tool = active_tool;
                    guard.state.tool_content = tool_content;
                    guard.tool_generation += 1;
                }
                drop(guard);
                warn!(ticket_id = %self.ticket.id, tool = tool.label(), error = %err, "ticket: tool fetch failed");
                self.publish_failure(&err);
                Err(err)
            }
        }
    }

    pub async fn submit_kb_query(
        self: &Arc<Self>,
        text: &str,
    ) -> Result<Dispatch<String>, DeskError> {
        if text.trim().is_empty() {
            return Ok(Dispatch::Rejected(Rejection::EmptyQuery));
        }
        {
            let mut guard = self.inner.lock().await;
            if guard.state.kb_search_in_flight {
                debug!(ticket_id = %self.ticket.id, "ticket: kb query already in flight");
                return Ok(Dispatch::Rejected(Rejection::InFlight));
            }
            guard.state.kb_search_in_flight = true;
            guard.state.kb_query = text.to_string();
            if guard.state.active_tool != Some(ToolKind::Kb) {
                guard.state.active_tool = Some(ToolKind::Kb);
                guard.state.tool_content.clear();
                guard.tool_generation += 1;
            }
        }

        info!(ticket_id = %self.ticket.id, "ticket: searching knowledge base");
        let query = text.to_string();
        let machine = Arc::clone(self);
        let task = tokio::spawn(async move {
            let outcome = call_collaborator(
                Operation::KnowledgeBaseSearch,
                machine.timeout,
                machine.knowledge_base.search(&query),
            )
            .await;
            machine.finish_kb_query(query, outcome).await
        });

        join_completion(Operation::KnowledgeBaseSearch, task)
            .await
            .map(Dispatch::Completed)
    }

    async fn finish_kb_query(
        &self,
        query: String,
        outcome: Result<String, DeskError>,
    ) -> Result<String, DeskError> {
        let mut guard = self.inner.lock().await;
        guard.state.kb_search_in_flight = false;
        match outcome {
            Ok(answer) => {
                // Only shown while the KB panel is the active one.
                if guard.state.active_tool == Some(ToolKind::Kb) {
                    guard.state.tool_content = answer.clone();
                }
                drop(guard);
                self.publish(SessionEvent::KnowledgeBaseAnswered {
                    ticket_id: self.ticket.id.clone(),
                    query,
                });
                Ok(answer)
            }
            Err(err) => {
                drop(guard);
                warn!(ticket_id = %self.ticket.id, error = %err, "ticket: kb search failed");
                self.publish_failure(&err);
                Err(err)
            }
        }
    }

    fn publish(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn publish_failure(&self, err: &DeskError) {
        if let Some(operation) = err.operation() {
            self.publish(SessionEvent::OperationFailed {
                operation,
                ticket_id: Some(self.ticket.id.clone()),
                error: err.report(),
            });
        }
    }
}

#[cfg(test)]
#[path = "tests/ticket_tests.rs"]
mod tests;
