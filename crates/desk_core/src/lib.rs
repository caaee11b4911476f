use std::{
    collections::HashSet, future::Future, panic::AssertUnwindSafe, sync::Arc, time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::FutureExt;
use shared::{
    domain::{Ticket, TicketId, ToolKind},
    protocol::Operation,
};
use tokio::task::JoinHandle;
use tracing::warn;

pub mod config;
pub mod context;
pub mod error;
pub mod queue;
pub mod session;
pub mod ticket;

pub use error::DeskError;
pub use queue::{AssignOutcome, BulkAssignState, TicketQueue};
pub use session::{RailSide, SessionController, ShellState};
pub use ticket::{TicketConversationState, TicketLifecycle};

#[async_trait]
pub trait TicketSource: Send + Sync {
    async fn load_tickets(&self) -> Result<Vec<Ticket>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentResult {
    pub assigned_ids: HashSet<TicketId>,
}

#[async_trait]
pub trait AssignmentService: Send + Sync {
    async fn assign(&self, tickets: &[Ticket]) -> Result<AssignmentResult>;
}

#[async_trait]
pub trait SendService: Send + Sync {
    async fn send(&self, ticket_id: &TicketId, draft_text: &str) -> Result<()>;
}

/// Knowledge-base lookup. Implementations answer benign but useless queries
/// with an explanatory result instead of an error.
#[async_trait]
pub trait KnowledgeBaseSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<String>;
}

#[async_trait]
pub trait ToolFeed: Send + Sync {
    async fn fetch(&self, tool: ToolKind, ticket: &Ticket) -> Result<String>;
}

pub struct MissingTicketSource;

#[async_trait]
impl TicketSource for MissingTicketSource {
    async fn load_tickets(&self) -> Result<Vec<Ticket>> {
        Err(anyhow!("ticket source is unavailable"))
    }
}

pub struct MissingAssignmentService;

#[async_trait]
impl AssignmentService for MissingAssignmentService {
    async fn assign(&self, _tickets: &[Ticket]) -> Result<AssignmentResult> {
        Err(anyhow!("assignment service is unavailable"))
    }
}

pub struct MissingSendService;

#[async_trait]
impl SendService for MissingSendService {
    async fn send(&self, ticket_id: &TicketId, _draft_text: &str) -> Result<()> {
        Err(anyhow!("send service is unavailable for ticket {ticket_id}"))
    }
}

pub struct MissingKnowledgeBase;

#[async_trait]
impl KnowledgeBaseSearch for MissingKnowledgeBase {
    async fn search(&self, _query: &str) -> Result<String> {
        Err(anyhow!("knowledge base is unavailable"))
    }
}

pub struct MissingToolFeed;

#[async_trait]
impl ToolFeed for MissingToolFeed {
    async fn fetch(&self, tool: ToolKind, ticket: &Ticket) -> Result<String> {
        Err(anyhow!(
            "{} feed is unavailable for ticket {}",
            tool.label(),
            ticket.id
        ))
    }
}

#[derive(Clone)]
pub struct Collaborators {
    pub tickets: Arc<dyn TicketSource>,
    pub assignment: Arc<dyn AssignmentService>,
    pub send: Arc<dyn SendService>,
    pub knowledge_base: Arc<dyn KnowledgeBaseSearch>,
    pub tools: Arc<dyn ToolFeed>,
}

impl Collaborators {
    pub fn missing() -> Self {
        Self {
            tickets: Arc::new(MissingTicketSource),
            assignment: Arc::new(MissingAssignmentService),
            send: Arc::new(MissingSendService),
            knowledge_base: Arc::new(MissingKnowledgeBase),
            tools: Arc::new(MissingToolFeed),
        }
    }
}

/// Rejections are not failures; the presentation layer shows nothing for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    InFlight,
    AlreadySent,
    EmptyQuery,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch<T> {
    Completed(T),
    Rejected(Rejection),
}

impl<T> Dispatch<T> {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Dispatch::Rejected(_))
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Dispatch::Completed(value) => Some(value),
            Dispatch::Rejected(_) => None,
        }
    }
}

pub(crate) async fn call_collaborator<T, F>(
    operation: Operation,
    limit: Duration,
    call: F,
) -> std::result::Result<T, DeskError>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, AssertUnwindSafe(call).catch_unwind()).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(source))) => Err(DeskError::Collaborator { operation, source }),
        Ok(Err(_)) => {
            warn!(operation = %operation, "collaborator call panicked");
            Err(DeskError::CollaboratorPanicked { operation })
        }
        Err(_) => Err(DeskError::TimedOut {
            operation,
            after: limit,
        }),
    }
}

/// The task owns the state transition, so dropping this future does not
/// cancel the operation.
pub(crate) async fn join_completion<T>(
    operation: Operation,
    task: JoinHandle<std::result::Result<T, DeskError>>,
) -> std::result::Result<T, DeskError> {
    match task.await {
        Ok(outcome) => outcome,
        Err(_) => Err(DeskError::TaskAborted { operation }),
    }
}

#[cfg(test)]
#[path = "tests/doubles.rs"]
pub(crate) mod doubles;
