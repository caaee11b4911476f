use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{CustomerTier, TicketId, ToolKind, WorkspaceMode},
    error::ErrorReport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Flat,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Side-panel data for the active workspace. Each variant carries only the
/// fields its mode displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextPayload {
    Queue {
        queue_length: usize,
        urgent_count: usize,
        average_sentiment: f32,
    },
    Ticket {
        ticket_id: TicketId,
        customer: String,
        tier: CustomerTier,
        sentiment: f32,
    },
    Analytics {
        csat: f32,
        response_time: String,
        trend: Trend,
    },
    Escalation {
        incident_id: String,
        severity: Severity,
    },
    Empty,
}

impl ContextPayload {
    pub fn field_names(&self) -> &'static [&'static str] {
        match self {
            ContextPayload::Queue { .. } => &["queue_length", "urgent_count", "average_sentiment"],
            ContextPayload::Ticket { .. } => &["ticket_id", "customer", "tier", "sentiment"],
            ContextPayload::Analytics { .. } => &["csat", "response_time", "trend"],
            ContextPayload::Escalation { .. } => &["incident_id", "severity"],
            ContextPayload::Empty => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ContextPayload::Empty)
    }
}

/// Asynchronous operations the controller dispatches to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    LoadTickets,
    SendReply,
    FetchTool,
    KnowledgeBaseSearch,
    AutoAssign,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::LoadTickets => "load_tickets",
            Operation::SendReply => "send_reply",
            Operation::FetchTool => "fetch_tool",
            Operation::KnowledgeBaseSearch => "knowledge_base_search",
            Operation::AutoAssign => "auto_assign",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    ModeChanged {
        mode: WorkspaceMode,
    },
    ReplySent {
        ticket_id: TicketId,
        sent_at: DateTime<Utc>,
    },
    ToolLoaded {
        ticket_id: TicketId,
        tool: ToolKind,
    },
    KnowledgeBaseAnswered {
        ticket_id: TicketId,
        query: String,
    },
    BulkAssigned {
        assigned: usize,
        total_assigned: usize,
        remaining: usize,
    },
    OperationFailed {
        operation: Operation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ticket_id: Option<TicketId>,
        error: ErrorReport,
    },
}

impl SessionEvent {
    /// Short notification text for events the overlay surfaces as a toast.
    pub fn toast_text(&self) -> Option<String> {
        match self {
            SessionEvent::BulkAssigned { total_assigned, .. } => Some(format!(
                "{total_assigned} Tickets assigned to you by Risa AI."
            )),
            SessionEvent::ReplySent { .. } => Some("Reply Sent Successfully".to_string()),
            SessionEvent::OperationFailed { error, .. } => Some(error.message.clone()),
            _ => None,
        }
    }
}
