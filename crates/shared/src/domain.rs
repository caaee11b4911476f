use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub String);

impl TicketId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Top-level view shown in the overlay's main canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceMode {
    Queue,
    Ticket,
    Analytics,
    Escalation,
    Knowledge,
}

impl WorkspaceMode {
    pub const ALL: [WorkspaceMode; 5] = [
        WorkspaceMode::Queue,
        WorkspaceMode::Ticket,
        WorkspaceMode::Analytics,
        WorkspaceMode::Escalation,
        WorkspaceMode::Knowledge,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WorkspaceMode::Queue => "queue",
            WorkspaceMode::Ticket => "ticket",
            WorkspaceMode::Analytics => "analytics",
            WorkspaceMode::Escalation => "escalation",
            WorkspaceMode::Knowledge => "knowledge",
        }
    }
}

impl fmt::Display for WorkspaceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown workspace mode '{0}'")]
pub struct UnknownMode(pub String);

impl FromStr for WorkspaceMode {
    type Err = UnknownMode;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        WorkspaceMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| UnknownMode(raw.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    /// High and critical tickets count toward the queue's urgent tally.
    pub fn is_urgent(self) -> bool {
        self >= Urgency::High
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    New,
    Open,
    Pending,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Chat,
    Phone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerTier {
    #[default]
    Standard,
    Business,
    Enterprise,
}

impl fmt::Display for CustomerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CustomerTier::Standard => "Standard",
            CustomerTier::Business => "Business",
            CustomerTier::Enterprise => "Enterprise",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub subject: String,
    pub customer: String,
    pub sentiment_score: f32,
    pub urgency: Urgency,
    pub status: TicketStatus,
    pub channel: Channel,
    /// Display-only, e.g. "10m ago".
    pub last_updated: String,
    #[serde(default)]
    pub tier: CustomerTier,
}

impl Ticket {
    /// Sentiment clamped to [-1, 1]; backends occasionally overshoot.
    pub fn sentiment(&self) -> f32 {
        if self.sentiment_score.is_nan() {
            return 0.0;
        }
        self.sentiment_score.clamp(-1.0, 1.0)
    }
}

/// Auxiliary viewer attachable to a ticket conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    #[serde(rename = "CRM")]
    Crm,
    #[serde(rename = "KB")]
    Kb,
    #[serde(rename = "Logs")]
    Logs,
}

impl ToolKind {
    pub fn label(self) -> &'static str {
        match self {
            ToolKind::Crm => "CRM",
            ToolKind::Kb => "Knowledge Base",
            ToolKind::Logs => "Logs",
        }
    }

    /// CRM and Logs load a payload as soon as they are selected; KB waits for a query.
    pub fn fetches_on_select(self) -> bool {
        !matches!(self, ToolKind::Kb)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    #[default]
    Draft,
    Sending,
    Sent,
}
