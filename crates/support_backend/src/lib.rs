//! In-process stand-in for the support backend: seeded tickets, simulated
//! latency, canned tool payloads, and a small keyword-matched knowledge base.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use desk_core::{
    AssignmentResult, AssignmentService, Collaborators, KnowledgeBaseSearch, SendService,
    TicketSource, ToolFeed,
};
use shared::{
    domain::{Channel, CustomerTier, Ticket, TicketId, TicketStatus, ToolKind, Urgency},
    protocol::Operation,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

mod knowledge;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    pub send_latency: Duration,
    pub tool_latency: Duration,
    pub assign_latency: Duration,
    pub search_latency: Duration,
    /// How many tickets one auto-assign batch hands out.
    pub assign_batch: usize,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            send_latency: Duration::from_millis(1500),
            tool_latency: Duration::from_millis(500),
            assign_latency: Duration::from_millis(1500),
            search_latency: Duration::from_millis(800),
            assign_batch: 2,
        }
    }
}

impl BackendSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();
        let millis = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
        };

        if let Some(v) = millis("DESK_BACKEND_SEND_LATENCY_MS") {
            settings.send_latency = v;
        }
        if let Some(v) = millis("DESK_BACKEND_TOOL_LATENCY_MS") {
            settings.tool_latency = v;
        }
        if let Some(v) = millis("DESK_BACKEND_ASSIGN_LATENCY_MS") {
            settings.assign_latency = v;
        }
        if let Some(v) = millis("DESK_BACKEND_SEARCH_LATENCY_MS") {
            settings.search_latency = v;
        }
        if let Some(v) = lookup("DESK_BACKEND_ASSIGN_BATCH").and_then(|v| v.trim().parse().ok()) {
            settings.assign_batch = v;
        }
        settings
    }

    pub fn instant() -> Self {
        Self {
            send_latency: Duration::ZERO,
            tool_latency: Duration::ZERO,
            assign_latency: Duration::ZERO,
            search_latency: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// The five tickets the demo queue opens with.
pub fn seed_tickets() -> Vec<Ticket> {
    let ticket = |id: &str,
                  subject: &str,
                  customer: &str,
                  sentiment_score: f32,
                  urgency: Urgency,
                  status: TicketStatus,
                  channel: Channel,
                  last_updated: &str,
                  tier: CustomerTier| Ticket {
        id: TicketId::new(id),
        subject: subject.to_string(),
        customer: customer.to_string(),
        sentiment_score,
        urgency,
        status,
        channel,
        last_updated: last_updated.to_string(),
        tier,
    };

    vec![
        ticket(
            "4492",
            "Refund Request - Unhappy with Service",
            "Acme Corp",
            -0.8,
            Urgency::Critical,
            TicketStatus::New,
            Channel::Email,
            "10m ago",
            CustomerTier::Enterprise,
        ),
        ticket(
            "4491",
            "How do I add a user?",
            "StartUp Inc",
            0.5,
            Urgency::Low,
            TicketStatus::New,
            Channel::Chat,
            "15m ago",
            CustomerTier::Standard,
        ),
        ticket(
            "4490",
            "API Latency Issues",
            "TechGiant",
            -0.2,
            Urgency::High,
            TicketStatus::Open,
            Channel::Email,
            "1h ago",
            CustomerTier::Enterprise,
        ),
        ticket(
            "4489",
            "Billing Inquiry",
            "Mom&Pop Shop",
            0.1,
            Urgency::Medium,
            TicketStatus::Pending,
            Channel::Phone,
            "2h ago",
            CustomerTier::Business,
        ),
        ticket(
            "4488",
            "Feature Request: Dark Mode",
            "DevUser",
            0.8,
            Urgency::Low,
            TicketStatus::Resolved,
            Channel::Email,
            "1d ago",
            CustomerTier::Standard,
        ),
    ]
}

pub struct CannedBackend {
    settings: BackendSettings,
    tickets: Vec<Ticket>,
    pending_failures: Mutex<HashSet<Operation>>,
    calls: Mutex<HashMap<Operation, usize>>,
}

impl CannedBackend {
    pub fn new(settings: BackendSettings) -> Arc<Self> {
        Self::with_tickets(settings, seed_tickets())
    }

    pub fn with_tickets(settings: BackendSettings, tickets: Vec<Ticket>) -> Arc<Self> {
        Arc::new(Self {
            settings,
            tickets,
            pending_failures: Mutex::new(HashSet::new()),
            calls: Mutex::new(HashMap::new()),
        })
    }

    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators {
            tickets: self.clone(),
            assignment: self.clone(),
            send: self.clone(),
            knowledge_base: self.clone(),
            tools: self.clone(),
        }
    }

    /// Makes the next call of `operation` fail once.
    pub async fn fail_next(&self, operation: Operation) {
        self.pending_failures.lock().await.insert(operation);
    }

    pub async fn calls(&self, operation: Operation) -> usize {
        self.calls
            .lock()
            .await
            .get(&operation)
            .copied()
            .unwrap_or_default()
    }

    async fn begin(&self, operation: Operation, latency: Duration) -> Result<()> {
        *self.calls.lock().await.entry(operation).or_default() += 1;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.pending_failures.lock().await.remove(&operation) {
            debug!(operation = %operation, "backend: injected failure");
            return Err(anyhow!("{operation} failed: support backend unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl TicketSource for CannedBackend {
    async fn load_tickets(&self) -> Result<Vec<Ticket>> {
        self.begin(Operation::LoadTickets, Duration::ZERO).await?;
        Ok(self.tickets.clone())
    }
}

#[async_trait]
impl AssignmentService for CannedBackend {
    /// Hands out the oldest tickets, i.e. the tail of the queue.
    async fn assign(&self, tickets: &[Ticket]) -> Result<AssignmentResult> {
        self.begin(Operation::AutoAssign, self.settings.assign_latency)
            .await?;
        let skip = tickets.len().saturating_sub(self.settings.assign_batch);
        let assigned_ids: HashSet<TicketId> = tickets
            .iter()
            .skip(skip)
            .map(|ticket| ticket.id.clone())
            .collect();
        info!(assigned = assigned_ids.len(), "backend: tickets assigned");
        Ok(AssignmentResult { assigned_ids })
    }
}

#[async_trait]
impl SendService for CannedBackend {
    async fn send(&self, ticket_id: &TicketId, draft_text: &str) -> Result<()> {
        self.begin(Operation::SendReply, self.settings.send_latency)
            .await?;
        info!(ticket_id = %ticket_id, chars = draft_text.chars().count(), "backend: reply delivered");
        Ok(())
    }
}

#[async_trait]
impl KnowledgeBaseSearch for CannedBackend {
    async fn search(&self, query: &str) -> Result<String> {
        self.begin(Operation::KnowledgeBaseSearch, self.settings.search_latency)
            .await?;
        Ok(knowledge::answer(query))
    }
}

#[async_trait]
impl ToolFeed for CannedBackend {
    async fn fetch(&self, tool: ToolKind, ticket: &Ticket) -> Result<String> {
        self.begin(Operation::FetchTool, self.settings.tool_latency)
            .await?;
        match tool {
            ToolKind::Crm => Ok(crm_record(ticket)),
            ToolKind::Logs => Ok(log_excerpt(ticket)),
            ToolKind::Kb => Err(anyhow!("knowledge base answers queries, not fetches")),
        }
    }
}

fn crm_record(ticket: &Ticket) -> String {
    if ticket.id.as_str() == "4492" {
        return "Customer: Acme Corp\nARR: $120,000\nRenewal: Nov 2024\nTech Stack: AWS, React, Node.js"
            .to_string();
    }
    format!(
        "Customer: {}\nTier: {}\nOpen tickets: 1",
        ticket.customer, ticket.tier
    )
}

fn log_excerpt(ticket: &Ticket) -> String {
    if ticket.id.as_str() == "4492" {
        return "User ID: 8821\nError 502 Bad Gateway @ 10:41 AM\nRegion: us-east-1\nTrace ID: req-9921-aa"
            .to_string();
    }
    format!("No errors recorded for {} in the last 24h", ticket.customer)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
