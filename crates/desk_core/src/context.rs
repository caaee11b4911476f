use shared::{
    domain::{Ticket, WorkspaceMode},
    protocol::ContextPayload,
};

use crate::config::PanelFigures;

#[derive(Debug, Clone, Copy)]
pub struct ContextSources<'a> {
    pub queue: &'a [Ticket],
    pub focused: Option<&'a Ticket>,
    pub panels: &'a PanelFigures,
}

pub fn resolve(mode: WorkspaceMode, sources: &ContextSources<'_>) -> ContextPayload {
    match mode {
        WorkspaceMode::Queue => queue_payload(sources.queue),
        WorkspaceMode::Ticket => match sources.focused {
            Some(ticket) => ContextPayload::Ticket {
                ticket_id: ticket.id.clone(),
                customer: ticket.customer.clone(),
                tier: ticket.tier,
                sentiment: ticket.sentiment(),
            },
            None => ContextPayload::Empty,
        },
        WorkspaceMode::Analytics => ContextPayload::Analytics {
            csat: sources.panels.csat,
            response_time: sources.panels.response_time.clone(),
            trend: sources.panels.trend,
        },
        WorkspaceMode::Escalation => ContextPayload::Escalation {
            incident_id: sources.panels.incident_id.clone(),
            severity: sources.panels.severity,
        },
        WorkspaceMode::Knowledge => ContextPayload::Empty,
    }
}

/// Resolves a mode given by name; names that match no mode get the empty payload.
pub fn resolve_named(name: &str, sources: &ContextSources<'_>) -> ContextPayload {
    match name.parse::<WorkspaceMode>() {
        Ok(mode) => resolve(mode, sources),
        Err(_) => ContextPayload::Empty,
    }
}

fn queue_payload(queue: &[Ticket]) -> ContextPayload {
    let urgent_count = queue
        .iter()
        .filter(|ticket| ticket.urgency.is_urgent())
        .count();
    let average_sentiment = if queue.is_empty() {
        0.0
    } else {
        queue.iter().map(Ticket::sentiment).sum::<f32>() / queue.len() as f32
    };
    ContextPayload::Queue {
        queue_length: queue.len(),
        urgent_count,
        average_sentiment,
    }
}

#[cfg(test)]
#[path = "tests/context_tests.rs"]
mod tests;
