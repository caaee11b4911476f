use super::*;

use shared::domain::{CustomerTier, Urgency};

use crate::doubles::{sample_tickets, ticket};

fn payload_keys(payload: &ContextPayload) -> Vec<String> {
    let value = serde_json::to_value(payload).expect("json");
    let mut keys: Vec<String> = value
        .as_object()
        .expect("object")
        .keys()
        .filter(|key| key.as_str() != "kind")
        .cloned()
        .collect();
    keys.sort();
    keys
}

#[test]
fn every_mode_yields_exactly_its_own_fields() {
    let queue = sample_tickets(4);
    let panels = PanelFigures::default();
    let sources = ContextSources {
        queue: &queue,
        focused: queue.first(),
        panels: &panels,
    };

    for mode in WorkspaceMode::ALL {
        let payload = resolve(mode, &sources);
        let mut expected: Vec<String> = payload
            .field_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        expected.sort();
        assert_eq!(payload_keys(&payload), expected, "mode {mode}");
    }

    assert!(matches!(
        resolve(WorkspaceMode::Queue, &sources),
        ContextPayload::Queue { .. }
    ));
    assert!(matches!(
        resolve(WorkspaceMode::Ticket, &sources),
        ContextPayload::Ticket { .. }
    ));
    assert!(matches!(
        resolve(WorkspaceMode::Analytics, &sources),
        ContextPayload::Analytics { .. }
    ));
    assert!(matches!(
        resolve(WorkspaceMode::Escalation, &sources),
        ContextPayload::Escalation { .. }
    ));
    assert!(resolve(WorkspaceMode::Knowledge, &sources).is_empty());
}

#[test]
fn unknown_mode_name_degrades_to_empty_payload() {
    let panels = PanelFigures::default();
    let sources = ContextSources {
        queue: &[],
        focused: None,
        panels: &panels,
    };
    assert_eq!(resolve_named("billing", &sources), ContextPayload::Empty);
    assert_eq!(resolve_named("", &sources), ContextPayload::Empty);
    assert!(matches!(
        resolve_named("ANALYTICS", &sources),
        ContextPayload::Analytics { .. }
    ));
}

#[test]
fn queue_payload_is_derived_from_tickets() {
    let mut first = ticket("1", Urgency::Critical);
    first.sentiment_score = -0.8;
    let mut second = ticket("2", Urgency::High);
    second.sentiment_score = 0.2;
    let mut third = ticket("3", Urgency::Low);
    third.sentiment_score = 0.3;
    let queue = vec![first, second, third];
    let panels = PanelFigures::default();
    let sources = ContextSources {
        queue: &queue,
        focused: None,
        panels: &panels,
    };

    let ContextPayload::Queue {
        queue_length,
        urgent_count,
        average_sentiment,
    } = resolve(WorkspaceMode::Queue, &sources)
    else {
        panic!("expected queue payload");
    };
    assert_eq!(queue_length, 3);
    assert_eq!(urgent_count, 2);
    assert!((average_sentiment - (-0.1)).abs() < 1e-5);
}

#[test]
fn empty_queue_has_neutral_sentiment() {
    let panels = PanelFigures::default();
    let sources = ContextSources {
        queue: &[],
        focused: None,
        panels: &panels,
    };
    assert_eq!(
        resolve(WorkspaceMode::Queue, &sources),
        ContextPayload::Queue {
            queue_length: 0,
            urgent_count: 0,
            average_sentiment: 0.0,
        }
    );
}

#[test]
fn ticket_mode_without_focus_is_empty() {
    let panels = PanelFigures::default();
    let sources = ContextSources {
        queue: &[],
        focused: None,
        panels: &panels,
    };
    assert!(resolve(WorkspaceMode::Ticket, &sources).is_empty());
}

#[test]
fn ticket_payload_reflects_focused_ticket() {
    let mut focused = ticket("4492", Urgency::Critical);
    focused.customer = "Acme Corp".into();
    focused.tier = CustomerTier::Enterprise;
    focused.sentiment_score = -0.6;
    let panels = PanelFigures::default();
    let sources = ContextSources {
        queue: &[],
        focused: Some(&focused),
        panels: &panels,
    };
    assert_eq!(
        resolve(WorkspaceMode::Ticket, &sources),
        ContextPayload::Ticket {
            ticket_id: focused.id.clone(),
            customer: "Acme Corp".into(),
            tier: CustomerTier::Enterprise,
            sentiment: -0.6,
        }
    );
}

#[test]
fn repeated_resolution_is_identical() {
    let queue = sample_tickets(5);
    let panels = PanelFigures::default();
    let sources = ContextSources {
        queue: &queue,
        focused: None,
        panels: &panels,
    };
    let first = resolve(WorkspaceMode::Queue, &sources);
    let _ = resolve(WorkspaceMode::Ticket, &sources);
    let second = resolve(WorkspaceMode::Queue, &sources);
    assert_eq!(first, second);
}
