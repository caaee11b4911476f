use std::{collections::HashMap, fs, path::Path, time::Duration};

use shared::{
    domain::WorkspaceMode,
    protocol::{Severity, Trend},
};

pub const SETTINGS_FILE: &str = "support_desk.toml";

/// Figures shown in the analytics and escalation side panels.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelFigures {
    pub csat: f32,
    pub response_time: String,
    pub trend: Trend,
    pub incident_id: String,
    pub severity: Severity,
}

impl Default for PanelFigures {
    fn default() -> Self {
        Self {
            csat: 4.2,
            response_time: "45m".into(),
            trend: Trend::Down,
            incident_id: "new".into(),
            severity: Severity::High,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub initial_mode: WorkspaceMode,
    pub right_rail_open: bool,
    pub collaborator_timeout: Duration,
    pub event_capacity: usize,
    pub panels: PanelFigures,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            initial_mode: WorkspaceMode::Queue,
            right_rail_open: true,
            collaborator_timeout: Duration::from_secs(10),
            event_capacity: 256,
            panels: PanelFigures::default(),
        }
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the flat key/value file at `path`, then environment
/// variables. Values that fail to parse leave the previous layer in place.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, String>>(&raw) {
            Ok(file_cfg) => apply_table(&mut settings, |key| file_cfg.get(key).cloned()),
            Err(err) => tracing::warn!(
                path = %path.display(),
                error = %err,
                "config: ignoring unreadable settings file"
            ),
        }
    }

    apply_table(&mut settings, |key| {
        let upper = key.to_ascii_uppercase();
        env(&format!("APP__{upper}")).or_else(|| env(&format!("DESK_{upper}")))
    });

    settings
}

fn apply_table(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(mode) = lookup("initial_mode").and_then(|v| v.parse().ok()) {
        settings.initial_mode = mode;
    }
    if let Some(open) = lookup("right_rail_open").and_then(|v| parse_bool(&v)) {
        settings.right_rail_open = open;
    }
    if let Some(ms) = lookup("collaborator_timeout_ms").and_then(|v| v.trim().parse::<u64>().ok())
    {
        if ms > 0 {
            settings.collaborator_timeout = Duration::from_millis(ms);
        }
    }
    if let Some(capacity) = lookup("event_capacity").and_then(|v| v.trim().parse::<usize>().ok())
    {
        if capacity > 0 {
            settings.event_capacity = capacity;
        }
    }
    if let Some(csat) = lookup("csat").and_then(|v| v.trim().parse::<f32>().ok()) {
        settings.panels.csat = csat;
    }
    if let Some(response_time) = lookup("response_time") {
        settings.panels.response_time = response_time;
    }
    if let Some(trend) = lookup("trend").and_then(|v| parse_trend(&v)) {
        settings.panels.trend = trend;
    }
    if let Some(incident_id) = lookup("incident_id") {
        settings.panels.incident_id = incident_id;
    }
    if let Some(severity) = lookup("severity").and_then(|v| parse_severity(&v)) {
        settings.panels.severity = severity;
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_trend(raw: &str) -> Option<Trend> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "up" => Some(Trend::Up),
        "flat" => Some(Trend::Flat),
        "down" => Some(Trend::Down),
        _ => None,
    }
}

fn parse_severity(raw: &str) -> Option<Severity> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "low" => Some(Severity::Low),
        "medium" => Some(Severity::Medium),
        "high" => Some(Severity::High),
        "critical" => Some(Severity::Critical),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
