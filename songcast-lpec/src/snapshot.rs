//! Per-device state snapshot and diffing

use std::collections::BTreeMap;

use crate::event::{LpecEvent, Variable};

/// A single variable transition produced by applying an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableChange {
    pub variable: Variable,
    pub old_value: Option<String>,
    pub new_value: String,
}

/// Last-seen value of each recognized variable for one device
///
/// Owned by exactly one monitor; everyone else sees clones or the
/// [`VariableChange`]s produced by [`EventSnapshot::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSnapshot {
    values: BTreeMap<Variable, String>,
}

impl EventSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from the events of a subscription response
    pub fn seeded<'a>(events: impl IntoIterator<Item = &'a LpecEvent>) -> Self {
        let mut snapshot = Self::new();
        for event in events {
            snapshot.apply(event);
        }
        snapshot
    }

    /// Apply an event, returning one change per variable whose value differs
    pub fn apply(&mut self, event: &LpecEvent) -> Vec<VariableChange> {
        let mut changes = Vec::new();
        for (variable, value) in event.variables() {
            if self.values.get(&variable).map(String::as_str) == Some(value) {
                continue;
            }
            let old_value = self.values.insert(variable, value.to_string());
            changes.push(VariableChange {
                variable,
                old_value,
                new_value: value.to_string(),
            });
        }
        changes
    }

    /// Record a value received as a [`VariableChange`] elsewhere
    pub fn set(&mut self, variable: Variable, value: String) -> Option<String> {
        self.values.insert(variable, value)
    }

    pub fn get(&self, variable: Variable) -> Option<&str> {
        self.values.get(&variable).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Variable, &str)> {
        self.values.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// One-line human summary, e.g. `Transport=Playing, Sender=ohz://239.255.255.250:51972/..., Status=Yes`
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(transport) = self.get(Variable::TransportState) {
            parts.push(format!("Transport={}", transport));
        }
        if let Some(sender) = self.get(Variable::Sender) {
            parts.push(format!("Sender={}", format_sender_uri(sender)));
        }
        if let Some(status) = self.get(Variable::Status) {
            parts.push(format!("Status={}", status));
        }
        if parts.is_empty() {
            "No state".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Compact rendering of a sender reference for logs
pub fn format_sender_uri(uri: &str) -> String {
    if uri.is_empty() {
        return "(empty)".to_string();
    }
    if let Some(rest) = uri.strip_prefix("ohz://") {
        let group = rest.split('/').next().unwrap_or_default();
        return format!("ohz://{}/...", group);
    }
    if uri.starts_with("ohSongcast://") {
        let room = uri
            .split(['?', '&'])
            .find_map(|part| part.strip_prefix("room="))
            .unwrap_or("?");
        return format!("ohSongcast://[{}]", room);
    }
    if uri.chars().count() > 60 {
        let head: String = uri.chars().take(60).collect();
        return format!("{}...", head);
    }
    uri.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::parse_event;

    #[test]
    fn test_apply_reports_each_changed_variable() {
        let mut snapshot = EventSnapshot::new();
        let event = parse_event(r#"EVENT 3 TransportState "Playing" Status "Yes""#).unwrap();

        let changes = snapshot.apply(&event);
        assert_eq!(changes.len(), 2);
        assert_eq!(snapshot.get(Variable::TransportState), Some("Playing"));
        assert_eq!(snapshot.get(Variable::Status), Some("Yes"));
        assert_eq!(changes[0].old_value, None);

        // same values again: nothing to report
        assert!(snapshot.apply(&event).is_empty());
    }

    #[test]
    fn test_apply_carries_previous_value() {
        let mut snapshot =
            EventSnapshot::seeded([&parse_event(r#"EVENT 0 TransportState "Stopped""#).unwrap()]);
        let changes = snapshot.apply(&parse_event(r#"EVENT 1 TransportState "Buffering""#).unwrap());
        assert_eq!(
            changes,
            vec![VariableChange {
                variable: Variable::TransportState,
                old_value: Some("Stopped".to_string()),
                new_value: "Buffering".to_string(),
            }]
        );
    }

    #[test]
    fn test_summary() {
        let snapshot = EventSnapshot::seeded([&parse_event(
            r#"EVENT 0 TransportState "Playing" Sender "ohz://239.255.255.250:51972/udn-1" Status "Yes""#,
        )
        .unwrap()]);
        assert_eq!(
            snapshot.summary(),
            "Transport=Playing, Sender=ohz://239.255.255.250:51972/..., Status=Yes"
        );
        assert_eq!(EventSnapshot::new().summary(), "No state");
    }

    #[test]
    fn test_format_sender_uri() {
        assert_eq!(format_sender_uri(""), "(empty)");
        assert_eq!(
            format_sender_uri("ohSongcast://udn-1?room=Kitchen&name=DSM"),
            "ohSongcast://[Kitchen]"
        );
        let long = format!("http://example.com/{}", "x".repeat(80));
        assert!(format_sender_uri(&long).ends_with("..."));
        assert_eq!(format_sender_uri("short"), "short");
    }
}
