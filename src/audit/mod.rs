//! Audit trail — append-only event log and config diff engine.
//!
//! Every committed configuration change, rejected update, rollback, and
//! secret access is recorded as an `AuditEvent`.  Events accumulate in
//! memory for the process lifetime and are forwarded to an optional
//! external sink; the trail never depends on the sink succeeding.
//!
//! The diff engine enumerates every leaf path that was added, removed,
//! or changed between two documents.  Any path with a secret-like
//! segment has both its old and new value masked before the entry is
//! recorded, so credential material can never reach a log line.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::document::Document;

/// Placeholder written in place of masked values.
pub const MASKED: &str = "[REDACTED]";

/// Key-name fragments that mark a path as sensitive.
const SENSITIVE_MARKERS: &[&str] = &[
    "secret",
    "key",
    "password",
    "passphrase",
    "token",
    "credential",
];

/// What happened, as recorded in an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    Loaded,
    Updated,
    ValidationFailed,
    Rollback,
    SecretAccessed,
    SecretRotated,
    SecurityViolation,
}

/// Coarse severity attached to every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// A single audit record.  Never mutated after creation.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub risk_level: RiskLevel,
    pub details: Map<String, Value>,
}

impl AuditEvent {
    pub fn new(
        event_type: AuditEventType,
        risk_level: RiskLevel,
        details: Map<String, Value>,
    ) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            user_id: None,
            risk_level,
            details,
        }
    }

    pub fn with_user(mut self, user_id: Option<&str>) -> Self {
        self.user_id = user_id.map(str::to_string);
        self
    }
}

/// External consumer of audit events (alerting, notification, archival).
///
/// `accept` takes the event by reference and returns nothing — the trail
/// records the event in memory regardless of what the sink does with it.
pub trait AuditSink: Send + Sync {
    fn accept(&self, event: &AuditEvent);
}

/// One entry in a config diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffEntry {
    pub path: String,
    pub kind: ChangeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Changed,
}

/// In-memory, append-only audit log with an optional external sink.
pub struct AuditTrail {
    events: Mutex<Vec<AuditEvent>>,
    sink: Option<Box<dyn AuditSink>>,
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditTrail {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            sink: None,
        }
    }

    pub fn with_sink(sink: Box<dyn AuditSink>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            sink: Some(sink),
        }
    }

    /// Append an event and forward it to the sink, if one is configured.
    pub fn log_event(&self, event: AuditEvent) {
        if let Some(sink) = &self.sink {
            sink.accept(&event);
        }
        self.events.lock().push(event);
    }

    /// Record a committed configuration change as one `Updated` event.
    ///
    /// The event's details carry the full masked diff; its risk level is
    /// derived from which paths changed.
    pub fn log_config_change(&self, old: &Document, new: &Document, user_id: Option<&str>) {
        let diff = diff_documents(old, new);
        let risk = classify_risk(&diff);

        let mut details = Map::new();
        details.insert("changes".into(), Value::from(diff.len()));
        details.insert(
            "diff".into(),
            serde_json::to_value(&diff).unwrap_or(Value::Null),
        );

        self.log_event(AuditEvent::new(AuditEventType::Updated, risk, details).with_user(user_id));
    }

    /// Query recent events, most recent first.
    ///
    /// - `limit`: maximum number of entries to return.
    /// - `since`: if provided, only entries at or after this timestamp.
    pub fn query(&self, limit: usize, since: Option<DateTime<Utc>>) -> Vec<AuditEvent> {
        let events = self.events.lock();
        events
            .iter()
            .rev()
            .filter(|e| since.map_or(true, |ts| e.timestamp >= ts))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

/// Recursive diff between two documents.
///
/// Emits one entry per leaf path that differs.  List values that differ
/// produce a single entry at the list's own path rather than per-element
/// entries.  Sensitive paths are masked on both sides.
pub fn diff_documents(old: &Document, new: &Document) -> Vec<DiffEntry> {
    let mut entries = Vec::new();
    diff_maps("", old.as_map(), new.as_map(), &mut entries);
    entries
}

fn diff_maps(
    path: &str,
    old: &Map<String, Value>,
    new: &Map<String, Value>,
    out: &mut Vec<DiffEntry>,
) {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    for key in keys {
        let child = join_path(path, key);
        diff_value(&child, old.get(key.as_str()), new.get(key.as_str()), out);
    }
}

fn diff_value(path: &str, old: Option<&Value>, new: Option<&Value>, out: &mut Vec<DiffEntry>) {
    match (old, new) {
        (None, None) => {}
        (Some(o), Some(n)) if o == n => {}

        // Both maps: recurse into the union of their keys.
        (Some(Value::Object(om)), Some(Value::Object(nm))) => diff_maps(path, om, nm, out),

        // Both lists: a single entry for the whole list.
        (Some(Value::Array(_)), Some(Value::Array(_))) => {
            out.push(entry(path, ChangeKind::Changed, old, new));
        }

        // A whole subtree appeared or disappeared: enumerate its leaves.
        (None, Some(Value::Object(nm))) => {
            for (key, value) in nm {
                diff_value(&join_path(path, key), None, Some(value), out);
            }
        }
        (Some(Value::Object(om)), None) => {
            for (key, value) in om {
                diff_value(&join_path(path, key), Some(value), None, out);
            }
        }

        (None, Some(_)) => out.push(entry(path, ChangeKind::Added, old, new)),
        (Some(_), None) => out.push(entry(path, ChangeKind::Removed, old, new)),

        // Scalar change or type change.
        (Some(_), Some(_)) => out.push(entry(path, ChangeKind::Changed, old, new)),
    }
}

fn entry(path: &str, kind: ChangeKind, old: Option<&Value>, new: Option<&Value>) -> DiffEntry {
    let masked = is_sensitive_path(path);
    let render_side = |v: Option<&Value>| {
        v.map(|v| {
            if masked {
                MASKED.to_string()
            } else {
                render(v)
            }
        })
    };
    DiffEntry {
        path: path.to_string(),
        kind,
        old: render_side(old),
        new: render_side(new),
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => format!("[list of {} items]", items.len()),
        Value::Object(_) => "[map]".to_string(),
    }
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

/// Whether any segment of a dotted path carries a secret-like name.
pub fn is_sensitive_path(path: &str) -> bool {
    path.split('.').any(|segment| {
        let lower = segment.to_ascii_lowercase();
        SENSITIVE_MARKERS.iter().any(|m| lower.contains(m))
    })
}

/// Risk classification over a set of diff entries.
///
/// High when credential-shaped paths changed, Medium when risk/loss
/// limits changed, Low otherwise.
fn classify_risk(entries: &[DiffEntry]) -> RiskLevel {
    let high = entries
        .iter()
        .any(|e| is_sensitive_path(&e.path) || e.path.to_ascii_lowercase().contains("api_"));
    if high {
        return RiskLevel::High;
    }

    let medium = entries.iter().any(|e| {
        let lower = e.path.to_ascii_lowercase();
        lower.contains("risk") || lower.contains("loss")
    });
    if medium {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}
