//! The configuration document model.
//!
//! A `Document` is an order-irrelevant tree of key→value bindings where
//! every value is one of {null, bool, number, string, list, map}.  It is
//! the unit of versioning, validation, and auditing.  Callers never hold
//! a reference into the live tree — the store only ever hands out deep
//! copies.
//!
//! Canonical serialization: `serde_json`'s default map is sorted by key,
//! so `canonical_bytes` is deterministic for structurally equal trees and
//! can back a recomputable checksum.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::errors::{Result, TradeVaultError};

/// A configuration document — the root is always a map.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    root: Map<String, Value>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self { root: Map::new() }
    }

    /// Build a document from a JSON value.
    ///
    /// The value must be an object; anything else is a malformed document.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            other => Err(TradeVaultError::MalformedDocument(format!(
                "document root must be a map, got {}",
                type_name(&other)
            ))),
        }
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    /// Look up a top-level key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    /// Look up a nested value by dotted path, e.g. `"bot_settings.name"`.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?;

        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Set a nested value by dotted path, creating intermediate maps.
    ///
    /// An intermediate segment that holds a non-map value is replaced by
    /// a map so the remaining path can be descended.
    pub fn set_path(&mut self, path: &str, value: Value) {
        let segments: Vec<&str> = path.split('.').collect();
        let mut current = &mut self.root;

        for segment in &segments[..segments.len() - 1] {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            current = match entry {
                Value::Object(map) => map,
                // Just replaced with an object above.
                _ => return,
            };
        }

        if let Some(last) = segments.last() {
            current.insert((*last).to_string(), value);
        }
    }

    /// Remove a top-level key, returning the previous value if any.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.root.remove(key)
    }

    /// Serialize the document to its canonical byte form.
    ///
    /// Keys are emitted in sorted order at every nesting level, so two
    /// structurally equal documents always produce identical bytes.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.root)
            .map_err(|e| TradeVaultError::Serialization(format!("document: {e}")))
    }

    /// SHA-256 checksum over the canonical serialization.
    pub fn checksum(&self) -> Result<Vec<u8>> {
        let bytes = self.canonical_bytes()?;
        Ok(Sha256::digest(&bytes).to_vec())
    }
}

impl From<Map<String, Value>> for Document {
    fn from(root: Map<String, Value>) -> Self {
        Self { root }
    }
}

/// Human-readable name for a JSON value's variant, used in error messages.
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Document {
        Document::from_json(json!({
            "bot_settings": { "name": "test_bot", "trading_mode": "moderate" },
            "capital_management": { "initial_balance": 1000.0 }
        }))
        .unwrap()
    }

    #[test]
    fn from_json_rejects_non_map_root() {
        assert!(Document::from_json(json!([1, 2, 3])).is_err());
        assert!(Document::from_json(json!("scalar")).is_err());
        assert!(Document::from_json(json!(null)).is_err());
    }

    #[test]
    fn get_path_descends_nested_maps() {
        let doc = sample();
        assert_eq!(
            doc.get_path("bot_settings.name"),
            Some(&json!("test_bot"))
        );
        assert_eq!(doc.get_path("bot_settings.missing"), None);
        assert_eq!(doc.get_path("missing.name"), None);
    }

    #[test]
    fn get_path_stops_at_scalar() {
        let doc = sample();
        // "name" is a string — descending further must yield None, not panic.
        assert_eq!(doc.get_path("bot_settings.name.deeper"), None);
    }

    #[test]
    fn set_path_creates_intermediate_maps() {
        let mut doc = Document::new();
        doc.set_path("a.b.c", json!(42));
        assert_eq!(doc.get_path("a.b.c"), Some(&json!(42)));
    }

    #[test]
    fn set_path_replaces_scalar_intermediate() {
        let mut doc = sample();
        doc.set_path("bot_settings.name.sub", json!(true));
        assert_eq!(doc.get_path("bot_settings.name.sub"), Some(&json!(true)));
    }

    #[test]
    fn canonical_bytes_are_key_order_independent() {
        let a = Document::from_json(json!({"x": 1, "a": {"m": 1, "b": 2}})).unwrap();
        let b = Document::from_json(json!({"a": {"b": 2, "m": 1}, "x": 1})).unwrap();
        assert_eq!(
            a.canonical_bytes().unwrap(),
            b.canonical_bytes().unwrap()
        );
    }

    #[test]
    fn checksum_changes_with_content() {
        let a = sample();
        let mut b = sample();
        b.set_path("capital_management.initial_balance", json!(2000.0));
        assert_ne!(a.checksum().unwrap(), b.checksum().unwrap());
    }

    #[test]
    fn checksum_is_stable_for_equal_documents() {
        assert_eq!(sample().checksum().unwrap(), sample().checksum().unwrap());
    }
}
