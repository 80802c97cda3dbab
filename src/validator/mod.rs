//! Configuration validation rules.
//!
//! `Validator::validate` is a pure function from a document to a
//! `ValidationResult`.  Rule classes run in a fixed order — structural,
//! cross-field, policy-by-mode, reserved-name, sensitive-data leak —
//! and every error is accumulated rather than short-circuiting, so a
//! caller sees the full list of problems in one pass.

pub mod leak_scan;

pub use leak_scan::SecretScanner;

use serde_json::Value;

use crate::document::{type_name, Document};
use crate::errors::Result;

/// Trading modes the bot understands.
const TRADING_MODES: &[&str] = &["conservative", "moderate", "aggressive"];

/// Deployment environments the bot understands.
const ENVIRONMENTS: &[&str] = &["backtest", "paper", "testnet", "live"];

/// Bot names that collide with operational identities.
const RESERVED_BOT_NAMES: &[&str] = &["admin", "administrator", "root", "system", "superuser"];

/// Outcome of validating a document.
///
/// `is_valid` is true iff `errors` is empty; a non-empty error list
/// always leaves `validated_document` absent.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub validated_document: Option<Document>,
}

/// Document validator with compiled leak-scan patterns.
pub struct Validator {
    scanner: SecretScanner,
}

impl Validator {
    pub fn new() -> Result<Self> {
        Ok(Self {
            scanner: SecretScanner::new()?,
        })
    }

    /// Run every rule class over `document`, accumulating all errors.
    pub fn validate(&self, document: &Document) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        check_structural(document, &mut errors);
        check_cross_field(document, &mut errors);
        check_policy(document, &mut errors);
        check_reserved_name(document, &mut errors);
        errors.extend(self.scanner.scan(document));

        collect_warnings(document, &mut warnings);

        let is_valid = errors.is_empty();
        ValidationResult {
            is_valid,
            validated_document: is_valid.then(|| document.clone()),
            errors,
            warnings,
        }
    }
}

// ---------------------------------------------------------------------------
// Rule classes
// ---------------------------------------------------------------------------

fn check_structural(doc: &Document, errors: &mut Vec<String>) {
    // Required sections.
    for section in ["bot_settings", "capital_management"] {
        match doc.get(section) {
            None => errors.push(format!("required section '{section}' is missing")),
            Some(value) if !value.is_object() => errors.push(format!(
                "section '{section}' must be a map, got {}",
                type_name(value)
            )),
            Some(_) => {}
        }
    }

    // bot_settings fields.
    match doc.get_path("bot_settings.name") {
        Some(Value::String(name)) if !name.is_empty() => {}
        Some(Value::String(_)) => errors.push("bot_settings.name must not be empty".into()),
        Some(other) => errors.push(format!(
            "bot_settings.name must be a string, got {}",
            type_name(other)
        )),
        None => {
            if doc.get("bot_settings").is_some_and(Value::is_object) {
                errors.push("bot_settings.name is required".into());
            }
        }
    }

    match doc.get_path("bot_settings.trading_mode") {
        Some(Value::String(mode)) if TRADING_MODES.contains(&mode.as_str()) => {}
        Some(Value::String(mode)) => errors.push(format!(
            "bot_settings.trading_mode '{mode}' is not one of: {}",
            TRADING_MODES.join(", ")
        )),
        Some(other) => errors.push(format!(
            "bot_settings.trading_mode must be a string, got {}",
            type_name(other)
        )),
        None => {
            if doc.get("bot_settings").is_some_and(Value::is_object) {
                errors.push("bot_settings.trading_mode is required".into());
            }
        }
    }

    if let Some(env) = doc.get_path("bot_settings.environment") {
        match env {
            Value::String(env) if ENVIRONMENTS.contains(&env.as_str()) => {}
            Value::String(env) => errors.push(format!(
                "bot_settings.environment '{env}' is not one of: {}",
                ENVIRONMENTS.join(", ")
            )),
            other => errors.push(format!(
                "bot_settings.environment must be a string, got {}",
                type_name(other)
            )),
        }
    }

    if let Some(features) = doc.get_path("bot_settings.features") {
        match features {
            Value::Object(map) => {
                for (name, value) in map {
                    if !value.is_boolean() {
                        errors.push(format!(
                            "bot_settings.features.{name} must be a boolean, got {}",
                            type_name(value)
                        ));
                    }
                }
            }
            other => errors.push(format!(
                "bot_settings.features must be a map of booleans, got {}",
                type_name(other)
            )),
        }
    }

    // capital_management numeric ranges.
    if let Some(v) = numeric_field(doc, "capital_management.initial_balance", true, errors) {
        if v <= 0.0 {
            errors.push(format!(
                "capital_management.initial_balance must be greater than 0 (got {v})"
            ));
        }
    }
    if let Some(v) = numeric_field(doc, "capital_management.target_balance", true, errors) {
        if v <= 0.0 {
            errors.push(format!(
                "capital_management.target_balance must be greater than 0 (got {v})"
            ));
        }
    }
    if let Some(v) = numeric_field(doc, "capital_management.max_risk_per_trade", true, errors) {
        if v <= 0.0 || v > 10.0 {
            errors.push(format!(
                "capital_management.max_risk_per_trade must be in (0, 10] percent (got {v})"
            ));
        }
    }
    if let Some(v) = numeric_field(doc, "capital_management.max_daily_loss_pct", true, errors) {
        if v <= 0.0 || v > 50.0 {
            errors.push(format!(
                "capital_management.max_daily_loss_pct must be in (0, 50] percent (got {v})"
            ));
        }
    }
    if let Some(v) = numeric_field(doc, "capital_management.max_weekly_loss_pct", true, errors) {
        if v <= 0.0 || v > 100.0 {
            errors.push(format!(
                "capital_management.max_weekly_loss_pct must be in (0, 100] percent (got {v})"
            ));
        }
    }
    if let Some(v) = numeric_field(doc, "capital_management.max_drawdown_pct", true, errors) {
        if v <= 0.0 || v > 100.0 {
            errors.push(format!(
                "capital_management.max_drawdown_pct must be in (0, 100] percent (got {v})"
            ));
        }
    }
    if let Some(v) = numeric_field(doc, "capital_management.min_confidence_pct", false, errors) {
        if !(50.0..=95.0).contains(&v) {
            errors.push(format!(
                "capital_management.min_confidence_pct must be in [50, 95] percent (got {v})"
            ));
        }
    }
    if let Some(v) = numeric_field(doc, "capital_management.max_leverage", false, errors) {
        if v <= 0.0 || v > 125.0 {
            errors.push(format!(
                "capital_management.max_leverage must be in (0, 125] (got {v})"
            ));
        }
    }
}

fn check_cross_field(doc: &Document, errors: &mut Vec<String>) {
    let initial = number_at(doc, "capital_management.initial_balance");
    let target = number_at(doc, "capital_management.target_balance");
    if let (Some(initial), Some(target)) = (initial, target) {
        // A growth target over a non-positive base is meaningless, so the
        // relation requires a positive initial balance as well.
        if !(initial > 0.0 && target > initial) {
            errors.push(format!(
                "capital_management.target_balance ({target}) must exceed a positive initial_balance ({initial})"
            ));
        }
    }

    let daily = number_at(doc, "capital_management.max_daily_loss_pct");
    let weekly = number_at(doc, "capital_management.max_weekly_loss_pct");
    if let (Some(daily), Some(weekly)) = (daily, weekly) {
        if weekly <= daily {
            errors.push(format!(
                "capital_management.max_weekly_loss_pct ({weekly}) must exceed max_daily_loss_pct ({daily})"
            ));
        }
    }

    let drawdown = number_at(doc, "capital_management.max_drawdown_pct");
    if let (Some(weekly), Some(drawdown)) = (weekly, drawdown) {
        if drawdown <= weekly {
            errors.push(format!(
                "capital_management.max_drawdown_pct ({drawdown}) must exceed max_weekly_loss_pct ({weekly})"
            ));
        }
    }

    let leverage = number_at(doc, "capital_management.max_leverage");
    let risk = number_at(doc, "capital_management.max_risk_per_trade");
    if let (Some(leverage), Some(risk)) = (leverage, risk) {
        if leverage > 5.0 && risk > 2.0 {
            errors.push(format!(
                "leverage above 5x requires max_risk_per_trade of at most 2 percent (got {risk})"
            ));
        }
    }
}

fn check_policy(doc: &Document, errors: &mut Vec<String>) {
    let risk = number_at(doc, "capital_management.max_risk_per_trade");
    let confidence = number_at(doc, "capital_management.min_confidence_pct");

    if string_at(doc, "bot_settings.trading_mode") == Some("conservative") {
        if let Some(risk) = risk {
            if risk > 2.0 {
                errors.push(format!(
                    "conservative mode caps max_risk_per_trade at 2 percent (got {risk})"
                ));
            }
        }
        match confidence {
            Some(c) if c >= 75.0 => {}
            Some(c) => errors.push(format!(
                "conservative mode requires min_confidence_pct of at least 75 (got {c})"
            )),
            None => errors.push(
                "conservative mode requires min_confidence_pct of at least 75".into(),
            ),
        }
    }

    if string_at(doc, "bot_settings.environment") == Some("live") {
        for feature in ["risk_management", "stop_on_drawdown"] {
            let enabled = doc
                .get_path(&format!("bot_settings.features.{feature}"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if !enabled {
                errors.push(format!(
                    "live environment requires bot_settings.features.{feature} to be enabled"
                ));
            }
        }

        if let Some(risk) = risk {
            if risk > 2.0 {
                errors.push(format!(
                    "live environment caps max_risk_per_trade at 2 percent (got {risk})"
                ));
            }
        }
        if let Some(daily) = number_at(doc, "capital_management.max_daily_loss_pct") {
            if daily > 5.0 {
                errors.push(format!(
                    "live environment caps max_daily_loss_pct at 5 percent (got {daily})"
                ));
            }
        }
        match confidence {
            Some(c) if c >= 70.0 => {}
            Some(c) => errors.push(format!(
                "live environment requires min_confidence_pct of at least 70 (got {c})"
            )),
            None => errors.push(
                "live environment requires min_confidence_pct of at least 70".into(),
            ),
        }
    }
}

fn check_reserved_name(doc: &Document, errors: &mut Vec<String>) {
    if let Some(name) = string_at(doc, "bot_settings.name") {
        let lower = name.to_ascii_lowercase();
        if RESERVED_BOT_NAMES.contains(&lower.as_str()) {
            errors.push(format!("bot_settings.name '{name}' is a reserved identifier"));
        }
    }
}

fn collect_warnings(doc: &Document, warnings: &mut Vec<String>) {
    if let Some(risk) = number_at(doc, "capital_management.max_risk_per_trade") {
        if risk > 5.0 {
            warnings.push(format!(
                "max_risk_per_trade of {risk} percent is aggressive for any trading mode"
            ));
        }
    }

    let auto_trading = doc
        .get_path("bot_settings.features.auto_trading")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let risk_management = doc
        .get_path("bot_settings.features.risk_management")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if auto_trading && !risk_management {
        warnings.push("auto_trading is enabled without risk_management".into());
    }
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// Fetch a numeric field, recording presence/type errors.
///
/// Returns the value so the caller can apply its range rule; returns
/// `None` (after recording the error) when the field is absent but
/// required, or present with a non-numeric type.  Section-level absence
/// is reported once by the section check, not per field.
fn numeric_field(
    doc: &Document,
    path: &str,
    required: bool,
    errors: &mut Vec<String>,
) -> Option<f64> {
    match doc.get_path(path) {
        Some(value) => match value.as_f64() {
            Some(v) => Some(v),
            None => {
                errors.push(format!("{path} must be a number, got {}", type_name(value)));
                None
            }
        },
        None => {
            let section_present = path
                .split('.')
                .next()
                .and_then(|s| doc.get(s))
                .is_some_and(Value::is_object);
            if required && section_present {
                errors.push(format!("{path} is required"));
            }
            None
        }
    }
}

fn number_at(doc: &Document, path: &str) -> Option<f64> {
    doc.get_path(path).and_then(Value::as_f64)
}

fn string_at<'d>(doc: &'d Document, path: &str) -> Option<&'d str> {
    doc.get_path(path).and_then(Value::as_str)
}
