//! Audit records emitted by the detectors.

use serde::{Deserialize, Serialize};

use crate::actor::GuildId;

/// Which detector produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSource {
    AntiSpam,
    AntiRaid,
    AntiNuke,
}

/// How loudly a record should be surfaced to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Passive visibility, no action taken.
    Info,
    /// A consequence was applied (or attempted).
    Warning,
    /// Protective mode changes and uncontained threats.
    Alert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditField {
    pub name: String,
    pub value: String,
}

/// A log/alert record. Rendering is left to the platform layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub guild: GuildId,
    pub ts_ms: u64,
    pub source: AuditSource,
    pub severity: Severity,
    pub title: String,
    #[serde(default)]
    pub fields: Vec<AuditField>,
}

impl AuditRecord {
    pub fn new(
        guild: GuildId,
        ts_ms: u64,
        source: AuditSource,
        severity: Severity,
        title: impl Into<String>,
    ) -> Self {
        Self {
            guild,
            ts_ms,
            source,
            severity,
            title: title.into(),
            fields: Vec::new(),
        }
    }

    /// Builder: append a named field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(AuditField {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// First field called `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    /// Serialize to a single JSON line.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("AuditRecord serialization cannot fail")
    }
}
