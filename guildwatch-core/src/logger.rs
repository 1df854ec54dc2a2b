//! Logging abstraction for testable output.
//!
//! Detectors log through the [`Logger`] trait with a component tag
//! (`anti-spam`, `anti-raid`, `anti-nuke`, `engine`) so tests can assert on
//! exactly what each subscriber reported without touching global state.

use std::io::Write;
use std::sync::{Arc, RwLock};

/// Verbosity level for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Mode transitions and uncontained threats (always shown)
    Normal,
    /// Escalations and warnings (-v flag)
    Verbose,
    /// Window counts and stale timers (-vv flag)
    Debug,
}

impl Verbosity {
    /// Create verbosity from CLI flag count.
    pub fn from_count(count: u8) -> Self {
        match count {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    }
}

/// Trait for logging output.
pub trait Logger: Send + Sync {
    /// Log a message from `component` at the given verbosity level.
    fn log(&self, level: Verbosity, component: &str, message: &str);

    fn info(&self, component: &str, message: &str) {
        self.log(Verbosity::Normal, component, message);
    }

    fn verbose(&self, component: &str, message: &str) {
        self.log(Verbosity::Verbose, component, message);
    }

    fn debug(&self, component: &str, message: &str) {
        self.log(Verbosity::Debug, component, message);
    }
}

/// Logger that writes `[component] message` lines to stderr.
#[derive(Debug)]
pub struct StderrLogger {
    level: Verbosity,
}

impl StderrLogger {
    pub fn new(level: Verbosity) -> Self {
        Self { level }
    }
}

impl Logger for StderrLogger {
    fn log(&self, level: Verbosity, component: &str, message: &str) {
        if level <= self.level {
            let _ = writeln!(std::io::stderr(), "[{}] {}", component, message);
        }
    }
}

/// A captured log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Verbosity,
    pub component: String,
    pub message: String,
}

/// Mock logger for testing that captures every message regardless of level.
#[derive(Debug, Clone, Default)]
pub struct MockLogger {
    entries: Arc<RwLock<Vec<LogEntry>>>,
}

impl MockLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all captured log entries.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().map(|e| e.clone()).unwrap_or_default()
    }

    /// Messages logged by one component.
    pub fn messages_from(&self, component: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.component == component)
            .map(|e| e.message)
            .collect()
    }

    /// Check if any message contains the given substring.
    pub fn contains(&self, substring: &str) -> bool {
        self.entries().iter().any(|e| e.message.contains(substring))
    }

    pub fn count(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}

impl Logger for MockLogger {
    fn log(&self, level: Verbosity, component: &str, message: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.push(LogEntry {
                level,
                component: component.to_string(),
                message: message.to_string(),
            });
        }
    }
}

/// A no-op logger that discards all messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _level: Verbosity, _component: &str, _message: &str) {}
}
