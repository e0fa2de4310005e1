//! Diagnostics sink for stack operations.
//!
//! Stacks report progress through a [`Diagnostics`] implementation carried
//! by their region instead of a global logger.

use std::sync::{Arc, Mutex, PoisonError};

/// Severity of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Fatal,
}

/// Receiver of diagnostic messages.
pub trait Diagnostics: Send + Sync {
    /// Record a message at a level.
    fn emit(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.emit(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.emit(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.emit(Level::Warn, message);
    }

    fn fatal(&self, message: &str) {
        self.emit(Level::Fatal, message);
    }
}

/// Forwards to the `log` facade. Fatal maps to `error!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn emit(&self, level: Level, message: &str) {
        match level {
            Level::Debug => log::debug!("{message}"),
            Level::Info => log::info!("{message}"),
            Level::Warn => log::warn!("{message}"),
            Level::Fatal => log::error!("{message}"),
        }
    }
}

/// Drops every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiagnostics;

impl Diagnostics for NoDiagnostics {
    fn emit(&self, _level: Level, _message: &str) {}
}

/// Records messages in memory (useful for testing).
#[derive(Debug, Clone, Default)]
pub struct MemoryDiagnostics {
    messages: Arc<Mutex<Vec<(Level, String)>>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded messages, oldest first.
    pub fn messages(&self) -> Vec<(Level, String)> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded messages at one level.
    pub fn at(&self, level: Level) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }
}

impl Diagnostics for MemoryDiagnostics {
    fn emit(&self, level: Level, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, message.to_string()));
    }
}
