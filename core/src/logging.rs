//! Structured diagnostics shared by every component.
//!
//! Components never print; they receive an [`EventSink`] and record coded
//! events through [`log_event`]. [`EventLog`] forwards each event to the `log`
//! facade and keeps the most recent ones in memory for the UI debugger.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub id: String,
    pub ts: i64,
    pub level: Level,
    pub code: Option<String>,
    pub module: String,
    pub message: String,
    pub explain: Option<String>,
    pub data: Option<Value>,
}

/// Destination for structured events.
pub trait EventSink: Send + Sync {
    fn record(&self, event: LogEvent);
}

pub fn log_event(
    sink: &dyn EventSink,
    level: Level,
    code: Option<&str>,
    module: &str,
    message: &str,
    explain: Option<&str>,
    data: Option<Value>,
) {
    sink.record(LogEvent {
        id: Uuid::new_v4().to_string(),
        ts: OffsetDateTime::now_utc().unix_timestamp(),
        level,
        code: code.map(str::to_string),
        module: module.to_string(),
        message: message.to_string(),
        explain: explain.map(str::to_string),
        data,
    });
}

const DEFAULT_CAPACITY: usize = 256;

pub struct EventLog {
    capacity: usize,
    events: Mutex<VecDeque<LogEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// Newest first, at most `limit` entries.
    pub fn recent(&self, limit: usize) -> Vec<LogEvent> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.iter().rev().take(limit).cloned().collect()
    }

    /// Events whose code matches, oldest first.
    pub fn with_code(&self, code: &str) -> Vec<LogEvent> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events
            .iter()
            .filter(|e| e.code.as_deref() == Some(code))
            .cloned()
            .collect()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventLog {
    fn record(&self, event: LogEvent) {
        let level = match event.level {
            Level::Debug => log::Level::Debug,
            Level::Info => log::Level::Info,
            Level::Warn => log::Level::Warn,
            Level::Error => log::Level::Error,
        };
        match &event.data {
            Some(data) => log::log!(
                target: event.module.as_str(),
                level,
                "[{}] {} {}",
                event.code.as_deref().unwrap_or("-"),
                event.message,
                data
            ),
            None => log::log!(
                target: event.module.as_str(),
                level,
                "[{}] {}",
                event.code.as_deref().unwrap_or("-"),
                event.message
            ),
        }

        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }
}
