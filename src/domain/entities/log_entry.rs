use serde::{Deserialize, Serialize};

use crate::domain::events::{LogEvent, LogLevel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    #[serde(rename = "msg")]
    pub message: String,
    pub source: String,
    pub timestamp: String,
}

impl From<LogEvent> for LogEntry {
    fn from(event: LogEvent) -> Self {
        Self {
            level: event.level,
            message: event.msg,
            source: event.source,
            timestamp: event.timestamp,
        }
    }
}
