//! Append-only audit log entries attached to a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of a run event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

impl EventLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// An immutable, timestamped log entry for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub id: Uuid,
    pub run_id: Uuid,
    pub level: EventLevel,
    pub message: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl RunEvent {
    pub fn new(run_id: Uuid, level: EventLevel, message: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            level,
            message: message.into(),
            payload,
            created_at: Utc::now(),
        }
    }

    pub fn info(run_id: Uuid, message: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::new(run_id, EventLevel::Info, message, payload)
    }

    pub fn warn(run_id: Uuid, message: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::new(run_id, EventLevel::Warn, message, payload)
    }

    pub fn error(run_id: Uuid, message: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::new(run_id, EventLevel::Error, message, payload)
    }
}
