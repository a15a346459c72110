//! Chat history for one interactive session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user-query")]
    UserQuery,
    #[serde(rename = "sensor-data")]
    SensorData,
    #[serde(rename = "bot-response")]
    Bot,
}

impl Role {
    /// Label shown next to the turn in transcripts and exports.
    pub fn label(&self) -> &'static str {
        match self {
            Role::UserQuery => "User Query",
            Role::SensorData => "Sensor Data",
            Role::Bot => "Bot",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One entry in the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

/// Ordered, append-only transcript scoped to one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatHistory {
    turns: Vec<ChatTurn>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one completed exchange: the query (if any), the sensor block (if any), then
    /// the answer.
    pub fn record_exchange(&mut self, query: Option<&str>, sensor: Option<&str>, answer: &str) {
        if let Some(query) = query {
            self.turns.push(ChatTurn::new(Role::UserQuery, query));
        }
        if let Some(sensor) = sensor {
            self.turns.push(ChatTurn::new(Role::SensorData, sensor));
        }
        self.turns.push(ChatTurn::new(Role::Bot, answer));
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }
}
