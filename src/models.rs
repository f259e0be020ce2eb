use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Instruction consumed by the sequence controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Terminate,
}

/// State written to every fixture in one go.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixtureCommand {
    pub on: bool,
    pub brightness: u8,
    pub x: f64,
    pub y: f64,
}

impl FixtureCommand {
    pub fn off() -> Self {
        Self {
            on: false,
            brightness: 0,
            x: 0.0,
            y: 0.0,
        }
    }
}

/// Observed state of a single fixture.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureState {
    pub id: String,
    pub on: bool,
    pub brightness: u8,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Completed,
    Stopped,
    Overridden,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SequenceStatus {
    Idle {
        last_end: Option<EndReason>,
    },
    Running {
        started_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        percent: f64,
    },
}

impl Default for SequenceStatus {
    fn default() -> Self {
        SequenceStatus::Idle { last_end: None }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    Status(SequenceStatus),
}
