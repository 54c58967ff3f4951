//! Visitor protocol for messages streamed out of a running module.

use serde::Serialize;

/// Severity of a log line emitted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    InputError,
    Notice,
    Warning,
    Error,
}

impl MessageType {
    /// Decodes the engine's severity code.
    ///
    /// # Panics
    ///
    /// Panics on a code outside `0..=3`. The engine never produces one, so
    /// seeing it means the two sides disagree about the protocol.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::InputError,
            1 => Self::Notice,
            2 => Self::Warning,
            3 => Self::Error,
            other => unreachable!("unknown SSC message severity {other}"),
        }
    }

    /// Whether a message of this severity means the run must not be trusted.
    pub fn is_error(self) -> bool {
        !matches!(self, Self::Warning)
    }
}

/// Receives log lines and progress ticks while a module executes.
///
/// Both methods are called on the executing thread, re-entrantly from inside
/// the engine. Returning `false` asks the engine to abort the run.
pub trait ExecutionHandler {
    fn handle_log_message(&mut self, kind: MessageType, time: f32, text: &str) -> bool;
    fn handle_progress_update(&mut self, percent: f32, time: f32, text: &str) -> bool;
}

/// One log line, as returned to API callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogMessage {
    pub severity: MessageType,
    pub time: f32,
    pub text: String,
}

/// Buckets log messages into errors and warnings.
///
/// Notice, Error and InputError all count as errors. Progress ticks are
/// ignored. Never aborts the run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageCollector {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl MessageCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl ExecutionHandler for MessageCollector {
    fn handle_log_message(&mut self, kind: MessageType, _time: f32, text: &str) -> bool {
        if kind.is_error() {
            self.errors.push(text.to_string());
        } else {
            self.warnings.push(text.to_string());
        }
        true
    }

    fn handle_progress_update(&mut self, _percent: f32, _time: f32, _text: &str) -> bool {
        true
    }
}

/// Keeps every log line verbatim, in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageRecorder {
    pub messages: Vec<LogMessage>,
}

impl MessageRecorder {
    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|m| m.severity.is_error())
    }
}

impl ExecutionHandler for MessageRecorder {
    fn handle_log_message(&mut self, kind: MessageType, time: f32, text: &str) -> bool {
        self.messages.push(LogMessage {
            severity: kind,
            time,
            text: text.to_string(),
        });
        true
    }

    fn handle_progress_update(&mut self, _percent: f32, _time: f32, _text: &str) -> bool {
        true
    }
}
