use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::Duration;

/// Oldest envelopes are dropped once the in-memory buffer holds this many
pub const MAX_BUFFERED_ENVELOPES: usize = 1000;

#[derive(Serialize, Deserialize, Clone)]
struct ErrorEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    timestamp: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<serde_json::Value>,
}

#[derive(Serialize, Deserialize, Clone)]
struct MessageEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    timestamp: String,
    message: String,
    level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<serde_json::Value>,
}

#[derive(Serialize, Deserialize, Clone)]
struct PerformanceEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    timestamp: String,
    operation: String,
    duration_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<HashMap<String, String>>,
}

#[derive(Clone)]
enum LogEnvelope {
    Error(ErrorEnvelope),
    Performance(PerformanceEnvelope),
    Message(MessageEnvelope),
}

impl LogEnvelope {
    fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            LogEnvelope::Error(e) => serde_json::to_value(e).ok(),
            LogEnvelope::Performance(p) => serde_json::to_value(p).ok(),
            LogEnvelope::Message(m) => serde_json::to_value(m).ok(),
        }
    }
}

enum LogMode {
    Buffered(VecDeque<LogEnvelope>),
    Disk(PathBuf),
}

struct ObservabilityInner {
    mode: LogMode,
}

static OBSERVABILITY: OnceLock<Mutex<ObservabilityInner>> = OnceLock::new();

fn get_observability() -> MutexGuard<'static, ObservabilityInner> {
    let lock = OBSERVABILITY.get_or_init(|| {
        Mutex::new(ObservabilityInner {
            mode: LogMode::Buffered(VecDeque::new()),
        })
    });
    // A panic while logging must not take logging down with it
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Switch to writing `<dir>/<pid>.log` and flush anything buffered so far.
/// Later calls are ignored once a log file is set.
pub fn set_log_dir(dir: &Path) {
    let log_path = dir.join(format!("{}.log", std::process::id()));

    let mut obs = get_observability();

    let buffered_events = match &mut obs.mode {
        LogMode::Buffered(events) => std::mem::take(events),
        LogMode::Disk(_) => return,
    };

    obs.mode = LogMode::Disk(log_path.clone());
    drop(obs);

    let _ = fs::create_dir_all(dir);
    if !buffered_events.is_empty() {
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&log_path) {
            for envelope in buffered_events {
                if let Some(json) = envelope.to_json() {
                    let _ = writeln!(file, "{}", json);
                }
            }
        }
    }
}

/// Path of the active log file, if logging has been switched to disk
pub fn log_file_path() -> Option<PathBuf> {
    match &get_observability().mode {
        LogMode::Disk(path) => Some(path.clone()),
        LogMode::Buffered(_) => None,
    }
}

/// Take every buffered envelope as JSON. Empty once logging writes to disk.
pub fn drain_buffered() -> Vec<serde_json::Value> {
    let mut obs = get_observability();
    match &mut obs.mode {
        LogMode::Buffered(events) => events.drain(..).filter_map(|e| e.to_json()).collect(),
        LogMode::Disk(_) => Vec::new(),
    }
}

fn append_envelope(envelope: LogEnvelope) {
    let mut obs = get_observability();

    match &mut obs.mode {
        LogMode::Buffered(buffer) => {
            if buffer.len() >= MAX_BUFFERED_ENVELOPES {
                buffer.pop_front();
            }
            buffer.push_back(envelope);
        }
        LogMode::Disk(log_path) => {
            let log_path = log_path.clone();
            drop(obs);

            if let Some(json) = envelope.to_json() {
                if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&log_path) {
                    let _ = writeln!(file, "{}", json);
                }
            }
        }
    }
}

pub fn log_error(error: &dyn std::error::Error, context: Option<serde_json::Value>) {
    let envelope = ErrorEnvelope {
        event_type: "error".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        message: error.to_string(),
        context,
    };

    append_envelope(LogEnvelope::Error(envelope));
}

pub fn log_performance(
    operation: &str,
    duration: Duration,
    context: Option<serde_json::Value>,
    tags: Option<HashMap<String, String>>,
) {
    let envelope = PerformanceEnvelope {
        event_type: "performance".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        operation: operation.to_string(),
        duration_ms: duration.as_millis(),
        context,
        tags,
    };

    append_envelope(LogEnvelope::Performance(envelope));
}

/// Log a message (info, warning, etc.)
pub fn log_message(message: &str, level: &str, context: Option<serde_json::Value>) {
    let envelope = MessageEnvelope {
        event_type: "message".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        message: message.to_string(),
        level: level.to_string(),
        context,
    };

    append_envelope(LogEnvelope::Message(envelope));
}
