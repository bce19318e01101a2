// Match log for round and match outcomes
//
// Fire-and-forget async logging so room actors never wait on disk. Each
// round_over / game_over event is appended to a JSONL file together with the
// room code, the round number and a timestamp.

use log::error;
use serde::Serialize;
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::protocol::ServerEvent;

/// Represents a single match log entry
#[derive(Debug, Serialize)]
struct OutcomeEntry {
    room: String,
    round: u32,
    event: ServerEvent,
    timestamp: String,
}

/// Shared match logger state
/// Uses Arc<Mutex<File>> so every room actor can append concurrently
#[derive(Clone)]
pub struct DebugLogger {
    file: Arc<Mutex<Option<File>>>,
    enabled: bool,
}

impl DebugLogger {
    /// Creates a new logger
    /// If enabled is true, opens the log file for appending
    pub async fn new(enabled: bool, log_file_path: &str) -> Self {
        if !enabled {
            return Self::disabled();
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file_path)
            .await
        {
            Ok(file) => {
                log::info!("Match log enabled: {}", log_file_path);
                DebugLogger {
                    file: Arc::new(Mutex::new(Some(file))),
                    enabled: true,
                }
            }
            Err(e) => {
                error!("Failed to open match log '{}': {}", log_file_path, e);
                Self::disabled()
            }
        }
    }

    /// Creates a disabled logger (no-op)
    pub fn disabled() -> Self {
        DebugLogger {
            file: Arc::new(Mutex::new(None)),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Records a round or match result (fire-and-forget)
    /// Other events are ignored
    pub fn log_outcome(&self, room: &str, round: u32, event: &ServerEvent) {
        if !self.enabled || !event.is_outcome() {
            return;
        }

        let file_handle = self.file.clone();
        let entry = OutcomeEntry {
            room: room.to_string(),
            round,
            event: event.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        tokio::spawn(async move {
            Self::write_entry(file_handle, entry).await;
        });
    }

    /// Internal async function that performs the actual file write
    async fn write_entry(file_handle: Arc<Mutex<Option<File>>>, entry: OutcomeEntry) {
        let mut file_guard = file_handle.lock().await;
        let Some(file) = file_guard.as_mut() else {
            return;
        };

        match serde_json::to_string(&entry) {
            Ok(json_line) => {
                let line_with_newline = format!("{}\n", json_line);
                if let Err(e) = file.write_all(line_with_newline.as_bytes()).await {
                    error!("Failed to write match log entry: {}", e);
                } else if let Err(e) = file.flush().await {
                    error!("Failed to flush match log: {}", e);
                }
            }
            Err(e) => {
                error!("Failed to serialize match log entry: {}", e);
            }
        }
    }
}
