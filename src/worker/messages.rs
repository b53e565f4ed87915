//! Page-to-worker messages.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShowroomError};

/// A message posted by a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Activate a waiting worker now.
    SkipWaiting,
    /// Ask for the number of entries in the current store.
    GetCacheSize,
}

impl WorkerMessage {
    /// Decode a JSON message.
    ///
    /// # Errors
    /// Returns [`ShowroomError::InvalidRequest`] for malformed JSON or an
    /// unknown `type`.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw)
            .map_err(|e| ShowroomError::InvalidRequest(format!("worker message: {e}")))
    }
}

/// Reply sent back on the message port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerReply {
    CacheSize { size: usize },
}
