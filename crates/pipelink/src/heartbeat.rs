use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// The conventional liveness payload the manager expects at a regular
/// cadence. The channel itself never generates this; it is an ordinary
/// opaque message supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Heartbeat {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub seq: u64,
    pub timestamp_ms: u64,
}

impl Heartbeat {
    pub fn new(seq: u64) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            msg_type: "heartbeat".to_string(),
            seq,
            timestamp_ms,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }
}
