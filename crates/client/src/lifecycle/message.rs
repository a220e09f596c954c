//! Control messages posted to the worker by application pages.

use serde_json::Value;

/// Recognized control commands. Anything else is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// `{ "type": "SKIP_WAITING" }`
    SkipWaiting,
    /// `{ "type": "CACHE_OFFLINE_DATA" }`
    CacheOfflineData,
}

impl ControlMessage {
    /// Recognize a message payload; `None` for unknown shapes.
    pub fn parse(payload: &Value) -> Option<Self> {
        match payload.get("type").and_then(Value::as_str)? {
            "SKIP_WAITING" => Some(Self::SkipWaiting),
            "CACHE_OFFLINE_DATA" => Some(Self::CacheOfflineData),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SkipWaiting => "SKIP_WAITING",
            Self::CacheOfflineData => "CACHE_OFFLINE_DATA",
        }
    }
}
