//! JSON frames exchanged over the realtime channel.

use serde::{Deserialize, Serialize};

/// Frame tag carried by remote key commands.
pub const KEY_CODE_TYPE: &str = "keyCode";

/// Control frame sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl OutboundMessage {
    /// `{"type":"command","command":"<name>"}`
    #[must_use]
    pub fn command(name: &str) -> Self {
        Self {
            kind: "command".to_string(),
            command: Some(name.to_string()),
            data: None,
        }
    }

    /// Liveness ping sent right after connecting.
    #[must_use]
    pub fn ping() -> Self {
        Self::command("ping")
    }
}

/// Frame pushed by the service.
///
/// Missing fields decode as empty strings and fail validation later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InboundCommand {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "keyCode")]
    pub key_code: String,
    #[serde(rename = "userId")]
    pub target_user_id: String,
}
