use super::messages::{MESSAGE_TYPES, WireMessage};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Default frame rate for simulation and snapshot broadcast.
pub const DEFAULT_TICK_RATE_HZ: u32 = 60;

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(String),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(t) => write!(f, "unknown message type: {t}"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a message as a JSON text frame.
pub fn encode_message(msg: &WireMessage) -> Result<String, ProtocolError> {
    let text =
        serde_json::to_string(msg).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(text.len()));
    }
    Ok(text)
}

/// Decode a JSON text frame. Unknown `type` tags are reported separately
/// from malformed payloads so receivers can log them apart.
pub fn decode_message(text: &str) -> Result<WireMessage, ProtocolError> {
    if text.trim().is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(text.len()));
    }
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::DeserializeError(e.to_string()))?;
    let Some(kind) = value.get("type").and_then(|t| t.as_str()) else {
        return Err(ProtocolError::DeserializeError(
            "missing \"type\" field".to_string(),
        ));
    };
    if !MESSAGE_TYPES.contains(&kind) {
        return Err(ProtocolError::UnknownMessageType(kind.to_string()));
    }
    serde_json::from_value(value).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}
