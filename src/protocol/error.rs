//! Protocol error types

/// Error decoding or encoding an envelope
#[derive(Debug)]
pub enum ProtocolError {
    /// Envelope or payload is not valid JSON of the expected shape
    Json(serde_json::Error),
    /// Event name is not one we handle
    UnknownEvent(String),
    /// Event requires a `data` payload but none was sent
    MissingData(&'static str),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::Json(e) => write!(f, "Invalid JSON: {}", e),
            ProtocolError::UnknownEvent(name) => write!(f, "Unknown event: {}", name),
            ProtocolError::MissingData(name) => write!(f, "Missing data for event: {}", name),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Json(err)
    }
}
