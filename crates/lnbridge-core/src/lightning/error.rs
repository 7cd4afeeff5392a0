use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteError {
    pub code: i64,
    pub message: String,
}

impl RemoteError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        RemoteError {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LightningError {
    #[error("lightning node unavailable: {0}")]
    NodeUnavailable(String),
    #[error("authentication error: {0}")]
    AuthError(String),
    #[error("remote error: {0}")]
    Remote(RemoteError),
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("stream error: {0}")]
    StreamError(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("invalid payment request: {0}")]
    InvalidPaymentRequest(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("decode error: {0}")]
    Decode(String),
}
