use thiserror::Error;

/// Taxonomy shared by every protocol crate. Library code returns this;
/// the daemon's composition root widens failures into `anyhow::Result`.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("timeout")]
    Timeout,

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("auth error: {0}")]
    AuthError(String),

    #[error("transport closed")]
    TransportClosed,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for HubError {
    fn from(e: serde_json::Error) -> Self {
        HubError::ParseError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HubError>;
