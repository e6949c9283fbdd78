//! Media Errors

use thiserror::Error;

use fos_ipc::IpcError;

/// Errors surfaced to callers of the playback proxy
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid media URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Delivery failures of the message transport.
///
/// These never reach proxy callers; the manager logs them and moves on.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport disconnected")]
    Disconnected,

    #[error("transport I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("wire codec: {0}")]
    Codec(#[from] IpcError),
}
