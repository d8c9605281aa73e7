use super::writer::SendError;

/// Failures local to one signaling session. None of them is ever reported
/// to another session.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Malformed message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Peer transport rejected the request: {0:#}")]
    Transport(#[from] anyhow::Error),

    #[error(transparent)]
    Write(#[from] SendError),
}
