use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("peer {0} is not connected")]
    Disconnected(String),

    #[error("no peer listening at {0}")]
    UnknownPeer(String),

    #[error("inbox closed for peer {0}")]
    Closed(String),

    #[error("transport does not support {0}")]
    Unsupported(&'static str),

    #[error("transport error: {0}")]
    Transport(String),
}

pub type NetResult<T> = Result<T, NetError>;
