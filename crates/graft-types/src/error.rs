use thiserror::Error;

/// Errors produced while decoding wire envelopes, versions, and records.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("missing write timestamp '@'")]
    MissingTimestamp,

    #[error("invalid path value: {0}")]
    InvalidPath(String),

    #[error("invalid version: {0}")]
    InvalidVersion(String),

    #[error("unrecognized envelope shape: keys {0:?}")]
    UnknownShape(Vec<String>),

    #[error("payload is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),
}

pub type CodecResult<T> = Result<T, CodecError>;
