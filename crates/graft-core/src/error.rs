use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraftError {
    /// A scalar, `null`, or link was put at the root or a top-level key.
    #[error("cannot put a non-object value at '{path}'")]
    InvalidRootWrite { path: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("codec error: {0}")]
    Codec(#[from] graft_types::CodecError),

    #[error("store error: {0}")]
    Store(#[from] graft_store::StoreError),

    #[error("network error: {0}")]
    Net(#[from] graft_net::NetError),
}

pub type GraftResult<T> = Result<T, GraftError>;
