use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum RepostError {
    #[error("Fetch error: {0}")]
    FetchError(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Frame sampling error: {0}")]
    FrameSample(String),

    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("Message source error: {0}")]
    Source(String),

    #[error("Timed out after {secs}s: {what}")]
    Timeout { what: String, secs: u64 },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RepostError>;
