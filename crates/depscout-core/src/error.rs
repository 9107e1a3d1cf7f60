use thiserror::Error;

use crate::registry::TransportError;

#[derive(Error, Debug)]
pub enum Error {
    // Registry errors
    #[error("package not found: {name}")]
    PackageNotFound { name: String },

    #[error("network error: {0}")]
    Transport(String),

    #[error("failed to decode remote payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("authentication rejected by remote")]
    Auth,

    // Range errors surface when parsing caller-supplied configuration;
    // matching itself never propagates them.
    #[error("invalid version range: {0}")]
    Range(#[from] depscout_semver::RangeError),
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::NotFound(name) => Error::PackageNotFound { name },
            TransportError::Auth(_) => Error::Auth,
            other => Error::Transport(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
