//! Error types and result alias for the crate.
//!
//! This module defines [`enum@crate::error::Error`] and the crate-wide [Result] alias. Variants cover
//! invalid configuration, malformed baked fields, shared mesh pool bookkeeping mistakes,
//! queries against a scene that is mid-rebuild, and generic errors.
use thiserror::Error;

use crate::scene::pool::MeshAssetId;

pub type Result<T> = std::result::Result<T, Error>;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid baked field: {0}")]
    InvalidField(String),

    /// A release was requested for an asset the pool holds no references to.
    /// This always means register/deregister calls got out of step.
    #[error("reference count underflow for mesh asset {asset}")]
    RefCountUnderflow { asset: MeshAssetId },

    #[error("scene is not ready; run a tick or request an update first")]
    NotReady,

    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Other(value)
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error::Other(value.to_owned())
    }
}
