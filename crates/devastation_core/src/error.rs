//! # Simulation Error Types
//!
//! All errors that can occur inside the simulation. Tick bodies return
//! [`DevastationResult`]; the engines catch and log these per entity so a
//! single bad source, chunk or ward never halts the step.

use devastation_world::GridFault;
use thiserror::Error;

/// Errors that can occur in the devastation simulation.
#[derive(Error, Debug)]
pub enum DevastationError {
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem access failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted state or configuration could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A persisted blob failed to decompress.
    #[error("compression error: {0}")]
    Compression(String),

    /// The host grid refused a read or write.
    #[error("grid fault: {0}")]
    Grid(#[from] GridFault),

    /// A rule names a block the registry does not know.
    #[error("unknown block: {0}")]
    UnknownBlock(String),
}

impl From<serde_json::Error> for DevastationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for DevastationError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<lz4_flex::block::DecompressError> for DevastationError {
    fn from(err: lz4_flex::block::DecompressError) -> Self {
        Self::Compression(err.to_string())
    }
}

/// Result type for simulation operations.
pub type DevastationResult<T> = Result<T, DevastationError>;
