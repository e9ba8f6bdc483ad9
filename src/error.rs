//! Error types shared by the library modules.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure is fatal for the run. The first group are precondition
/// violations on local data, the second are remote failures.
#[derive(Error, Debug)]
pub enum Error {
    /// An expected mask file is absent on disk
    #[error("{} does not exist", .0.display())]
    MissingMask(PathBuf),

    /// A well has no image for the requested field
    #[error("Well {well} has no image for field {field}")]
    MissingImage { well: String, field: usize },

    /// A plate name does not carry the corrected-plate suffix
    #[error("Plate {name} does not end with {suffix}")]
    UnexpectedPlateName { name: String, suffix: String },

    #[error("Screen not found: {0}")]
    ScreenNotFound(String),

    #[error("Login failed: {0}")]
    Auth(String),

    /// The gateway answered with a non-success status
    #[error("{operation} failed: {status} - {body}")]
    Api {
        operation: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    /// The exchange with the gateway could not be carried out as expected
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
