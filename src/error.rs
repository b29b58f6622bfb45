//! Error taxonomy of the propagation engine.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("unknown material {id:?}")]
    UnknownMaterial { id: String },

    #[error("{what} at ({x}, {y}) lies outside the {width} x {height} m layout")]
    OutOfBounds {
        what: &'static str,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },

    #[error("invalid geometry: {reason}")]
    InvalidGeometry { reason: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("dataset generation was cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
