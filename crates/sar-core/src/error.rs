//! Error types for the planning engine.

use thiserror::Error;

/// Failure reported by an elevation collaborator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ElevationError {
    /// The provider could not be reached or refused the request.
    #[error("elevation provider unavailable: {0}")]
    Unavailable(String),

    /// The requested coordinate lies outside the provider's coverage.
    #[error("no elevation coverage at ({lat:.6}, {lng:.6})")]
    OutOfCoverage { lat: f64, lng: f64 },

    /// The provider answered with a non-finite elevation.
    #[error("elevation provider returned an invalid value at ({lat:.6}, {lng:.6})")]
    InvalidValue { lat: f64, lng: f64 },
}

/// Errors raised by engine operations.
///
/// Expected operational outcomes (an infeasible return path, no landing zone
/// with spare capacity) are reported as values, never as errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Polygon with fewer than three vertices or a non-finite vertex.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// Coordinate missing, non-finite or out of range.
    #[error("invalid coordinate ({lat}, {lng})")]
    InvalidCoordinate { lat: f64, lng: f64 },

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// The requested computation would exceed a configured work bound.
    #[error("{what} exceeds limit of {limit}")]
    WorkLimitExceeded { what: &'static str, limit: usize },

    #[error(transparent)]
    Elevation(#[from] ElevationError),
}

impl EngineError {
    pub(crate) fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
