use crate::params::Mode;
use thiserror::Error;

/// Errors raised before any field is computed.
///
/// Variants fall into two groups: configuration errors (the request is
/// internally inconsistent or physically invalid) and unsupported requests
/// (the request is well formed but has no defined result). Recoverable
/// physical-constraint conditions are not errors; they are reported through
/// `log::warn!` and the computation continues with the documented fallback.
#[derive(Debug, Error)]
pub enum PsfError {
    /// Configuration: the mode needs an excitation parameter set.
    #[error("{mode:?} mode requires excitation parameters")]
    MissingExcitation { mode: Mode },

    /// Configuration: explicit pinhole positions were given without a pinhole size.
    #[error("{mode:?} mode with explicit pinhole positions requires a pinhole size")]
    MissingPinhole { mode: Mode },

    /// Configuration: a disc pinhole has a single diameter, not per-axis sizes.
    #[error("disc pinholes take a scalar diameter ({0:.3} x {1:.3} AU given)")]
    AnisotropicDisc(f64, f64),

    /// Configuration: a parameter violates its physical bounds.
    #[error("invalid optical parameters: {0}")]
    InvalidParameter(String),

    /// Configuration: grid shape or sampling is unusable.
    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    /// Unsupported request: there is no amplitude once a pinhole has been applied.
    #[error("amplitude output is undefined for a finite pinhole; request intensity instead")]
    AmplitudeWithPinhole,
}
