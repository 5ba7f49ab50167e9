use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the simulation engine and its diagnostic writers.
///
/// Numerical degeneracy in the collision solver is not represented here: it is
/// recovered inside the engine by re-sampling the particle and only counted.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid construction or start parameters (impossible geometry,
    /// out-of-range fraction, incompatible gate options).
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid argument to a helper operation.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Numerical issue that cannot be recovered (e.g. a NaN event time).
    #[error("numerical error: {0}")]
    MathError(String),

    /// Propagated I/O errors from snapshot and totals dumps.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
