use thiserror::Error;

/// Errors produced by phase-space generation.
#[derive(Error, Debug)]
pub enum Error {
    /// The final-state masses leave no energy for momenta. Raised before any
    /// sampling takes place; not retryable without changing the inputs.
    #[error(
        "total final-state mass {total_mass} does not fit below the center-of-mass energy {cme}"
    )]
    InsufficientEnergy { total_mass: f64, cme: f64 },

    /// The mass-rescaling Newton iteration exhausted its iteration cap.
    /// Retryable with a relaxed tolerance or a larger cap.
    #[error("mass rescaling did not converge after {iterations} iterations (residual {residual:e})")]
    NumericalNonConvergence { iterations: usize, residual: f64 },

    /// Malformed request: fewer than two final-state particles, a negative or
    /// non-finite mass, a non-positive energy, or a bad particle index.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, Error>;
