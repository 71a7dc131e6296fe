//! Relativistic N-body phase-space Monte Carlo generation.
//!
//! The generator follows the RAMBO construction: sample massless four-momenta
//! isotropically with c * exp(-c) energies, boost and rescale them so they sum
//! exactly to the requested center-of-mass energy, and (for massive final
//! states) solve for the single scalar that puts every particle on shell while
//! preserving the total energy. Each event carries the Lorentz-invariant
//! phase-space weight, optionally reweighted by a caller-supplied squared
//! matrix element, so weighted averages over batches estimate phase-space
//! integrals and binned observables.

mod errors;
mod event;
mod fast_rng;
mod four_momentum;
mod generator;
mod histogram;
mod matrix_element;
mod rescale;
mod sampler;
mod stats;
mod weight;

pub use errors::{Error, Result};
pub use event::Event;
pub use fast_rng::FastRng;
pub use four_momentum::FourMomentum;
pub use generator::{
    generate_batch, generate_event, generate_histogram, BatchDiagnostics, BatchResult, Estimate,
    HistogramResult, Observable, PhaseSpace,
};
pub use histogram::Histogram;
pub use matrix_element::identity;
pub use rescale::{MassSolution, SolverSettings};
pub use weight::{massless_weight, WeightCache};
