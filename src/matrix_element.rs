// Seam between the generator and physics-specific squared matrix elements.
// A matrix element is any `Fn(&[FourMomentum]) -> f64 + Sync`; the engine
// only assumes the value is nonnegative and finite.

use crate::four_momentum::FourMomentum;

/// The identity matrix element: every configuration scores 1, so event
/// weights are pure phase-space weights.
pub fn identity(_momenta: &[FourMomentum]) -> f64 {
    1.0
}

/// Combine a phase-space weight with a matrix-element value.
///
/// Returns `None` when the value is negative or non-finite; the caller zeroes
/// the event and records the rejection instead of aborting the batch.
pub fn reweight(phase_space_weight: f64, matrix_element: f64) -> Option<f64> {
    if matrix_element.is_finite() && matrix_element >= 0.0 {
        Some(phase_space_weight * matrix_element)
    } else {
        None
    }
}
