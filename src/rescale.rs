// Newton-Raphson solve for the scalar that puts massless RAMBO momenta on
// shell while preserving the total energy.

use crate::errors::{Error, Result};
use crate::four_momentum::FourMomentum;

/// Tolerance and iteration cap for the mass-rescaling solve. Callers that
/// hit `NumericalNonConvergence` can retry with looser settings.
#[derive(Debug, Clone, Copy)]
pub struct SolverSettings {
    /// Convergence threshold on |f(xi)| relative to the center-of-mass energy.
    pub tolerance: f64,
    /// Hard cap on Newton iterations.
    pub max_iterations: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 50,
        }
    }
}

/// Outcome of a converged mass-rescaling solve.
#[derive(Debug, Clone, Copy)]
pub struct MassSolution {
    /// The momentum rescaling factor xi in (0, 1].
    pub xi: f64,
    /// Newton iterations consumed.
    pub iterations: usize,
}

/// Rescale massless momenta onto their mass shells.
///
/// Finds xi such that sum_i sqrt(xi^2 E_i^2 + m_i^2) = cme, then replaces
/// each momentum by (k_i, xi * p_i). The momenta must be the output of the
/// frame correction (energies summing to cme) and the caller must have
/// checked sum(masses) < cme.
pub fn rescale_to_masses(
    momenta: &mut [FourMomentum],
    masses: &[f64],
    cme: f64,
    settings: &SolverSettings,
) -> Result<MassSolution> {
    let mass_sum: f64 = masses.iter().sum();
    let mut xi = (1.0 - (mass_sum / cme).powi(2)).sqrt();

    let mut residual = f64::INFINITY;
    for iteration in 0..settings.max_iterations {
        // f(xi) = sum_i sqrt(xi^2 E_i^2 + m_i^2) - cme and its derivative
        let mut f = -cme;
        let mut df = 0.0;
        for (q, &m) in momenta.iter().zip(masses) {
            let e = q.energy();
            let k = (xi * xi * e * e + m * m).sqrt();
            f += k;
            df += xi * e * e / k;
        }
        residual = f.abs();

        if residual < settings.tolerance * cme {
            log::debug!(
                "mass rescaling converged: xi = {}, {} iterations, residual = {:e}",
                xi,
                iteration,
                residual
            );
            for (q, &m) in momenta.iter_mut().zip(masses) {
                let e = q.energy();
                let k = (xi * xi * e * e + m * m).sqrt();
                *q = FourMomentum::from_parts(k, xi * q.momentum());
            }
            return Ok(MassSolution {
                xi,
                iterations: iteration,
            });
        }

        xi -= f / df;
        if !(xi > 0.0) {
            // Newton stepped out of the physical branch
            break;
        }
    }

    log::warn!(
        "mass rescaling failed to converge after {} iterations (residual {:e})",
        settings.max_iterations,
        residual
    );
    Err(Error::NumericalNonConvergence {
        iterations: settings.max_iterations,
        residual,
    })
}
