// Phase-space weights: the massless normalization W0(N, cme), its process-wide
// memoization, and the massive correction factor.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::Mutex;

use crate::four_momentum::FourMomentum;

// Process-wide memoization of W0. Read-mostly; a key always maps to the same
// value, so concurrent re-insertion is benign.
static WEIGHT_CACHE: Lazy<Mutex<WeightCache>> = Lazy::new(|| Mutex::new(WeightCache::new()));

/// Memoization table for the massless weight normalization, keyed by
/// (particle count, cme bits).
///
/// A process-wide instance is exposed via [`WeightCache::global`]; tests that
/// need isolation construct their own with [`WeightCache::new`].
#[derive(Debug, Default)]
pub struct WeightCache {
    table: HashMap<(usize, u64), f64>,
}

impl WeightCache {
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// Get the process-wide cache instance.
    pub fn global() -> std::sync::MutexGuard<'static, Self> {
        WEIGHT_CACHE
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fetch W0(n, cme), computing and memoizing it on first use.
    pub fn massless_weight(&mut self, n: usize, cme: f64) -> f64 {
        *self
            .table
            .entry((n, cme.to_bits()))
            .or_insert_with(|| massless_weight(n, cme))
    }

    /// Drop all memoized entries (test isolation).
    pub fn clear(&mut self) {
        self.table.clear();
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// The massless N-body phase-space volume under the Lorentz-invariant
/// measure prod_i d^3p_i / ((2pi)^3 2E_i) * (2pi)^4 delta^4(sum P - P_tot):
///
///   W0 = (pi/2)^(N-1) * cme^(2N-4) / ((N-1)! (N-2)!) * (2pi)^(4-3N)
///
/// RAMBO samples the massless phase space uniformly, so each massless event
/// carries exactly this constant weight. Evaluated in log space so large N
/// neither overflows nor loses the factorials to rounding.
pub fn massless_weight(n: usize, cme: f64) -> f64 {
    assert!(n >= 2, "need at least two final-state particles");
    let nf = n as f64;
    let ln_w0 = (nf - 1.0) * (PI / 2.0).ln() + (2.0 * nf - 4.0) * cme.ln()
        - ln_gamma(nf)
        - ln_gamma(nf - 1.0)
        + (4.0 - 3.0 * nf) * (2.0 * PI).ln();
    ln_w0.exp()
}

/// Correction to W0 for massive final states, evaluated on the on-shell
/// momenta produced by the mass rescaling:
///
///   (sum_i |p_i| / cme)^(2N-3) * prod_i (|p_i| / E_i)
///       * cme / sum_i (|p_i|^2 / E_i)
///
/// The first factor equals xi^(2N-3) since the pre-rescaling energies summed
/// to cme.
pub fn mass_correction(momenta: &[FourMomentum], cme: f64) -> f64 {
    let n = momenta.len();
    let mut modulus_sum = 0.0;
    let mut jacobian_denom = 0.0;
    let mut modulus_product = 1.0;
    for q in momenta {
        let p = q.modulus();
        modulus_sum += p;
        jacobian_denom += p * p / q.energy();
        modulus_product *= p / q.energy();
    }
    (modulus_sum / cme).powi(2 * n as i32 - 3) * modulus_product * cme / jacobian_denom
}

/// ln Gamma(x) for x > 0 via the Lanczos approximation (g = 7, 9 terms).
pub(crate) fn ln_gamma(x: f64) -> f64 {
    const COEFFICIENTS: [f64; 9] = [
        0.99999999999980993,
        676.5203681218851,
        -1259.1392167224028,
        771.32342877765313,
        -176.61502916214059,
        12.507343278686905,
        -0.13857109526572012,
        9.9843695780195716e-6,
        1.5056327351493116e-7,
    ];

    let z = x - 1.0;
    let mut series = COEFFICIENTS[0];
    for (i, &c) in COEFFICIENTS.iter().enumerate().skip(1) {
        series += c / (z + i as f64);
    }
    let t = z + 7.5;
    0.5 * (2.0 * PI).ln() + (z + 0.5) * t.ln() - t + series.ln()
}
