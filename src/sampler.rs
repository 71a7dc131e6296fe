// Massless RAMBO sampling: isotropic four-momenta with c*exp(-c) energies,
// then a boost-and-rescale that puts the set exactly at the requested total
// energy-momentum.

use crate::four_momentum::FourMomentum;
use crate::stats;
use rand::Rng;

/// Draw `n` independent massless four-momenta, isotropic in direction with
/// energies distributed as c * exp(-c).
pub fn sample_massless<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<FourMomentum> {
    (0..n)
        .map(|_| {
            let direction = stats::sample_isotropic_direction(rng);
            let c = stats::sample_massless_energy(rng);
            FourMomentum::from_parts(c, c * direction)
        })
        .collect()
}

/// Boost the massless set into the rest frame of its own total momentum and
/// rescale so the four-momenta sum to exactly (cme, 0, 0, 0).
///
/// Always applied; the total momentum of two or more physical massless
/// samples is timelike, so the boost is well defined.
pub fn correct_frame(momenta: &mut [FourMomentum], cme: f64) {
    let total: FourMomentum = momenta.iter().copied().sum();
    let invariant_mass = total.mass();
    debug_assert!(
        invariant_mass > 0.0,
        "null total momentum in massless sample"
    );

    // b = gamma * beta of the boost into the rest frame of `total`.
    let b = -total.momentum() / invariant_mass;
    let gamma = total.energy() / invariant_mass;
    let x = cme / invariant_mass;

    for q in momenta.iter_mut() {
        *q = q.boost(b, gamma).scale(x);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sample_massless_is_massless() {
        let mut rng = StdRng::seed_from_u64(1);
        let momenta = sample_massless(4, &mut rng);

        assert_eq!(momenta.len(), 4);
        for q in &momenta {
            assert!(q.energy() > 0.0);
            // E = |p| for a massless momentum
            assert!((q.energy() - q.modulus()).abs() < 1e-12 * q.energy());
        }
    }

    #[test]
    fn test_correct_frame_conserves_total() {
        let mut rng = StdRng::seed_from_u64(2);
        let cme = 1000.0;

        for n in 2..=5 {
            let mut momenta = sample_massless(n, &mut rng);
            correct_frame(&mut momenta, cme);

            let total: FourMomentum = momenta.iter().copied().sum();
            assert!((total.energy() - cme).abs() < 1e-8 * cme);
            assert!(total.modulus() < 1e-8 * cme);
        }
    }

    #[test]
    fn test_correct_frame_keeps_momenta_massless() {
        let mut rng = StdRng::seed_from_u64(3);
        let cme = 500.0;

        let mut momenta = sample_massless(3, &mut rng);
        correct_frame(&mut momenta, cme);

        for q in &momenta {
            assert!(q.mass_squared().abs() < 1e-8 * cme * cme);
        }
    }

    #[test]
    fn test_two_body_back_to_back() {
        // With N = 2 the corrected momenta are exactly back to back with
        // energy cme / 2 each.
        let mut rng = StdRng::seed_from_u64(4);
        let cme = 1000.0;

        for _ in 0..50 {
            let mut momenta = sample_massless(2, &mut rng);
            correct_frame(&mut momenta, cme);

            assert!((momenta[0].energy() - 500.0).abs() < 1e-8 * cme);
            assert!((momenta[1].energy() - 500.0).abs() < 1e-8 * cme);
            let opposed = momenta[0].momentum() + momenta[1].momentum();
            assert!(opposed.norm() < 1e-8 * cme);
        }
    }
}
