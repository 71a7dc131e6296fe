// Batch phase-space generation: the per-event RAMBO pipeline plus the
// parallel batch, histogram, and integration surfaces built on it.

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::event::Event;
use crate::fast_rng::FastRng;
use crate::four_momentum::FourMomentum;
use crate::histogram::Histogram;
use crate::matrix_element;
use crate::rescale::{self, SolverSettings};
use crate::sampler;
use crate::weight::{self, WeightCache};

/// Scalar observable to histogram over a batch of events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observable {
    /// Energy of the particle at this index.
    Energy(usize),
    /// Invariant mass of the pair of particles at these indices.
    InvariantMass(usize, usize),
}

/// Per-batch diagnostics. Rejected events stay in the batch with zero weight;
/// these counters say how many there were and why.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDiagnostics {
    /// Events whose matrix element returned a negative or non-finite value.
    pub n_invalid_matrix_element: usize,
    /// Events whose mass rescaling hit the iteration cap.
    pub n_nonconverged: usize,
}

impl BatchDiagnostics {
    pub fn n_rejected(&self) -> usize {
        self.n_invalid_matrix_element + self.n_nonconverged
    }
}

/// A generated batch: one event per requested index, rejections included
/// (flagged invalid with zero weight) so results are index-aligned and
/// deterministic under a fixed seed.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub events: Vec<Event>,
    pub diagnostics: BatchDiagnostics,
}

/// A histogram estimated from a batch, with the batch diagnostics.
#[derive(Debug, Clone)]
pub struct HistogramResult {
    pub histogram: Histogram,
    pub diagnostics: BatchDiagnostics,
}

/// A Monte Carlo estimate of a phase-space integral: the weighted sample
/// mean and its standard error stddev(weight) / sqrt(n).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Estimate {
    pub value: f64,
    pub error: f64,
}

/// A phase-space generation request: final-state masses, center-of-mass
/// energy, master seed, and solver settings. Immutable once built; every
/// generation call derives its randomness from the seed and the event index.
#[derive(Debug, Clone)]
pub struct PhaseSpace {
    masses: Vec<f64>,
    cme: f64,
    seed: u64,
    solver: SolverSettings,
}

impl PhaseSpace {
    /// Validate the final state and build a generator for it.
    pub fn new(masses: &[f64], cme: f64) -> Result<Self> {
        if masses.len() < 2 {
            return Err(Error::InvalidInput(format!(
                "need at least two final-state particles, got {}",
                masses.len()
            )));
        }
        if let Some(&m) = masses.iter().find(|&&m| !(m >= 0.0) || !m.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "final-state masses must be finite and nonnegative, got {}",
                m
            )));
        }
        if !cme.is_finite() || cme <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "center-of-mass energy must be positive and finite, got {}",
                cme
            )));
        }
        let total_mass: f64 = masses.iter().sum();
        if total_mass >= cme {
            return Err(Error::InsufficientEnergy { total_mass, cme });
        }
        Ok(Self {
            masses: masses.to_vec(),
            cme,
            seed: 0,
            solver: SolverSettings::default(),
        })
    }

    /// Set the master seed for batch generation.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Override the mass-rescaling solver settings, e.g. to retry a
    /// non-converged call with a relaxed tolerance.
    pub fn with_solver(mut self, solver: SolverSettings) -> Self {
        self.solver = solver;
        self
    }

    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    pub fn cme(&self) -> f64 {
        self.cme
    }

    fn num_particles(&self) -> usize {
        self.masses.len()
    }

    fn has_massive_particles(&self) -> bool {
        self.masses.iter().any(|&m| m > 0.0)
    }

    /// Generate one event from a caller-supplied random number generator,
    /// using the process-wide weight cache.
    pub fn generate_event<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Event> {
        let w0 = WeightCache::global().massless_weight(self.num_particles(), self.cme);
        self.sample_event(rng, w0)
    }

    /// Same as [`PhaseSpace::generate_event`] but against an injected cache,
    /// for callers that need isolation from the process-wide table.
    pub fn generate_event_with_cache<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        cache: &mut WeightCache,
    ) -> Result<Event> {
        let w0 = cache.massless_weight(self.num_particles(), self.cme);
        self.sample_event(rng, w0)
    }

    /// The per-event pipeline: massless sampling, frame correction, mass
    /// rescaling when needed, and the weight assembly.
    fn sample_event<R: Rng + ?Sized>(&self, rng: &mut R, w0: f64) -> Result<Event> {
        let mut momenta = sampler::sample_massless(self.num_particles(), rng);
        sampler::correct_frame(&mut momenta, self.cme);

        let mut event_weight = w0;
        if self.has_massive_particles() {
            rescale::rescale_to_masses(&mut momenta, &self.masses, self.cme, &self.solver)?;
            event_weight *= weight::mass_correction(&momenta, self.cme);
        }

        debug_assert!(
            event_weight.is_finite() && event_weight >= 0.0,
            "phase-space weight {} is not a finite nonnegative number",
            event_weight
        );
        debug_assert!(
            {
                let total = momenta.iter().copied().sum::<FourMomentum>();
                (total.energy() - self.cme).abs() <= 1e-8 * self.cme
                    && total.modulus() <= 1e-8 * self.cme
            },
            "generated event does not conserve total momentum"
        );

        Ok(Event::new(momenta, event_weight))
    }

    /// Generate a batch of unweighted (identity matrix element) events.
    pub fn generate(&self, n: usize) -> Result<BatchResult> {
        self.generate_weighted(n, matrix_element::identity)
    }

    /// Generate a batch of events reweighted by a squared matrix element.
    ///
    /// Events are produced by a parallel map over the event indices; each
    /// index owns a deterministically derived random stream, so the batch is
    /// bit-identical for a fixed seed regardless of thread count.
    pub fn generate_weighted<F>(&self, n: usize, msqrd: F) -> Result<BatchResult>
    where
        F: Fn(&[FourMomentum]) -> f64 + Sync,
    {
        if n == 0 {
            return Err(Error::InvalidInput(
                "batch size must be positive".to_string(),
            ));
        }
        // Warm the cache once so workers share a single read.
        let w0 = WeightCache::global().massless_weight(self.num_particles(), self.cme);

        let events: Vec<Event> = (0..n)
            .into_par_iter()
            .map(|index| self.indexed_event(index as u64, w0, &msqrd))
            .collect();

        let mut diagnostics = BatchDiagnostics::default();
        for event in &events {
            if !event.valid {
                if event.momenta.is_empty() {
                    diagnostics.n_nonconverged += 1;
                } else {
                    diagnostics.n_invalid_matrix_element += 1;
                }
            }
        }
        if diagnostics.n_rejected() > 0 {
            log::warn!(
                "batch of {} events: {} rejected by the matrix element, {} failed to converge",
                n,
                diagnostics.n_invalid_matrix_element,
                diagnostics.n_nonconverged
            );
        }
        Ok(BatchResult {
            events,
            diagnostics,
        })
    }

    /// One event of a batch. Mass-rescaling failures become empty invalid
    /// events, matrix-element rejections keep their momenta; both carry zero
    /// weight.
    fn indexed_event<F>(&self, index: u64, w0: f64, msqrd: &F) -> Event
    where
        F: Fn(&[FourMomentum]) -> f64 + Sync,
    {
        let mut rng = FastRng::event_stream(self.seed, index);
        match self.sample_event(&mut rng, w0) {
            Ok(mut event) => {
                let value = msqrd(&event.momenta);
                match matrix_element::reweight(event.weight, value) {
                    Some(weight) => {
                        event.weight = weight;
                        event
                    }
                    None => Event::invalidated(event.momenta),
                }
            }
            Err(_) => Event::invalidated(Vec::new()),
        }
    }

    /// Estimate the phase-space integral of the matrix element as the
    /// weighted sample mean over `n` events.
    pub fn integrate<F>(&self, n: usize, msqrd: F) -> Result<(Estimate, BatchDiagnostics)>
    where
        F: Fn(&[FourMomentum]) -> f64 + Sync,
    {
        let batch = self.generate_weighted(n, msqrd)?;
        let nf = n as f64;
        let mean = batch.events.iter().map(|e| e.weight).sum::<f64>() / nf;
        let variance = batch
            .events
            .iter()
            .map(|e| (e.weight - mean).powi(2))
            .sum::<f64>()
            / (nf - 1.0).max(1.0);
        Ok((
            Estimate {
                value: mean,
                error: (variance / nf).sqrt(),
            },
            batch.diagnostics,
        ))
    }

    /// Histogram an observable over `n` events with the given number of
    /// equal-width bins spanning the observable's full kinematic range.
    pub fn histogram<F>(
        &self,
        n: usize,
        observable: Observable,
        bins: usize,
        msqrd: F,
    ) -> Result<HistogramResult>
    where
        F: Fn(&[FourMomentum]) -> f64 + Sync,
    {
        if bins == 0 {
            return Err(Error::InvalidInput(
                "histogram needs at least one bin".to_string(),
            ));
        }
        let (lo, hi) = self.observable_range(observable)?;
        self.histogram_with_edges(
            n,
            observable,
            Histogram::with_range(lo, hi, bins).edges,
            msqrd,
        )
    }

    /// Histogram an observable with caller-specified bin edges.
    pub fn histogram_with_edges<F>(
        &self,
        n: usize,
        observable: Observable,
        edges: Vec<f64>,
        msqrd: F,
    ) -> Result<HistogramResult>
    where
        F: Fn(&[FourMomentum]) -> f64 + Sync,
    {
        self.check_observable(observable)?;
        if n == 0 {
            return Err(Error::InvalidInput(
                "batch size must be positive".to_string(),
            ));
        }
        if edges.len() < 2 || !edges.windows(2).all(|w| w[0] < w[1]) {
            return Err(Error::InvalidInput(
                "histogram edges must be strictly increasing with at least two entries"
                    .to_string(),
            ));
        }
        let w0 = WeightCache::global().massless_weight(self.num_particles(), self.cme);
        let template = Histogram::with_edges(edges);

        // Per-worker partial histograms, merged by elementwise summation.
        let (histogram, diagnostics) = (0..n)
            .into_par_iter()
            .map(|index| self.indexed_event(index as u64, w0, &msqrd))
            .fold(
                || (template.clone(), BatchDiagnostics::default()),
                |(mut hist, mut diag), event| {
                    if event.valid {
                        hist.fill(observe(observable, &event.momenta), event.weight);
                    } else if event.momenta.is_empty() {
                        diag.n_nonconverged += 1;
                    } else {
                        diag.n_invalid_matrix_element += 1;
                    }
                    (hist, diag)
                },
            )
            .reduce(
                || (template.clone(), BatchDiagnostics::default()),
                |(mut ha, mut da), (hb, db)| {
                    ha.merge(&hb);
                    da.n_invalid_matrix_element += db.n_invalid_matrix_element;
                    da.n_nonconverged += db.n_nonconverged;
                    (ha, da)
                },
            );

        if diagnostics.n_rejected() > 0 {
            log::warn!(
                "histogram batch of {} events: {} rejected by the matrix element, {} failed to converge",
                n,
                diagnostics.n_invalid_matrix_element,
                diagnostics.n_nonconverged
            );
        }
        Ok(HistogramResult {
            histogram,
            diagnostics,
        })
    }

    fn check_observable(&self, observable: Observable) -> Result<()> {
        let n = self.num_particles();
        match observable {
            Observable::Energy(i) if i >= n => Err(Error::InvalidInput(format!(
                "particle index {} out of range for {} particles",
                i, n
            ))),
            Observable::InvariantMass(i, j) if i >= n || j >= n => {
                Err(Error::InvalidInput(format!(
                    "particle pair ({}, {}) out of range for {} particles",
                    i, j, n
                )))
            }
            Observable::InvariantMass(i, j) if i == j => Err(Error::InvalidInput(format!(
                "invariant-mass pair needs two distinct particles, got ({}, {})",
                i, j
            ))),
            _ => Ok(()),
        }
    }

    /// Exact kinematic range of an observable, used for default binning so
    /// histograms from independent batches share a binning.
    pub fn observable_range(&self, observable: Observable) -> Result<(f64, f64)> {
        self.check_observable(observable)?;
        let total_mass: f64 = self.masses.iter().sum();
        match observable {
            Observable::Energy(i) => {
                let m = self.masses[i];
                let others = total_mass - m;
                let hi = (self.cme * self.cme + m * m - others * others) / (2.0 * self.cme);
                Ok((m, hi))
            }
            Observable::InvariantMass(i, j) => {
                let lo = self.masses[i] + self.masses[j];
                let hi = self.cme - (total_mass - self.masses[i] - self.masses[j]);
                Ok((lo, hi))
            }
        }
    }
}

fn observe(observable: Observable, momenta: &[FourMomentum]) -> f64 {
    match observable {
        Observable::Energy(i) => momenta[i].energy(),
        Observable::InvariantMass(i, j) => momenta[i].invariant_mass_with(&momenta[j]),
    }
}

/// Generate a single event with the given RNG.
pub fn generate_event<R: Rng + ?Sized>(masses: &[f64], cme: f64, rng: &mut R) -> Result<Event> {
    PhaseSpace::new(masses, cme)?.generate_event(rng)
}

/// Generate `n` events reweighted by `msqrd` from a master seed.
pub fn generate_batch<F>(
    n: usize,
    masses: &[f64],
    cme: f64,
    seed: u64,
    msqrd: F,
) -> Result<BatchResult>
where
    F: Fn(&[FourMomentum]) -> f64 + Sync,
{
    PhaseSpace::new(masses, cme)?
        .with_seed(seed)
        .generate_weighted(n, msqrd)
}

/// Histogram an observable over `n` events from a master seed.
pub fn generate_histogram<F>(
    n: usize,
    masses: &[f64],
    cme: f64,
    seed: u64,
    observable: Observable,
    bins: usize,
    msqrd: F,
) -> Result<HistogramResult>
where
    F: Fn(&[FourMomentum]) -> f64 + Sync,
{
    PhaseSpace::new(masses, cme)?
        .with_seed(seed)
        .histogram(n, observable, bins, msqrd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_rejects_short_mass_list() {
        match PhaseSpace::new(&[1.0], 10.0) {
            Err(Error::InvalidInput(msg)) => assert!(msg.contains("two")),
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_negative_mass() {
        assert!(matches!(
            PhaseSpace::new(&[1.0, -1.0], 10.0),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_bad_cme() {
        assert!(matches!(
            PhaseSpace::new(&[0.0, 0.0], 0.0),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            PhaseSpace::new(&[0.0, 0.0], f64::NAN),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_insufficient_energy() {
        // Sum above and exactly at the limit both fail before sampling.
        assert!(matches!(
            PhaseSpace::new(&[600.0, 600.0], 1000.0),
            Err(Error::InsufficientEnergy { .. })
        ));
        assert!(matches!(
            PhaseSpace::new(&[500.0, 500.0], 1000.0),
            Err(Error::InsufficientEnergy { .. })
        ));
    }

    #[test]
    fn test_single_event_conserves_momentum() {
        let mut rng = StdRng::seed_from_u64(11);
        let ps = PhaseSpace::new(&[139.57, 139.57, 139.57], 1000.0).unwrap();
        let event = ps.generate_event(&mut rng).unwrap();

        let total = event.total_momentum();
        assert!((total.energy() - 1000.0).abs() < 1e-8 * 1000.0);
        assert!(total.modulus() < 1e-8 * 1000.0);
    }

    #[test]
    fn test_injected_cache_used() {
        let mut rng = StdRng::seed_from_u64(12);
        let mut cache = WeightCache::new();
        let ps = PhaseSpace::new(&[0.0, 0.0, 0.0], 500.0).unwrap();
        let _ = ps.generate_event_with_cache(&mut rng, &mut cache).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_batch_rejected() {
        let ps = PhaseSpace::new(&[0.0, 0.0], 100.0).unwrap();
        assert!(matches!(ps.generate(0), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_batch_is_deterministic() {
        let ps = PhaseSpace::new(&[139.57, 139.57, 139.57], 1000.0)
            .unwrap()
            .with_seed(99);
        let a = ps.generate(64).unwrap();
        let b = ps.generate(64).unwrap();

        assert_eq!(a.events.len(), 64);
        for (x, y) in a.events.iter().zip(&b.events) {
            assert_eq!(x.weight.to_bits(), y.weight.to_bits());
            for (p, q) in x.momenta.iter().zip(&y.momenta) {
                assert_eq!(p.energy().to_bits(), q.energy().to_bits());
                assert_eq!(p.momentum(), q.momentum());
            }
        }
    }

    #[test]
    fn test_batch_events_match_indexed_streams() {
        // Event i of a batch is exactly the event generated from the
        // (seed, i) stream, so completion order cannot matter.
        let seed = 7;
        let ps = PhaseSpace::new(&[0.0, 0.0, 0.0, 0.0], 800.0)
            .unwrap()
            .with_seed(seed);
        let batch = ps.generate(16).unwrap();

        for (i, event) in batch.events.iter().enumerate() {
            let mut rng = FastRng::event_stream(seed, i as u64);
            let expected = ps.generate_event(&mut rng).unwrap();
            assert_eq!(event.weight.to_bits(), expected.weight.to_bits());
            for (p, q) in event.momenta.iter().zip(&expected.momenta) {
                assert_eq!(p.energy().to_bits(), q.energy().to_bits());
            }
        }
    }

    #[test]
    fn test_matrix_element_rejections_counted() {
        let ps = PhaseSpace::new(&[0.0, 0.0], 100.0).unwrap().with_seed(1);
        // Reject every second event.
        let batch = ps
            .generate_weighted(100, |momenta: &[FourMomentum]| {
                if momenta[0].pz() > 0.0 {
                    f64::NAN
                } else {
                    1.0
                }
            })
            .unwrap();

        let n_invalid = batch.events.iter().filter(|e| !e.valid).count();
        assert_eq!(n_invalid, batch.diagnostics.n_invalid_matrix_element);
        assert!(n_invalid > 0, "expected some rejections");
        assert!(batch.events.iter().filter(|e| !e.valid).all(|e| e.weight == 0.0));
        assert_eq!(batch.diagnostics.n_nonconverged, 0);
    }

    #[test]
    fn test_matrix_element_scales_weights() {
        let ps = PhaseSpace::new(&[0.0, 0.0], 100.0).unwrap().with_seed(2);
        let plain = ps.generate(10).unwrap();
        let scaled = ps.generate_weighted(10, |_: &[FourMomentum]| 2.0).unwrap();

        for (p, s) in plain.events.iter().zip(&scaled.events) {
            assert!((s.weight - 2.0 * p.weight).abs() < 1e-15 * s.weight.abs());
        }
    }

    #[test]
    fn test_integrate_massless_two_body() {
        // Identity matrix element: the estimate is the exact constant
        // two-body volume with zero variance.
        let ps = PhaseSpace::new(&[0.0, 0.0], 1000.0).unwrap().with_seed(3);
        let (estimate, diagnostics) = ps.integrate(1000, matrix_element::identity).unwrap();

        let expected = 1.0 / (8.0 * std::f64::consts::PI);
        assert!((estimate.value - expected).abs() < 1e-12 * expected);
        assert!(estimate.error < 1e-12 * expected);
        assert_eq!(diagnostics.n_rejected(), 0);
    }

    #[test]
    fn test_observable_ranges() {
        let ps = PhaseSpace::new(&[100.0, 200.0, 300.0], 1000.0).unwrap();

        let (lo, hi) = ps.observable_range(Observable::Energy(0)).unwrap();
        assert_eq!(lo, 100.0);
        // E_max = (s + m^2 - (sum of others)^2) / (2 cme)
        let expected_hi = (1000.0_f64.powi(2) + 100.0_f64.powi(2) - 500.0_f64.powi(2)) / 2000.0;
        assert!((hi - expected_hi).abs() < 1e-12);

        let (lo, hi) = ps
            .observable_range(Observable::InvariantMass(0, 1))
            .unwrap();
        assert_eq!(lo, 300.0);
        assert_eq!(hi, 700.0);
    }

    #[test]
    fn test_bad_observable_indices() {
        let ps = PhaseSpace::new(&[0.0, 0.0], 100.0).unwrap();
        assert!(matches!(
            ps.observable_range(Observable::Energy(5)),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            ps.observable_range(Observable::InvariantMass(0, 0)),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_zero_bins_rejected() {
        let ps = PhaseSpace::new(&[0.0, 0.0], 100.0).unwrap();
        assert!(matches!(
            ps.histogram(10, Observable::Energy(0), 0, matrix_element::identity),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_malformed_edges_rejected() {
        let ps = PhaseSpace::new(&[0.0, 0.0], 100.0).unwrap();
        for edges in [
            vec![1.0],
            vec![0.0, 1.0, 1.0],
            vec![2.0, 1.0],
            vec![0.0, f64::NAN, 2.0],
        ] {
            assert!(matches!(
                ps.histogram_with_edges(10, Observable::Energy(0), edges, matrix_element::identity),
                Err(Error::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_free_function_surface() {
        let mut rng = StdRng::seed_from_u64(21);
        let event = generate_event(&[0.0, 0.0], 100.0, &mut rng).unwrap();
        assert_eq!(event.momenta.len(), 2);

        let batch = generate_batch(10, &[0.0, 0.0], 100.0, 5, matrix_element::identity).unwrap();
        assert_eq!(batch.events.len(), 10);

        let result = generate_histogram(
            200,
            &[0.0, 0.0, 0.0],
            100.0,
            5,
            Observable::Energy(0),
            20,
            matrix_element::identity,
        )
        .unwrap();
        assert_eq!(result.histogram.num_bins(), 20);
        assert!(result.histogram.total_weight() > 0.0);
    }
}
