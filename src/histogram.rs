use serde::{Deserialize, Serialize};
use std::fmt;

/// Weighted histogram serving as both accumulation buffer and results
/// container.
///
/// `counts` holds the accumulated weight per bin and `sumw2` the accumulated
/// squared weights, from which the per-bin Monte Carlo error follows.
/// Partial histograms from independent batches combine with [`Histogram::merge`]
/// before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Ordered bin edges; bin i spans [edges[i], edges[i + 1]).
    pub edges: Vec<f64>,
    /// Accumulated weight per bin.
    pub counts: Vec<f64>,
    /// Accumulated squared weight per bin.
    pub sumw2: Vec<f64>,
    /// Number of fills that fell outside the edge range.
    pub n_outside: usize,
}

impl Histogram {
    /// Equal-width bins spanning [lo, hi].
    pub fn with_range(lo: f64, hi: f64, bins: usize) -> Self {
        assert!(bins > 0, "histogram needs at least one bin");
        assert!(hi > lo, "histogram range must be nonempty");
        let width = (hi - lo) / bins as f64;
        let edges = (0..=bins)
            .map(|i| if i == bins { hi } else { lo + i as f64 * width })
            .collect();
        Self::with_edges(edges)
    }

    /// Explicit, strictly increasing bin edges.
    pub fn with_edges(edges: Vec<f64>) -> Self {
        assert!(edges.len() >= 2, "histogram needs at least two edges");
        assert!(
            edges.windows(2).all(|w| w[0] < w[1]),
            "histogram edges must be strictly increasing"
        );
        let bins = edges.len() - 1;
        Self {
            edges,
            counts: vec![0.0; bins],
            sumw2: vec![0.0; bins],
            n_outside: 0,
        }
    }

    pub fn num_bins(&self) -> usize {
        self.counts.len()
    }

    /// Accumulate a weight into the bin containing `x`. The top edge is
    /// inclusive so exact kinematic endpoints are not dropped.
    pub fn fill(&mut self, x: f64, weight: f64) {
        let last = self.edges[self.edges.len() - 1];
        if !(x >= self.edges[0] && x <= last) {
            self.n_outside += 1;
            return;
        }
        let mut idx = self.edges.partition_point(|&e| e <= x);
        // partition_point returns the first edge above x, except for x at the
        // top edge where every edge compares <=.
        idx = idx.min(self.counts.len());
        let bin = idx - 1;
        self.counts[bin] += weight;
        self.sumw2[bin] += weight * weight;
    }

    /// Elementwise sum of another histogram into this one. The binnings must
    /// be identical.
    pub fn merge(&mut self, other: &Histogram) {
        assert_eq!(self.edges, other.edges, "cannot merge mismatched binnings");
        for (c, &o) in self.counts.iter_mut().zip(&other.counts) {
            *c += o;
        }
        for (s, &o) in self.sumw2.iter_mut().zip(&other.sumw2) {
            *s += o;
        }
        self.n_outside += other.n_outside;
    }

    /// Total accumulated weight across all bins.
    pub fn total_weight(&self) -> f64 {
        self.counts.iter().sum()
    }

    pub fn bin_width(&self, bin: usize) -> f64 {
        self.edges[bin + 1] - self.edges[bin]
    }

    pub fn bin_centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    /// Density estimate: each bin normalized by (bin width * total weight),
    /// so the densities integrate to one.
    pub fn density(&self) -> Vec<f64> {
        let total = self.total_weight();
        if total <= 0.0 {
            return vec![0.0; self.num_bins()];
        }
        self.counts
            .iter()
            .enumerate()
            .map(|(i, &c)| c / (self.bin_width(i) * total))
            .collect()
    }

    /// Monte Carlo standard error of the density per bin,
    /// sqrt(sum w^2) / (bin width * total weight).
    pub fn std_errors(&self) -> Vec<f64> {
        let total = self.total_weight();
        if total <= 0.0 {
            return vec![0.0; self.num_bins()];
        }
        self.sumw2
            .iter()
            .enumerate()
            .map(|(i, &s)| s.sqrt() / (self.bin_width(i) * total))
            .collect()
    }
}

impl fmt::Display for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Histogram: {} bins over [{}, {}]",
            self.num_bins(),
            self.edges[0],
            self.edges[self.edges.len() - 1]
        )?;
        writeln!(f, "  Total weight: {:.6e}", self.total_weight())?;
        writeln!(f, "  Fills outside range: {}", self.n_outside)?;
        let density = self.density();
        let errors = self.std_errors();
        for (i, center) in self.bin_centers().iter().enumerate() {
            writeln!(
                f,
                "  {:>12.4} : {:.6e} +/- {:.6e}",
                center, density[i], errors[i]
            )?;
        }
        Ok(())
    }
}
