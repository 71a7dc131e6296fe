use crate::four_momentum::FourMomentum;

/// A single sampled final state: one four-momentum per final-state particle,
/// in the same order as the mass list, plus the Monte Carlo weight.
///
/// `valid` is false for events whose matrix element evaluated to a negative
/// or non-finite value, or whose mass rescaling failed; such events carry
/// zero weight but keep their slot in the batch so indices stay aligned.
#[derive(Debug, Clone)]
pub struct Event {
    pub momenta: Vec<FourMomentum>,
    pub weight: f64,
    pub valid: bool,
}

impl Event {
    pub fn new(momenta: Vec<FourMomentum>, weight: f64) -> Self {
        Self {
            momenta,
            weight,
            valid: true,
        }
    }

    /// A rejected event: weight zeroed, flagged invalid.
    pub fn invalidated(momenta: Vec<FourMomentum>) -> Self {
        Self {
            momenta,
            weight: 0.0,
            valid: false,
        }
    }

    /// Sum of the final-state four-momenta. For a valid event this equals
    /// (cme, 0, 0, 0) up to floating tolerance.
    pub fn total_momentum(&self) -> FourMomentum {
        self.momenta.iter().copied().sum()
    }
}
