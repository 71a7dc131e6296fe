use nalgebra::Vector3;
use std::iter::Sum;
use std::ops::Add;

/// A relativistic four-momentum (E, px, py, pz) with named accessors.
///
/// The spatial part is stored as a `Vector3` so that dot products and norms
/// come from nalgebra rather than hand-rolled index arithmetic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FourMomentum {
    e: f64,
    p: Vector3<f64>,
}

impl FourMomentum {
    pub fn new(e: f64, px: f64, py: f64, pz: f64) -> Self {
        Self {
            e,
            p: Vector3::new(px, py, pz),
        }
    }

    pub fn from_parts(e: f64, p: Vector3<f64>) -> Self {
        Self { e, p }
    }

    pub fn zero() -> Self {
        Self {
            e: 0.0,
            p: Vector3::zeros(),
        }
    }

    pub fn energy(&self) -> f64 {
        self.e
    }

    pub fn px(&self) -> f64 {
        self.p.x
    }

    pub fn py(&self) -> f64 {
        self.p.y
    }

    pub fn pz(&self) -> f64 {
        self.p.z
    }

    /// Spatial three-momentum.
    pub fn momentum(&self) -> Vector3<f64> {
        self.p
    }

    /// Magnitude of the spatial three-momentum.
    pub fn modulus(&self) -> f64 {
        self.p.norm()
    }

    /// Invariant mass squared, E^2 - |p|^2. May be slightly negative from
    /// floating-point cancellation for massless momenta.
    pub fn mass_squared(&self) -> f64 {
        self.e * self.e - self.p.norm_squared()
    }

    /// Invariant mass, with the floating-point-negative case clamped to zero.
    pub fn mass(&self) -> f64 {
        self.mass_squared().max(0.0).sqrt()
    }

    /// Invariant mass of this momentum combined with another.
    pub fn invariant_mass_with(&self, other: &FourMomentum) -> f64 {
        (*self + *other).mass()
    }

    /// Lorentz boost written in terms of b = gamma * beta, the form used by
    /// phase-space generators: gamma^2 - |b|^2 = 1 for a physical boost.
    pub fn boost(&self, b: Vector3<f64>, gamma: f64) -> Self {
        let a = 1.0 / (1.0 + gamma);
        let bq = b.dot(&self.p);
        Self {
            e: gamma * self.e + bq,
            p: self.p + b * (self.e + a * bq),
        }
    }

    /// Multiply every component by a scalar.
    pub fn scale(&self, x: f64) -> Self {
        Self {
            e: x * self.e,
            p: x * self.p,
        }
    }
}

impl Add for FourMomentum {
    type Output = FourMomentum;

    fn add(self, other: FourMomentum) -> FourMomentum {
        FourMomentum {
            e: self.e + other.e,
            p: self.p + other.p,
        }
    }
}

impl Sum for FourMomentum {
    fn sum<I: Iterator<Item = FourMomentum>>(iter: I) -> FourMomentum {
        iter.fold(FourMomentum::zero(), |acc, q| acc + q)
    }
}
