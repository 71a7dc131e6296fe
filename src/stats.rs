use nalgebra::Vector3;
use rand::Rng;

/// Sample a unit vector isotropically distributed over the sphere.
pub fn sample_isotropic_direction<R: Rng + ?Sized>(rng: &mut R) -> Vector3<f64> {
    let xi1: f64 = rng.gen();
    let xi2: f64 = rng.gen();

    let mu = 2.0 * xi1 - 1.0; // cosine of polar angle
    let phi = 2.0 * std::f64::consts::PI * xi2; // azimuthal angle

    let sqrt_one_minus_mu2 = (1.0 - mu * mu).sqrt();
    Vector3::new(
        sqrt_one_minus_mu2 * phi.cos(),
        sqrt_one_minus_mu2 * phi.sin(),
        mu,
    )
}

/// Sample a massless energy with density c * exp(-c), the distribution the
/// RAMBO construction requires. Drawn as -ln(r1 * r2), a Gamma(2, 1) variate.
pub fn sample_massless_energy<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let r1: f64 = rng.gen();
    let r2: f64 = rng.gen();
    -(r1.ln() + r2.ln())
}
