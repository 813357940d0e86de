//! Angular separations between reconstructed physics objects

use crate::numeric::{reals::consts::PI, Float};

/// Something which has a direction in the (eta, phi) plane
pub trait Direction {
    /// Pseudorapidity
    fn eta(&self) -> Float;

    /// Azimuthal angle
    fn phi(&self) -> Float;
}

/// Azimuthal separation, folded back into [-pi, pi]
pub fn delta_phi(phi1: Float, phi2: Float) -> Float {
    let dphi = phi1 - phi2;

    // Non-finite angles cannot be folded
    if !dphi.is_finite() {
        return dphi;
    }

    if (-PI..=PI).contains(&dphi) {
        return dphi;
    }
    (dphi + PI).rem_euclid(2. * PI) - PI
}

/// Squared angular separation in the (eta, phi) plane
pub fn delta_r2(eta1: Float, phi1: Float, eta2: Float, phi2: Float) -> Float {
    let deta = eta1 - eta2;
    let dphi = delta_phi(phi1, phi2);
    deta * deta + dphi * dphi
}

/// Angular separation in the (eta, phi) plane
pub fn delta_r(eta1: Float, phi1: Float, eta2: Float, phi2: Float) -> Float {
    delta_r2(eta1, phi1, eta2, phi2).sqrt()
}

/// Angular separation between two objects
pub fn delta_r_between(a: &impl Direction, b: &impl Direction) -> Float {
    delta_r(a.eta(), a.phi(), b.eta(), b.phi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_phi_wraps_around() {
        let dphi = delta_phi(3.0, -3.0);
        assert!((dphi - (6.0 - 2. * PI)).abs() < 1e-6);
        let dphi = delta_phi(-3.0, 3.0);
        assert!((dphi + (6.0 - 2. * PI)).abs() < 1e-6);
        assert_eq!(delta_phi(0.5, 0.25), 0.25);
    }

    #[test]
    fn delta_phi_leaves_infinities_alone() {
        assert!(delta_phi(Float::INFINITY, 0.).is_infinite());
        assert!(delta_phi(Float::NAN, 0.).is_nan());
    }

    #[test]
    fn delta_phi_folds_huge_angles() {
        let dphi = delta_phi(1e20, 0.);
        assert!((-PI..=PI).contains(&dphi));
        let dphi = delta_phi(0., -1e10);
        assert!((-PI..=PI).contains(&dphi));
        let dphi = delta_phi(7. * PI + 0.5, 0.);
        assert!((dphi - (-PI + 0.5)).abs() < 1e-4);
    }

    #[test]
    fn delta_r_combines_both_axes() {
        let dr = delta_r(0.3, 0.0, 0.0, 0.4);
        assert!((dr - 0.5).abs() < 1e-6);
    }
}
