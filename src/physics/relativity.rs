//! Gravitational and kinematic redshift formulas.
//!
//! - `schwarzschild_radius`: `r_s = 2GM/c²`
//! - `z_gravitational`: `1/√(1 − r_s/r) − 1`
//! - `z_special_relativistic`: `γ(1 + v_los/c) − 1`
//! - `compose`: `(1 + z_a)(1 + z_b) − 1`
//! - `orbit_radius`, `vis_viva`: Keplerian helpers for rows without `r_emit_m`

use super::constants::{BETA_MAX, C, G};

pub fn schwarzschild_radius(mass_kg: f64) -> f64 {
    2.0 * G * mass_kg / (C * C)
}

/// Escape and "fall" velocities at radius `r` around mass `M`.
///
/// `v_esc/c = √(r_s/r)` and `v_fall/c = 1 / (v_esc/c)`, so their product is
/// `c²` up to rounding. Returns `None` unless `M > 0` and `r > r_s`.
pub fn dual_velocities(mass_kg: f64, r_m: f64) -> Option<(f64, f64)> {
    if !(mass_kg.is_finite() && mass_kg > 0.0 && r_m.is_finite()) {
        return None;
    }
    let rs = schwarzschild_radius(mass_kg);
    if r_m <= rs {
        return None;
    }
    let beta_esc = (rs / r_m).sqrt();
    Some((C * beta_esc, C / beta_esc))
}

/// Gravitational redshift of light emitted at `r_m` and received at infinity.
pub fn z_gravitational(mass_kg: f64, r_m: Option<f64>) -> f64 {
    let Some(r) = r_m else { return f64::NAN };
    if !(mass_kg.is_finite() && mass_kg > 0.0) || !r.is_finite() || r <= 0.0 {
        return f64::NAN;
    }
    let rs = schwarzschild_radius(mass_kg);
    if r <= rs {
        return f64::NAN;
    }
    1.0 / (1.0 - rs / r).sqrt() - 1.0
}

/// Special-relativistic Doppler redshift.
///
/// Depends on `|v_tot|` only through `β`; a missing or non-finite `v_los`
/// counts as zero. Returns `NaN` when `v_tot` is missing or non-finite.
pub fn z_special_relativistic(v_tot_mps: Option<f64>, v_los_mps: Option<f64>) -> f64 {
    let Some(v_tot) = v_tot_mps.filter(|v| v.is_finite()) else {
        return f64::NAN;
    };
    let beta = (v_tot.abs() / C).min(BETA_MAX);
    let beta_los = v_los_mps.filter(|v| v.is_finite()).map_or(0.0, |v| v / C);
    let gamma = 1.0 / (1.0 - beta * beta).sqrt();
    gamma * (1.0 + beta_los) - 1.0
}

/// Multiplicative composition of two redshifts.
pub fn compose(z_a: f64, z_b: f64) -> f64 {
    (1.0 + z_a) * (1.0 + z_b) - 1.0
}

/// Composition where a non-finite component counts as zero.
///
/// Returns `NaN` only when neither component is finite.
pub fn compose_available(z_a: f64, z_b: f64) -> f64 {
    match (z_a.is_finite(), z_b.is_finite()) {
        (false, false) => f64::NAN,
        (true, true) => compose(z_a, z_b),
        (true, false) => compose(z_a, 0.0),
        (false, true) => compose(0.0, z_b),
    }
}

/// Kepler ellipse radius at true anomaly `f`: `a(1 − e²) / (1 + e cos f)`.
pub fn orbit_radius(a_m: f64, e: f64, f_true_rad: f64) -> f64 {
    let denom = 1.0 + e * f_true_rad.cos();
    if denom == 0.0 {
        return f64::NAN;
    }
    a_m * (1.0 - e * e) / denom
}

/// Orbital speed from the vis-viva equation `√(μ(2/r − 1/a))`.
pub fn vis_viva(mu: f64, a_m: f64, r_m: f64) -> f64 {
    let term = mu * (2.0 / r_m.max(1e-99) - 1.0 / a_m.max(1e-99));
    if term >= 0.0 { term.sqrt() } else { f64::NAN }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::M_SUN;

    #[test]
    fn schwarzschild_radius_of_the_sun() {
        let rs = schwarzschild_radius(M_SUN);
        assert!((rs - 2952.893).abs() < 0.1, "rs={rs}");
    }

    #[test]
    fn dual_velocity_product_is_c_squared() {
        let mass = 1.0;
        let r = 1.1 * schwarzschild_radius(mass);
        let (v_esc, v_fall) = dual_velocities(mass, r).unwrap();
        assert!((v_esc * v_fall / (C * C) - 1.0).abs() < 1e-14);
    }

    #[test]
    fn dual_velocity_product_holds_across_masses() {
        for &mass in &[1e-20, 1.0, 5.97e24, M_SUN, 8.5e36] {
            for &ratio in &[1.000_001, 1.5, 10.0, 1e6] {
                let r = ratio * schwarzschild_radius(mass);
                let (v_esc, v_fall) = dual_velocities(mass, r).unwrap();
                let rel = (v_esc * v_fall / (C * C) - 1.0).abs();
                assert!(rel <= 1e-14, "mass={mass} ratio={ratio} rel={rel}");
            }
        }
    }

    #[test]
    fn dual_velocities_reject_inside_horizon() {
        let rs = schwarzschild_radius(M_SUN);
        assert!(dual_velocities(M_SUN, rs).is_none());
        assert!(dual_velocities(0.0, 1.0).is_none());
    }

    #[test]
    fn z_gr_is_strictly_decreasing_in_radius() {
        let rs = schwarzschild_radius(M_SUN);
        let mut prev = f64::INFINITY;
        for i in 1..200 {
            let r = rs * (1.0 + i as f64 * 0.37);
            let z = z_gravitational(M_SUN, Some(r));
            assert!(z.is_finite());
            assert!(z < prev, "not decreasing at r={r}");
            prev = z;
        }
    }

    #[test]
    fn z_gr_is_nan_at_or_inside_horizon() {
        let rs = schwarzschild_radius(M_SUN);
        assert!(z_gravitational(M_SUN, Some(rs)).is_nan());
        assert!(z_gravitational(M_SUN, Some(0.5 * rs)).is_nan());
        assert!(z_gravitational(M_SUN, None).is_nan());
        assert!(z_gravitational(0.0, Some(1e9)).is_nan());
    }

    #[test]
    fn z_sr_depends_only_on_speed_without_los() {
        for &v in &[0.0, 1.0, 3.0e4, 1.0e7, 2.9e8] {
            let plus = z_special_relativistic(Some(v), Some(0.0));
            let minus = z_special_relativistic(Some(-v), None);
            assert_eq!(plus, minus);
            assert!(plus >= 0.0);
        }
    }

    #[test]
    fn z_sr_caps_beta() {
        let z = z_special_relativistic(Some(10.0 * C), None);
        assert!(z.is_finite());
        assert!(z > 1000.0);
    }

    #[test]
    fn z_sr_missing_velocity_is_nan() {
        assert!(z_special_relativistic(None, Some(10.0)).is_nan());
        assert!(z_special_relativistic(Some(f64::NAN), None).is_nan());
    }

    #[test]
    fn composition_matches_closed_form() {
        let z = compose(0.01, 0.02);
        assert!((z - 0.0302).abs() < 1e-12);
    }

    #[test]
    fn composition_with_missing_component() {
        assert_eq!(compose_available(0.01, f64::NAN), compose(0.01, 0.0));
        assert_eq!(compose_available(f64::NAN, 0.02), compose(0.0, 0.02));
        assert!(compose_available(f64::NAN, f64::INFINITY).is_nan());
        assert_eq!(compose_available(0.01, 0.02), compose(0.01, 0.02));
    }

    #[test]
    fn orbit_radius_at_periapsis_and_apoapsis() {
        let a = 1.0e12;
        let e = 0.5;
        assert!((orbit_radius(a, e, 0.0) - a * (1.0 - e)).abs() < 1e-3);
        assert!((orbit_radius(a, e, std::f64::consts::PI) - a * (1.0 + e)).abs() < 1e-3);
        assert!(orbit_radius(a, 1.0, std::f64::consts::PI).is_nan());
    }

    #[test]
    fn vis_viva_circular_orbit() {
        let mu = G * M_SUN;
        let r = 1.496e11;
        let v = vis_viva(mu, r, r);
        assert!((v - (mu / r).sqrt()).abs() < 1e-6);
        assert!(vis_viva(mu, 1.0, 10.0).is_nan());
    }
}
