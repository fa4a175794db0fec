//! Bounded scalar minimisation.
//!
//! Brent's method restricted to an interval: golden-section steps, replaced by
//! parabolic interpolation whenever the parabola is acceptable. The iterate is
//! always the best point seen so far, so stopping early still returns the best
//! candidate evaluated.

use crate::error::ValidationError;

const GOLDEN_MEAN: f64 = 0.381_966_011_250_105_1; // (3 - √5) / 2

/// Result of a bounded minimisation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Minimum {
    pub x: f64,
    pub fx: f64,
    pub evaluations: usize,
    /// False when `max_evals` was reached before the tolerance was met.
    pub converged: bool,
}

/// Minimise `f` over `[lo, hi]` to absolute tolerance `xatol`.
pub fn minimize_bounded<F>(mut f: F, lo: f64, hi: f64, xatol: f64, max_evals: usize) -> Result<Minimum, ValidationError>
where
    F: FnMut(f64) -> f64,
{
    if !(lo.is_finite() && hi.is_finite() && lo < hi) {
        return Err(ValidationError::Invalid(format!(
            "invalid bounds [{lo}, {hi}] (must be finite with lo < hi)"
        )));
    }
    if !(xatol.is_finite() && xatol > 0.0) {
        return Err(ValidationError::Invalid(format!("invalid tolerance {xatol}")));
    }

    let sqrt_eps = f64::EPSILON.sqrt();
    let (mut a, mut b) = (lo, hi);

    let mut fulc = a + GOLDEN_MEAN * (b - a);
    let mut nfc = fulc;
    let mut xf = fulc;
    let mut rat = 0.0_f64;
    let mut e = 0.0_f64;

    let mut fx = f(xf);
    let mut evaluations = 1usize;
    let mut ffulc = fx;
    let mut fnfc = fx;

    let mut xm = 0.5 * (a + b);
    let mut tol1 = sqrt_eps * xf.abs() + xatol / 3.0;
    let mut tol2 = 2.0 * tol1;
    let mut converged = true;

    while (xf - xm).abs() > tol2 - 0.5 * (b - a) {
        let mut golden = true;

        if e.abs() > tol1 {
            golden = false;
            let mut r = (xf - nfc) * (fx - ffulc);
            let mut q = (xf - fulc) * (fx - fnfc);
            let mut p = (xf - fulc) * q - (xf - nfc) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            r = e;
            e = rat;

            if p.abs() < (0.5 * q * r).abs() && p > q * (a - xf) && p < q * (b - xf) {
                rat = p / q;
                let x = xf + rat;
                if (x - a) < tol2 || (b - x) < tol2 {
                    rat = tol1 * sign_or_one(xm - xf);
                }
            } else {
                golden = true;
            }
        }

        if golden {
            e = if xf >= xm { a - xf } else { b - xf };
            rat = GOLDEN_MEAN * e;
        }

        let x = xf + sign_or_one(rat) * rat.abs().max(tol1);
        let fu = f(x);
        evaluations += 1;

        if fu <= fx {
            if x >= xf {
                a = xf;
            } else {
                b = xf;
            }
            fulc = nfc;
            ffulc = fnfc;
            nfc = xf;
            fnfc = fx;
            xf = x;
            fx = fu;
        } else {
            if x < xf {
                a = x;
            } else {
                b = x;
            }
            if fu <= fnfc || nfc == xf {
                fulc = nfc;
                ffulc = fnfc;
                nfc = x;
                fnfc = fu;
            } else if fu <= ffulc || fulc == xf || fulc == nfc {
                fulc = x;
                ffulc = fu;
            }
        }

        xm = 0.5 * (a + b);
        tol1 = sqrt_eps * xf.abs() + xatol / 3.0;
        tol2 = 2.0 * tol1;

        if evaluations >= max_evals {
            converged = false;
            break;
        }
    }

    Ok(Minimum {
        x: xf,
        fx,
        evaluations,
        converged,
    })
}

fn sign_or_one(v: f64) -> f64 {
    if v < 0.0 { -1.0 } else { 1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_parabola_vertex() {
        let m = minimize_bounded(|x| (x - 1.3).powi(2) + 2.0, 0.0, 3.0, 1e-8, 500).unwrap();
        assert!(m.converged);
        assert!((m.x - 1.3).abs() < 1e-6, "x={}", m.x);
        assert!((m.fx - 2.0).abs() < 1e-10);
    }

    #[test]
    fn finds_kink_minimum() {
        let m = minimize_bounded(|x| (x - 0.77).abs(), 0.1, 3.0, 1e-8, 500).unwrap();
        assert!((m.x - 0.77).abs() < 1e-6, "x={}", m.x);
    }

    #[test]
    fn boundary_minimum_is_approached() {
        let m = minimize_bounded(|x| x, 0.1, 3.0, 1e-8, 500).unwrap();
        assert!((m.x - 0.1).abs() < 1e-6);
    }

    #[test]
    fn eval_budget_returns_best_seen() {
        let m = minimize_bounded(|x| (x - 2.0).powi(2), 0.0, 3.0, 1e-12, 3).unwrap();
        assert!(!m.converged);
        assert_eq!(m.evaluations, 3);
        assert!(m.x >= 0.0 && m.x <= 3.0);
    }

    #[test]
    fn rejects_invalid_bounds() {
        assert!(minimize_bounded(|x| x, 1.0, 1.0, 1e-8, 10).is_err());
        assert!(minimize_bounded(|x| x, f64::NAN, 1.0, 1e-8, 10).is_err());
    }
}
