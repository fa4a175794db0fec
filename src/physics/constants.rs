//! SI constants.

/// Newtonian gravitational constant (m³ kg⁻¹ s⁻²).
pub const G: f64 = 6.67430e-11;

/// Speed of light (m/s).
pub const C: f64 = 299_792_458.0;

/// Solar mass (kg).
pub const M_SUN: f64 = 1.98847e30;

/// Golden ratio `(1 + √5) / 2`.
pub const PHI: f64 = 1.618_033_988_749_895;

/// Fine-structure constant.
pub const ALPHA_FS: f64 = 7.2973525693e-3;

/// Electron rest mass (kg).
pub const M_ELECTRON: f64 = 9.10938356e-31;

/// Planck constant (J s).
pub const H_PLANCK: f64 = 6.62607015e-34;

/// Cap on `|v|/c` so the Lorentz factor stays finite.
pub const BETA_MAX: f64 = 0.999_999_999_999;
