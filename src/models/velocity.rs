//! Velocity imputation for ordinary stars.
//!
//! Catalogue rows for nearby stars, Wolf-Rayet and luminous blue variables
//! often carry a signed radial velocity in the `v_tot` column. This is not
//! physics: it is a fixed, deterministic imputation that turns such rows into
//! a plausible total speed by adding a tangential component chosen from the
//! `source` name. Rows in any other category pass through untouched.

/// Categories the imputation applies to (exact match).
pub const CORRECTED_CATEGORIES: [&str; 3] = ["nearby-stars", "wolf-rayet", "luminous-blue"];

pub const METHOD_ORIGINAL: &str = "original";
pub const METHOD_VIS_VIVA: &str = "vis_viva_orbital";

const V_TAN_GIANT: f64 = 30_000.0;
const V_TAN_DWARF: f64 = 15_000.0;
const V_TAN_DEFAULT: f64 = 20_000.0;
const V_TAN_FROM_LOS: f64 = 25_000.0;
const V_LOS_THRESHOLD: f64 = 1_000.0;

/// Outcome of the imputation: the velocity to use and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityCorrection {
    pub v_tot: Option<f64>,
    pub method: String,
}

impl VelocityCorrection {
    pub fn is_original(&self) -> bool {
        self.method == METHOD_ORIGINAL
    }
}

/// Apply the imputation to one row's velocity fields.
pub fn correct_velocity(
    category: &str,
    source: &str,
    v_tot: Option<f64>,
    v_los: Option<f64>,
) -> VelocityCorrection {
    let corrected = CORRECTED_CATEGORIES.contains(&category.trim());
    match (v_tot, v_los) {
        (Some(v), _) if corrected && v < 0.0 => {
            let v_rad = v.abs();
            let v_tan = tangential_for_source(source);
            VelocityCorrection {
                v_tot: Some((v_rad * v_rad + v_tan * v_tan).sqrt()),
                method: format!("fixed_negative(v_rad={v_rad:.0},v_tan={v_tan:.0})"),
            }
        }
        (None, Some(v_los)) if corrected && v_los.abs() > V_LOS_THRESHOLD => {
            let v_rad = v_los.abs();
            VelocityCorrection {
                v_tot: Some((v_rad * v_rad + V_TAN_FROM_LOS * V_TAN_FROM_LOS).sqrt()),
                method: format!("estimated_from_v_los(v_rad={v_rad:.0},v_tan={V_TAN_FROM_LOS:.0})"),
            }
        }
        _ => VelocityCorrection {
            v_tot,
            method: METHOD_ORIGINAL.to_string(),
        },
    }
}

fn tangential_for_source(source: &str) -> f64 {
    let source = source.to_lowercase();
    if source.contains("giant") || source.contains("supergiant") {
        V_TAN_GIANT
    } else if source.contains("dwarf") || source.contains("main") {
        V_TAN_DWARF
    } else {
        V_TAN_DEFAULT
    }
}
