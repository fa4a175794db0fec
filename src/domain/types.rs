//! Shared domain types.
//!
//! Input records are plain structs with explicit `Option` fields; nothing here
//! knows about CSV layout or file paths. Outputs derive `Serialize` where they
//! end up in JSON artifacts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::physics::M_SUN;

/// Artifacts produced by a suite step: name -> path string, scalar, list or map.
pub type ArtifactMap = BTreeMap<String, serde_json::Value>;

/// Observation classification tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    EmissionLine,
    Continuum,
    Mixed,
}

impl DataType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "emission_line" => Some(DataType::EmissionLine),
            "continuum" => Some(DataType::Continuum),
            "mixed" => Some(DataType::Mixed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::EmissionLine => "emission_line",
            DataType::Continuum => "continuum",
            DataType::Mixed => "mixed",
        }
    }
}

/// How the segmented-spacetime prediction `z_SEG` is formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegMode {
    /// Compose the geometric hint with `z_SR`; fall back to GR×SR.
    Hint,
    /// Plain GR×SR composition.
    Grsr,
    /// Mass-dependent correction of `z_GR`, then compose with `z_SR`.
    #[serde(alias = "deltaM")]
    DeltaM,
    /// `Hint` for S-stars / Sgr A* rows with a hint, `DeltaM` otherwise.
    Hybrid,
}

impl SegMode {
    pub fn label(self) -> &'static str {
        match self {
            SegMode::Hint => "hint",
            SegMode::Grsr => "grsr",
            SegMode::DeltaM => "deltaM",
            SegMode::Hybrid => "hybrid",
        }
    }

    /// Whether the Δ(M) diagnostics are meaningful in this mode.
    pub fn uses_delta_m(self) -> bool {
        matches!(self, SegMode::DeltaM | SegMode::Hybrid)
    }
}

/// One row of the redshift input table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationRow {
    /// 1-based file line of this record.
    pub line: usize,
    pub case: String,
    pub source: String,
    pub category: String,
    pub m_solar: Option<f64>,
    pub r_emit_m: Option<f64>,
    pub a_m: Option<f64>,
    pub e: Option<f64>,
    pub f_true_deg: Option<f64>,
    pub v_tot_mps: Option<f64>,
    pub v_los_mps: Option<f64>,
    pub z_geom_hint: Option<f64>,
    pub z: Option<f64>,
    pub f_emit_hz: Option<f64>,
    pub f_obs_hz: Option<f64>,
    pub data_type: Option<DataType>,
    /// Unrecognised columns as `(header, value)`, passed through to the debug dump.
    pub extras: Vec<(String, String)>,
}

impl ObservationRow {
    /// Keplerian triple and central mass are all present.
    pub fn is_strong(&self) -> bool {
        self.a_m.is_some() && self.e.is_some() && self.f_true_deg.is_some() && self.m_solar.is_some()
    }

    pub fn central_mass_kg(&self) -> Option<f64> {
        self.m_solar
            .filter(|m| m.is_finite() && *m > 0.0)
            .map(|m| m * M_SUN)
    }

    /// Untagged rows participate; tagged rows only when they are emission lines.
    pub fn in_paired_test(&self) -> bool {
        matches!(self.data_type, None | Some(DataType::EmissionLine))
    }
}

/// Where the observed redshift of a row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZSource {
    Z,
    Freq,
    Missing,
}

impl ZSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ZSource::Z => "z",
            ZSource::Freq => "freq",
            ZSource::Missing => "missing",
        }
    }
}

/// Where the effective emission radius came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiusSource {
    Emission,
    Orbit,
    Missing,
}

impl RadiusSource {
    pub fn as_str(self) -> &'static str {
        match self {
            RadiusSource::Emission => "r_emit_m",
            RadiusSource::Orbit => "r(a,e,f)",
            RadiusSource::Missing => "no r",
        }
    }
}

/// Δ(M) parameters: `Δ = (A·exp(−α·r_s) + B) · norm(log10 M)`, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeltaMParams {
    pub a: f64,
    pub b: f64,
    pub alpha: f64,
}

impl Default for DeltaMParams {
    fn default() -> Self {
        Self {
            a: 4.0,
            b: 0.0,
            alpha: 1e-11,
        }
    }
}

/// Settings for one redshift evaluation run.
#[derive(Debug, Clone, PartialEq)]
pub struct RedshiftConfig {
    pub mode: SegMode,
    /// Use the `z` column ahead of the frequency pair when both exist.
    pub prefer_z: bool,
    pub delta_m: DeltaMParams,
    /// Caller-supplied log10(M/kg) normalisation bounds; dataset extrema otherwise.
    pub logm_min: Option<f64>,
    pub logm_max: Option<f64>,
    pub bootstrap_samples: usize,
    pub seed: u64,
}

impl Default for RedshiftConfig {
    fn default() -> Self {
        Self {
            mode: SegMode::Hybrid,
            prefer_z: true,
            delta_m: DeltaMParams::default(),
            logm_min: None,
            logm_max: None,
            bootstrap_samples: 2000,
            seed: 1234,
        }
    }
}

/// Per-row evaluation output.
///
/// Unusable rows (no observed redshift) keep `z_obs = None`, NaN predictions
/// and a `note`; they feed the debug dump only.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRow {
    pub line: usize,
    pub case: String,
    pub category: String,
    pub m_solar: Option<f64>,
    pub z_obs: Option<f64>,
    pub z_source: ZSource,
    pub z_seg: f64,
    pub z_gr: f64,
    pub z_sr: f64,
    pub z_grsr: f64,
    pub abs_seg: f64,
    pub abs_gr: f64,
    pub abs_sr: f64,
    pub abs_grsr: f64,
    pub r_eff_m: Option<f64>,
    pub r_source: RadiusSource,
    pub v_tot_original: Option<f64>,
    pub v_tot_corrected: Option<f64>,
    pub v_correction_method: String,
    pub v_los_eff: f64,
    pub rs_m: Option<f64>,
    pub delta_m_percent: Option<f64>,
    pub log10m_norm: Option<f64>,
    pub strong: bool,
    pub in_paired_test: bool,
    pub note: Option<String>,
    pub extras: Vec<(String, String)>,
}

impl PredictionRow {
    pub fn is_usable(&self) -> bool {
        self.z_obs.is_some()
    }
}

/// One shell of the segwave chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellRow {
    pub ring: String,
    /// Temperature in K.
    pub t: f64,
    pub n: Option<f64>,
    /// Observed velocity in km/s.
    pub v_obs: Option<f64>,
}

impl ShellRow {
    pub fn new(ring: impl Into<String>, t: f64) -> Self {
        Self {
            ring: ring.into(),
            t,
            n: None,
            v_obs: None,
        }
    }
}

/// Free parameters of the segwave recursion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegwaveParams {
    /// Initial velocity `v_1` (km/s).
    pub v0: f64,
    pub alpha: f64,
    pub beta: f64,
    pub eta: f64,
}

/// Per-shell propagation output.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainRow {
    pub ring: String,
    pub t: f64,
    pub n: Option<f64>,
    pub q_k: f64,
    pub v_pred: f64,
    pub v_obs: Option<f64>,
    pub residual: Option<f64>,
    pub nu_out_hz: Option<f64>,
}
