use serde::{Deserialize, Serialize};

// Configuration structure for network attribute column mapping
#[derive(Debug, Clone)]
pub struct ColumnConfig {
    pub key: String,
    pub downstream: String,
    pub label: String,
    pub length: String,
    pub width_bf: String,
    pub sinuosity: String,
    pub drain_area: String,
    pub eff_da: String,
    pub direct_da: String,
    pub fp_area: String,
    pub d_mid: String,
    pub d_low: String,
    pub d_high: String,
    pub dist_d50: String,
    pub confine: String,
    pub confluence: String,
    pub dist_start: String,
    pub dist_end: String,
    pub g_shape: String,
    pub g_scale: String,
    pub dist_g_shape: String,
    pub dist_g_scale: String,
    pub qc_low: String,
    pub qc_mid: String,
    pub qc_high: String,
    pub slope_min: String,
    pub slope_mid: String,
    pub slope_max: String,
    pub fpt_min: String,
    pub fpt_mid: String,
    pub fpt_max: String,
}

impl ColumnConfig {
    pub fn new() -> Self {
        ColumnConfig {
            key: "id".to_string(),
            downstream: "toid".to_string(),
            label: "rid".to_string(),
            length: "Length_m".to_string(),
            width_bf: "w_bf".to_string(),
            sinuosity: "Sinuos".to_string(),
            drain_area: "Drain_Area".to_string(),
            eff_da: "eff_DA".to_string(),
            direct_da: "direct_DA".to_string(),
            fp_area: "fp_area".to_string(),
            d_mid: "D_pred_mid".to_string(),
            d_low: "D_pred_low".to_string(),
            d_high: "D_pred_hig".to_string(),
            dist_d50: "dist_d50".to_string(),
            confine: "confine".to_string(),
            confluence: "confluence".to_string(),
            dist_start: "dist_start".to_string(),
            dist_end: "dist_end".to_string(),
            g_shape: "g_shape".to_string(),
            g_scale: "g_scale".to_string(),
            dist_g_shape: "dist_g_sh".to_string(),
            dist_g_scale: "dist_g_sc".to_string(),
            qc_low: "Qc_low".to_string(),
            qc_mid: "Qc_mid".to_string(),
            qc_high: "Qc_high".to_string(),
            slope_min: "Slope_min".to_string(),
            slope_mid: "Slope_mid".to_string(),
            slope_max: "Slope_max".to_string(),
            fpt_min: "fpt_min".to_string(),
            fpt_mid: "fpt_mid".to_string(),
            fpt_max: "fpt_max".to_string(),
        }
    }
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Basin-wide model parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParams {
    /// Exponent b in the discharge ~ drainage-area relationship Q = a * DA^b.
    pub flow_exp: f64,
    /// Manning's n bounds across the basin; roughness is interpolated between
    /// them as a linear function of mid-scenario grain size.
    pub mannings_min: f64,
    pub mannings_max: f64,
    /// Floodplain Manning's n for overbank flow.
    pub fp_mannings: f64,
    /// Bulk density of stored sediment deposits (t/m^3).
    pub bulk_density: f64,
}

impl ModelParams {
    pub fn new(flow_exp: f64) -> Self {
        ModelParams {
            flow_exp,
            mannings_min: 0.03,
            mannings_max: 0.06,
            fp_mannings: 0.09,
            bulk_density: 1.0,
        }
    }
}
