use crate::errors::{ModelError, Result};
use nalgebra::{Matrix3, Vector3};
use serde::Deserialize;

/// One calibration observation: drainage area (km^2), discharge (m^3/s),
/// surveyed channel width (m).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WidthSample {
    #[serde(rename = "DA")]
    pub drain_area: f64,
    #[serde(rename = "Q")]
    pub discharge: f64,
    #[serde(rename = "w")]
    pub width: f64,
}

/// Channel-width regression fitted once from survey data:
/// w = intercept + c1 * ln(DA) + c2 * sqrt(Q).
#[derive(Debug, Clone, Copy)]
pub struct WidthModel {
    pub intercept: f64,
    pub coef_log_da: f64,
    pub coef_sqrt_q: f64,
    pub r_squared: f64,
}

impl WidthModel {
    /// Least-squares fit via the 3x3 normal equations. Rows with non-finite
    /// transformed predictors are dropped. An R^2 below 0.5 is reported as a
    /// data-quality warning but the fitted model is used regardless.
    pub fn fit(samples: &[WidthSample]) -> Result<Self> {
        let rows: Vec<(f64, f64, f64)> = samples
            .iter()
            .map(|s| (s.drain_area.ln(), s.discharge.sqrt(), s.width))
            .filter(|(x1, x2, y)| x1.is_finite() && x2.is_finite() && y.is_finite())
            .collect();

        if rows.is_empty() {
            return Err(ModelError::EmptyWidthTable);
        }

        let mut xtx = Matrix3::zeros();
        let mut xty = Vector3::zeros();
        for &(x1, x2, y) in &rows {
            let x = Vector3::new(1.0, x1, x2);
            xtx += x * x.transpose();
            xty += x * y;
        }

        let beta = xtx
            .lu()
            .solve(&xty)
            .ok_or(ModelError::DegenerateWidthFit)?;

        let mean_y = rows.iter().map(|r| r.2).sum::<f64>() / rows.len() as f64;
        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        for &(x1, x2, y) in &rows {
            let pred = beta[0] + beta[1] * x1 + beta[2] * x2;
            ss_res += (y - pred) * (y - pred);
            ss_tot += (y - mean_y) * (y - mean_y);
        }
        let r_squared = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else {
            1.0
        };

        println!("channel width regression");
        println!("  intercept: {}", beta[0]);
        println!("  coefficients: {} (ln DA), {} (sqrt Q)", beta[1], beta[2]);
        println!("  r squared: {}", r_squared);
        if r_squared < 0.5 {
            eprintln!("width model warning: r squared below 0.5, poor fit");
        }

        Ok(WidthModel {
            intercept: beta[0],
            coef_log_da: beta[1],
            coef_sqrt_q: beta[2],
            r_squared,
        })
    }

    /// Predicted width (m) for raw drainage area (km^2) and discharge
    /// (m^3/s). Callers apply their own floors/caps.
    pub fn predict(&self, drain_area: f64, discharge: f64) -> f64 {
        self.intercept + self.coef_log_da * drain_area.ln() + self.coef_sqrt_q * discharge.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_exact_linear_relationship() {
        // w = 2 + 3*ln(DA) + 0.5*sqrt(Q), no noise
        let mut samples = Vec::new();
        for da in [1.0_f64, 5.0, 20.0, 80.0] {
            for q in [0.5_f64, 4.0, 25.0] {
                samples.push(WidthSample {
                    drain_area: da,
                    discharge: q,
                    width: 2.0 + 3.0 * da.ln() + 0.5 * q.sqrt(),
                });
            }
        }
        let model = WidthModel::fit(&samples).unwrap();
        assert!((model.intercept - 2.0).abs() < 1e-9);
        assert!((model.coef_log_da - 3.0).abs() < 1e-9);
        assert!((model.coef_sqrt_q - 0.5).abs() < 1e-9);
        assert!(model.r_squared > 0.999999);
        assert!((model.predict(10.0, 9.0) - (2.0 + 3.0 * 10.0_f64.ln() + 1.5)).abs() < 1e-9);
    }

    #[test]
    fn empty_table_is_an_error() {
        match WidthModel::fit(&[]) {
            Err(ModelError::EmptyWidthTable) => {}
            other => panic!("expected empty-table error, got {other:?}"),
        }
    }

    #[test]
    fn collinear_rows_are_degenerate() {
        // ln(1) = 0 and sqrt(4) = 2 exactly, so the normal equations are
        // exactly singular
        let samples = vec![
            WidthSample {
                drain_area: 1.0,
                discharge: 4.0,
                width: 3.0,
            };
            5
        ];
        match WidthModel::fit(&samples) {
            Err(ModelError::DegenerateWidthFit) => {}
            other => panic!("expected degenerate-fit error, got {other:?}"),
        }
    }
}
