use std::collections::BTreeMap;

use anyhow::{ensure, Result};
use ndarray::{ArrayView, Dimension};
use serde::Serialize;

use super::arrays::ForecastArray;

/// Point-forecast error metrics over one set of predictions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    pub mape: f64,
    pub mspe: f64,
}

/// Compute MAE, MSE, RMSE, MAPE and MSPE between `pred` and `truth`.
///
/// Percentage errors divide by `truth` with IEEE semantics, so zero targets
/// give infinite or NaN values. Empty input gives NaN everywhere.
pub fn metric<D: Dimension>(
    pred: &ArrayView<'_, f64, D>,
    truth: &ArrayView<'_, f64, D>,
) -> Result<Metrics> {
    ensure!(
        pred.shape() == truth.shape(),
        "prediction shape {:?} does not match truth shape {:?}",
        pred.shape(),
        truth.shape()
    );
    let diff = pred - truth;
    let rel = &diff / truth;

    let mae = diff.mapv(f64::abs).mean().unwrap_or(f64::NAN);
    let mse = diff.mapv(|d| d * d).mean().unwrap_or(f64::NAN);
    let mape = rel.mapv(f64::abs).mean().unwrap_or(f64::NAN);
    let mspe = rel.mapv(|r| r * r).mean().unwrap_or(f64::NAN);
    Ok(Metrics {
        mae,
        mse,
        rmse: mse.sqrt(),
        mape,
        mspe,
    })
}

/// Metrics for a single forecast lag (1-based), as written to `lag_metrics.csv`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LagMetrics {
    pub lag: usize,
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    pub mape: f64,
    pub mspe: f64,
    pub mean_pred: f64,
    pub mean_true: f64,
}

impl LagMetrics {
    /// Scalar values keyed by name, for run loggers.
    pub fn as_dict(&self) -> BTreeMap<String, f64> {
        [
            ("mae", self.mae),
            ("mse", self.mse),
            ("rmse", self.rmse),
            ("mape", self.mape),
            ("mspe", self.mspe),
            ("mean_pred", self.mean_pred),
            ("mean_true", self.mean_true),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

/// Metrics per lag over all samples and features.
pub fn per_lag_metrics(pred: &ForecastArray, truth: &ForecastArray) -> Result<Vec<LagMetrics>> {
    ensure!(
        pred.shape() == truth.shape(),
        "pred has shape {:?} but true has shape {:?}",
        pred.shape(),
        truth.shape()
    );

    (0..pred.lags())
        .map(|i| {
            let p = pred.at_lag(i);
            let t = truth.at_lag(i);
            let m = metric(&p, &t)?;
            Ok(LagMetrics {
                lag: i + 1,
                mae: m.mae,
                mse: m.mse,
                rmse: m.rmse,
                mape: m.mape,
                mspe: m.mspe,
                mean_pred: p.mean().unwrap_or(f64::NAN),
                mean_true: t.mean().unwrap_or(f64::NAN),
            })
        })
        .collect()
}
