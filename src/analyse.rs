//! Per-lag error analysis of a finished forecasting run.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;

use crate::constants::results::{
    LAG_METRICS_FILENAME, MAE_PLOT_FILENAME, METRICS_STEM, MSE_PLOT_FILENAME, PRED_STEM, TRUE_STEM,
};
use crate::error::PrepError;
use crate::results::arrays::{find_array_file, load_array, load_npy_raw};
use crate::results::metrics::{per_lag_metrics, LagMetrics};
use crate::results::plot::{plot_lag_series, Series};
use crate::tracking::RunLogger;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyseOptions {
    /// Directory holding `pred` and `true` arrays.
    pub results_path: PathBuf,
    /// Render `mae.png` and `mse.png`.
    pub plots: bool,
}

impl AnalyseOptions {
    pub fn new(results_path: impl Into<PathBuf>) -> Self {
        AnalyseOptions {
            results_path: results_path.into(),
            plots: true,
        }
    }
}

/// What an analysis produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyseReport {
    pub lags: Vec<LagMetrics>,
    pub metrics_path: PathBuf,
    pub plots: Vec<PathBuf>,
}

fn required_array(dir: &Path, stem: &str) -> Result<PathBuf, PrepError> {
    find_array_file(dir, stem)
        .ok_or_else(|| PrepError::input(dir, format!("no {stem}.npy, {stem}.parquet or {stem}.csv")))
}

/// Compute, store and plot per-lag metrics for one results directory.
pub fn run(options: &AnalyseOptions, logger: &mut dyn RunLogger) -> Result<AnalyseReport> {
    let dir = &options.results_path;
    info!("Process {}.", dir.display());
    if !dir.is_dir() {
        return Err(PrepError::input(dir, "does not exist or is not a directory").into());
    }
    logger.log_config(&serde_json::to_value(options)?)?;

    let pred = load_array(&required_array(dir, PRED_STEM)?)?;
    let truth = load_array(&required_array(dir, TRUE_STEM)?)?;
    info!(
        "Loaded predictions {:?} and targets {:?}",
        pred.shape(),
        truth.shape()
    );

    let stored = dir.join(format!("{METRICS_STEM}.npy"));
    if stored.is_file() {
        let (_, values) = load_npy_raw(&stored)?;
        info!("Stored run metrics (mae, mse, rmse, mape, mspe): {values:?}");
    }

    let lags = per_lag_metrics(&pred, &truth)?;

    let metrics_path = dir.join(LAG_METRICS_FILENAME);
    let mut writer = csv::Writer::from_path(&metrics_path)
        .with_context(|| format!("creating {}", metrics_path.display()))?;
    for lag in &lags {
        writer.serialize(lag)?;
        logger.log_dict(&lag.as_dict(), Some(lag.lag as u64))?;
    }
    writer.flush()?;
    info!("Wrote {} lags to {}", lags.len(), metrics_path.display());

    let mut plots = Vec::new();
    if options.plots {
        let column = |f: fn(&LagMetrics) -> f64| lags.iter().map(f).collect::<Vec<_>>();
        let (mae, mse) = (column(|l| l.mae), column(|l| l.mse));
        let (mean_pred, mean_true) = (column(|l| l.mean_pred), column(|l| l.mean_true));

        let mae_path = dir.join(MAE_PLOT_FILENAME);
        plot_lag_series(
            &mae_path,
            "MAE by lag",
            &[
                Series { name: "mae", values: &mae },
                Series { name: "preds", values: &mean_pred },
                Series { name: "trues", values: &mean_true },
            ],
        )?;
        let mse_path = dir.join(MSE_PLOT_FILENAME);
        plot_lag_series(&mse_path, "MSE by lag", &[Series { name: "mse", values: &mse }])?;
        plots = vec![mae_path, mse_path];
    }

    info!("Done.");
    Ok(AnalyseReport {
        lags,
        metrics_path,
        plots,
    })
}
