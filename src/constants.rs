/// Column names of the raw solar-manager export.
pub mod columns {
    pub const GATEWAY_ID: &str = "gateway_id";
    pub const CREATED_AT: &str = "createdAt";
    pub const DATE: &str = "date";
    pub const PV_GENERATION: &str = "pv_generation";
    /// Canonical consumption column written to prepared datasets.
    pub const CONSUMPTION: &str = "consumption";
    /// Header used by the vendor export (first letter is a Cyrillic `с`).
    pub const CONSUMPTION_LEGACY: &str = "\u{0441}onsumption";
}

/// Split defaults and output layout.
pub mod splits {
    pub const DEFAULT_TRAIN: f64 = 0.8;
    pub const DEFAULT_DEV: f64 = 0.1;
    pub const DEFAULT_TEST: f64 = 0.1;
    /// Allowed drift of the ratio sum from `1.0`.
    pub const RATIO_SUM_TOLERANCE: f64 = 1e-9;

    pub const DATASET_SUBDIR: &str = "pv";
    pub const RUN_NAME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
    pub const ARGS_FILENAME: &str = "args.txt";
    pub const ALL_STEM: &str = "all";
    pub const TRAIN_STEM: &str = "train";
    pub const DEV_STEM: &str = "valid";
    pub const TEST_STEM: &str = "test";
}

/// File names inside an experiment results directory.
pub mod results {
    pub const PRED_STEM: &str = "pred";
    pub const TRUE_STEM: &str = "true";
    pub const METRICS_STEM: &str = "metrics";
    /// Extensions probed, in order, when looking for an array file.
    pub const ARRAY_EXTENSIONS: [&str; 3] = ["npy", "parquet", "csv"];
    pub const LAG_METRICS_FILENAME: &str = "lag_metrics.csv";
    pub const MAE_PLOT_FILENAME: &str = "mae.png";
    pub const MSE_PLOT_FILENAME: &str = "mse.png";
}

/// File layout of the tracking store.
pub mod tracking {
    pub const DEFAULT_PROJECT: &str = "pv-forecast";
    pub const RUN_FILENAME: &str = "run.json";
    pub const CONFIG_FILENAME: &str = "config.json";
    pub const HISTORY_FILENAME: &str = "history.jsonl";
    pub const SUMMARY_FILENAME: &str = "summary.json";
    pub const RUN_ID_FORMAT: &str = "%Y%m%d_%H%M%S%3f";
}
