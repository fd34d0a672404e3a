//! Clean, aggregate and split a raw PV-generation export.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::constants::columns::{
    CONSUMPTION, CONSUMPTION_LEGACY, CREATED_AT, DATE, GATEWAY_ID, PV_GENERATION,
};
use crate::constants::splits::{
    ALL_STEM, ARGS_FILENAME, DATASET_SUBDIR, DEV_STEM, RUN_NAME_FORMAT, TEST_STEM, TRAIN_STEM,
};
use crate::data::aggregate::group_sum;
use crate::data::filter::{apply_filters, drop_missing, drop_negative, select_values};
use crate::data::loader::{load_table, LoadOptions};
use crate::data::split::{split_by_group, SplitRatios};
use crate::data::writer::{write_table, OutputFormat};
use crate::error::PrepError;
use crate::tracking::RunLogger;

/// Settings of one preparation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepareOptions {
    /// Raw export (`.csv`, `.json` or `.parquet`).
    pub data_path: PathBuf,
    /// Root under which `pv/<run_name>/` is created.
    pub out_path: PathBuf,
    #[serde(flatten)]
    pub ratios: SplitRatios,
    /// Keep only these gateways and skip splitting. Empty means all gateways, split.
    pub gateway_ids: Vec<String>,
    /// Output directory name; a local timestamp when `None`.
    pub run_name: Option<String>,
    pub format: OutputFormat,
}

impl PrepareOptions {
    pub fn new(data_path: impl Into<PathBuf>, out_path: impl Into<PathBuf>) -> Self {
        PrepareOptions {
            data_path: data_path.into(),
            out_path: out_path.into(),
            ratios: SplitRatios::default(),
            gateway_ids: Vec::new(),
            run_name: None,
            format: OutputFormat::default(),
        }
    }
}

/// Options as named on the command line, for `args.txt` and the run logger.
#[derive(Debug, Serialize)]
struct ArgsSnapshot<'a> {
    data_path: &'a Path,
    out_path: &'a Path,
    train_size: f64,
    dev_size: f64,
    test_size: f64,
    gateway_ids: &'a [String],
    run_name: Option<&'a str>,
    format: OutputFormat,
}

impl<'a> From<&'a PrepareOptions> for ArgsSnapshot<'a> {
    fn from(options: &'a PrepareOptions) -> Self {
        ArgsSnapshot {
            data_path: &options.data_path,
            out_path: &options.out_path,
            train_size: options.ratios.train,
            dev_size: options.ratios.dev,
            test_size: options.ratios.test,
            gateway_ids: &options.gateway_ids,
            run_name: options.run_name.as_deref(),
            format: options.format,
        }
    }
}

/// Row counts of the written partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplitSizes {
    pub train: usize,
    pub dev: usize,
    pub test: usize,
}

/// What a preparation run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrepareReport {
    pub out_dir: PathBuf,
    pub raw_rows: usize,
    pub cleaned_rows: usize,
    pub aggregated_rows: usize,
    /// Rows left after the gateway filter, when one was given.
    pub filtered_rows: Option<usize>,
    pub split: Option<SplitSizes>,
}

impl PrepareReport {
    fn metrics(&self) -> BTreeMap<String, f64> {
        let mut m = BTreeMap::new();
        m.insert("raw_rows".to_string(), self.raw_rows as f64);
        m.insert("cleaned_rows".to_string(), self.cleaned_rows as f64);
        m.insert("aggregated_rows".to_string(), self.aggregated_rows as f64);
        if let Some(n) = self.filtered_rows {
            m.insert("filtered_rows".to_string(), n as f64);
        }
        if let Some(s) = self.split {
            m.insert("train_rows".to_string(), s.train as f64);
            m.insert("dev_rows".to_string(), s.dev as f64);
            m.insert("test_rows".to_string(), s.test as f64);
        }
        m
    }
}

/// Run the preparation pipeline.
///
/// Ratios are checked before anything touches the file system. The output
/// directory must not exist yet; nothing is written over an earlier run.
pub fn run(options: &PrepareOptions, logger: &mut dyn RunLogger) -> Result<PrepareReport> {
    let ratios = options.ratios.validated()?;

    info!("Process {}.", options.data_path.display());
    if !options.data_path.is_file() {
        return Err(PrepError::input(
            &options.data_path,
            "does not exist or is not a regular file",
        )
        .into());
    }

    let run_name = options
        .run_name
        .clone()
        .unwrap_or_else(|| Local::now().format(RUN_NAME_FORMAT).to_string());
    let out_dir = create_run_dir(&options.out_path.join(DATASET_SUBDIR), &run_name)?;
    let args = ArgsSnapshot::from(options);
    write_args(&out_dir.join(ARGS_FILENAME), &args)?;
    logger.log_config(&serde_json::to_value(&args)?)?;

    let raw = load_table(
        &options.data_path,
        &LoadOptions::with_text_columns([GATEWAY_ID, CREATED_AT]),
    )?;
    info!(
        "Loaded {} samples with {} features",
        raw.len(),
        raw.columns.len()
    );

    let consumption = raw.resolve_column(&[CONSUMPTION, CONSUMPTION_LEGACY])?;
    let cleaned = drop_negative(&raw, PV_GENERATION)?;
    let cleaned = drop_negative(&cleaned, consumption)?;
    info!(
        "Removed negative: {} of {} samples remain",
        cleaned.len(),
        raw.len()
    );

    let keyed = drop_missing(&cleaned, &[GATEWAY_ID, CREATED_AT])?;
    if keyed.len() < cleaned.len() {
        info!(
            "Removed {} samples without gateway_id or createdAt",
            cleaned.len() - keyed.len()
        );
    }
    let mut aggregated = group_sum(&keyed, &[GATEWAY_ID, CREATED_AT], &[PV_GENERATION, consumption])?;
    aggregated.rename_column(CREATED_AT, DATE)?;
    if consumption != CONSUMPTION {
        aggregated.rename_column(consumption, CONSUMPTION)?;
    }
    info!(
        "Grouped by gateway_id and createdAt: {} of {} samples remain",
        aggregated.len(),
        raw.len()
    );

    let ext = options.format.extension();
    let path_for = |stem: &str| out_dir.join(format!("{stem}.{ext}"));

    let mut report = PrepareReport {
        out_dir: out_dir.clone(),
        raw_rows: raw.len(),
        cleaned_rows: cleaned.len(),
        aggregated_rows: aggregated.len(),
        filtered_rows: None,
        split: None,
    };

    if !options.gateway_ids.is_empty() {
        let filters = select_values(GATEWAY_ID, options.gateway_ids.iter().map(String::as_str));
        let filtered = apply_filters(&aggregated, &filters)?;
        info!(
            "Filter gateway_id: {} of {} samples remain",
            filtered.len(),
            raw.len()
        );
        write_table(&path_for(ALL_STEM), &filtered)?;
        report.filtered_rows = Some(filtered.len());
    } else {
        let parts = split_by_group(&aggregated, GATEWAY_ID, ratios)?;
        info!(
            "Train/valid/test split: ({}, {})/({}, {})/({}, {})",
            parts.train.len(),
            parts.train.columns.len(),
            parts.dev.len(),
            parts.dev.columns.len(),
            parts.test.len(),
            parts.test.columns.len()
        );
        write_table(&path_for(ALL_STEM), &aggregated)?;
        write_table(&path_for(TRAIN_STEM), &parts.train)?;
        write_table(&path_for(DEV_STEM), &parts.dev)?;
        write_table(&path_for(TEST_STEM), &parts.test)?;
        report.split = Some(SplitSizes {
            train: parts.train.len(),
            dev: parts.dev.len(),
            test: parts.test.len(),
        });
    }

    logger.log_dict(&report.metrics(), None)?;
    info!("Done.");
    Ok(report)
}

/// Create `<parent>/<name>`, refusing to reuse an existing directory.
fn create_run_dir(parent: &Path, name: &str) -> Result<PathBuf, PrepError> {
    let dir = parent.join(name);
    if dir.exists() {
        return Err(PrepError::OutputExists(dir));
    }
    fs::create_dir_all(parent)?;
    match fs::create_dir(&dir) {
        Ok(()) => Ok(dir),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(PrepError::OutputExists(dir)),
        Err(e) => Err(e.into()),
    }
}

/// Snapshot options as `--key=value` lines.
fn write_args<T: Serialize>(path: &Path, options: &T) -> Result<()> {
    let JsonValue::Object(fields) = serde_json::to_value(options)? else {
        anyhow::bail!("options must serialize to a map");
    };
    let mut file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    for (key, value) in fields {
        let text = match value {
            JsonValue::String(s) => s,
            JsonValue::Null => "None".to_string(),
            other => other.to_string(),
        };
        writeln!(file, "--{key}={text}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_snapshot_has_one_line_per_option() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ARGS_FILENAME);
        let mut options = PrepareOptions::new("raw.csv", "out");
        options.gateway_ids = vec!["g1".into()];
        write_args(&path, &ArgsSnapshot::from(&options)).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines.contains(&"--data_path=raw.csv"));
        assert!(lines.contains(&"--train_size=0.8"));
        assert!(lines.contains(&"--dev_size=0.1"));
        assert!(lines.contains(&"--test_size=0.1"));
        assert!(!lines.iter().any(|l| l.starts_with("--train=")));
        assert!(lines.contains(&"--gateway_ids=[\"g1\"]"));
        assert!(lines.contains(&"--run_name=None"));
        assert!(lines.contains(&"--format=csv"));
    }

    #[test]
    fn existing_run_dir_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        create_run_dir(dir.path(), "run").unwrap();
        assert!(matches!(
            create_run_dir(dir.path(), "run"),
            Err(PrepError::OutputExists(_))
        ));
    }
}
