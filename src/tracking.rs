//! Experiment-tracking loggers.
//!
//! [`RunLogger`] is the seam used by the pipelines. [`NoLogger`] discards
//! everything; [`TrackingLogger`] records a run in a file-backed tracking
//! store laid out as `<root>/<project>/<run_id>/`.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::constants::tracking::{
    CONFIG_FILENAME, DEFAULT_PROJECT, HISTORY_FILENAME, RUN_FILENAME, RUN_ID_FORMAT,
    SUMMARY_FILENAME,
};

/// Sink for run configuration and metrics.
pub trait RunLogger {
    /// Merge `config` (a JSON object) into the run configuration.
    fn log_config(&mut self, config: &JsonValue) -> Result<()>;

    /// Record a batch of scalar metrics, optionally at an explicit step.
    fn log_dict(&mut self, values: &BTreeMap<String, f64>, step: Option<u64>) -> Result<()>;

    /// Finish the run. Calling it again is a no-op.
    fn close(&mut self) -> Result<()>;
}

/// Logger that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLogger;

impl RunLogger for NoLogger {
    fn log_config(&mut self, _config: &JsonValue) -> Result<()> {
        Ok(())
    }

    fn log_dict(&mut self, _values: &BTreeMap<String, f64>, _step: Option<u64>) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Identification of a tracked run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingSettings {
    pub name: Option<String>,
    pub project: Option<String>,
    pub entity: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Finished,
}

/// Contents of `run.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub id: String,
    pub name: Option<String>,
    pub project: String,
    pub entity: Option<String>,
    pub tags: Vec<String>,
    pub state: RunState,
    pub started_at: String,
    pub finished_at: Option<String>,
}

/// Logger backed by a file tracking store.
///
/// History lines carry `_step` and `_timestamp` next to the logged values.
/// Steps never go backwards: a batch logged at an explicit step lower than
/// the last one is dropped with a warning.
pub struct TrackingLogger {
    dir: PathBuf,
    info: RunInfo,
    config: Map<String, JsonValue>,
    history: BufWriter<File>,
    summary: BTreeMap<String, f64>,
    last_step: Option<u64>,
    closed: bool,
}

impl TrackingLogger {
    /// Start a new run under `root`.
    pub fn init(root: &Path, settings: TrackingSettings) -> Result<Self> {
        let project = settings
            .project
            .unwrap_or_else(|| DEFAULT_PROJECT.to_string());
        let project_dir = root.join(&project);
        fs::create_dir_all(&project_dir)
            .with_context(|| format!("creating {}", project_dir.display()))?;

        let now = Local::now();
        let (id, dir) = create_unique_dir(&project_dir, &now.format(RUN_ID_FORMAT).to_string())?;

        let info = RunInfo {
            id,
            name: settings.name,
            project,
            entity: settings.entity,
            tags: settings.tags,
            state: RunState::Running,
            started_at: now.to_rfc3339(),
            finished_at: None,
        };
        write_json(&dir.join(RUN_FILENAME), &info)?;

        let history = File::create(dir.join(HISTORY_FILENAME)).context("creating run history")?;
        log::info!("Tracking run {} in {}", info.id, dir.display());

        Ok(TrackingLogger {
            dir,
            info,
            config: Map::new(),
            history: BufWriter::new(history),
            summary: BTreeMap::new(),
            last_step: None,
            closed: false,
        })
    }

    /// Directory holding this run's files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl RunLogger for TrackingLogger {
    fn log_config(&mut self, config: &JsonValue) -> Result<()> {
        let Some(entries) = config.as_object() else {
            bail!("run config must be a JSON object");
        };
        for (key, value) in entries {
            self.config.insert(key.clone(), value.clone());
        }
        write_json(&self.dir.join(CONFIG_FILENAME), &self.config)
    }

    fn log_dict(&mut self, values: &BTreeMap<String, f64>, step: Option<u64>) -> Result<()> {
        let step = match (step, self.last_step) {
            (Some(s), Some(last)) if s < last => {
                log::warn!("Dropping metrics logged at step {s}; run is already at step {last}");
                return Ok(());
            }
            (Some(s), _) => s,
            (None, Some(last)) => last + 1,
            (None, None) => 0,
        };

        let mut line = Map::new();
        line.insert("_step".into(), step.into());
        line.insert("_timestamp".into(), timestamp_secs().into());
        for (key, &value) in values {
            line.insert(key.clone(), value.into());
            self.summary.insert(key.clone(), value);
        }
        serde_json::to_writer(&mut self.history, &line)?;
        self.history.write_all(b"\n")?;

        self.last_step = Some(step);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.history.flush().context("flushing run history")?;
        write_json(&self.dir.join(SUMMARY_FILENAME), &self.summary)?;

        self.info.state = RunState::Finished;
        self.info.finished_at = Some(Local::now().to_rfc3339());
        write_json(&self.dir.join(RUN_FILENAME), &self.info)?;
        log::info!("Finished run {}", self.info.id);
        Ok(())
    }
}

impl Drop for TrackingLogger {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to finish run {}: {e:#}", self.info.id);
        }
    }
}

/// Open a tracking run under `root`, or a [`NoLogger`] when `root` is `None`.
pub fn open_logger(root: Option<&Path>, settings: TrackingSettings) -> Result<Box<dyn RunLogger>> {
    Ok(match root {
        Some(root) => Box::new(TrackingLogger::init(root, settings)?),
        None => Box::new(NoLogger),
    })
}

/// Create `<parent>/<base>`, falling back to `<base>-1`, `<base>-2`, ... on collision.
fn create_unique_dir(parent: &Path, base: &str) -> Result<(String, PathBuf)> {
    for attempt in 0..1000u32 {
        let id = if attempt == 0 {
            base.to_string()
        } else {
            format!("{base}-{attempt}")
        };
        let dir = parent.join(&id);
        match fs::create_dir(&dir) {
            Ok(()) => return Ok((id, dir)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e).with_context(|| format!("creating {}", dir.display())),
        }
    }
    bail!("no free run id for {base} under {}", parent.display())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn timestamp_secs() -> f64 {
    Local::now().timestamp_millis() as f64 / 1000.0
}
