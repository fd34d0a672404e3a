use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use pv_forecast_prep::analyse::{self, AnalyseOptions};
use pv_forecast_prep::constants::splits::{DEFAULT_DEV, DEFAULT_TEST, DEFAULT_TRAIN};
use pv_forecast_prep::data::writer::OutputFormat;
use pv_forecast_prep::prepare::{self, PrepareOptions};
use pv_forecast_prep::tracking::{open_logger, TrackingSettings};
use pv_forecast_prep::SplitRatios;

#[derive(Debug, Parser)]
#[command(name = "pv-forecast-prep", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    tracking: TrackingArgs,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Clean, aggregate and split a raw PV export.
    Prepare {
        #[arg(long, default_value = "../../data/raw/export_solar_manager_data_133.csv")]
        data_path: PathBuf,
        #[arg(long, default_value = "../../data/informer/datasets")]
        out_path: PathBuf,
        #[arg(long, default_value_t = DEFAULT_TRAIN)]
        train_size: f64,
        #[arg(long, default_value_t = DEFAULT_DEV)]
        dev_size: f64,
        #[arg(long, default_value_t = DEFAULT_TEST)]
        test_size: f64,
        /// Keep only these gateways and write `all` without splitting.
        #[arg(long, num_args = 1..)]
        gateway_ids: Vec<String>,
        /// Output directory name (default: current local time).
        #[arg(long)]
        run_name: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,
    },
    /// Compute and plot per-lag errors of a results directory.
    Analyse {
        #[arg(long)]
        results_path: PathBuf,
        /// Skip writing mae.png / mse.png.
        #[arg(long)]
        no_plots: bool,
    },
}

#[derive(Debug, Args)]
struct TrackingArgs {
    /// Record the run in a tracking store at this directory.
    #[arg(long, global = true)]
    tracking_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    project: Option<String>,
    #[arg(long, global = true)]
    entity: Option<String>,
    /// Display name of the tracked run.
    #[arg(long, global = true)]
    tracking_name: Option<String>,
    #[arg(long = "tag", global = true)]
    tags: Vec<String>,
}

impl TrackingArgs {
    fn settings(&self) -> TrackingSettings {
        TrackingSettings {
            name: self.tracking_name.clone(),
            project: self.project.clone(),
            entity: self.entity.clone(),
            tags: self.tags.clone(),
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut logger = open_logger(cli.tracking.tracking_dir.as_deref(), cli.tracking.settings())?;

    let outcome = match cli.command {
        Command::Prepare {
            data_path,
            out_path,
            train_size,
            dev_size,
            test_size,
            gateway_ids,
            run_name,
            format,
        } => {
            let options = PrepareOptions {
                data_path,
                out_path,
                ratios: SplitRatios::new(train_size, dev_size, test_size),
                gateway_ids,
                run_name,
                format,
            };
            prepare::run(&options, logger.as_mut()).map(|report| {
                println!("out_dir={}", report.out_dir.display());
            })
        }
        Command::Analyse {
            results_path,
            no_plots,
        } => {
            let options = AnalyseOptions {
                results_path,
                plots: !no_plots,
            };
            analyse::run(&options, logger.as_mut()).map(|report| {
                println!("lag_metrics={}", report.metrics_path.display());
            })
        }
    };

    logger.close()?;
    outcome
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
