use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use clap::Parser;
use ndarray::Array3;
use npyz::WriterBuilder;

use pv_forecast_prep::constants::columns::{
    CONSUMPTION_LEGACY, CREATED_AT, GATEWAY_ID, PV_GENERATION,
};
use pv_forecast_prep::results::metrics::metric;

/// Write a synthetic raw PV export and synthetic forecast results.
#[derive(Debug, Parser)]
struct Args {
    /// Directory receiving `raw_pv.csv` and `results/`.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Days of 15-minute readings per gateway.
    #[arg(long, default_value_t = 7)]
    days: u32,
    /// Forecast windows in the synthetic results.
    #[arg(long, default_value_t = 200)]
    samples: usize,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Clear-sky shaped generation for an hour of the day, zero at night.
fn solar_profile(hour: f64, peak_kw: f64) -> f64 {
    let (sunrise, sunset) = (6.0, 20.0);
    if hour <= sunrise || hour >= sunset {
        return 0.0;
    }
    let phase = (hour - sunrise) / (sunset - sunrise) * std::f64::consts::PI;
    peak_kw * phase.sin().powi(2)
}

fn write_raw_export(path: &Path, rng: &mut SimpleRng, days: u32) -> Result<usize> {
    // (gateway, peak kW, meters reporting per timestamp)
    let gateways = [
        ("5bc8d9a84ad9805f7c30c68d", 8.0, 2),
        ("5c1a2f7e9b3d4e0012ab34cd", 5.5, 1),
        ("5d77e0c4a1f2b30019cd56ef", 10.0, 2),
        ("5e01b9d2c8a7f40023ef7890", 3.0, 1),
        ("5f3c6a18d4b9e50034a1b2c3", 6.5, 3),
        ("600a4d2be7c1f60045c3d4e5", 4.0, 1),
    ];
    let start = NaiveDate::from_ymd_opt(2021, 5, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .context("invalid start date")?;
    let steps = days as i64 * 24 * 4;

    let mut writer = csv::Writer::from_path(path).context("creating raw export")?;
    writer.write_record(["id", GATEWAY_ID, CREATED_AT, PV_GENERATION, CONSUMPTION_LEGACY, "meter"])?;

    let mut id = 0u64;
    for &(gateway, peak_kw, meters) in &gateways {
        for step in 0..steps {
            let ts = start + Duration::minutes(15 * step);
            let hour = (step % 96) as f64 / 4.0;
            for meter in 0..meters {
                let share = peak_kw / meters as f64;
                // Sensor glitches show up as small negative readings.
                let pv = solar_profile(hour, share) + rng.gauss(0.0, 0.05 * share);
                let load = 0.4 + 0.3 * (hour / 24.0 * std::f64::consts::TAU).cos().abs()
                    + rng.gauss(0.0, 0.1);
                writer.write_record([
                    id.to_string(),
                    gateway.to_string(),
                    ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                    format!("{pv:.4}"),
                    format!("{load:.4}"),
                    format!("m{meter}"),
                ])?;
                id += 1;
            }
        }
    }
    writer.flush()?;
    Ok(id as usize)
}

fn write_npy(path: &Path, shape: &[usize], values: impl IntoIterator<Item = f32>) -> Result<()> {
    let shape: Vec<u64> = shape.iter().map(|&d| d as u64).collect();
    let file = BufWriter::new(
        File::create(path).with_context(|| format!("creating {}", path.display()))?,
    );
    let mut writer = npyz::WriteOptions::<f32>::new()
        .default_dtype()
        .shape(&shape)
        .writer(file)
        .begin_nd()?;
    writer.extend(values)?;
    writer.finish()?;
    Ok(())
}

fn write_results(dir: &Path, rng: &mut SimpleRng, samples: usize) -> Result<()> {
    const PRED_LEN: usize = 24;
    fs::create_dir_all(dir)?;

    let truth = Array3::from_shape_fn((samples, PRED_LEN, 1), |(s, lag, _)| {
        solar_profile(((s + lag) % 24) as f64, 6.0) as f32 + 0.1
    });
    // Error grows with the horizon.
    let pred = Array3::from_shape_fn((samples, PRED_LEN, 1), |(s, lag, f)| {
        truth[[s, lag, f]] + rng.gauss(0.0, 0.05 + 0.03 * lag as f64) as f32
    });

    let m = metric(&pred.mapv(f64::from).view(), &truth.mapv(f64::from).view())?;
    let summary = [m.mae, m.mse, m.rmse, m.mape, m.mspe].map(|v| v as f32);

    write_npy(&dir.join("pred.npy"), pred.shape(), pred.iter().copied())?;
    write_npy(&dir.join("true.npy"), truth.shape(), truth.iter().copied())?;
    write_npy(&dir.join("metrics.npy"), &[summary.len()], summary)?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let mut rng = SimpleRng::new(args.seed);

    fs::create_dir_all(&args.out_dir)?;
    let raw_path = args.out_dir.join("raw_pv.csv");
    let rows = write_raw_export(&raw_path, &mut rng, args.days)?;
    log::info!("Wrote {rows} readings to {}", raw_path.display());

    let results_dir = args.out_dir.join("results");
    write_results(&results_dir, &mut rng, args.samples)?;
    log::info!(
        "Wrote {} forecast windows to {}",
        args.samples,
        results_dir.display()
    );
    Ok(())
}
