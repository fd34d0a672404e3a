use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use pv_forecast_prep::data::loader::{load_table, LoadOptions};
use pv_forecast_prep::data::writer::OutputFormat;
use pv_forecast_prep::prepare::{self, PrepareOptions};
use pv_forecast_prep::tracking::{NoLogger, RunLogger, TrackingLogger, TrackingSettings};
use pv_forecast_prep::{PrepError, SplitRatios, Table, Value};

const RAW: &str = "\
id,gateway_id,createdAt,pv_generation,\u{0441}onsumption
0,gw_a,2021-05-01 10:00:00,1.0,0.5
1,gw_a,2021-05-01 10:00:00,2.0,0.25
2,gw_a,2021-05-01 10:15:00,-0.1,0.5
3,gw_a,2021-05-01 10:30:00,3.0,0.5
4,gw_b,2021-05-01 10:00:00,4.0,-1.0
5,gw_b,2021-05-01 10:15:00,4.5,1.0
6,gw_b,2021-05-01 10:30:00,5.0,1.0
7,gw_c,2021-05-01 10:00:00,0.5,0.5
8,gw_d,2021-05-01 10:00:00,0.0,0.1
9,gw_d,2021-05-01 10:15:00,0.0,0.1
10,,2021-05-01 10:15:00,9.0,9.0
";

fn write_raw(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("raw.csv");
    fs::write(&path, RAW).unwrap();
    path
}

fn options(dir: &Path) -> PrepareOptions {
    let mut options = PrepareOptions::new(write_raw(dir), dir.join("out"));
    options.run_name = Some("run".into());
    options
}

fn read(path: &Path) -> Table {
    load_table(path, &LoadOptions::with_text_columns(["gateway_id", "date"])).unwrap()
}

fn gateways(table: &Table) -> BTreeSet<Value> {
    table.unique_values("gateway_id").unwrap()
}

#[test]
fn cleans_aggregates_and_splits() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = options(dir.path());
    opts.ratios = SplitRatios::new(0.5, 0.25, 0.25);

    let report = prepare::run(&opts, &mut NoLogger).unwrap();
    assert_eq!(report.out_dir, dir.path().join("out").join("pv").join("run"));
    assert_eq!(report.raw_rows, 11);
    // One negative pv and one negative consumption row dropped.
    assert_eq!(report.cleaned_rows, 9);
    // gw_a 10:00 is summed; the row without a gateway is dropped.
    assert_eq!(report.aggregated_rows, 7);

    let all = read(&report.out_dir.join("all.csv"));
    assert_eq!(all.columns, vec!["gateway_id", "date", "pv_generation", "consumption"]);
    assert_eq!(
        all.rows[0],
        vec![
            Value::from("gw_a"),
            Value::from("2021-05-01 10:00:00"),
            Value::Float(3.0),
            Value::Float(0.75),
        ]
    );

    // 7 rows: test and dev targets are 1.75; gw_d (2) is too big, gw_c (1) fits test.
    let train = read(&report.out_dir.join("train.csv"));
    let dev = read(&report.out_dir.join("valid.csv"));
    let test = read(&report.out_dir.join("test.csv"));
    assert_eq!(gateways(&test), BTreeSet::from([Value::from("gw_c")]));
    assert!(dev.is_empty());
    assert_eq!(
        gateways(&train),
        BTreeSet::from([Value::from("gw_a"), Value::from("gw_b"), Value::from("gw_d")])
    );
    assert_eq!(train.len() + dev.len() + test.len(), all.len());

    let split = report.split.unwrap();
    assert_eq!((split.train, split.dev, split.test), (6, 0, 1));

    let args = fs::read_to_string(report.out_dir.join("args.txt")).unwrap();
    assert!(args.lines().any(|l| l == "--test_size=0.25"));
}

#[test]
fn gateway_filter_writes_only_all() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = options(dir.path());
    opts.gateway_ids = vec!["gw_b".into()];

    let report = prepare::run(&opts, &mut NoLogger).unwrap();
    assert_eq!(report.filtered_rows, Some(2));
    assert!(report.split.is_none());
    assert!(!report.out_dir.join("train.csv").exists());

    let all = read(&report.out_dir.join("all.csv"));
    assert_eq!(gateways(&all), BTreeSet::from([Value::from("gw_b")]));
}

#[test]
fn parquet_output_is_supported() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = options(dir.path());
    opts.format = OutputFormat::Parquet;

    let report = prepare::run(&opts, &mut NoLogger).unwrap();
    for stem in ["all", "train", "valid", "test"] {
        assert!(report.out_dir.join(format!("{stem}.parquet")).is_file());
    }
    let all = read(&report.out_dir.join("all.parquet"));
    assert_eq!(all.len(), report.aggregated_rows);
}

#[test]
fn bad_ratios_fail_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = options(dir.path());
    opts.ratios = SplitRatios::new(0.8, 0.1, 0.05);

    let err = prepare::run(&opts, &mut NoLogger).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PrepError>(),
        Some(PrepError::Configuration(_))
    ));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn missing_input_is_an_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = options(dir.path());
    opts.data_path = dir.path().join("nope.csv");

    let err = prepare::run(&opts, &mut NoLogger).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PrepError>(),
        Some(PrepError::Input { .. })
    ));
}

#[test]
fn rerun_into_same_directory_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let opts = options(dir.path());
    prepare::run(&opts, &mut NoLogger).unwrap();

    let err = prepare::run(&opts, &mut NoLogger).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PrepError>(),
        Some(PrepError::OutputExists(_))
    ));
}

#[test]
fn run_is_recorded_by_tracking_logger() {
    let dir = tempfile::tempdir().unwrap();
    let opts = options(dir.path());
    let mut logger =
        TrackingLogger::init(&dir.path().join("tracking"), TrackingSettings::default()).unwrap();

    prepare::run(&opts, &mut logger).unwrap();
    logger.close().unwrap();

    let config: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(logger.dir().join("config.json")).unwrap())
            .unwrap();
    assert_eq!(config["train_size"], serde_json::json!(0.8));
    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(logger.dir().join("summary.json")).unwrap())
            .unwrap();
    assert_eq!(summary["aggregated_rows"], serde_json::json!(7.0));
}
