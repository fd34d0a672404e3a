use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type};
use ndarray::{Array3, ArrayView2, Axis};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::constants::results::ARRAY_EXTENSIONS;

/// Forecast values laid out as `(sample, lag, feature)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastArray {
    data: Array3<f64>,
}

impl ForecastArray {
    pub fn new(data: Array3<f64>) -> Self {
        ForecastArray { data }
    }

    /// Build from a flat row-major buffer and a shape of rank two or more.
    ///
    /// Rank two is `(sample, lag)`; axes after the second are flattened into
    /// the feature axis.
    pub fn from_shape_vec(shape: &[usize], values: Vec<f64>) -> Result<Self> {
        ensure!(
            shape.len() >= 2,
            "expected at least 2 axes (sample, lag), got shape {shape:?}"
        );
        let features = shape[2..].iter().product::<usize>();
        let data = Array3::from_shape_vec((shape[0], shape[1], features), values)
            .with_context(|| format!("values do not fit shape {shape:?}"))?;
        Ok(ForecastArray { data })
    }

    pub fn samples(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn lags(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn features(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// All values at lag index `lag` (0-based), as `(sample, feature)`.
    pub fn at_lag(&self, lag: usize) -> ArrayView2<'_, f64> {
        self.data.index_axis(Axis(1), lag)
    }

    pub fn view(&self) -> ndarray::ArrayView3<'_, f64> {
        self.data.view()
    }
}

/// Find `<dir>/<stem>.<ext>` for the first supported extension that exists.
pub fn find_array_file(dir: &Path, stem: &str) -> Option<PathBuf> {
    ARRAY_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{stem}.{ext}")))
        .find(|p| p.is_file())
}

/// Load a forecast array.  Dispatch by extension.
///
/// Supported formats:
/// * `.npy`     – float32 or float64, C order, shape `(samples, lags[, features...])`
/// * `.parquet` – one row per sample, a List<Float64|Float32> column with one value per lag
/// * `.csv`     – header row, one row per sample, one numeric column per lag
pub fn load_array(path: &Path) -> Result<ForecastArray> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let array = match ext.as_str() {
        "npy" => load_npy(path),
        "parquet" | "pq" => load_parquet(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    log::debug!("loaded array {:?} from {}", array.shape(), path.display());
    Ok(array)
}

/// Load any `.npy` file as a flat buffer plus its shape.
pub fn load_npy_raw(path: &Path) -> Result<(Vec<usize>, Vec<f64>)> {
    let file = File::open(path).context("opening npy file")?;
    let npy = npyz::NpyFile::new(BufReader::new(file)).context("reading npy header")?;
    ensure!(
        npy.order() == npyz::Order::C,
        "only C-ordered arrays are supported"
    );
    let shape: Vec<usize> = npy.shape().iter().map(|&d| d as usize).collect();

    let values: Vec<f64> = match npy.try_data::<f32>() {
        Ok(reader) => reader
            .map(|v| v.map(f64::from))
            .collect::<std::io::Result<_>>()?,
        Err(npy) => {
            let dtype = npy.dtype().descr();
            npy.data::<f64>()
                .with_context(|| format!("unsupported dtype {dtype}, expected float32 or float64"))?
                .collect::<std::io::Result<_>>()?
        }
    };
    Ok((shape, values))
}

fn load_npy(path: &Path) -> Result<ForecastArray> {
    let (shape, values) = load_npy_raw(path)?;
    ForecastArray::from_shape_vec(&shape, values)
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

fn load_parquet(path: &Path) -> Result<ForecastArray> {
    let file = File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let list_idx = builder
        .schema()
        .fields()
        .iter()
        .position(|f| matches!(f.data_type(), DataType::List(_) | DataType::LargeList(_)))
        .context("Parquet file has no list column")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut rows: Vec<Vec<f64>> = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let col = batch.column(list_idx);
        for row in 0..batch.num_rows() {
            let values = extract_f64_list(col, row)
                .with_context(|| format!("Row {}", rows.len()))?;
            rows.push(values);
        }
    }
    from_rows(rows)
}

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &ArrayRef, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => col.as_list::<i32>().value(row),
        DataType::LargeList(_) => col.as_list::<i64>().value(row),
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    // The inner array can be Float64 or Float32
    match values_array.data_type() {
        DataType::Float64 => Ok(values_array
            .as_primitive::<Float64Type>()
            .iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect()),
        DataType::Float32 => Ok(values_array
            .as_primitive::<Float32Type>()
            .iter()
            .map(|v| v.map_or(f64::NAN, f64::from))
            .collect()),
        other => bail!("List inner type is {other:?}, expected Float64 or Float32"),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<ForecastArray> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let values = record
            .iter()
            .enumerate()
            .map(|(j, tok)| {
                tok.trim()
                    .parse::<f64>()
                    .with_context(|| format!("Row {row_no}, column {j}: '{tok}' is not a number"))
            })
            .collect::<Result<Vec<_>>>()?;
        rows.push(values);
    }
    from_rows(rows)
}

/// Stack equal-length per-sample rows into a `(samples, lags, 1)` array.
fn from_rows(rows: Vec<Vec<f64>>) -> Result<ForecastArray> {
    let lags = rows.first().map_or(0, Vec::len);
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != lags) {
        bail!("Row {i} has {} values but row 0 has {lags}", row.len());
    }
    let samples = rows.len();
    ForecastArray::from_shape_vec(&[samples, lags], rows.into_iter().flatten().collect())
}
