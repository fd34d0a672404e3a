use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use arrow::util::display::array_value_to_string;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Table, Value};

/// Options controlling how cells are typed on load.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Columns kept as text even when their cells look numeric
    /// (identifiers such as `5bc8e4a1` or `20240101` must not become numbers).
    pub text_columns: Vec<String>,
}

impl LoadOptions {
    pub fn with_text_columns<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        LoadOptions {
            text_columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    fn is_text(&self, column: &str) -> bool {
        self.text_columns.iter().any(|c| c == column)
    }
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, one record per line
/// * `.json`    – `[{ "gateway_id": "...", "pv_generation": 1.5, ... }, ...]`
/// * `.parquet` – flat columns of strings, integers, floats or booleans
pub fn load_table(path: &Path, options: &LoadOptions) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "csv" => load_csv(path, options),
        "json" => load_json(path, options),
        "parquet" | "pq" => load_parquet(path, options),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    log::debug!(
        "loaded {} rows x {} columns from {}",
        table.len(),
        table.columns.len(),
        path.display()
    );
    Ok(table)
}

fn typed_cell(raw: &str, text: bool) -> Value {
    if text {
        if raw.is_empty() {
            Value::Null
        } else {
            Value::String(raw.to_string())
        }
    } else {
        Value::guess(raw)
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, every other row a record.
fn load_csv(path: &Path, options: &LoadOptions) -> Result<Table> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let text: Vec<bool> = headers.iter().map(|h| options.is_text(h)).collect();

    let mut table = Table::new(headers);
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let row = record
            .iter()
            .zip(&text)
            .map(|(cell, &is_text)| typed_cell(cell, is_text))
            .collect();
        table
            .push_row(row)
            .with_context(|| format!("CSV row {row_no}"))?;
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON (`df.to_json(orient='records')`).
///
/// Columns are the union of all keys in order of first appearance; a key
/// missing from a record becomes `Null`.
fn load_json(path: &Path, options: &LoadOptions) -> Result<Table> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut columns: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if seen.insert(key.as_str()) {
                columns.push(key.clone());
            }
        }
    }

    let mut table = Table::new(columns.clone());
    for rec in records {
        // Checked to be an object above.
        let Some(obj) = rec.as_object() else { continue };
        let row = columns
            .iter()
            .map(|col| match obj.get(col) {
                Some(JsonValue::String(s)) => typed_cell(s, true),
                Some(val) if options.is_text(col) => match val {
                    JsonValue::Null => Value::Null,
                    other => Value::String(other.to_string()),
                },
                Some(val) => json_to_value(val),
                None => Value::Null,
            })
            .collect();
        table.push_row(row)?;
    }
    Ok(table)
}

fn json_to_value(val: &JsonValue) -> Value {
    match val {
        JsonValue::String(s) => Value::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Null => Value::Null,
        other => Value::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with flat columns.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`). Types without a direct mapping
/// (timestamps, decimals, ...) are read as their display text.
fn load_parquet(path: &Path, options: &LoadOptions) -> Result<Table> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let text: Vec<bool> = columns.iter().map(|c| options.is_text(c)).collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut table = Table::new(columns);
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for row in 0..batch.num_rows() {
            let cells = batch
                .columns()
                .iter()
                .zip(&text)
                .map(|(col, &is_text)| extract_value(col, row, is_text))
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("Row {row}"))?;
            table.push_row(cells)?;
        }
    }
    Ok(table)
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_value(col: &ArrayRef, row: usize, text: bool) -> Result<Value> {
    if col.is_null(row) {
        return Ok(Value::Null);
    }
    let value = match col.data_type() {
        DataType::Utf8 => Value::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::String(col.as_string::<i64>().value(row).to_string()),
        _ if text => Value::String(array_value_to_string(col.as_ref(), row)?),
        DataType::Int32 => Value::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => Value::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => Value::Float(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => Value::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => Value::Bool(col.as_boolean().value(row)),
        _ => Value::String(array_value_to_string(col.as_ref(), row)?),
    };
    Ok(value)
}
