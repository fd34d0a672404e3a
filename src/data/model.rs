use std::collections::BTreeSet;
use std::fmt;

use crate::error::PrepError;

// ---------------------------------------------------------------------------
// Value – a single cell of a table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring common dataframe dtypes.
/// Used as a `BTreeMap` / `HashMap` key downstream, so `Value` must be `Ord` and `Hash`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

// -- Manual Eq/Ord so we can put Value in BTreeSet --

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Value::*;
        fn discriminant(v: &Value) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::String(s) => s.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Null => {}
        }
    }
}

/// Writes the value the way it appears in a CSV cell; `Null` is empty.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            // Keep a decimal point so integral floats read back as floats.
            Value::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => Ok(()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl Value {
    /// Try to interpret the value as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Infer the cell type from its text, as a dataframe CSV reader would.
    pub fn guess(s: &str) -> Value {
        if s.is_empty() {
            return Value::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return Value::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return Value::Float(f);
        }
        if s == "true" || s == "false" {
            return Value::Bool(s == "true");
        }
        Value::String(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Table – an ordered collection of rows over named columns
// ---------------------------------------------------------------------------

/// In-memory table. Every row holds exactly one cell per column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    /// Column names in file order.
    pub columns: Vec<String>,
    /// Rows in load order.
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table with the given columns.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Table {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a table, checking that every row matches the column count.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, PrepError> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(PrepError::Configuration(format!(
                "row {i} has {} cells but the table has {} columns",
                row.len(),
                columns.len()
            )));
        }
        Ok(Table { columns, rows })
    }

    /// Append a row; it must match the column count.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), PrepError> {
        if row.len() != self.columns.len() {
            return Err(PrepError::Configuration(format!(
                "row has {} cells but the table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of a column that must be present.
    pub fn require_column(&self, name: &str) -> Result<usize, PrepError> {
        self.column_index(name)
            .ok_or_else(|| PrepError::Configuration(format!("required column '{name}' is missing")))
    }

    /// Name of the first column present among `candidates`.
    pub fn resolve_column<'a>(&self, candidates: &[&'a str]) -> Result<&'a str, PrepError> {
        candidates
            .iter()
            .copied()
            .find(|c| self.column_index(c).is_some())
            .ok_or_else(|| {
                PrepError::Configuration(format!(
                    "none of the columns {candidates:?} is present"
                ))
            })
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<(), PrepError> {
        let idx = self.require_column(from)?;
        self.columns[idx] = to.to_string();
        Ok(())
    }

    /// New table with the given rows, in the order given.
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Sorted set of distinct values in a column.
    pub fn unique_values(&self, name: &str) -> Result<BTreeSet<Value>, PrepError> {
        let idx = self.require_column(name)?;
        Ok(self.rows.iter().map(|row| row[idx].clone()).collect())
    }

    /// Iterate one column's cells in row order.
    pub fn column_values<'a>(
        &'a self,
        name: &str,
    ) -> Result<impl Iterator<Item = &'a Value> + 'a, PrepError> {
        let idx = self.require_column(name)?;
        Ok(self.rows.iter().map(move |row| &row[idx]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_rows(
            vec!["id".into(), "x".into()],
            vec![
                vec![Value::from("a"), Value::Integer(1)],
                vec![Value::from("b"), Value::Float(2.5)],
                vec![Value::from("a"), Value::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn guess_prefers_integer_then_float() {
        assert_eq!(Value::guess("12"), Value::Integer(12));
        assert_eq!(Value::guess("-0.5"), Value::Float(-0.5));
        assert_eq!(Value::guess("true"), Value::Bool(true));
        assert_eq!(Value::guess(""), Value::Null);
        assert_eq!(Value::guess("5bc8d9"), Value::String("5bc8d9".into()));
    }

    #[test]
    fn ordering_groups_by_type_first() {
        let mut values = vec![
            Value::from("z"),
            Value::Float(0.1),
            Value::Null,
            Value::Integer(7),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Integer(7),
                Value::Float(0.1),
                Value::from("z"),
            ]
        );
    }

    #[test]
    fn from_rows_rejects_ragged_rows() {
        let err = Table::from_rows(vec!["a".into()], vec![vec![Value::Null, Value::Null]]);
        assert!(matches!(err, Err(PrepError::Configuration(_))));
    }

    #[test]
    fn resolve_column_takes_first_present() {
        let table = sample();
        assert_eq!(table.resolve_column(&["missing", "x", "id"]).unwrap(), "x");
        assert!(table.resolve_column(&["missing"]).is_err());
    }

    #[test]
    fn unique_values_are_sorted_and_distinct() {
        let table = sample();
        let ids: Vec<Value> = table.unique_values("id").unwrap().into_iter().collect();
        assert_eq!(ids, vec![Value::from("a"), Value::from("b")]);
    }

    #[test]
    fn display_writes_null_as_empty() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
    }
}
