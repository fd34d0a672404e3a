use std::collections::{BTreeMap, BTreeSet};

use super::model::{Table, Value};
use crate::error::PrepError;

// ---------------------------------------------------------------------------
// Filter predicate: which values are selected per column
// ---------------------------------------------------------------------------

/// Per-column selection state: maps column_name → set of selected values.
/// A column absent from the map is unconstrained; an empty set selects nothing.
pub type FilterState = BTreeMap<String, BTreeSet<Value>>;

/// Build a single-column selection.
pub fn select_values<I, V>(column: &str, values: I) -> FilterState
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    let mut filters = FilterState::new();
    filters.insert(
        column.to_string(),
        values.into_iter().map(Into::into).collect(),
    );
    filters
}

/// Return indices of rows that pass all active filters.
///
/// A row passes a column filter when:
/// * The filter set for that column is empty → nothing selected → fails
/// * The row's value for that column is in the selected set → passes
///
/// Filtering on a column the table does not have is a configuration error.
pub fn filtered_indices(table: &Table, filters: &FilterState) -> Result<Vec<usize>, PrepError> {
    let active: Vec<(usize, &BTreeSet<Value>)> = filters
        .iter()
        .map(|(col, selected)| Ok((table.require_column(col)?, selected)))
        .collect::<Result<_, PrepError>>()?;

    Ok(table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| {
            active
                .iter()
                .all(|(idx, selected)| selected.contains(&row[*idx]))
        })
        .map(|(i, _)| i)
        .collect())
}

/// Keep only rows passing `filters`, preserving order.
pub fn apply_filters(table: &Table, filters: &FilterState) -> Result<Table, PrepError> {
    Ok(table.select_rows(&filtered_indices(table, filters)?))
}

/// Drop rows whose numeric value in `column` is negative.
///
/// Missing and non-numeric cells are kept, matching a `value < 0` mask over a
/// column with missing entries.
pub fn drop_negative(table: &Table, column: &str) -> Result<Table, PrepError> {
    let idx = table.require_column(column)?;
    let keep: Vec<usize> = table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| !matches!(row[idx].as_f64(), Some(v) if v < 0.0))
        .map(|(i, _)| i)
        .collect();
    Ok(table.select_rows(&keep))
}

/// Drop rows with a missing value in any of `columns`.
pub fn drop_missing(table: &Table, columns: &[&str]) -> Result<Table, PrepError> {
    let idx: Vec<usize> = columns
        .iter()
        .map(|c| table.require_column(c))
        .collect::<Result<_, _>>()?;
    let keep: Vec<usize> = table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| idx.iter().all(|&i| !row[i].is_null()))
        .map(|(i, _)| i)
        .collect();
    Ok(table.select_rows(&keep))
}
