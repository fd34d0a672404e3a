use std::collections::BTreeMap;

use anyhow::{bail, Result};

use super::model::{Table, Value};

/// Running sum that stays integral until a float shows up or `i64` overflows.
#[derive(Debug, Clone, Copy, Default)]
struct Sum {
    int: i64,
    float: f64,
    is_float: bool,
}

impl Sum {
    fn add(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => {}
            Value::Integer(i) => match self.int.checked_add(*i) {
                Some(sum) => self.int = sum,
                None => {
                    self.float += *i as f64;
                    self.is_float = true;
                }
            },
            Value::Float(f) => {
                self.float += f;
                self.is_float = true;
            }
            other => bail!("cannot sum non-numeric value '{other}'"),
        }
        Ok(())
    }

    fn finish(self) -> Value {
        if self.is_float {
            Value::Float(self.float + self.int as f64)
        } else {
            Value::Integer(self.int)
        }
    }
}

/// Group rows by `keys` and sum each of `values` within a group.
///
/// The result has the key columns followed by the value columns, one row per
/// distinct key tuple, sorted by key. Missing cells count as zero.
pub fn group_sum(table: &Table, keys: &[&str], values: &[&str]) -> Result<Table> {
    let key_idx: Vec<usize> = keys
        .iter()
        .map(|k| table.require_column(k))
        .collect::<Result<_, _>>()?;
    let value_idx: Vec<usize> = values
        .iter()
        .map(|v| table.require_column(v))
        .collect::<Result<_, _>>()?;

    let mut groups: BTreeMap<Vec<Value>, Vec<Sum>> = BTreeMap::new();
    for (row_no, row) in table.rows.iter().enumerate() {
        let key: Vec<Value> = key_idx.iter().map(|&i| row[i].clone()).collect();
        let sums = groups
            .entry(key)
            .or_insert_with(|| vec![Sum::default(); value_idx.len()]);
        for (sum, &i) in sums.iter_mut().zip(&value_idx) {
            sum.add(&row[i])
                .map_err(|e| e.context(format!("row {row_no}, column '{}'", table.columns[i])))?;
        }
    }

    let columns = keys.iter().chain(values).map(|c| c.to_string()).collect();
    let rows = groups
        .into_iter()
        .map(|(mut key, sums)| {
            key.extend(sums.into_iter().map(Sum::finish));
            key
        })
        .collect();
    Ok(Table::from_rows(columns, rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_duplicate_keys_and_sorts() {
        let table = Table::from_rows(
            vec!["g".into(), "t".into(), "pv".into(), "extra".into()],
            vec![
                vec!["b".into(), "t1".into(), Value::Float(1.5), "x".into()],
                vec!["a".into(), "t2".into(), Value::Integer(2), "y".into()],
                vec!["b".into(), "t1".into(), Value::Integer(1), "z".into()],
                vec!["a".into(), "t1".into(), Value::Null, "w".into()],
            ],
        )
        .unwrap();

        let grouped = group_sum(&table, &["g", "t"], &["pv"]).unwrap();
        assert_eq!(grouped.columns, vec!["g", "t", "pv"]);
        assert_eq!(
            grouped.rows,
            vec![
                vec!["a".into(), "t1".into(), Value::Integer(0)],
                vec!["a".into(), "t2".into(), Value::Integer(2)],
                vec!["b".into(), "t1".into(), Value::Float(2.5)],
            ]
        );
    }

    #[test]
    fn text_in_value_column_is_an_error() {
        let table = Table::from_rows(
            vec!["g".into(), "pv".into()],
            vec![vec!["a".into(), "n/a".into()]],
        )
        .unwrap();
        assert!(group_sum(&table, &["g"], &["pv"]).is_err());
    }

    #[test]
    fn integer_overflow_falls_back_to_float() {
        let table = Table::from_rows(
            vec!["g".into(), "pv".into()],
            vec![
                vec!["a".into(), Value::Integer(i64::MAX)],
                vec!["a".into(), Value::Integer(1)],
                vec!["b".into(), Value::Integer(i64::MIN)],
                vec!["b".into(), Value::Integer(-1)],
            ],
        )
        .unwrap();

        let grouped = group_sum(&table, &["g"], &["pv"]).unwrap();
        assert_eq!(grouped.rows[0][1], Value::Float(i64::MAX as f64 + 1.0));
        assert_eq!(grouped.rows[1][1], Value::Float(i64::MIN as f64 - 1.0));
    }
}
