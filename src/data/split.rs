//! Whole-group train/dev/test splitting.
//!
//! Groups (for the PV data: gateways) are never divided between partitions.
//! Groups are visited in descending order of first appearance and placed
//! greedily: test first, then dev, with train absorbing whatever does not fit.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::model::{Table, Value};
use crate::constants::splits::{
    DEFAULT_DEV, DEFAULT_TEST, DEFAULT_TRAIN, RATIO_SUM_TOLERANCE,
};
use crate::error::PrepError;

/// Logical dataset partitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SplitLabel {
    Train,
    Dev,
    Test,
}

impl fmt::Display for SplitLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitLabel::Train => write!(f, "train"),
            SplitLabel::Dev => write!(f, "dev"),
            SplitLabel::Test => write!(f, "test"),
        }
    }
}

/// Ratio configuration for train/dev/test assignment.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplitRatios {
    pub train: f64,
    pub dev: f64,
    pub test: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: DEFAULT_TRAIN,
            dev: DEFAULT_DEV,
            test: DEFAULT_TEST,
        }
    }
}

impl SplitRatios {
    pub fn new(train: f64, dev: f64, test: f64) -> Self {
        Self { train, dev, test }
    }

    /// Check that ratios are finite, non-negative and sum to `1.0`.
    pub fn validated(self) -> Result<Self, PrepError> {
        for (name, ratio) in [("train", self.train), ("dev", self.dev), ("test", self.test)] {
            if !ratio.is_finite() || ratio < 0.0 {
                return Err(PrepError::Configuration(format!(
                    "{name} ratio must be a non-negative number, got {ratio}"
                )));
            }
        }
        let sum = self.train + self.dev + self.test;
        if (sum - 1.0).abs() > RATIO_SUM_TOLERANCE {
            return Err(PrepError::Configuration(format!(
                "split ratios must sum to 1.0, got {} + {} + {} = {sum}",
                self.train, self.dev, self.test
            )));
        }
        Ok(self)
    }
}

/// The three partitions produced by [`split_by_group`].
#[derive(Debug, Clone, PartialEq)]
pub struct Partitions {
    pub train: Table,
    pub dev: Table,
    pub test: Table,
}

/// Decide a partition for each group, given group sizes in first-seen order.
///
/// Targets are `ratio * total_rows`. Groups are visited from the last index
/// down to the first; a group goes to test if test stays within its target,
/// otherwise to dev under the same rule, otherwise to train.
pub fn assign_groups(
    group_sizes: &[usize],
    total_rows: usize,
    ratios: SplitRatios,
) -> Result<Vec<SplitLabel>, PrepError> {
    let ratios = ratios.validated()?;
    let target_test = ratios.test * total_rows as f64;
    let target_dev = ratios.dev * total_rows as f64;

    let mut labels = vec![SplitLabel::Train; group_sizes.len()];
    let (mut n_test, mut n_dev) = (0usize, 0usize);
    for (idx, &size) in group_sizes.iter().enumerate().rev() {
        if (n_test + size) as f64 <= target_test {
            n_test += size;
            labels[idx] = SplitLabel::Test;
        } else if (n_dev + size) as f64 <= target_dev {
            n_dev += size;
            labels[idx] = SplitLabel::Dev;
        }
    }
    Ok(labels)
}

/// One-line summary such as `train 2 groups/20 rows, dev 0 groups/0 rows, ...`.
fn describe_assignment(labels: &[SplitLabel], sizes: &[usize]) -> String {
    [SplitLabel::Train, SplitLabel::Dev, SplitLabel::Test]
        .iter()
        .map(|target| {
            let (groups, rows) = labels
                .iter()
                .zip(sizes)
                .filter(|(label, _)| *label == target)
                .fold((0, 0), |(g, r), (_, &n)| (g + 1, r + n));
            format!("{target} {groups} groups/{rows} rows")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Split `table` into train/dev/test without dividing any group of `group_column`.
///
/// Rows of one group keep their input order; within a partition groups appear
/// in the order they were assigned. All input columns are kept.
pub fn split_by_group(
    table: &Table,
    group_column: &str,
    ratios: SplitRatios,
) -> Result<Partitions, PrepError> {
    let ratios = ratios.validated()?;
    let col = table.require_column(group_column)?;

    // Factorize: stable index per distinct id, in order of first appearance.
    let mut index_of: HashMap<&Value, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (row_no, row) in table.rows.iter().enumerate() {
        let id = &row[col];
        if id.is_null() {
            return Err(PrepError::Configuration(format!(
                "row {row_no} has no value for group column '{group_column}'"
            )));
        }
        let idx = *index_of.entry(id).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[idx].push(row_no);
    }

    let sizes: Vec<usize> = groups.iter().map(Vec::len).collect();
    let labels = assign_groups(&sizes, table.len(), ratios)?;

    let (mut train, mut dev, mut test) = (Vec::new(), Vec::new(), Vec::new());
    for (members, label) in groups.iter().zip(&labels).rev() {
        let target = match label {
            SplitLabel::Train => &mut train,
            SplitLabel::Dev => &mut dev,
            SplitLabel::Test => &mut test,
        };
        target.extend_from_slice(members);
    }

    log::debug!(
        "split {} groups ({} rows): {}",
        groups.len(),
        table.len(),
        describe_assignment(&labels, &sizes)
    );

    Ok(Partitions {
        train: table.select_rows(&train),
        dev: table.select_rows(&dev),
        test: table.select_rows(&test),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    /// Rows `(group, seq)`; `seq` is unique across the table.
    fn grouped_table(sizes: &[(&str, usize)]) -> Table {
        let mut table = Table::new(["gateway_id", "seq"]);
        let mut seq = 0i64;
        for &(group, n) in sizes {
            for _ in 0..n {
                table
                    .push_row(vec![Value::from(group), Value::Integer(seq)])
                    .unwrap();
                seq += 1;
            }
        }
        table
    }

    fn groups_of(table: &Table) -> BTreeSet<Value> {
        table.unique_values("gateway_id").unwrap()
    }

    fn seqs(table: &Table) -> Vec<i64> {
        table
            .column_values("seq")
            .unwrap()
            .map(|v| match v {
                Value::Integer(i) => *i,
                other => panic!("unexpected {other:?}"),
            })
            .collect()
    }

    #[test]
    fn partitions_are_disjoint_and_exhaustive() {
        let table = grouped_table(&[("a", 5), ("b", 3), ("c", 1), ("d", 7), ("e", 2), ("f", 2)]);
        let parts = split_by_group(&table, "gateway_id", SplitRatios::new(0.6, 0.2, 0.2)).unwrap();

        let mut all: Vec<i64> = [&parts.train, &parts.dev, &parts.test]
            .iter()
            .flat_map(|t| seqs(t))
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..20).collect::<Vec<_>>());

        let train = groups_of(&parts.train);
        let dev = groups_of(&parts.dev);
        let test = groups_of(&parts.test);
        assert!(train.is_disjoint(&dev));
        assert!(train.is_disjoint(&test));
        assert!(dev.is_disjoint(&test));
    }

    #[test]
    fn no_group_is_split() {
        let table = grouped_table(&[("a", 4), ("b", 4), ("a", 2), ("c", 3), ("b", 1)]);
        let parts = split_by_group(&table, "gateway_id", SplitRatios::new(0.5, 0.25, 0.25)).unwrap();

        let mut home: BTreeMap<Value, usize> = BTreeMap::new();
        for (p, part) in [&parts.train, &parts.dev, &parts.test].iter().enumerate() {
            for id in groups_of(part) {
                assert!(home.insert(id, p).is_none(), "group in two partitions");
            }
        }
        assert_eq!(home.len(), 3);
    }

    #[test]
    fn greedy_fills_test_then_dev_from_last_group() {
        // 20 rows, test target 4, dev target 4.
        let table = grouped_table(&[("a", 10), ("b", 3), ("c", 3), ("d", 4)]);
        let parts = split_by_group(&table, "gateway_id", SplitRatios::new(0.6, 0.2, 0.2)).unwrap();

        assert_eq!(groups_of(&parts.test), BTreeSet::from([Value::from("d")]));
        assert_eq!(groups_of(&parts.dev), BTreeSet::from([Value::from("c")]));
        assert_eq!(
            groups_of(&parts.train),
            BTreeSet::from([Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn train_rows_follow_assignment_order() {
        let table = grouped_table(&[("a", 2), ("b", 2)]);
        let parts = split_by_group(&table, "gateway_id", SplitRatios::new(1.0, 0.0, 0.0)).unwrap();
        assert_eq!(seqs(&parts.train), vec![2, 3, 0, 1]);
    }

    #[test]
    fn ratios_not_summing_to_one_are_rejected() {
        let table = grouped_table(&[("a", 3)]);
        let err = split_by_group(&table, "gateway_id", SplitRatios::new(0.8, 0.1, 0.05));
        assert!(matches!(err, Err(PrepError::Configuration(_))));
    }

    #[test]
    fn float_rounding_in_ratio_sum_is_tolerated() {
        let ratios = SplitRatios::new(0.7, 0.2, 0.1);
        assert_ne!(ratios.train + ratios.dev + ratios.test, 1.0);
        assert!(ratios.validated().is_ok());
        assert!(SplitRatios::new(0.7, 0.2, 0.1 + 1e-6).validated().is_err());
    }

    #[test]
    fn negative_or_nan_ratios_are_rejected() {
        assert!(SplitRatios::new(1.2, -0.1, -0.1).validated().is_err());
        assert!(SplitRatios::new(f64::NAN, 0.5, 0.5).validated().is_err());
        assert!(SplitRatios::default().validated().is_ok());
    }

    #[test]
    fn missing_group_column_is_rejected() {
        let table = grouped_table(&[("a", 3)]);
        let err = split_by_group(&table, "site_id", SplitRatios::default());
        assert!(matches!(err, Err(PrepError::Configuration(_))));
    }

    #[test]
    fn null_group_id_is_rejected() {
        let mut table = grouped_table(&[("a", 3)]);
        table.rows[1][0] = Value::Null;
        let err = split_by_group(&table, "gateway_id", SplitRatios::default());
        assert!(matches!(err, Err(PrepError::Configuration(_))));
    }

    #[test]
    fn single_group_lands_in_train() {
        let table = grouped_table(&[("only", 50)]);
        let parts = split_by_group(&table, "gateway_id", SplitRatios::new(0.8, 0.1, 0.1)).unwrap();
        assert_eq!(parts.train, table);
        assert!(parts.dev.is_empty());
        assert!(parts.test.is_empty());
    }

    #[test]
    fn oversized_groups_overflow_to_train() {
        // 30 rows, test and dev targets are 9: no group of 10 fits.
        let table = grouped_table(&[("a", 10), ("b", 10), ("c", 10)]);
        let parts = split_by_group(&table, "gateway_id", SplitRatios::new(0.4, 0.3, 0.3)).unwrap();
        assert_eq!(parts.train.len(), 30);
        assert!(parts.dev.is_empty());
        assert!(parts.test.is_empty());
    }

    #[test]
    fn equal_groups_fill_test_and_dev_when_they_fit() {
        // 30 rows, test and dev targets are 12.
        let labels = assign_groups(&[10, 10, 10], 30, SplitRatios::new(0.2, 0.4, 0.4)).unwrap();
        assert_eq!(
            labels,
            vec![SplitLabel::Train, SplitLabel::Dev, SplitLabel::Test]
        );
    }

    #[test]
    fn assignment_summary_counts_groups_and_rows_per_label() {
        let labels = [SplitLabel::Train, SplitLabel::Dev, SplitLabel::Test, SplitLabel::Train];
        assert_eq!(
            describe_assignment(&labels, &[5, 3, 2, 4]),
            "train 2 groups/9 rows, dev 1 groups/3 rows, test 1 groups/2 rows"
        );
    }

    #[test]
    fn empty_table_gives_empty_partitions() {
        let table = Table::new(["gateway_id", "seq"]);
        let parts = split_by_group(&table, "gateway_id", SplitRatios::default()).unwrap();
        assert!(parts.train.is_empty() && parts.dev.is_empty() && parts.test.is_empty());
        assert_eq!(parts.test.columns, table.columns);
    }

    #[test]
    fn split_is_deterministic() {
        let table = grouped_table(&[("x", 3), ("y", 1), ("z", 2), ("w", 4)]);
        let ratios = SplitRatios::new(0.5, 0.3, 0.2);
        let first = split_by_group(&table, "gateway_id", ratios).unwrap();
        let second = split_by_group(&table, "gateway_id", ratios).unwrap();
        assert_eq!(first, second);
    }
}
