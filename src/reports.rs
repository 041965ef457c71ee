use crate::error::{ReportError, Result};
use crate::output::{flat_key, recommendations, GRAND_TOTAL_LABEL, TOTAL_LABEL};
use crate::types::{
    Aggregation, ColumnDetail, ColumnSummary, Dataset, DatasetInfo, DescriptiveStats,
    FrequencyEntry, FrequencyReport, MissingValuesReport, PivotGroup, PivotReport, PivotRow,
    Severity, SeveritySummary, TrendPoint, UniqueCount, Value,
};
use crate::util::{
    average, compare_labels, parse_date_safe, percentage, quantile_sorted, round2, sort_floats,
    variance,
};
use chrono::{Datelike, NaiveDate};
use indexmap::{IndexMap, IndexSet};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Which columns `describe` should summarize.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ColumnSelection {
    #[default]
    NumericOnly,
    Columns(Vec<String>),
}

/// Occurrences of each distinct non-null value in `column`, most frequent
/// first. Ties keep first-seen order. Entries below `min_count` are dropped.
pub fn frequency(dataset: &Dataset, column: &str, min_count: usize) -> Result<FrequencyReport> {
    let idx = dataset.require(&[column])?[0];
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for label in dataset.column(idx).filter_map(Value::label) {
        *counts.entry(label).or_insert(0) += 1;
    }
    let mut entries: Vec<FrequencyEntry> = counts
        .into_iter()
        .filter(|(_, count)| *count >= min_count)
        .map(|(label, count)| FrequencyEntry { label, count })
        .collect();
    // `sort_by` is stable, so equal counts stay in first-seen order.
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    Ok(FrequencyReport {
        column: column.to_string(),
        entries,
    })
}

pub fn pivot<S: AsRef<str>>(
    dataset: &Dataset,
    row_column: &str,
    col_columns: &[S],
    value_column: &str,
    aggregation: Aggregation,
) -> Result<PivotReport> {
    if col_columns.is_empty() {
        return Err(ReportError::Config(
            "pivot needs at least one column dimension".to_string(),
        ));
    }
    let mut names: Vec<&str> = vec![row_column];
    names.extend(col_columns.iter().map(AsRef::as_ref));
    names.push(value_column);
    let indices = dataset.require(&names[..])?;
    let row_idx = indices[0];
    let col_idx = &indices[1..indices.len() - 1];
    let val_idx = indices[indices.len() - 1];

    let mut row_keys: IndexSet<String> = IndexSet::new();
    let mut groups: IndexMap<String, IndexSet<String>> = IndexMap::new();
    let mut cells: HashMap<(String, String, String), f64> = HashMap::new();

    'rows: for row in dataset.rows() {
        let Some(row_key) = row[row_idx].label() else {
            continue;
        };
        let mut parts = Vec::with_capacity(col_idx.len());
        for &c in col_idx {
            match row[c].label() {
                Some(l) => parts.push(l),
                None => continue 'rows,
            }
        }
        let group = parts.remove(0);
        let subgroup = parts.join(" ");

        let contribution = match aggregation {
            Aggregation::Count => {
                if row[val_idx].is_null() {
                    0.0
                } else {
                    1.0
                }
            }
            Aggregation::Sum => row[val_idx].as_f64().unwrap_or(0.0),
        };

        row_keys.insert(row_key.clone());
        groups
            .entry(group.clone())
            .or_default()
            .insert(subgroup.clone());
        *cells.entry((row_key, group, subgroup)).or_insert(0.0) += contribution;
    }

    let mut row_keys: Vec<String> = row_keys.into_iter().collect();
    row_keys.sort_by(|a, b| compare_labels(a, b));
    let mut groups: Vec<PivotGroup> = groups
        .into_iter()
        .map(|(label, subs)| {
            let mut subgroups: Vec<String> = subs.into_iter().collect();
            subgroups.sort_by(|a, b| compare_labels(a, b));
            PivotGroup { label, subgroups }
        })
        .collect();
    groups.sort_by(|a, b| compare_labels(&a.label, &b.label));
    check_flat_keys(row_column, &groups)?;

    let rows = row_keys
        .into_iter()
        .map(|key| {
            let cells_for_row: Vec<Vec<f64>> = groups
                .iter()
                .map(|g| {
                    g.subgroups
                        .iter()
                        .map(|s| {
                            cells
                                .get(&(key.clone(), g.label.clone(), s.clone()))
                                .copied()
                                .unwrap_or(0.0)
                        })
                        .collect()
                })
                .collect();
            let subtotals: Vec<f64> = cells_for_row.iter().map(|c| c.iter().sum()).collect();
            let grand_total = subtotals.iter().sum();
            PivotRow {
                key,
                cells: cells_for_row,
                subtotals,
                grand_total,
            }
        })
        .collect();

    Ok(PivotReport {
        row_column: row_column.to_string(),
        col_columns: col_columns.iter().map(|c| c.as_ref().to_string()).collect(),
        value_column: value_column.to_string(),
        aggregation,
        groups,
        rows,
    })
}

/// Flattened column keys must be unique, or payload cells would overwrite
/// each other (a subgroup named `TOTAL`, or `"A B"/"C"` against `"A"/"B C"`).
fn check_flat_keys(row_column: &str, groups: &[PivotGroup]) -> Result<()> {
    let mut seen: HashSet<String> = HashSet::from([row_column.to_string()]);
    let keys = groups
        .iter()
        .flat_map(|g| {
            g.subgroups
                .iter()
                .map(|s| flat_key(&g.label, s))
                .chain(std::iter::once(flat_key(&g.label, TOTAL_LABEL)))
        })
        .chain(std::iter::once(GRAND_TOTAL_LABEL.to_string()));
    for key in keys {
        if !seen.insert(key.clone()) {
            return Err(ReportError::Config(format!(
                "pivot column key {:?} is produced by more than one column",
                key
            )));
        }
    }
    Ok(())
}

pub fn missing_report(dataset: &Dataset) -> MissingValuesReport {
    let total_rows = dataset.row_count();
    let total_columns = dataset.column_count();
    let total_cells = total_rows * total_columns;

    let mut total_missing = 0usize;
    let mut summary: Vec<ColumnSummary> = Vec::new();
    for (idx, name) in dataset.columns().iter().enumerate() {
        let missing = dataset.column(idx).filter(|v| v.is_null()).count();
        total_missing += missing;
        if missing > 0 {
            summary.push(ColumnSummary {
                column: name.clone(),
                missing_count: missing,
                missing_percentage: percentage(missing, total_rows),
            });
        }
    }
    summary.sort_by(|a, b| b.missing_count.cmp(&a.missing_count));

    let mut severity = SeveritySummary::default();
    for s in &summary {
        severity.record(Severity::from_percentage(s.missing_percentage));
    }

    MissingValuesReport {
        total_rows,
        total_columns,
        total_cells,
        total_missing_values: total_missing,
        overall_missing_percentage: percentage(total_missing, total_cells),
        columns_with_missing_values: summary.len(),
        columns_without_missing_values: total_columns - summary.len(),
        severity_summary: severity,
        recommendations: recommendations(&summary),
        missing_values_summary: summary,
    }
}

pub fn describe(dataset: &Dataset, selection: &ColumnSelection) -> Result<Vec<DescriptiveStats>> {
    let indices: Vec<usize> = match selection {
        ColumnSelection::NumericOnly => (0..dataset.column_count())
            .filter(|&idx| dataset.column_kind(idx).is_numeric())
            .collect(),
        ColumnSelection::Columns(names) => dataset.require(names.as_slice())?,
    };
    Ok(indices
        .into_iter()
        .map(|idx| {
            let mut values: Vec<f64> = dataset.column(idx).filter_map(Value::as_f64).collect();
            sort_floats(&mut values);
            column_stats(&dataset.columns()[idx], &values)
        })
        .collect())
}

fn column_stats(column: &str, sorted: &[f64]) -> DescriptiveStats {
    let count = sorted.len();
    let var = variance(sorted);
    DescriptiveStats {
        column: column.to_string(),
        count,
        mean: (count > 0).then(|| average(sorted)),
        std: var.map(f64::sqrt),
        variance: var,
        min: sorted.first().copied(),
        q25: quantile_sorted(sorted, 0.25),
        median: quantile_sorted(sorted, 0.5),
        q75: quantile_sorted(sorted, 0.75),
        max: sorted.last().copied(),
    }
}

pub fn dataset_info(dataset: &Dataset) -> DatasetInfo {
    let dtypes = dataset
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.clone(), dataset.column_kind(idx)))
        .collect();
    let bytes: usize = dataset.columns().iter().map(String::len).sum::<usize>()
        + dataset
            .rows()
            .iter()
            .flat_map(|row| row.iter())
            .map(Value::approx_size)
            .sum::<usize>();
    DatasetInfo {
        rows: dataset.row_count(),
        columns: dataset.column_count(),
        column_names: dataset.columns().to_vec(),
        dtypes,
        memory_usage_mb: round2(bytes as f64 / (1024.0 * 1024.0)),
    }
}

pub fn column_details(dataset: &Dataset) -> Vec<ColumnDetail> {
    dataset
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let null_count = dataset.column(idx).filter(|v| v.is_null()).count();
            ColumnDetail {
                column: name.clone(),
                kind: dataset.column_kind(idx),
                non_null_count: dataset.row_count() - null_count,
                null_count,
            }
        })
        .collect()
}

/// Distinct non-null values per column, largest first.
pub fn unique_counts(dataset: &Dataset) -> Vec<UniqueCount> {
    let mut out: Vec<UniqueCount> = dataset
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let distinct: IndexSet<String> = dataset.column(idx).filter_map(Value::label).collect();
            UniqueCount {
                column: name.clone(),
                unique_values: distinct.len(),
            }
        })
        .collect();
    out.sort_by(|a, b| b.unique_values.cmp(&a.unique_values));
    out
}

/// Rows per calendar date, oldest first. Cells that are not dates are skipped.
pub fn date_trend(dataset: &Dataset, column: &str) -> Result<Vec<TrendPoint>> {
    let idx = dataset.require(&[column])?[0];
    let mut by_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for date in dataset.column(idx).filter_map(parse_date_safe) {
        *by_day.entry(date).or_insert(0) += 1;
    }
    Ok(by_day
        .into_iter()
        .map(|(date, count)| TrendPoint { date, count })
        .collect())
}

/// Copy of `dataset` with `year_column` holding the year of `date_column`.
pub fn with_year_column(
    dataset: &Dataset,
    date_column: &str,
    year_column: &str,
) -> Result<Dataset> {
    let idx = dataset.require(&[date_column])?[0];
    Ok(dataset.with_derived_column(year_column, |row| {
        parse_date_safe(&row[idx])
            .map(|d| Value::Int(i64::from(d.year())))
            .unwrap_or(Value::Null)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value as V;

    fn x_dataset() -> Dataset {
        let xs = [
            Some(1),
            Some(1),
            Some(2),
            None,
            Some(3),
            Some(3),
            Some(3),
            None,
            None,
            Some(5),
        ];
        Dataset::from_rows(
            ["X", "Y"],
            xs.iter()
                .enumerate()
                .map(|(i, x)| vec![V::from(x.map(i64::from)), V::Int(i as i64)])
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn frequency_sorts_by_count_and_skips_nulls() {
        let report = frequency(&x_dataset(), "X", 0).unwrap();
        let labels: Vec<(&str, usize)> = report
            .entries
            .iter()
            .map(|e| (e.label.as_str(), e.count))
            .collect();
        assert_eq!(labels, [("3", 3), ("1", 2), ("2", 1), ("5", 1)]);
        assert_eq!(report.total(), 7);
    }

    #[test]
    fn frequency_min_count_drops_long_tail() {
        let report = frequency(&x_dataset(), "X", 2).unwrap();
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.get("2"), None);
    }

    #[test]
    fn frequency_on_absent_column_is_schema_error() {
        let err = frequency(&x_dataset(), "DEPT", 0).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Schema);
    }

    #[test]
    fn missing_report_for_x_column() {
        let report = missing_report(&x_dataset());
        assert_eq!(report.total_rows, 10);
        assert_eq!(report.total_cells, 20);
        assert_eq!(report.total_missing_values, 3);
        assert_eq!(report.overall_missing_percentage, 15.0);
        assert_eq!(
            report.missing_values_summary,
            vec![ColumnSummary {
                column: "X".into(),
                missing_count: 3,
                missing_percentage: 30.0,
            }]
        );
        assert_eq!(report.severity_summary.high, 1);
        assert_eq!(report.columns_without_missing_values, 1);
    }

    #[test]
    fn missing_report_on_empty_dataset() {
        let ds = Dataset::new(vec!["A".into(), "B".into()]);
        let report = missing_report(&ds);
        assert_eq!(report.total_rows, 0);
        assert_eq!(report.overall_missing_percentage, 0.0);
        assert!(report.missing_values_summary.is_empty());
        assert_eq!(report.columns_without_missing_values, 2);
    }

    #[test]
    fn missing_report_on_complete_dataset() {
        let ds = Dataset::from_rows(
            ["A", "B"],
            vec![vec![V::Int(1), V::text("x")], vec![V::Int(2), V::text("y")]],
        )
        .unwrap();
        let report = missing_report(&ds);
        assert_eq!(report.total_rows, 2);
        assert_eq!(report.total_missing_values, 0);
        assert_eq!(report.overall_missing_percentage, 0.0);
        assert_eq!(report.severity_summary.total(), 0);
        assert_eq!(report.columns_without_missing_values, 2);
        assert_eq!(
            report.recommendations,
            ["No missing values detected. Dataset is complete."]
        );
    }

    #[test]
    fn missing_report_fully_missing_is_100_percent() {
        let ds = Dataset::from_rows(["A", "B"], vec![vec![V::Null, V::Null]; 4]).unwrap();
        let report = missing_report(&ds);
        assert_eq!(report.overall_missing_percentage, 100.0);
        assert_eq!(report.severity_summary.critical, 2);
        assert_eq!(
            report.severity_summary.total(),
            report.missing_values_summary.len()
        );
    }

    #[test]
    fn missing_summary_is_sorted_stably_by_count() {
        let ds = Dataset::from_rows(
            ["A", "B", "C"],
            vec![
                vec![V::Null, V::Int(1), V::Null],
                vec![V::Int(1), V::Null, V::Null],
                vec![V::Int(1), V::Int(1), V::Null],
            ],
        )
        .unwrap();
        let cols: Vec<String> = missing_report(&ds)
            .missing_values_summary
            .into_iter()
            .map(|s| s.column)
            .collect();
        assert_eq!(cols, ["C", "A", "B"]);
    }

    fn complaint_rows() -> Dataset {
        Dataset::from_rows(
            ["type", "dept", "status"],
            vec![
                vec![V::text("A"), V::text("X"), V::text("CLOSED")],
                vec![V::text("A"), V::text("X"), V::text("OPEN")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn pivot_two_row_scenario() {
        let p = pivot(
            &complaint_rows(),
            "type",
            &["dept", "status"],
            "status",
            Aggregation::Count,
        )
        .unwrap();
        assert_eq!(p.groups.len(), 1);
        assert_eq!(p.groups[0].subgroups, ["CLOSED", "OPEN"]);
        let row = p.row("A").unwrap();
        assert_eq!(row.cells, vec![vec![1.0, 1.0]]);
        assert_eq!(row.subtotals, vec![2.0]);
        assert_eq!(row.grand_total, 2.0);
    }

    #[test]
    fn pivot_fills_unobserved_cells_with_zero() {
        let ds = Dataset::from_rows(
            ["type", "dept", "status"],
            vec![
                vec![V::text("A"), V::text("X"), V::text("OPEN")],
                vec![V::text("B"), V::text("Y"), V::text("CLOSED")],
                vec![V::text("B"), V::text("Y"), V::text("CLOSED")],
                vec![V::Null, V::text("Y"), V::text("CLOSED")],
            ],
        )
        .unwrap();
        let p = pivot(&ds, "type", &["dept", "status"], "status", Aggregation::Count).unwrap();
        let a = p.row("A").unwrap();
        assert_eq!(a.cells, vec![vec![1.0], vec![0.0]]);
        let b = p.row("B").unwrap();
        assert_eq!(b.cells, vec![vec![0.0], vec![2.0]]);
        assert_eq!(b.grand_total, 2.0);
        assert_eq!(p.rows.len(), 2);
        for row in &p.rows {
            assert_eq!(row.grand_total, row.subtotals.iter().sum::<f64>());
        }
    }

    #[test]
    fn pivot_count_ignores_null_values_and_sum_adds_numbers() {
        let ds = Dataset::from_rows(
            ["type", "dept", "cost"],
            vec![
                vec![V::text("A"), V::text("X"), V::Int(10)],
                vec![V::text("A"), V::text("X"), V::Null],
                vec![V::text("A"), V::text("X"), V::Float(2.5)],
            ],
        )
        .unwrap();
        let count = pivot(&ds, "type", &["dept"], "cost", Aggregation::Count).unwrap();
        assert_eq!(count.rows[0].grand_total, 2.0);
        let sum = pivot(&ds, "type", &["dept"], "cost", Aggregation::Sum).unwrap();
        assert_eq!(sum.rows[0].grand_total, 12.5);
    }

    #[test]
    fn pivot_requires_every_column() {
        let err = pivot(&complaint_rows(), "type", &["DEPT"], "STATUS", Aggregation::Count)
            .unwrap_err();
        match err {
            ReportError::Schema { missing } => assert_eq!(missing, ["DEPT", "STATUS"]),
            other => panic!("unexpected error: {other}"),
        }
        let empty: [&str; 0] = [];
        assert!(pivot(&complaint_rows(), "type", &empty, "status", Aggregation::Count).is_err());
    }

    #[test]
    fn pivot_rejects_ambiguous_column_keys() {
        let ds = Dataset::from_rows(
            ["type", "dept", "status"],
            vec![
                vec![V::text("A"), V::text("X"), V::text("TOTAL")],
                vec![V::text("A"), V::text("X"), V::text("OPEN")],
                vec![V::text("A"), V::text("X"), V::text("OPEN")],
            ],
        )
        .unwrap();
        let err = pivot(&ds, "type", &["dept", "status"], "status", Aggregation::Count)
            .unwrap_err();
        assert!(matches!(err, ReportError::Config(ref m) if m.contains("\"X TOTAL\"")));

        let ds = Dataset::from_rows(
            ["type", "dept", "status"],
            vec![
                vec![V::text("A"), V::text("A B"), V::text("C")],
                vec![V::text("A"), V::text("A"), V::text("B C")],
            ],
        )
        .unwrap();
        let err = pivot(&ds, "type", &["dept", "status"], "status", Aggregation::Count)
            .unwrap_err();
        assert!(matches!(err, ReportError::Config(ref m) if m.contains("\"A B C\"")));

        let ds = Dataset::from_rows(
            ["type", "status"],
            vec![vec![V::text("A"), V::text("Grand")]],
        )
        .unwrap();
        let err = pivot(&ds, "type", &["status"], "status", Aggregation::Count).unwrap_err();
        assert!(matches!(err, ReportError::Config(ref m) if m.contains("\"Grand TOTAL\"")));
    }

    #[test]
    fn describe_numeric_columns_only() {
        let ds = Dataset::from_rows(
            ["n", "label"],
            vec![
                vec![V::Int(1), V::text("a")],
                vec![V::Int(2), V::text("b")],
                vec![V::Int(3), V::Null],
                vec![V::Int(4), V::text("c")],
            ],
        )
        .unwrap();
        let stats = describe(&ds, &ColumnSelection::NumericOnly).unwrap();
        assert_eq!(stats.len(), 1);
        let n = &stats[0];
        assert_eq!(n.column, "n");
        assert_eq!(n.count, 4);
        assert_eq!(n.mean, Some(2.5));
        assert_eq!(n.min, Some(1.0));
        assert_eq!(n.q25, Some(1.75));
        assert_eq!(n.median, Some(2.5));
        assert_eq!(n.q75, Some(3.25));
        assert_eq!(n.max, Some(4.0));
        assert_eq!(n.variance, Some(5.0 / 3.0));

        let explicit =
            describe(&ds, &ColumnSelection::Columns(vec!["label".into()])).unwrap();
        assert_eq!(explicit[0].count, 0);
        assert_eq!(explicit[0].mean, None);
    }

    #[test]
    fn describe_is_idempotent() {
        let ds = x_dataset();
        let first = describe(&ds, &ColumnSelection::NumericOnly).unwrap();
        let second = describe(&ds, &ColumnSelection::NumericOnly).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].count, 7);
    }

    #[test]
    fn info_details_and_unique_counts() {
        let ds = x_dataset();
        let info = dataset_info(&ds);
        assert_eq!(info.rows, 10);
        assert_eq!(info.column_names, ["X", "Y"]);
        assert_eq!(info.dtypes["X"], crate::types::ColumnKind::Integer);

        let details = column_details(&ds);
        assert_eq!(details[0].null_count, 3);
        assert_eq!(details[0].non_null_count, 7);

        let uniques = unique_counts(&ds);
        assert_eq!(uniques[0].column, "Y");
        assert_eq!(uniques[0].unique_values, 10);
        assert_eq!(uniques[1].unique_values, 4);
    }

    #[test]
    fn year_column_and_trend_from_dates() {
        let d = |y, m, day| V::Date(NaiveDate::from_ymd_opt(y, m, day).unwrap());
        let ds = Dataset::from_rows(
            ["DATE"],
            vec![
                vec![d(2023, 1, 2)],
                vec![V::text("01/02/2022")],
                vec![d(2023, 1, 2)],
                vec![V::text("soon")],
            ],
        )
        .unwrap();
        let with_year = with_year_column(&ds, "DATE", "YEAR").unwrap();
        let years: Vec<V> = with_year.column(1).cloned().collect();
        assert_eq!(years, [V::Int(2023), V::Int(2022), V::Int(2023), V::Null]);

        let trend = date_trend(&ds, "DATE").unwrap();
        assert_eq!(trend.len(), 2);
        assert_eq!(trend[0].date, NaiveDate::from_ymd_opt(2022, 2, 1).unwrap());
        assert_eq!(trend[1].count, 2);
    }
}
