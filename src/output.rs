use crate::types::{
    ColumnDetail, ColumnSummary, DescriptiveStats, FrequencyReport, MissingValuesReport,
    PivotReport, PivotRow, Series, Severity, TrendPoint, UniqueCount,
};
use crate::util::{format_int, format_number};
use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};
use std::error::Error;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

pub const TOTAL_LABEL: &str = "TOTAL";
pub const GRAND_TOTAL_LABEL: &str = "Grand TOTAL";

/// One flat row of a report, keys in display order.
pub type Record = Map<String, JsonValue>;

/// JSON body returned to dashboard callers.
pub trait Payload {
    fn to_payload(&self) -> JsonValue;
}

pub trait Records {
    fn to_records(&self) -> Vec<Record>;
}

pub trait ChartSeries {
    fn to_chart_series(&self) -> Vec<Series>;
}

/// Flattened pivot column key: `"{group} {subgroup}"`, or just the group
/// when there is a single column dimension.
pub fn flat_key(group: &str, subgroup: &str) -> String {
    if subgroup.is_empty() {
        group.to_string()
    } else {
        format!("{} {}", group, subgroup)
    }
}

/// All flattened column keys of a pivot in payload order.
pub fn pivot_columns(report: &PivotReport) -> Vec<String> {
    let mut keys = Vec::new();
    for g in &report.groups {
        for s in &g.subgroups {
            keys.push(flat_key(&g.label, s));
        }
        keys.push(flat_key(&g.label, TOTAL_LABEL));
    }
    keys.push(GRAND_TOTAL_LABEL.to_string());
    keys
}

/// Whole numbers are emitted as JSON integers so counts stay counts.
fn number(v: f64) -> JsonValue {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        JsonValue::from(v as i64)
    } else {
        json!(v)
    }
}

fn pivot_row_record(report: &PivotReport, row: &PivotRow) -> Record {
    let mut rec = Record::new();
    for (g, group) in report.groups.iter().enumerate() {
        for (s, sub) in group.subgroups.iter().enumerate() {
            rec.insert(flat_key(&group.label, sub), number(row.cells[g][s]));
        }
        rec.insert(flat_key(&group.label, TOTAL_LABEL), number(row.subtotals[g]));
    }
    rec.insert(GRAND_TOTAL_LABEL.to_string(), number(row.grand_total));
    rec
}

/// Human-readable remediation hints, ordered critical, high, medium, low,
/// then general advice.
pub fn recommendations(summary: &[ColumnSummary]) -> Vec<String> {
    if summary.is_empty() {
        return vec!["No missing values detected. Dataset is complete.".to_string()];
    }
    let of = |sev: Severity| at_severity(summary, sev);
    let mut out = Vec::new();
    let critical = of(Severity::Critical);
    if !critical.is_empty() {
        let names: Vec<&str> = critical.iter().map(|s| s.column.as_str()).collect();
        out.push(format!(
            "CRITICAL: {} column(s) have >=50% missing values. Consider dropping these columns: {}",
            critical.len(),
            names.join(", ")
        ));
    }
    let high = of(Severity::High).len();
    if high > 0 {
        out.push(format!(
            "HIGH: {} column(s) have 25-50% missing values. Consider imputation or feature engineering.",
            high
        ));
    }
    let medium = of(Severity::Medium).len();
    if medium > 0 {
        out.push(format!(
            "MEDIUM: {} column(s) have 10-25% missing values. Standard imputation techniques recommended.",
            medium
        ));
    }
    let low = of(Severity::Low).len();
    if low > 0 {
        out.push(format!(
            "LOW: {} column(s) have <10% missing values. Simple imputation or row deletion may be sufficient.",
            low
        ));
    }
    out.push(
        "Recommended actions: 1) Analyze patterns in missing data, \
         2) Determine if data is MCAR, MAR, or MNAR, \
         3) Choose appropriate imputation strategy"
            .to_string(),
    );
    out
}

fn at_severity(summary: &[ColumnSummary], sev: Severity) -> Vec<&ColumnSummary> {
    summary
        .iter()
        .filter(|s| Severity::from_percentage(s.missing_percentage) == sev)
        .collect()
}

impl Payload for FrequencyReport {
    fn to_payload(&self) -> JsonValue {
        let map: Record = self
            .entries
            .iter()
            .map(|e| (e.label.clone(), JsonValue::from(e.count)))
            .collect();
        JsonValue::Object(map)
    }
}

impl Payload for PivotReport {
    fn to_payload(&self) -> JsonValue {
        let map: Record = self
            .rows
            .iter()
            .map(|row| (row.key.clone(), JsonValue::Object(pivot_row_record(self, row))))
            .collect();
        JsonValue::Object(map)
    }
}

impl Payload for MissingValuesReport {
    fn to_payload(&self) -> JsonValue {
        json!(self)
    }
}

impl<T: Serialize> Payload for [T] {
    fn to_payload(&self) -> JsonValue {
        json!(self)
    }
}

fn serialized_records<T: Serialize>(items: &[T]) -> Vec<Record> {
    items
        .iter()
        .filter_map(|item| match serde_json::to_value(item) {
            Ok(JsonValue::Object(map)) => Some(map),
            _ => None,
        })
        .collect()
}

impl Records for FrequencyReport {
    fn to_records(&self) -> Vec<Record> {
        self.entries
            .iter()
            .map(|e| {
                let mut rec = Record::new();
                rec.insert(self.column.clone(), JsonValue::from(e.label.clone()));
                rec.insert("count".to_string(), JsonValue::from(e.count));
                rec
            })
            .collect()
    }
}

impl Records for PivotReport {
    fn to_records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| {
                let mut rec = Record::new();
                rec.insert(self.row_column.clone(), JsonValue::from(row.key.clone()));
                rec.extend(pivot_row_record(self, row));
                rec
            })
            .collect()
    }
}

impl Records for MissingValuesReport {
    fn to_records(&self) -> Vec<Record> {
        serialized_records(&self.missing_values_summary)
    }
}

macro_rules! serialized_slice_records {
    ($($t:ty),*) => {
        $(impl Records for [$t] {
            fn to_records(&self) -> Vec<Record> {
                serialized_records(self)
            }
        })*
    };
}

serialized_slice_records!(DescriptiveStats, ColumnDetail, UniqueCount, TrendPoint, ColumnSummary);

impl ChartSeries for FrequencyReport {
    fn to_chart_series(&self) -> Vec<Series> {
        vec![Series {
            name: self.column.clone(),
            labels: self.entries.iter().map(|e| e.label.clone()).collect(),
            values: self.entries.iter().map(|e| e.count as f64).collect(),
        }]
    }
}

/// One series per (group, subgroup) column, across the pivot rows; suited
/// to stacked bar charts.
impl ChartSeries for PivotReport {
    fn to_chart_series(&self) -> Vec<Series> {
        let labels: Vec<String> = self.rows.iter().map(|r| r.key.clone()).collect();
        let mut out = Vec::new();
        for (g, group) in self.groups.iter().enumerate() {
            for (s, sub) in group.subgroups.iter().enumerate() {
                out.push(Series {
                    name: flat_key(&group.label, sub),
                    labels: labels.clone(),
                    values: self.rows.iter().map(|r| r.cells[g][s]).collect(),
                });
            }
        }
        out
    }
}

impl ChartSeries for MissingValuesReport {
    fn to_chart_series(&self) -> Vec<Series> {
        if self.missing_values_summary.is_empty() {
            return Vec::new();
        }
        vec![Series {
            name: "Missing Values".to_string(),
            labels: self
                .missing_values_summary
                .iter()
                .map(|s| s.column.clone())
                .collect(),
            values: self
                .missing_values_summary
                .iter()
                .map(|s| s.missing_count as f64)
                .collect(),
        }]
    }
}

impl ChartSeries for [UniqueCount] {
    fn to_chart_series(&self) -> Vec<Series> {
        vec![Series {
            name: "Unique Values".to_string(),
            labels: self.iter().map(|u| u.column.clone()).collect(),
            values: self.iter().map(|u| u.unique_values as f64).collect(),
        }]
    }
}

impl ChartSeries for [TrendPoint] {
    fn to_chart_series(&self) -> Vec<Series> {
        vec![Series {
            name: "Daily Count".to_string(),
            labels: self
                .iter()
                .map(|p| p.date.format("%Y-%m-%d").to_string())
                .collect(),
            values: self.iter().map(|p| p.count as f64).collect(),
        }]
    }
}

fn cell_text(v: &JsonValue) -> String {
    match v {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Union of record keys in first-seen order.
fn record_headers(records: &[Record]) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for rec in records {
        for key in rec.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }
    headers
}

fn record_rows<F>(records: &[Record], headers: &[String], render: F) -> Vec<Vec<String>>
where
    F: Fn(&JsonValue) -> String,
{
    records
        .iter()
        .map(|rec| {
            headers
                .iter()
                .map(|h| rec.get(h).map(&render).unwrap_or_default())
                .collect()
        })
        .collect()
}

// Console cells get thousands separators; files keep raw numbers.
fn display_cell(v: &JsonValue) -> String {
    match v {
        JsonValue::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => format_int(i),
            (None, Some(f)) => format_number(f, 2),
            _ => n.to_string(),
        },
        other => cell_text(other),
    }
}

pub fn records_to_csv(records: &[Record]) -> Result<String, Box<dyn Error>> {
    let headers = record_headers(records);
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(&headers)?;
    for row in record_rows(records, &headers, cell_text) {
        wtr.write_record(&row)?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

pub fn write_csv(path: &Path, records: &[Record]) -> Result<(), Box<dyn Error>> {
    std::fs::write(path, records_to_csv(records)?)?;
    Ok(())
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), Box<dyn Error>> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Markdown table of the first `max_rows` records.
pub fn preview_records(records: &[Record], max_rows: usize) -> String {
    if records.is_empty() {
        return "(no rows)".to_string();
    }
    let headers = record_headers(records);
    let mut rows = vec![headers.clone()];
    rows.extend(record_rows(
        &records[..records.len().min(max_rows)],
        &headers,
        display_cell,
    ));
    Builder::from(rows)
        .build()
        .with(Style::markdown())
        .to_string()
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}
