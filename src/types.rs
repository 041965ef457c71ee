use crate::error::{ReadFailure, ReportError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tabled::Tabled;

/// A single cell as read from the dataset file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Missing cell: explicit null or a NaN float.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    /// Display label used as a grouping key; `None` for missing cells.
    pub fn label(&self) -> Option<String> {
        if self.is_null() {
            None
        } else {
            Some(self.to_string())
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Value::Null => ColumnKind::Empty,
            Value::Bool(_) => ColumnKind::Boolean,
            Value::Int(_) => ColumnKind::Integer,
            Value::Float(_) => ColumnKind::Float,
            Value::Text(_) => ColumnKind::Text,
            Value::Date(_) => ColumnKind::Date,
        }
    }

    /// Rough in-memory footprint, used for the dataset info report.
    pub fn approx_size(&self) -> usize {
        let base = std::mem::size_of::<Value>();
        match self {
            Value::Text(s) => base + s.capacity(),
            _ => base,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Inferred type of a whole column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Date,
    Text,
    Mixed,
    Empty,
}

impl ColumnKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }

    fn merge(self, other: ColumnKind) -> ColumnKind {
        use ColumnKind::*;
        match (self, other) {
            (Empty, k) | (k, Empty) => k,
            (a, b) if a == b => a,
            (Integer, Float) | (Float, Integer) => Float,
            _ => Mixed,
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Date => "date",
            ColumnKind::Text => "text",
            ColumnKind::Mixed => "mixed",
            ColumnKind::Empty => "empty",
        };
        f.write_str(s)
    }
}

/// In-memory snapshot of one dataset file. Every row holds exactly one
/// value per column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self, ReadFailure> {
        let mut ds = Dataset::new(columns.into_iter().map(Into::into).collect());
        for row in rows {
            ds.push_row(row)?;
        }
        Ok(ds)
    }

    /// Append a row, padding short rows with `Null`.
    pub fn push_row(&mut self, mut row: Vec<Value>) -> Result<(), ReadFailure> {
        let expected = self.columns.len();
        if row.len() > expected {
            return Err(ReadFailure::RowTooLong {
                row: self.rows.len() + 1,
                expected,
                found: row.len(),
            });
        }
        row.resize(expected, Value::Null);
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Resolve every name to its index, or fail listing all absent names.
    pub fn require<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>, ReportError> {
        let mut found = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match self.column_index(name.as_ref()) {
                Some(idx) => found.push(idx),
                None => missing.push(name.as_ref().to_string()),
            }
        }
        if missing.is_empty() {
            Ok(found)
        } else {
            Err(ReportError::missing_columns(missing))
        }
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| &row[idx])
    }

    pub fn column_kind(&self, idx: usize) -> ColumnKind {
        self.column(idx)
            .fold(ColumnKind::Empty, |acc, v| acc.merge(v.kind()))
    }

    /// Copy of the dataset with `f` applied to every cell of column `idx`.
    pub fn map_column<F>(&self, idx: usize, mut f: F) -> Dataset
    where
        F: FnMut(&Value) -> Value,
    {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                let mapped = f(&row[idx]);
                row[idx] = mapped;
                row
            })
            .collect();
        Dataset {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Copy of the dataset with a derived column appended (or replaced when
    /// a column of that name already exists).
    pub fn with_derived_column<F>(&self, name: &str, mut f: F) -> Dataset
    where
        F: FnMut(&[Value]) -> Value,
    {
        let existing = self.column_index(name);
        let mut columns = self.columns.clone();
        if existing.is_none() {
            columns.push(name.to_string());
        }
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let derived = f(row);
                let mut row = row.clone();
                match existing {
                    Some(idx) => row[idx] = derived,
                    None => row.push(derived),
                }
                row
            })
            .collect();
        Dataset { columns, rows }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct ColumnSummary {
    #[tabled(rename = "Column Name")]
    pub column: String,
    #[tabled(rename = "Missing Count")]
    pub missing_count: usize,
    #[tabled(rename = "Missing %")]
    pub missing_percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn from_percentage(pct: f64) -> Self {
        if pct >= 50.0 {
            Severity::Critical
        } else if pct >= 25.0 {
            Severity::High
        } else if pct >= 10.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeveritySummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeveritySummary {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingValuesReport {
    pub total_rows: usize,
    pub total_columns: usize,
    pub total_cells: usize,
    pub total_missing_values: usize,
    pub overall_missing_percentage: f64,
    pub columns_with_missing_values: usize,
    pub columns_without_missing_values: usize,
    pub severity_summary: SeveritySummary,
    pub missing_values_summary: Vec<ColumnSummary>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyEntry {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyReport {
    pub column: String,
    pub entries: Vec<FrequencyEntry>,
}

impl FrequencyReport {
    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }

    pub fn get(&self, label: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Count,
    Sum,
}

/// One top-level column group of a pivot and its observed subgroups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotGroup {
    pub label: String,
    pub subgroups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotRow {
    pub key: String,
    /// `cells[g][s]` is the value for group `g`, subgroup `s`.
    pub cells: Vec<Vec<f64>>,
    pub subtotals: Vec<f64>,
    pub grand_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotReport {
    pub row_column: String,
    pub col_columns: Vec<String>,
    pub value_column: String,
    pub aggregation: Aggregation,
    pub groups: Vec<PivotGroup>,
    pub rows: Vec<PivotRow>,
}

impl PivotReport {
    pub fn row(&self, key: &str) -> Option<&PivotRow> {
        self.rows.iter().find(|r| r.key == key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptiveStats {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub variance: Option<f64>,
    pub min: Option<f64>,
    #[serde(rename = "25%")]
    pub q25: Option<f64>,
    #[serde(rename = "50%")]
    pub median: Option<f64>,
    #[serde(rename = "75%")]
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
    pub dtypes: indexmap::IndexMap<String, ColumnKind>,
    pub memory_usage_mb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct ColumnDetail {
    #[tabled(rename = "Column")]
    pub column: String,
    #[tabled(rename = "Data Type")]
    pub kind: ColumnKind,
    #[tabled(rename = "Non-Null Count")]
    pub non_null_count: usize,
    #[tabled(rename = "Null Count")]
    pub null_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct UniqueCount {
    #[tabled(rename = "Column")]
    pub column: String,
    #[tabled(rename = "Unique Values")]
    pub unique_values: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub count: usize,
}

/// Labeled value series handed to chart renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplaintCharts {
    pub department_chart: Series,
    pub yearly_chart: Series,
    pub status_chart: Series,
}
