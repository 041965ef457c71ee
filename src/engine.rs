//! Configured entry point tying the loader, normalizer and reports together.
//!
//! A `ReportEngine` holds configuration only. Every report call reads the
//! dataset file again, so edits to the file show up on the next request.

use crate::error::{ReportError, Result};
use crate::loader::DatasetLoader;
use crate::normalize::Normalizer;
use crate::reports::{self, ColumnSelection};
use crate::types::{
    Aggregation, ColumnDetail, ComplaintCharts, Dataset, DatasetInfo, DescriptiveStats,
    FrequencyReport, MissingValuesReport, PivotReport, Series, TrendPoint, UniqueCount,
};
use crate::util::compare_labels;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const COMPLAINT_TYPE: &str = "COMPLAINT TYPE";
pub const DEPT: &str = "DEPT";
pub const STATUS: &str = "CLOSED/OPEN";
pub const DATE: &str = "DATE";
pub const YEAR: &str = "YEAR";

#[derive(Debug, Clone)]
pub struct ReportEngine {
    loader: DatasetLoader,
    normalizer: Option<Normalizer>,
    min_count: usize,
    columns: ColumnSelection,
}

#[derive(Debug, Clone, Default)]
pub struct ReportEngineBuilder {
    dataset_path: Option<PathBuf>,
    normalizer: Option<Normalizer>,
    min_count: usize,
    columns: Vec<String>,
}

impl ReportEngineBuilder {
    pub fn dataset_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dataset_path = Some(path.into());
        self
    }

    /// Normalizer applied before categorical reports. Without one, labels
    /// are reported exactly as they appear in the file.
    pub fn normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub fn min_count(mut self, min_count: usize) -> Self {
        self.min_count = min_count;
        self
    }

    /// Columns for `describe`; empty means every numeric column.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> Result<ReportEngine> {
        let path = self
            .dataset_path
            .ok_or_else(|| ReportError::Config("dataset path is required".to_string()))?;
        if path.as_os_str().is_empty() {
            return Err(ReportError::Config("dataset path is empty".to_string()));
        }
        let columns = if self.columns.is_empty() {
            ColumnSelection::NumericOnly
        } else {
            ColumnSelection::Columns(self.columns)
        };
        Ok(ReportEngine {
            loader: DatasetLoader::new(path),
            normalizer: self.normalizer.filter(|n| !n.is_empty()),
            min_count: self.min_count,
            columns,
        })
    }
}

impl ReportEngine {
    pub fn builder() -> ReportEngineBuilder {
        ReportEngineBuilder::default()
    }

    pub fn dataset_path(&self) -> &Path {
        self.loader.path()
    }

    fn load(&self) -> Result<Dataset> {
        let ds = self.loader.load().map_err(|e| {
            warn!(path = %self.loader.path().display(), error = %e, "dataset load failed");
            e
        })?;
        debug!(
            rows = ds.row_count(),
            columns = ds.column_count(),
            "dataset loaded"
        );
        Ok(ds)
    }

    /// Load, check `required` against the raw headers, then normalize.
    fn load_categorical(&self, required: &[&str]) -> Result<Dataset> {
        let ds = self.load()?;
        ds.require(required)?;
        match &self.normalizer {
            Some(n) => n.normalize(&ds),
            None => Ok(ds),
        }
    }

    pub fn missing_report(&self) -> Result<MissingValuesReport> {
        info!(report = "missing", "generating report");
        let report = reports::missing_report(&self.load()?);
        info!(
            missing = report.total_missing_values,
            columns = report.columns_with_missing_values,
            "missing-values report ready"
        );
        Ok(report)
    }

    pub fn frequency(&self, column: &str) -> Result<FrequencyReport> {
        info!(report = "frequency", column, "generating report");
        let ds = self.load_categorical(&[column])?;
        let report = reports::frequency(&ds, column, self.min_count)?;
        debug!(labels = report.entries.len(), "frequency report ready");
        Ok(report)
    }

    pub fn pivot<S: AsRef<str>>(
        &self,
        row_column: &str,
        col_columns: &[S],
        value_column: &str,
        aggregation: Aggregation,
    ) -> Result<PivotReport> {
        info!(report = "pivot", rows = row_column, value = value_column, "generating report");
        let mut required: Vec<&str> = vec![row_column];
        required.extend(col_columns.iter().map(AsRef::as_ref));
        required.push(value_column);
        let ds = self.load_categorical(&required)?;
        let report = reports::pivot(&ds, row_column, col_columns, value_column, aggregation)?;
        debug!(
            rows = report.rows.len(),
            groups = report.groups.len(),
            "pivot report ready"
        );
        Ok(report)
    }

    pub fn describe(&self) -> Result<Vec<DescriptiveStats>> {
        info!(report = "describe", "generating report");
        reports::describe(&self.load()?, &self.columns)
    }

    pub fn dataset_info(&self) -> Result<DatasetInfo> {
        info!(report = "info", "generating report");
        Ok(reports::dataset_info(&self.load()?))
    }

    pub fn column_details(&self) -> Result<Vec<ColumnDetail>> {
        Ok(reports::column_details(&self.load()?))
    }

    pub fn unique_counts(&self) -> Result<Vec<UniqueCount>> {
        Ok(reports::unique_counts(&self.load()?))
    }

    pub fn date_trend(&self, column: &str) -> Result<Vec<TrendPoint>> {
        info!(report = "trend", column, "generating report");
        reports::date_trend(&self.load()?, column)
    }

    /// Complaint type x department x status counts.
    pub fn complaint_pivot(&self) -> Result<PivotReport> {
        info!(report = "complaint_pivot", "generating report");
        let ds = self.load_categorical(&[COMPLAINT_TYPE, DEPT, STATUS])?;
        reports::pivot(&ds, COMPLAINT_TYPE, &[DEPT, STATUS], STATUS, Aggregation::Count)
    }

    /// Year x status counts, years derived from `DATE`.
    pub fn status_by_year(&self) -> Result<PivotReport> {
        info!(report = "status_by_year", "generating report");
        let ds = self.load_categorical(&[DATE, STATUS])?;
        status_pivot(&reports::with_year_column(&ds, DATE, YEAR)?)
    }

    /// Department, year and status series for the dashboard pie charts.
    pub fn complaint_charts(&self) -> Result<ComplaintCharts> {
        info!(report = "complaint_charts", "generating report");
        let ds = self.load_categorical(&[DEPT, DATE, STATUS])?;
        let ds = reports::with_year_column(&ds, DATE, YEAR)?;

        let department_chart = label_sorted_series(reports::frequency(&ds, DEPT, 0)?);
        let yearly_chart = label_sorted_series(reports::frequency(&ds, YEAR, 0)?);

        // Status totals only cover rows with a usable date.
        let by_year = status_pivot(&ds)?;
        let status_chart = Series {
            name: STATUS.to_string(),
            labels: by_year.groups.iter().map(|g| g.label.clone()).collect(),
            values: (0..by_year.groups.len())
                .map(|g| by_year.rows.iter().map(|r| r.subtotals[g]).sum())
                .collect(),
        };
        Ok(ComplaintCharts {
            department_chart,
            yearly_chart,
            status_chart,
        })
    }
}

fn status_pivot(ds: &Dataset) -> Result<PivotReport> {
    reports::pivot(ds, YEAR, &[STATUS], STATUS, Aggregation::Count)
}

fn label_sorted_series(mut report: FrequencyReport) -> Series {
    report.entries.sort_by(|a, b| compare_labels(&a.label, &b.label));
    Series {
        name: report.column,
        labels: report.entries.iter().map(|e| e.label.clone()).collect(),
        values: report.entries.iter().map(|e| e.count as f64).collect(),
    }
}
