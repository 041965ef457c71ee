use crate::error::{ReadFailure, ReportError, Result};
use crate::types::{Dataset, Value};
use crate::util::{is_na_token, parse_cell};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Csv,
    Workbook,
}

impl SourceFormat {
    fn from_path(path: &Path) -> std::result::Result<Self, ReadFailure> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" | "txt" => Ok(SourceFormat::Csv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(SourceFormat::Workbook),
            other => Err(ReadFailure::UnsupportedFormat(if other.is_empty() {
                "(no extension)".to_string()
            } else {
                other.to_string()
            })),
        }
    }
}

/// Reads the configured dataset file into a fresh `Dataset` on every call.
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    path: PathBuf,
}

impl DatasetLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Dataset> {
        load(&self.path)
    }
}

pub fn load(path: &Path) -> Result<Dataset> {
    if !path.exists() {
        return Err(ReportError::DatasetNotFound {
            path: path.to_path_buf(),
        });
    }
    let format = SourceFormat::from_path(path).map_err(|e| ReportError::read(path, e))?;
    debug!(path = %path.display(), ?format, "reading dataset");
    let dataset = match format {
        SourceFormat::Csv => read_csv(path),
        SourceFormat::Workbook => read_workbook(path),
    }
    .map_err(|e| ReportError::read(path, e))?;
    info!(
        path = %path.display(),
        rows = dataset.row_count(),
        columns = dataset.column_count(),
        "dataset loaded"
    );
    Ok(dataset)
}

fn read_csv(path: &Path) -> std::result::Result<Dataset, ReadFailure> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers: Vec<Option<String>> = rdr
        .headers()?
        .iter()
        .map(|h| Some(h.to_string()))
        .collect();
    let mut dataset = Dataset::new(header_names(headers));
    for result in rdr.records() {
        let record = result?;
        dataset.push_row(record.iter().map(parse_cell).collect())?;
    }
    Ok(dataset)
}

fn read_workbook(path: &Path) -> std::result::Result<Dataset, ReadFailure> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(ReadFailure::NoSheets)?;
    let range = workbook.worksheet_range(&sheet_name)?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Dataset::default());
    };
    let headers = header_row
        .iter()
        .map(|cell| match workbook_cell(cell) {
            Value::Null => None,
            v => Some(v.to_string()),
        })
        .collect();
    let mut dataset = Dataset::new(header_names(headers));
    for row in rows {
        dataset.push_row(row.iter().map(workbook_cell).collect())?;
    }
    Ok(dataset)
}

fn workbook_cell(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) => {
            if is_na_token(s) {
                Value::Null
            } else {
                Value::Text(s.clone())
            }
        }
        Data::Float(f) => Value::Float(*f),
        Data::Int(i) => Value::Int(*i),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| Value::Date(d.date()))
            .unwrap_or(Value::Float(dt.as_f64())),
        Data::DateTimeIso(s) => parse_cell(s),
        Data::DurationIso(s) => Value::Text(s.clone()),
    }
}

/// Blank headers become `Unnamed: {idx}`; repeated names get `.1`, `.2`...
/// until the name is unused, so every column name is unique.
fn header_names(raw: Vec<Option<String>>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut suffixes: HashMap<String, usize> = HashMap::new();
    raw.into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let base = match name {
                Some(n) if !n.trim().is_empty() => n,
                _ => format!("Unnamed: {}", idx),
            };
            let mut name = base.clone();
            let n = suffixes.entry(base.clone()).or_insert(0);
            while taken.contains(&name) {
                *n += 1;
                name = format!("{}.{}", base, n);
            }
            taken.insert(name.clone());
            name
        })
        .collect()
}
