//! Canonicalization of free-text category columns.
//!
//! Synonym tables are plain configuration: a map from column name to
//! `{canonical label: [variant, ...]}`. The built-in table only covers the
//! department and status spellings seen in the complaint exports and can be
//! replaced wholesale from a JSON file.

use crate::error::{ReportError, Result};
use crate::types::{Dataset, Value};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Label substituted for missing or empty category values.
pub const BLANK_LABEL: &str = "(blank)";

static COMPLAINT_SYNONYMS: Lazy<Normalizer> = Lazy::new(|| {
    Normalizer::new()
        .with_synonyms(
            "DEPT",
            [
                (
                    "O&M",
                    &[
                        "Operation & Maintenance",
                        "Operation and Maintenance",
                        "Operations & Maintenance",
                        "O & M",
                    ][..],
                ),
                ("Commercial", &["Comm", "Commercial Dept"][..]),
            ],
        )
        .with_synonyms(
            "CLOSED/OPEN",
            [("CLOSED", &["Close"][..]), ("OPEN", &["Opened", "Re-open", "Reopen"][..])],
        )
});

/// Variants for one column, keyed by canonical label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SynonymTable(IndexMap<String, Vec<String>>);

impl SynonymTable {
    fn lookup(&self) -> HashMap<String, &str> {
        let mut map = HashMap::new();
        for (canonical, variants) in &self.0 {
            map.insert(fold(canonical), canonical.as_str());
            for v in variants {
                map.insert(fold(v), canonical.as_str());
            }
        }
        map
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Normalizer {
    columns: IndexMap<String, SynonymTable>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in table for the complaint dataset (`DEPT`, `CLOSED/OPEN`).
    pub fn complaints() -> Self {
        COMPLAINT_SYNONYMS.clone()
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s)
            .map_err(|e| ReportError::Config(format!("invalid synonym table: {}", e)))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ReportError::Config(format!("cannot read synonym file {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    /// Register a column with no synonyms: values are only trimmed and blanked.
    pub fn with_column(mut self, column: &str) -> Self {
        self.columns.entry(column.to_string()).or_default();
        self
    }

    pub fn with_synonyms<'a, I>(mut self, column: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [&'a str])>,
    {
        let table = self.columns.entry(column.to_string()).or_default();
        for (canonical, variants) in entries {
            table
                .0
                .entry(canonical.to_string())
                .or_default()
                .extend(variants.iter().map(|v| v.to_string()));
        }
        self
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns a normalized copy of `dataset`; the input is left untouched.
    pub fn normalize(&self, dataset: &Dataset) -> Result<Dataset> {
        let names: Vec<&str> = self.columns().collect();
        let indices = dataset.require(&names[..])?;
        let mut out = dataset.clone();
        for (idx, table) in indices.into_iter().zip(self.columns.values()) {
            let lookup = table.lookup();
            out = out.map_column(idx, |v| canonicalize(v, &lookup));
        }
        Ok(out)
    }
}

fn canonicalize(v: &Value, lookup: &HashMap<String, &str>) -> Value {
    match v {
        Value::Null => Value::text(BLANK_LABEL),
        Value::Text(s) => {
            let cleaned = collapse_whitespace(s);
            if cleaned.is_empty() {
                return Value::text(BLANK_LABEL);
            }
            match lookup.get(&cleaned.to_lowercase()) {
                Some(canonical) => Value::text(*canonical),
                None => Value::Text(cleaned),
            }
        }
        other => other.clone(),
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fold(s: &str) -> String {
    collapse_whitespace(s).to_lowercase()
}
