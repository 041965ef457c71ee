// Utility helpers for cell parsing, basic statistics and number formatting.
//
// Everything that has to deal with raw text from the dataset file lives here
// so the report code can work with typed `Value`s only.
use crate::types::Value;
use chrono::{NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

/// Tokens treated as missing when reading text cells, matching the usual
/// spreadsheet/pandas conventions.
const NA_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "null", "NULL", "None", "#N/A", "<NA>",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Type a raw CSV field.
///
/// - NA tokens become `Null`.
/// - Integers and floats become numbers (no thousands separators, like
///   spreadsheet exports without locale formatting).
/// - `true`/`false` in any case become booleans.
/// - ISO dates and date-times become dates.
/// - Anything else is kept verbatim as text.
pub fn parse_cell(raw: &str) -> Value {
    if is_na_token(raw) {
        return Value::Null;
    }
    let s = raw.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Value::Int(i);
    }
    if looks_numeric(s) {
        if let Ok(f) = s.parse::<f64>() {
            return Value::Float(f);
        }
    }
    if s.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Some(d) = parse_iso_date(s) {
        return Value::Date(d);
    }
    Value::Text(raw.to_string())
}

/// True for text that stands for a missing value in any source format.
pub fn is_na_token(raw: &str) -> bool {
    NA_TOKENS.contains(&raw.trim())
}

// `f64::from_str` accepts "inf" and "NaN"; those should stay text.
fn looks_numeric(s: &str) -> bool {
    !s.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E')
}

fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
}

/// Best-effort date extraction used for derived year/trend columns.
pub fn parse_date_safe(v: &Value) -> Option<NaiveDate> {
    match v {
        Value::Date(d) => Some(*d),
        Value::Text(s) => {
            let s = s.trim();
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .or_else(|| parse_iso_date(s))
        }
        _ => None,
    }
}

pub fn average(v: &[f64]) -> f64 {
    // Returns 0 for an empty slice to avoid NaNs.
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

/// Sample variance (n - 1 denominator); `None` below two observations.
pub fn variance(v: &[f64]) -> Option<f64> {
    if v.len() < 2 {
        return None;
    }
    let mean = average(v);
    let ss: f64 = v.iter().map(|x| (x - mean).powi(2)).sum();
    Some(ss / (v.len() - 1) as f64)
}

/// Quantile of an ascending-sorted slice using linear interpolation between
/// the two closest ranks.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn sort_floats(v: &mut [f64]) {
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
}

/// Ordering for grouping labels: numeric labels compare by value and sort
/// before text, everything else compares as strings.
pub fn compare_labels(a: &str, b: &str) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// `part / whole * 100` rounded to 2 decimals, 0 when `whole` is 0.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 / whole as f64 * 100.0)
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus locale-aware thousands separators, e.g. `1,234,567.89`.
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Used for counts in console messages (e.g. `9,855 rows loaded`).
    n.to_formatted_string(&Locale::en)
}
