//! Reporting over tabular complaint datasets.
//!
//! The pipeline is: [`loader`] reads a CSV or spreadsheet into a
//! [`types::Dataset`], [`normalize`] canonicalizes category labels,
//! [`reports`] computes frequency tables, pivots, missing-value and
//! descriptive summaries, and [`output`] turns the results into JSON
//! payloads, flat records and chart series. [`engine::ReportEngine`] wires
//! these together for a configured dataset path.

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod normalize;
pub mod output;
pub mod reports;
pub mod types;
pub mod util;

pub use config::ReportConfig;
pub use engine::ReportEngine;
pub use error::{ErrorKind, ReportError, Result};
pub use normalize::Normalizer;
