use crate::engine::ReportEngine;
use crate::error::Result;
use crate::normalize::Normalizer;
use std::path::PathBuf;
use tracing::debug;

/// Everything needed to build a `ReportEngine`, usually filled from the
/// command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportConfig {
    pub dataset: PathBuf,
    /// JSON synonym table; takes precedence over `normalize`.
    pub synonyms: Option<PathBuf>,
    /// Use the built-in complaint synonym table.
    pub normalize: bool,
    pub min_count: usize,
    pub columns: Vec<String>,
}

impl ReportConfig {
    pub fn new(dataset: impl Into<PathBuf>) -> Self {
        Self {
            dataset: dataset.into(),
            ..Self::default()
        }
    }

    pub fn normalizer(&self) -> Result<Option<Normalizer>> {
        match (&self.synonyms, self.normalize) {
            (Some(path), _) => {
                debug!(path = %path.display(), "loading synonym table");
                Normalizer::from_json_file(path).map(Some)
            }
            (None, true) => Ok(Some(Normalizer::complaints())),
            (None, false) => Ok(None),
        }
    }

    pub fn engine(&self) -> Result<ReportEngine> {
        let mut builder = ReportEngine::builder()
            .dataset_path(&self.dataset)
            .min_count(self.min_count)
            .columns(self.columns.iter().cloned());
        if let Some(n) = self.normalizer()? {
            builder = builder.normalizer(n);
        }
        builder.build()
    }
}
