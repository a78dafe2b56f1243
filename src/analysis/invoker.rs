//! Runs a demo parser and writes one file per populated category.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use super::category::Category;
use super::data::{write_record_json, CategoryData, DemoData, SerializeError};
use super::parser::{AnalysisError, DemoParser};

/// Errors that fail an analysis outright.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("No data could be extracted from the demo")]
    NoData,
}

/// How a category was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Csv,
    Json,
}

impl OutputKind {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputKind::Csv => "csv",
            OutputKind::Json => "json",
        }
    }
}

/// One file produced for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub category: Category,
    pub kind: OutputKind,
    pub path: PathBuf,
}

/// Files produced by one analysis, in category order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputFileSet {
    files: Vec<OutputFile>,
}

impl OutputFileSet {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutputFile> {
        self.files.iter()
    }

    pub fn categories(&self) -> Vec<Category> {
        self.files.iter().map(|f| f.category).collect()
    }

    pub fn get(&self, category: Category) -> Option<&OutputFile> {
        self.files.iter().find(|f| f.category == category)
    }
}

impl IntoIterator for OutputFileSet {
    type Item = OutputFile;
    type IntoIter = std::vec::IntoIter<OutputFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

/// Drives a [`DemoParser`] for the configured categories.
#[derive(Clone)]
pub struct AnalysisInvoker {
    parser: Arc<dyn DemoParser>,
    categories: Vec<Category>,
}

impl AnalysisInvoker {
    pub fn new(parser: Arc<dyn DemoParser>, categories: Vec<Category>) -> Self {
        Self { parser, categories }
    }

    /// Invoker requesting every known category.
    pub fn with_all_categories(parser: Arc<dyn DemoParser>) -> Self {
        Self::new(parser, Category::ALL.to_vec())
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Parse `input` and write every populated category into `output_dir`.
    ///
    /// Dropping the returned future cancels the parser; file writing runs on
    /// the blocking pool once parsing has finished.
    pub async fn run(&self, input: &Path, output_dir: &Path) -> Result<OutputFileSet, InvokeError> {
        let data = self.parser.parse(input, &self.categories).await?;

        let invoker = self.clone();
        let output_dir = output_dir.to_path_buf();
        tokio::task::spawn_blocking(move || invoker.write_outputs(data, &output_dir))
            .await
            .map_err(|e| AnalysisError::ParseFailed(format!("output task failed: {}", e)))?
    }

    /// Write every populated category of `data` into `output_dir`.
    ///
    /// Each category is written independently: one that fails to serialize
    /// is logged and left out, the rest still get written.
    pub fn write_outputs(
        &self,
        mut data: DemoData,
        output_dir: &Path,
    ) -> Result<OutputFileSet, InvokeError> {
        let mut files = Vec::new();

        for &category in &self.categories {
            let category_data = data.take(category);
            if !category_data.has_data() {
                tracing::debug!("No data for category '{}'", category);
                continue;
            }

            let (kind, result) = match category_data {
                CategoryData::Absent => continue,
                CategoryData::Table(table) => {
                    let path = output_path(output_dir, category, OutputKind::Csv);
                    (OutputKind::Csv, write_file(&path, |w| table.write_csv(w)).map(|_| path))
                }
                CategoryData::Record(record) => {
                    let path = output_path(output_dir, category, OutputKind::Json);
                    (
                        OutputKind::Json,
                        write_file(&path, |w| write_record_json(&record, w)).map(|_| path),
                    )
                }
            };

            match result {
                Ok(path) => {
                    tracing::debug!("Category '{}' saved as {}", category, kind.extension());
                    files.push(OutputFile {
                        category,
                        kind,
                        path,
                    });
                }
                Err(e) => {
                    tracing::warn!("Error while saving category '{}': {}", category, e);
                }
            }
        }

        if files.is_empty() {
            return Err(InvokeError::NoData);
        }

        tracing::info!(
            "{} produced {} of {} categories",
            self.parser.name(),
            files.len(),
            self.categories.len()
        );
        Ok(OutputFileSet { files })
    }
}

fn output_path(output_dir: &Path, category: Category, kind: OutputKind) -> PathBuf {
    output_dir.join(format!("{}.{}", category.as_str(), kind.extension()))
}

/// Create `path`, hand a buffered writer to `write`, and remove the partial
/// file if anything fails.
fn write_file<F>(path: &Path, write: F) -> Result<(), SerializeError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), SerializeError>,
{
    let result = File::create(path)
        .map_err(SerializeError::from)
        .and_then(|file| {
            let mut writer = BufWriter::new(file);
            write(&mut writer)
        });

    if result.is_err() {
        let _ = fs::remove_file(path);
    }
    result
}
