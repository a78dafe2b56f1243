//! The analyze-then-package sequence shared by the server and the CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::analysis::{AnalysisInvoker, CommandParser, DemoParser, UnknownCategory};
use crate::archive::{self, PackagingError};
use crate::config::Settings;
use crate::error::ProcessError;
use crate::workspace::{Workspace, WorkspaceLease, WorkspaceManager};

/// Runs analysis and packaging for one workspace at a time.
///
/// Cheap to clone; holds no per-request state.
#[derive(Clone)]
pub struct DemoProcessor {
    workspaces: WorkspaceManager,
    invoker: Arc<AnalysisInvoker>,
}

impl DemoProcessor {
    pub fn new(workspaces: WorkspaceManager, invoker: AnalysisInvoker) -> Self {
        Self {
            workspaces,
            invoker: Arc::new(invoker),
        }
    }

    /// Processor that asks `parser` for every known category.
    pub fn with_parser(workspaces: WorkspaceManager, parser: Arc<dyn DemoParser>) -> Self {
        Self::new(workspaces, AnalysisInvoker::with_all_categories(parser))
    }

    /// Processor driving the configured external analyzer.
    pub fn from_settings(settings: &Settings) -> Result<Self, UnknownCategory> {
        let categories = settings.analyzer.resolved_categories()?;
        let parser = Arc::new(CommandParser::new(settings.analyzer.clone()));
        Ok(Self::new(
            WorkspaceManager::new(&settings.scratch_dir),
            AnalysisInvoker::new(parser, categories),
        ))
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    pub fn invoker(&self) -> &AnalysisInvoker {
        &self.invoker
    }

    /// Allocate a workspace for a new request.
    pub fn allocate(&self) -> Result<WorkspaceLease, ProcessError> {
        Ok(self.workspaces.allocate()?)
    }

    /// Analyze `input` into the workspace's output directory and zip the
    /// result, returning the archive path.
    ///
    /// Dropping the future stops the analyzer. File writing and packaging run
    /// on the blocking pool. Nothing here removes the workspace; that is up to
    /// whoever holds the lease.
    pub async fn analyze_and_package(
        &self,
        workspace: &Workspace,
        input: &Path,
    ) -> Result<PathBuf, ProcessError> {
        let start = Instant::now();

        let files = self.invoker.run(input, workspace.output_dir()).await?;

        let output_dir = workspace.output_dir().to_path_buf();
        let destination = workspace.archive_path();
        let archive = tokio::task::spawn_blocking(move || archive::package(&output_dir, &destination))
            .await
            .map_err(|e| {
                PackagingError::Create(std::io::Error::other(format!(
                    "packaging task failed: {}",
                    e
                )))
            })??;

        tracing::info!(
            "Workspace {} analyzed into {} files in {}ms",
            workspace.id(),
            files.len(),
            start.elapsed().as_millis()
        );
        Ok(archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisError, Category, CategoryData, DemoData, Table};
    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::tempdir;

    struct KillsOnly;

    #[async_trait]
    impl DemoParser for KillsOnly {
        fn name(&self) -> &str {
            "kills-only"
        }

        async fn parse(&self, _input: &Path, _categories: &[Category]) -> Result<DemoData, AnalysisError> {
            Ok(DemoData::new().with(
                Category::Kills,
                CategoryData::Table(Table::new(vec!["tick".into()], vec![vec![json!(1)]])),
            ))
        }
    }

    struct Empty;

    #[async_trait]
    impl DemoParser for Empty {
        fn name(&self) -> &str {
            "empty"
        }

        async fn parse(&self, _input: &Path, _categories: &[Category]) -> Result<DemoData, AnalysisError> {
            Ok(DemoData::new())
        }
    }

    #[tokio::test]
    async fn test_analyze_and_package() {
        let dir = tempdir().unwrap();
        let processor = DemoProcessor::with_parser(WorkspaceManager::new(dir.path()), Arc::new(KillsOnly));

        let lease = processor.allocate().unwrap();
        let input = lease.input_dir().join("match.dem");
        std::fs::write(&input, b"demo").unwrap();

        let archive = processor.analyze_and_package(&lease, &input).await.unwrap();
        assert_eq!(archive, lease.archive_path());
        assert!(archive.is_file());
        assert!(lease.output_dir().join("kills.csv").is_file());

        drop(lease);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_no_data_produces_no_archive() {
        let dir = tempdir().unwrap();
        let processor = DemoProcessor::with_parser(WorkspaceManager::new(dir.path()), Arc::new(Empty));

        let lease = processor.allocate().unwrap();
        let input = lease.input_dir().join("match.dem");
        std::fs::write(&input, b"demo").unwrap();

        let result = processor.analyze_and_package(&lease, &input).await;
        assert!(matches!(result, Err(ProcessError::NoData)));
        assert!(!lease.archive_path().exists());
    }
}
