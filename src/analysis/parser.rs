//! The demo parser seam.
//!
//! Parsing a demo is somebody else's job; this trait is the whole contract.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use super::category::Category;
use super::data::DemoData;

/// Errors from a demo parser that make the whole demo unusable.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Analyzer not available: {0}")]
    NotAvailable(String),

    #[error("Failed to parse demo: {0}")]
    ParseFailed(String),

    #[error("Analyzer timed out after {0}s")]
    Timeout(u64),

    #[error("Analyzer produced invalid output: {0}")]
    InvalidOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that can turn a demo file into per-category data.
///
/// The returned future is dropped when the request that awaits it goes
/// away, so implementations must not leave work running past that point.
/// CPU-heavy in-process parsers belong on the blocking pool.
#[async_trait]
pub trait DemoParser: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Parse `input` and return data for as many of `categories` as possible.
    ///
    /// Categories the parser has nothing for may be left out of the result.
    /// Only return an error if the demo could not be parsed at all.
    async fn parse(&self, input: &Path, categories: &[Category]) -> Result<DemoData, AnalysisError>;
}
