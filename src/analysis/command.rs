//! Demo parser backed by an external command.
//!
//! The command is run once per demo with placeholders expanded in its
//! arguments:
//! - `{file}` - path of the uploaded demo
//! - `{basename}` - file name of the demo
//! - `{stem}` - file name without extension
//! - `{categories}` - comma-separated category names to extract
//!
//! It must print a single JSON object on stdout, keyed by category name:
//!
//! ```json
//! {
//!   "header": {"map_name": "de_mirage", "tickrate": 64},
//!   "kills": [{"tick": 1042, "attacker_name": "ropz", "victim_name": "jks"}],
//!   "smokes": null
//! }
//! ```
//!
//! Arrays of objects become tables, objects become records, and `null` or
//! missing keys mean the category has no data.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command;

use super::category::Category;
use super::data::{CategoryData, DemoData, Record, Table};
use super::parser::{AnalysisError, DemoParser};

/// External analyzer configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AnalyzerConfig {
    /// Command to execute.
    #[serde(default = "default_command")]
    pub command: String,
    /// Arguments (can include {file}, {basename}, {stem}, {categories}).
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Timeout in seconds (default: 300 = 5 minutes).
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Categories to request. Empty means all of them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

fn default_command() -> String {
    "demoproc-analyzer".to_string()
}

fn default_args() -> Vec<String> {
    vec![
        "{file}".to_string(),
        "--categories".to_string(),
        "{categories}".to_string(),
    ]
}

fn default_timeout() -> u64 {
    300
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: default_args(),
            timeout_seconds: default_timeout(),
            categories: Vec::new(),
        }
    }
}

impl AnalyzerConfig {
    /// Resolve the configured category names.
    pub fn resolved_categories(&self) -> Result<Vec<Category>, super::UnknownCategory> {
        if self.categories.is_empty() {
            return Ok(Category::ALL.to_vec());
        }
        let mut resolved = Vec::with_capacity(self.categories.len());
        for name in &self.categories {
            let category: Category = name.parse()?;
            if !resolved.contains(&category) {
                resolved.push(category);
            }
        }
        // Keep canonical output order regardless of how the list was written.
        resolved.sort();
        Ok(resolved)
    }
}

/// Runs the configured analyzer command and decodes its JSON output.
pub struct CommandParser {
    config: AnalyzerConfig,
}

impl CommandParser {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Replace placeholders in argument string.
    fn expand_arg(&self, arg: &str, file_path: &Path, categories: &[Category]) -> String {
        let file_str = file_path.to_string_lossy();
        let mut result = arg.replace("{file}", &file_str);
        if let Some(basename) = file_path.file_name().and_then(|n| n.to_str()) {
            result = result.replace("{basename}", basename);
        }
        if let Some(stem) = file_path.file_stem().and_then(|n| n.to_str()) {
            result = result.replace("{stem}", stem);
        }
        if result.contains("{categories}") {
            let names: Vec<&str> = categories.iter().map(|c| c.as_str()).collect();
            result = result.replace("{categories}", &names.join(","));
        }
        result
    }

    fn build_args(&self, file_path: &Path, categories: &[Category]) -> Vec<String> {
        self.config
            .args
            .iter()
            .map(|arg| self.expand_arg(arg, file_path, categories))
            .collect()
    }

    /// Run the command and return everything it wrote to stdout.
    ///
    /// The child is killed when the deadline passes or when this future is
    /// dropped, so a cancelled request does not leave an analyzer behind.
    async fn run(&self, file_path: &Path, categories: &[Category]) -> Result<Vec<u8>, AnalysisError> {
        let args = self.build_args(file_path, categories);

        let child = Command::new(&self.config.command)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AnalysisError::NotAvailable(format!(
                        "Install or add to PATH: {}",
                        self.config.command
                    ))
                } else {
                    AnalysisError::ParseFailed(format!("Failed to run command: {}", e))
                }
            })?;

        let timeout = Duration::from_secs(self.config.timeout_seconds);
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                tracing::warn!(
                    "{} exceeded {}s, killing it",
                    self.config.command,
                    self.config.timeout_seconds
                );
                return Err(AnalysisError::Timeout(self.config.timeout_seconds));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnalysisError::ParseFailed(format!(
                "{} failed (exit code {:?}): {}",
                self.config.command,
                output.status.code(),
                stderr.lines().take(5).collect::<Vec<_>>().join("\n")
            )));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl DemoParser for CommandParser {
    fn name(&self) -> &str {
        &self.config.command
    }

    async fn parse(&self, input: &Path, categories: &[Category]) -> Result<DemoData, AnalysisError> {
        let start = Instant::now();
        let output = self.run(input, categories).await?;
        let data = decode_output(&output, categories)?;
        tracing::debug!(
            "{} returned {} populated categories in {}ms",
            self.config.command,
            data.populated(),
            start.elapsed().as_millis()
        );
        Ok(data)
    }
}

/// Decode analyzer stdout into per-category data.
///
/// A malformed value only loses its own category; a document that is not a
/// JSON object at all fails the whole demo.
pub fn decode_output(bytes: &[u8], categories: &[Category]) -> Result<DemoData, AnalysisError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| AnalysisError::InvalidOutput(format!("stdout is not JSON: {}", e)))?;

    let Value::Object(mut map) = value else {
        return Err(AnalysisError::InvalidOutput(
            "expected a JSON object keyed by category".to_string(),
        ));
    };

    let mut data = DemoData::new();
    for &category in categories {
        match map.remove(category.as_str()) {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => match into_records(items) {
                Ok(records) => data.insert(category, CategoryData::Table(Table::from_records(records))),
                Err(index) => tracing::warn!(
                    "Category '{}' row {} is not an object, skipping category",
                    category,
                    index
                ),
            },
            Some(Value::Object(record)) => data.insert(category, CategoryData::Record(record)),
            Some(other) => tracing::warn!(
                "Category '{}' has unsupported value type ({}), skipping category",
                category,
                json_kind(&other)
            ),
        }
    }

    for key in map.keys() {
        tracing::debug!("Ignoring unrequested analyzer output '{}'", key);
    }

    Ok(data)
}

fn into_records(items: Vec<Value>) -> Result<Vec<Record>, usize> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(record) => Ok(record),
            _ => Err(i),
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
