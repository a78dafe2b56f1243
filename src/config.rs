//! Configuration management for demoproc.
//!
//! Effective [`Settings`] are built from, in increasing precedence:
//! built-in defaults, a config file ([`Config`]), and CLI flags or
//! environment variables (applied by the CLI layer).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::analysis::AnalyzerConfig;

/// Default scratch subdirectory name.
const SCRATCH_SUBDIR: &str = "scratch";

/// Config file names looked up when no path is given.
const CONFIG_FILENAMES: [&str; 4] = [
    "demoproc.toml",
    "demoproc.yaml",
    "demoproc.yml",
    "demoproc.json",
];

/// Default upload limit (512 MiB); competitive demos run to a few hundred MB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Default bind address.
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

/// Application settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Root under which per-request workspaces are created.
    pub scratch_dir: PathBuf,
    /// Address the server listens on.
    pub bind: String,
    /// Largest accepted request body in bytes.
    pub max_upload_bytes: usize,
    /// External analyzer.
    pub analyzer: AnalyzerConfig,
}

impl Default for Settings {
    fn default() -> Self {
        // Falls back gracefully: cache dir -> system temp dir
        let scratch_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("demoproc")
            .join(SCRATCH_SUBDIR);

        Self {
            scratch_dir,
            bind: DEFAULT_BIND.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            analyzer: AnalyzerConfig::default(),
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Scratch root path.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "temp_dir")]
    pub scratch_dir: Option<String>,
    /// Bind address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    /// Upload limit in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_upload_bytes: Option<usize>,
    /// External analyzer configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<AnalyzerConfig>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a specific file path.
    /// Supports JSON, TOML, and YAML based on file extension.
    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents =
            fs::read_to_string(path).map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

        let mut config: Config = match ext {
            "json" => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Find a config file in the working directory or the user config dir.
    pub fn discover() -> Option<PathBuf> {
        let mut candidates = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            candidates.extend(CONFIG_FILENAMES.iter().map(|name| cwd.join(name)));
        }
        if let Some(dir) = dirs::config_dir().map(|d| d.join("demoproc")) {
            candidates.push(dir.join("config.toml"));
            candidates.extend(CONFIG_FILENAMES.iter().map(|name| dir.join(name)));
        }
        candidates.into_iter().find(|path| path.is_file())
    }

    /// Get the base directory for resolving relative paths.
    /// Returns the config file's parent directory if available, otherwise None.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref scratch_dir) = self.scratch_dir {
            settings.scratch_dir = self.resolve_path(scratch_dir, base_dir);
        }
        if let Some(ref bind) = self.bind {
            settings.bind = bind.clone();
        }
        if let Some(limit) = self.max_upload_bytes {
            settings.max_upload_bytes = limit;
        }
        if let Some(ref analyzer) = self.analyzer {
            settings.analyzer = analyzer.clone();
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Scratch root override.
    pub scratch_dir: Option<PathBuf>,
    /// Upload limit override.
    pub max_upload_bytes: Option<usize>,
    /// Analyzer command override.
    pub analyzer_command: Option<String>,
}

/// Load settings: defaults, then config file, then explicit overrides.
///
/// An explicit config path that cannot be read is an error; a discovered
/// one that fails to parse is too, since silently ignoring it would run
/// with surprising defaults.
pub fn load_settings(options: &LoadOptions) -> Result<Settings, String> {
    let mut settings = Settings::default();

    let config_path = options.config_path.clone().or_else(Config::discover);
    if let Some(path) = config_path {
        let config = Config::load_from_path(&path)?;
        let base_dir = config
            .base_dir()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        config.apply_to_settings(&mut settings, &base_dir);
        tracing::debug!("Loaded config from {}", path.display());
    }

    if let Some(ref scratch_dir) = options.scratch_dir {
        settings.scratch_dir = scratch_dir.clone();
    }
    if let Some(limit) = options.max_upload_bytes {
        settings.max_upload_bytes = limit;
    }
    if let Some(ref command) = options.analyzer_command {
        settings.analyzer.command = command.clone();
    }

    Ok(settings)
}
