//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod categories;
mod process;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings, LoadOptions};

#[derive(Parser)]
#[command(name = "demoproc")]
#[command(about = "Demo analysis service: upload a demo, get its data back as a zip")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true, env = "DEMOPROC_CONFIG")]
    config: Option<PathBuf>,

    /// Root directory for per-request workspaces
    #[arg(long, global = true, env = "DEMOPROC_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Largest accepted upload in bytes
    #[arg(long, global = true, env = "DEMOPROC_MAX_UPLOAD_BYTES")]
    max_upload_bytes: Option<usize>,

    /// Analyzer executable
    #[arg(long, global = true, env = "DEMOPROC_ANALYZER")]
    analyzer: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Start the upload server
    Serve {
        /// Address to bind: PORT, HOST, or HOST:PORT
        #[arg(short, long, env = "DEMOPROC_BIND")]
        bind: Option<String>,
    },

    /// Analyze a local demo and write the result archive
    Process {
        /// Demo file to analyze
        file: PathBuf,
        /// Where to write the archive (default: ./{name}_analysis.zip)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List recognized data categories
    Categories,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        scratch_dir: cli.scratch_dir,
        max_upload_bytes: cli.max_upload_bytes,
        analyzer_command: cli.analyzer,
    };
    let settings = load_settings(&options).map_err(|e| anyhow::anyhow!(e))?;

    match cli.command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| settings.bind.clone());
            serve::cmd_serve(&settings, &bind).await
        }
        Commands::Process { file, output } => {
            process::cmd_process(&settings, &file, output.as_deref()).await
        }
        Commands::Categories => categories::cmd_categories(&settings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_with_bind() {
        let cli = Cli::try_parse_from(["demoproc", "serve", "--bind", "9000"]).unwrap();
        match cli.command {
            Commands::Serve { bind } => assert_eq!(bind.as_deref(), Some("9000")),
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_parse_process_with_global_flags() {
        let cli = Cli::try_parse_from([
            "demoproc",
            "process",
            "match.dem",
            "-o",
            "out.zip",
            "--scratch-dir",
            "/tmp/scratch",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.scratch_dir, Some(PathBuf::from("/tmp/scratch")));
        match cli.command {
            Commands::Process { file, output } => {
                assert_eq!(file, PathBuf::from("match.dem"));
                assert_eq!(output, Some(PathBuf::from("out.zip")));
            }
            _ => panic!("expected process"),
        }
    }

    #[test]
    fn test_process_requires_file() {
        assert!(Cli::try_parse_from(["demoproc", "process"]).is_err());
    }
}
