// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `themepipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "themepipe",
    version,
    about = "Build theme assets, serve a live-reloading dev proxy, rebuild on change.",
    long_about = None
)]
pub struct CliArgs {
    /// Task to run: stylesheets, scripts, svgs, img-opt, watch-images,
    /// serve, build, images, default.
    #[arg(value_name = "TASK", default_value = "default")]
    pub task: String,

    /// Path to the settings file (JSON).
    ///
    /// Default: `settings.json` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "settings.json")]
    pub settings: String,

    /// Production mode: content tasks skip live-reload notifications.
    ///
    /// This does not disable watching; invoke `build` for a one-shot run.
    #[arg(long)]
    pub production: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `THEMEPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
