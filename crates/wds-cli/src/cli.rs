//! CLI argument definitions for the survey.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "watermark-survey",
    version,
    about = "Watermark detection survey - can you tell marked text apart?",
    long_about = "Run a watermark detection survey in the terminal.\n\n\
                  Each assignment asks you to prompt a language model, decide whether\n\
                  the answer carries a hidden watermark, and explain how you would\n\
                  remove it. Results are summarised at the end of the session."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow prompts and answers to appear in trace logs.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,

    /// Survey configuration file (default: the per-user config directory).
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Take the survey.
    Run(RunArgs),

    /// List the registered watermarks and which are enabled.
    Watermarks,

    /// Apply the enabled watermarks to a piece of text.
    Apply(ApplyArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// Participant identifier recorded in the summary.
    #[arg(long = "participant", value_name = "ID")]
    pub participant: Option<String>,

    /// Answer prompts locally instead of calling the remote model.
    #[arg(long = "offline")]
    pub offline: bool,

    /// How to print the summary at the end of the session.
    #[arg(long = "summary", value_enum, default_value = "table")]
    pub summary: SummaryFormatArg,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Text to watermark (read from stdin when omitted).
    #[arg(value_name = "TEXT")]
    pub text: Option<String>,

    /// Use the local generator for watermarks that need a model.
    #[arg(long = "offline")]
    pub offline: bool,
}

/// CLI summary format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum SummaryFormatArg {
    Table,
    Json,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
