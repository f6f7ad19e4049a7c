//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use lockaudit_scanner::LockfileFormat;

/// lockaudit -- audit a dependency tree for known vulnerabilities.
///
/// Use `lockaudit <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "lockaudit", version, about, long_about = None)]
pub struct Cli {
    /// Path to the lockaudit.toml configuration file.
    #[arg(short, long, global = true, default_value = "lockaudit.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

/// Finding filters shared by the audit commands.
#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// Only report these severities (comma separated: none, low, medium, high, critical, unknown).
    #[arg(long, global = true, value_delimiter = ',')]
    pub severity: Vec<String>,

    /// Drop advisories whose attack vector is network.
    #[arg(long, global = true)]
    pub local_only: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Audit a lockfile.
    Lock(LockArgs),

    /// Audit a published package and its dependencies.
    Package(PackageArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- lock ----

/// Audit a package-lock.json, yarn.lock or pnpm-lock.yaml.
#[derive(Args, Debug)]
pub struct LockArgs {
    /// Lockfile path, or `-` to read from standard input.
    pub path: PathBuf,

    /// Lockfile format (detected from the file name when omitted; required for `-`).
    #[arg(long)]
    pub format: Option<FormatArg>,
}

impl LockArgs {
    /// Whether the lockfile is read from standard input.
    pub fn is_stdin(&self) -> bool {
        self.path.as_os_str() == "-"
    }
}

/// Lockfile format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Npm,
    Yarn,
    Pnpm,
}

impl From<FormatArg> for LockfileFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Npm => Self::Npm,
            FormatArg::Yarn => Self::Yarn,
            FormatArg::Pnpm => Self::Pnpm,
        }
    }
}

// ---- package ----

/// Audit a package from the local registry mirror.
#[derive(Args, Debug)]
pub struct PackageArgs {
    /// Package name (e.g. `express` or `@babel/core`).
    pub name: String,

    /// Version or range to audit (default: the `latest` dist-tag).
    #[arg(long = "version", id = "package_version")]
    pub version: Option<String>,
}

// ---- config ----

/// Manage lockaudit configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, advisory, registry, audit).
        #[arg(long)]
        section: Option<String>,
    },
}
