//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, sign, validate), and their associated argument
//! structs. Every `run` flag has an environment variable equivalent for
//! container deployments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "couchdb-auth-proxy",
    version,
    about = "Authenticating reverse proxy for CouchDB",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        couchdb-auth-proxy run --target http://localhost:5984 --secret $SECRET\n  \
        couchdb-auth-proxy run -c couchdb-auth-proxy.yaml\n  \
        couchdb-auth-proxy sign alice --secret $SECRET"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the proxy server
    Run(Box<RunArgs>),

    /// Print the proxy-auth token for a user
    Sign(SignArgs),

    /// Validate a config file without starting
    Validate(ValidateArgs),
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        couchdb-auth-proxy run                                  Auto-detect config\n  \
        couchdb-auth-proxy run -c proxy.yaml -p 8080 --pretty   Local dev mode\n  \
        couchdb-auth-proxy run --target http://couch:5984 --via gw-1")]
pub struct RunArgs {
    /// Config file path (.yaml, .json, .toml)
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Listen port
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Listen address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    // -- Proxy --
    /// CouchDB base URL (overrides the config file)
    #[arg(long, env = "COUCHDB_URL", help_heading = "Proxy")]
    pub target: Option<String>,

    /// Shared proxy-auth secret (overrides the config file)
    #[arg(
        long,
        env = "COUCHDB_AUTH_SECRET",
        hide_env_values = true,
        help_heading = "Proxy"
    )]
    pub secret: Option<String>,

    /// Pseudonym recorded in the Via header (overrides the config file)
    #[arg(long, env = "PROXY_VIA", help_heading = "Proxy")]
    pub via: Option<String>,

    // -- Logging --
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,
}

#[derive(Args)]
pub struct SignArgs {
    /// User name to sign
    pub user: String,

    /// Shared proxy-auth secret
    #[arg(long, env = "COUCHDB_AUTH_SECRET", hide_env_values = true)]
    pub secret: String,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Config file to validate
    #[arg(default_value = "couchdb-auth-proxy.yaml")]
    pub config: PathBuf,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ValidateFormat,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ValidateFormat {
    Text,
    Json,
}
