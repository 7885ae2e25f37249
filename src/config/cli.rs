use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the pawnstats binary.
#[derive(Debug, Parser)]
#[command(name = "pawnstats", version, about = "Cached chess.com statistics API")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PAWNSTATS_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP API.
    Serve(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the maximum number of cached responses.
    #[arg(long = "cache-max-entries", value_name = "COUNT")]
    pub cache_max_entries: Option<usize>,

    /// Expose `GET /api/cache/status`.
    #[arg(
        long = "cache-expose-status",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_expose_status: Option<bool>,

    /// Override the chess.com API base URL.
    #[arg(long = "upstream-base-url", value_name = "URL")]
    pub upstream_base_url: Option<String>,

    /// Override the User-Agent sent upstream.
    #[arg(long = "upstream-user-agent", value_name = "AGENT")]
    pub upstream_user_agent: Option<String>,

    /// Override the number of concurrent upstream requests.
    #[arg(long = "upstream-concurrency", value_name = "COUNT")]
    pub upstream_concurrency: Option<usize>,

    /// Override the minimum spacing between upstream request starts.
    #[arg(long = "upstream-rate-limit-ms", value_name = "MS")]
    pub upstream_rate_limit_ms: Option<u64>,

    /// Override the number of attempts per upstream request.
    #[arg(long = "upstream-max-attempts", value_name = "COUNT")]
    pub upstream_max_attempts: Option<u32>,
}
