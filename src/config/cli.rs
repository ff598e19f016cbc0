use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the Shieldforge binary.
#[derive(Debug, Parser)]
#[command(
    name = "shieldforge",
    version,
    about = "Shield editor backend: design storage and layer delivery"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "SHIELDFORGE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
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

    /// Override the remote project URL.
    #[arg(long = "remote-url", value_name = "URL")]
    pub remote_url: Option<String>,

    /// Override the bucket holding layer images.
    #[arg(long = "remote-bucket", value_name = "NAME")]
    pub remote_bucket: Option<String>,

    /// Override the connect timeout for remote calls.
    #[arg(long = "remote-connect-timeout-seconds", value_name = "SECONDS")]
    pub remote_connect_timeout_seconds: Option<u64>,

    /// Override the overall timeout for remote calls.
    #[arg(long = "remote-read-timeout-seconds", value_name = "SECONDS")]
    pub remote_read_timeout_seconds: Option<u64>,

    /// Override the maximum save request size in bytes.
    #[arg(long = "uploads-max-request-bytes", value_name = "BYTES")]
    pub uploads_max_request_bytes: Option<u64>,
}
