use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the Gatehouse binary.
#[derive(Debug, Parser)]
#[command(name = "gatehouse", version, about = "Feature rollout evaluation server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "GATEHOUSE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the evaluation HTTP service.
    Serve(Box<ServeArgs>),
    /// Evaluate a feature gate once and print the result.
    Gate(GateArgs),
    /// Resolve a dynamic config once and print the result.
    Config(LookupArgs),
    /// Resolve a parameter store once and print the result.
    #[command(name = "params")]
    Params(LookupArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Local,
    Http,
}

impl BackendArg {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendArg::Local => "local",
            BackendArg::Http => "http",
        }
    }
}

#[derive(Debug, Args, Default, Clone)]
pub struct RolloutOverrides {
    /// Override the evaluation service credential.
    #[arg(
        long = "server-secret",
        env = "GATEHOUSE_SERVER_SECRET",
        hide_env_values = true,
        value_name = "SECRET"
    )]
    pub server_secret: Option<String>,

    /// Override the environment tier evaluations run against.
    #[arg(long = "environment", value_name = "TIER")]
    pub environment: Option<String>,

    /// Override the evaluation backend.
    #[arg(long = "backend", value_enum, value_name = "BACKEND")]
    pub backend: Option<BackendArg>,

    /// Override the remote evaluation service base URL.
    #[arg(long = "api-base-url", value_name = "URL")]
    pub api_base_url: Option<String>,

    /// Override the local backend overrides document.
    #[arg(long = "overrides-file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub overrides_file: Option<PathBuf>,

    /// Toggle the in-memory data store handed to the backend.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub rollout: RolloutOverrides,

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
}

/// Identity attributes for one-shot evaluations.
#[derive(Debug, Args, Default, Clone)]
pub struct IdentityArgs {
    /// User id to evaluate for; the default identity is used when omitted.
    #[arg(long = "user-id", value_name = "ID")]
    pub user_id: Option<String>,

    /// Country attribute.
    #[arg(long = "country", value_name = "CODE")]
    pub country: Option<String>,

    /// Value of the `plan` custom attribute.
    #[arg(long = "plan", value_name = "PLAN")]
    pub plan: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct GateArgs {
    #[command(flatten)]
    pub rollout: RolloutOverrides,

    #[command(flatten)]
    pub identity: IdentityArgs,

    /// Gate name.
    #[arg(value_name = "GATE")]
    pub name: String,
}

#[derive(Debug, Args, Clone)]
pub struct LookupArgs {
    #[command(flatten)]
    pub rollout: RolloutOverrides,

    #[command(flatten)]
    pub identity: IdentityArgs,

    /// Config or parameter store name.
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Return only this key of the resolved value.
    #[arg(long = "key", value_name = "KEY")]
    pub key: Option<String>,
}
