//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

pub use cli::{
    BackendArg, CliArgs, Command, GateArgs, IdentityArgs, LookupArgs, RolloutOverrides,
    ServeArgs, ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "gatehouse";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_ENVIRONMENT_TIER: &str = "development";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 3_000;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub rollout: RolloutSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Clone)]
pub struct RolloutSettings {
    pub server_secret: String,
    pub environment: String,
    pub backend: BackendSettings,
}

impl std::fmt::Debug for RolloutSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RolloutSettings")
            .field("server_secret", &"<redacted>")
            .field("environment", &self.environment)
            .field("backend", &self.backend)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendSettings {
    Local {
        overrides_file: Option<PathBuf>,
    },
    Http {
        api_base_url: Url,
        request_timeout: Duration,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    pub enabled: bool,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("GATEHOUSE").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Gate(args)) => raw.apply_rollout_overrides(&args.rollout),
        Some(Command::Config(args)) | Some(Command::Params(args)) => {
            raw.apply_rollout_overrides(&args.rollout)
        }
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    rollout: RawRolloutSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }

        self.apply_rollout_overrides(&overrides.rollout);
    }

    fn apply_rollout_overrides(&mut self, overrides: &RolloutOverrides) {
        if let Some(secret) = overrides.server_secret.as_ref() {
            self.rollout.server_secret = Some(secret.clone());
        }
        if let Some(environment) = overrides.environment.as_ref() {
            self.rollout.environment = Some(environment.clone());
        }
        if let Some(backend) = overrides.backend {
            self.rollout.backend = Some(backend.as_str().to_string());
        }
        if let Some(url) = overrides.api_base_url.as_ref() {
            self.rollout.api_base_url = Some(url.clone());
        }
        if let Some(path) = overrides.overrides_file.as_ref() {
            self.rollout.overrides_file = Some(path.clone());
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            rollout,
            cache,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let rollout = build_rollout_settings(rollout)?;
        let cache = CacheSettings {
            enabled: cache.enabled.unwrap_or(false),
        };

        Ok(Self {
            server,
            logging,
            rollout,
            cache,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_rollout_settings(rollout: RawRolloutSettings) -> Result<RolloutSettings, LoadError> {
    let server_secret = non_blank(rollout.server_secret).ok_or_else(|| {
        LoadError::invalid(
            "rollout.server_secret",
            "must be set (GATEHOUSE__ROLLOUT__SERVER_SECRET or --server-secret)",
        )
    })?;

    let environment = non_blank(rollout.environment)
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT_TIER.to_string());

    let backend = match rollout.backend.as_deref().map(str::trim) {
        None | Some("local") => BackendSettings::Local {
            overrides_file: rollout.overrides_file,
        },
        Some("http") => {
            let raw_url = non_blank(rollout.api_base_url).ok_or_else(|| {
                LoadError::invalid("rollout.api_base_url", "required for the http backend")
            })?;
            let api_base_url = Url::parse(&raw_url).map_err(|err| {
                LoadError::invalid("rollout.api_base_url", format!("invalid URL: {err}"))
            })?;

            let timeout_ms = rollout
                .request_timeout_ms
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);
            if timeout_ms == 0 {
                return Err(LoadError::invalid(
                    "rollout.request_timeout_ms",
                    "must be greater than zero",
                ));
            }

            BackendSettings::Http {
                api_base_url,
                request_timeout: Duration::from_millis(timeout_ms),
            }
        }
        Some(other) => {
            return Err(LoadError::invalid(
                "rollout.backend",
                format!("unknown backend `{other}` (expected `local` or `http`)"),
            ));
        }
    };

    Ok(RolloutSettings {
        server_secret,
        environment,
        backend,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRolloutSettings {
    server_secret: Option<String>,
    environment: Option<String>,
    backend: Option<String>,
    api_base_url: Option<String>,
    overrides_file: Option<PathBuf>,
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
