//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use time::{Date, UtcOffset};
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "tsuzuri";
const ENV_PREFIX: &str = "TSUZURI";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_STORE_PATH: &str = "data/posts.json";
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://127.0.0.1:3000/media/";
const DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_GENERATION_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_GENERATION_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_GENERATION_MAX_TOKENS: u64 = 8000;
const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_IMAGE_SLOTS: u32 = 3;
const MAX_IMAGE_SLOTS: u32 = 12;
const DEFAULT_AUTHOR: &str = "Editorial Team";
const DEFAULT_INVALIDATION_TIMEOUT_SECS: u64 = 5;

/// Command-line arguments for the Tsuzuri binary.
#[derive(Debug, Parser)]
#[command(name = "tsuzuri", version, about = "Tsuzuri blog content pipeline")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "TSUZURI_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP API and public pages.
    Serve(Box<ServeArgs>),
    /// Print the publicly visible posts as JSON.
    Visible(VisibleArgs),
    /// Validate the post store and report its size.
    Check(CheckArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct StoreOverride {
    /// Override the post store file.
    #[arg(long = "store-path", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub store_path: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub store: StoreOverride,

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

    /// Override the uploads directory.
    #[arg(long = "uploads-directory", value_name = "PATH")]
    pub uploads_directory: Option<PathBuf>,

    /// Override the public base URL of stored images.
    #[arg(long = "uploads-public-base-url", value_name = "URL")]
    pub uploads_public_base_url: Option<String>,

    /// Override the maximum request size for uploads in bytes.
    #[arg(long = "uploads-max-request-bytes", value_name = "BYTES")]
    pub uploads_max_request_bytes: Option<u64>,

    /// Override the number of numbered image placeholders requested per draft.
    #[arg(long = "generation-image-slots", value_name = "COUNT")]
    pub generation_image_slots: Option<u32>,

    /// Override the invalidation webhook URL.
    #[arg(long = "invalidation-webhook-url", value_name = "URL")]
    pub invalidation_webhook_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct VisibleArgs {
    #[command(flatten)]
    pub store: StoreOverride,

    /// Reference day (YYYY-MM-DD) in the site offset; defaults to today.
    #[arg(long = "date", value_name = "DATE", value_parser = parse_calendar_date)]
    pub date: Option<Date>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub store: StoreOverride,
}

fn parse_calendar_date(value: &str) -> Result<Date, String> {
    let format = time::macros::format_description!("[year]-[month]-[day]");
    Date::parse(value, format).map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub store: StoreSettings,
    pub uploads: UploadSettings,
    pub generation: GenerationSettings,
    pub invalidation: InvalidationSettings,
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

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub path: PathBuf,
    /// Site offset used to decide which calendar day it is.
    pub utc_offset: UtcOffset,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub directory: PathBuf,
    pub public_base_url: Url,
    pub max_request_bytes: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub endpoint: Url,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: NonZeroU32,
    pub timeout: Duration,
    pub image_slots: u32,
    pub default_author: String,
}

#[derive(Debug, Clone)]
pub struct InvalidationSettings {
    pub webhook_url: Option<Url>,
    pub timeout: Duration,
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

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Visible(args)) => raw.apply_store_override(&args.store),
        Some(Command::Check(args)) => raw.apply_store_override(&args.store),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    store: RawStoreSettings,
    uploads: RawUploadSettings,
    generation: RawGenerationSettings,
    invalidation: RawInvalidationSettings,
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
        if let Some(directory) = overrides.uploads_directory.as_ref() {
            self.uploads.directory = Some(directory.clone());
        }
        if let Some(url) = overrides.uploads_public_base_url.as_ref() {
            self.uploads.public_base_url = Some(url.clone());
        }
        if let Some(limit) = overrides.uploads_max_request_bytes {
            self.uploads.max_request_bytes = Some(limit);
        }
        if let Some(slots) = overrides.generation_image_slots {
            self.generation.image_slots = Some(slots);
        }
        if let Some(url) = overrides.invalidation_webhook_url.as_ref() {
            self.invalidation.webhook_url = Some(url.clone());
        }

        self.apply_store_override(&overrides.store);
    }

    fn apply_store_override(&mut self, overrides: &StoreOverride) {
        if let Some(path) = overrides.store_path.as_ref() {
            self.store.path = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            store,
            uploads,
            generation,
            invalidation,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            store: build_store_settings(store)?,
            uploads: build_upload_settings(uploads)?,
            generation: build_generation_settings(generation)?,
            invalidation: build_invalidation_settings(invalidation)?,
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

fn build_store_settings(store: RawStoreSettings) -> Result<StoreSettings, LoadError> {
    let path = store
        .path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH));
    if path.as_os_str().is_empty() {
        return Err(LoadError::invalid("store.path", "path must not be empty"));
    }

    let hours = store.utc_offset_hours.unwrap_or(0);
    let utc_offset = UtcOffset::from_hms(hours, 0, 0).map_err(|err| {
        LoadError::invalid("store.utc_offset_hours", format!("out of range: {err}"))
    })?;

    Ok(StoreSettings { path, utc_offset })
}

fn build_upload_settings(uploads: RawUploadSettings) -> Result<UploadSettings, LoadError> {
    let directory = uploads
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR));

    let base = uploads
        .public_base_url
        .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string());
    let public_base_url = parse_url(&base, "uploads.public_base_url").map(with_trailing_slash)?;

    let max_request_bytes_value = uploads
        .max_request_bytes
        .unwrap_or(DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES);
    let max_request_bytes = NonZeroU64::new(max_request_bytes_value).ok_or_else(|| {
        LoadError::invalid("uploads.max_request_bytes", "must be greater than zero")
    })?;
    usize::try_from(max_request_bytes_value).map_err(|_| {
        LoadError::invalid(
            "uploads.max_request_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(UploadSettings {
        directory,
        public_base_url,
        max_request_bytes,
    })
}

fn build_generation_settings(
    generation: RawGenerationSettings,
) -> Result<GenerationSettings, LoadError> {
    let endpoint = parse_url(
        generation
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_GENERATION_ENDPOINT),
        "generation.endpoint",
    )?;

    let api_key = generation.api_key.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let model = generation
        .model
        .unwrap_or_else(|| DEFAULT_GENERATION_MODEL.to_string());
    if model.trim().is_empty() {
        return Err(LoadError::invalid("generation.model", "must not be empty"));
    }

    let max_tokens = non_zero_u32(
        generation
            .max_tokens
            .unwrap_or(DEFAULT_GENERATION_MAX_TOKENS),
        "generation.max_tokens",
    )?;

    let timeout_secs = generation
        .timeout_seconds
        .unwrap_or(DEFAULT_GENERATION_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "generation.timeout_seconds",
            "must be greater than zero",
        ));
    }

    let image_slots = generation.image_slots.unwrap_or(DEFAULT_IMAGE_SLOTS);
    if image_slots > MAX_IMAGE_SLOTS {
        return Err(LoadError::invalid(
            "generation.image_slots",
            format!("must be at most {MAX_IMAGE_SLOTS}"),
        ));
    }

    let default_author = generation
        .default_author
        .map(|author| author.trim().to_string())
        .filter(|author| !author.is_empty())
        .unwrap_or_else(|| DEFAULT_AUTHOR.to_string());

    Ok(GenerationSettings {
        endpoint,
        api_key,
        model,
        max_tokens,
        timeout: Duration::from_secs(timeout_secs),
        image_slots,
        default_author,
    })
}

fn build_invalidation_settings(
    invalidation: RawInvalidationSettings,
) -> Result<InvalidationSettings, LoadError> {
    let webhook_url = match invalidation.webhook_url.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => Some(parse_url(value, "invalidation.webhook_url")?),
        _ => None,
    };

    let timeout_secs = invalidation
        .timeout_seconds
        .unwrap_or(DEFAULT_INVALIDATION_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "invalidation.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(InvalidationSettings {
        webhook_url,
        timeout: Duration::from_secs(timeout_secs),
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
struct RawStoreSettings {
    path: Option<PathBuf>,
    utc_offset_hours: Option<i8>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUploadSettings {
    directory: Option<PathBuf>,
    public_base_url: Option<String>,
    max_request_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawGenerationSettings {
    endpoint: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    max_tokens: Option<u64>,
    timeout_seconds: Option<u64>,
    image_slots: Option<u32>,
    default_author: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawInvalidationSettings {
    webhook_url: Option<String>,
    timeout_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_url(value: &str, key: &'static str) -> Result<Url, LoadError> {
    Url::parse(value.trim()).map_err(|err| LoadError::invalid(key, format!("invalid url: {err}")))
}

/// `Url::join` drops the last path segment unless the base ends with `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
