use crate::query::QueryOptions;
use crate::query_cache::RetryPolicy;
use crate::theme::Theme;
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_GRAPHQL_URL: &str = "http://localhost:8081/graphql";

/// ProtoScope - terminal block explorer for a GraphQL sequencer
///
/// Configuration priority: CLI args > Environment variables > Config file > Defaults
#[derive(Parser, Debug, Default)]
#[command(name = "protoscope")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Terminal block explorer for a GraphQL sequencer", long_about = None)]
pub struct CliArgs {
    /// GraphQL endpoint URL
    #[arg(long, env = "GRAPHQL_URL")]
    pub graphql_url: Option<String>,

    /// Optional TOML config file
    #[arg(long, env = "PROTOSCOPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// List polling interval in milliseconds (500-60000)
    #[arg(long, env = "POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,

    /// Age at which cached results are re-fetched (0-600000)
    #[arg(long, env = "STALE_TIME_MS")]
    pub stale_time_ms: Option<u64>,

    /// Staleness for search results (0-600000)
    #[arg(long, env = "SEARCH_STALE_TIME_MS")]
    pub search_stale_time_ms: Option<u64>,

    /// GraphQL request timeout in milliseconds (1000-60000)
    #[arg(long, env = "REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: Option<u64>,

    /// Retry attempts for failed requests (0-10)
    #[arg(long, env = "RETRIES")]
    pub retries: Option<u32>,

    /// Base delay between retries in milliseconds (0-30000)
    #[arg(long, env = "RETRY_DELAY_MS")]
    pub retry_delay_ms: Option<u64>,

    /// Keep polling lists that are not on screen
    #[arg(long, env = "BACKGROUND_POLLING", num_args = 0..=1, default_missing_value = "true")]
    pub background_polling: Option<bool>,

    /// Target UI rendering FPS (1-120)
    #[arg(long, env = "RENDER_FPS")]
    pub render_fps: Option<u32>,

    /// Color theme: nord, dos-blue, amber-crt
    #[arg(long, env = "THEME")]
    pub theme: Option<String>,

    /// Log file (the terminal belongs to the UI)
    #[arg(long, env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

/// Shape of the optional TOML config file. Every key is optional.
#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub graphql_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub stale_time_ms: Option<u64>,
    pub search_stale_time_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub background_polling: Option<bool>,
    pub render_fps: Option<u32>,
    pub theme: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid config file")
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub graphql_url: String,
    pub poll_interval_ms: u64,
    pub stale_time_ms: u64,
    pub search_stale_time_ms: u64,
    pub request_timeout_ms: u64,
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub background_polling: bool,
    pub render_fps: u32,
    pub theme: Theme,
    pub log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
            poll_interval_ms: 5000,
            stale_time_ms: 5000,
            search_stale_time_ms: 10_000,
            request_timeout_ms: 8000,
            retries: 3,
            retry_delay_ms: 1000,
            background_polling: false,
            render_fps: 30,
            theme: Theme::Nord,
            log_file: PathBuf::from("./protoscope.log"),
        }
    }
}

/// Validate that a value is within a given range (inclusive)
fn validate_in_range<T>(val: T, min: T, max: T, name: &str) -> Result<T>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if val < min || val > max {
        Err(anyhow!("{name} must be in range [{min}, {max}], got {val}"))
    } else {
        Ok(val)
    }
}

/// Basic scheme check; the endpoint is always plain HTTP(S).
fn validate_url(url: &str, name: &str) -> Result<()> {
    if url.is_empty() {
        return Err(anyhow!("{name} cannot be empty"));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow!("{name} must start with http:// or https://"))
    }
}

/// Load configuration from CLI args, environment and the optional config file.
pub fn load() -> Result<Config> {
    let args = CliArgs::parse();
    let file = match &args.config {
        Some(path) => FileConfig::read(path)?,
        None => FileConfig::default(),
    };
    Config::resolve(args, file)
}

impl Config {
    /// Merge parsed args (CLI and env already folded by clap) over the file
    /// layer, then defaults, and validate.
    pub fn resolve(args: CliArgs, file: FileConfig) -> Result<Self> {
        let d = Config::default();

        let graphql_url = args
            .graphql_url
            .or(file.graphql_url)
            .unwrap_or(d.graphql_url);
        validate_url(&graphql_url, "GRAPHQL_URL")?;

        let poll_interval_ms = validate_in_range(
            args.poll_interval_ms
                .or(file.poll_interval_ms)
                .unwrap_or(d.poll_interval_ms),
            500,
            60_000,
            "POLL_INTERVAL_MS",
        )?;
        let stale_time_ms = validate_in_range(
            args.stale_time_ms
                .or(file.stale_time_ms)
                .unwrap_or(d.stale_time_ms),
            0,
            600_000,
            "STALE_TIME_MS",
        )?;
        let search_stale_time_ms = validate_in_range(
            args.search_stale_time_ms
                .or(file.search_stale_time_ms)
                .unwrap_or(d.search_stale_time_ms),
            0,
            600_000,
            "SEARCH_STALE_TIME_MS",
        )?;
        let request_timeout_ms = validate_in_range(
            args.request_timeout_ms
                .or(file.request_timeout_ms)
                .unwrap_or(d.request_timeout_ms),
            1000,
            60_000,
            "REQUEST_TIMEOUT_MS",
        )?;
        let retries = validate_in_range(
            args.retries.or(file.retries).unwrap_or(d.retries),
            0,
            10,
            "RETRIES",
        )?;
        let retry_delay_ms = validate_in_range(
            args.retry_delay_ms
                .or(file.retry_delay_ms)
                .unwrap_or(d.retry_delay_ms),
            0,
            30_000,
            "RETRY_DELAY_MS",
        )?;
        let render_fps = validate_in_range(
            args.render_fps.or(file.render_fps).unwrap_or(d.render_fps),
            1,
            120,
            "RENDER_FPS",
        )?;

        let theme = match args.theme.or(file.theme) {
            Some(name) => name.parse::<Theme>().map_err(|e| anyhow!(e))?,
            None => d.theme,
        };

        Ok(Config {
            graphql_url,
            poll_interval_ms,
            stale_time_ms,
            search_stale_time_ms,
            request_timeout_ms,
            retries,
            retry_delay_ms,
            background_polling: args
                .background_polling
                .or(file.background_polling)
                .unwrap_or(d.background_polling),
            render_fps,
            theme,
            log_file: args.log_file.or(file.log_file).unwrap_or(d.log_file),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retries,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    /// Options shared by every query: staleness, retries, background polling.
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions::default()
            .stale_time(Duration::from_millis(self.stale_time_ms))
            .retry(self.retry_policy())
            .refetch_in_background(self.background_polling)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn search_stale_time(&self) -> Duration {
        Duration::from_millis(self.search_stale_time_ms)
    }

    pub fn log_summary(&self) {
        log::info!("graphql endpoint: {}", self.graphql_url);
        log::info!(
            "poll {}ms, stale {}ms, search stale {}ms, timeout {}ms",
            self.poll_interval_ms,
            self.stale_time_ms,
            self.search_stale_time_ms,
            self.request_timeout_ms
        );
        log::info!(
            "retries {} (base delay {}ms), background polling {}",
            self.retries,
            self.retry_delay_ms,
            self.background_polling
        );
        log::info!("render fps {}, theme {}", self.render_fps, self.theme);
    }
}
