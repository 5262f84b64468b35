use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub scraper: ScraperConfig,
    pub llm: LlmConfig,
    pub storage: StorageConfig,
    pub queue: QueueConfig,
    pub discovery: DiscoveryConfigSection,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres connection string (Supabase's underlying database).
    pub url: String,
    pub batch_size: u32,
    pub max_retries: u32,
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub retry_delay_secs: u64,
}

/// Credentials and endpoints for the third-party Instagram scraping APIs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub api_key: String,
    pub api_host: String,
    pub similar_profiles_host: String,
    pub secondary_host: String,
    pub alt_host_20251: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub openai_api_key: String,
}

/// Supabase relational + object store, and the dual-write shadow flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub supabase_url: String,
    pub supabase_service_role_key: String,
    pub use_supabase: bool,
    pub keep_local_csv: bool,
    pub upload_images_to_supabase: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub max_concurrent_high: usize,
    pub max_concurrent_low: usize,
    /// Items PROCESSING longer than this are re-eligible for claim.
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub stuck_threshold_secs: u64,
}

/// C9 network discoverer bounds (spec §4.9); converted into
/// `discovery::DiscoveryConfig` at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfigSection {
    pub max_rounds: u32,
    pub max_accounts_to_queue: usize,
    pub profiles_per_round: usize,
    pub follower_floor: Option<i64>,
    pub default_seed_username: String,
}

impl Default for DiscoveryConfigSection {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            max_accounts_to_queue: 100,
            profiles_per_round: 10,
            follower_floor: None,
            default_seed_username: "instagram".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

/// Command line arguments for configuration overrides.
#[derive(Parser, Debug, Clone)]
#[command(name = "viralspot")]
#[command(version, about = "Viral-Spot - Instagram analytics pipeline")]
pub struct CommandLineArgs {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Server host (overrides config file)
    #[arg(long, value_name = "HOST")]
    pub server_host: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Postgres connection string (overrides config file)
    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,

    /// Logging level (overrides config file, e.g. "info,viralspot=debug")
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Max concurrent HIGH-priority workers (overrides config file)
    #[arg(long, value_name = "N")]
    pub max_concurrent_high: Option<usize>,

    /// Max concurrent LOW-priority workers (overrides config file)
    #[arg(long, value_name = "N")]
    pub max_concurrent_low: Option<usize>,
}

impl Config {
    /// Load configuration with command line, environment variable, and file support.
    ///
    /// Loading order (priority from highest to lowest):
    /// 1. Command line arguments
    /// 2. Environment variables
    /// 3. Configuration file (config.toml)
    /// 4. Default values
    pub fn load() -> Result<Self, anyhow::Error> {
        let cli_args = CommandLineArgs::parse();

        let config_path = cli_args.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(config_path) = config_path {
            Self::from_toml(&config_path)?
        } else {
            tracing::warn!("Configuration file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(&cli_args);
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Recognised variables (spec §6): `RAPIDAPI_KEY`/`INSTAGRAM_SCRAPER_API_KEY`,
    /// `INSTAGRAM_SCRAPER_API_HOST`, `SIMILAR_PROFILES_API_HOST`,
    /// `INSTAGRAM_SCRAPER_SECONDARY_HOST`, `RAPIDAPI_ALT_HOST_20251`,
    /// `OPENAI_API_KEY`, `SUPABASE_URL`, `SUPABASE_SERVICE_ROLE_KEY`,
    /// `DATABASE_URL`, `USE_SUPABASE`, `KEEP_LOCAL_CSV`,
    /// `UPLOAD_IMAGES_TO_SUPABASE`, `DB_BATCH_SIZE`, `DB_MAX_RETRIES`,
    /// `DB_RETRY_DELAY`, `MAX_CONCURRENT_LOW_PRIORITY`,
    /// `MAX_CONCURRENT_HIGH_PRIORITY`, `APP_SERVER_HOST`, `APP_SERVER_PORT`,
    /// `APP_LOG_LEVEL`.
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("APP_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("APP_SERVER_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(size) = std::env::var("DB_BATCH_SIZE")
            && let Ok(size) = size.parse()
        {
            self.database.batch_size = size;
        }
        if let Ok(retries) = std::env::var("DB_MAX_RETRIES")
            && let Ok(retries) = retries.parse()
        {
            self.database.max_retries = retries;
        }
        if let Ok(delay) = std::env::var("DB_RETRY_DELAY") {
            match parse_duration_to_secs(&delay) {
                Ok(val) => self.database.retry_delay_secs = val,
                Err(e) => {
                    tracing::warn!("invalid DB_RETRY_DELAY '{}': {} (keeping previous)", delay, e)
                },
            }
        }

        if let Ok(key) = std::env::var("RAPIDAPI_KEY").or_else(|_| std::env::var("INSTAGRAM_SCRAPER_API_KEY")) {
            self.scraper.api_key = key;
        }
        if let Ok(host) = std::env::var("INSTAGRAM_SCRAPER_API_HOST") {
            self.scraper.api_host = host;
        }
        if let Ok(host) = std::env::var("SIMILAR_PROFILES_API_HOST") {
            self.scraper.similar_profiles_host = host;
        }
        if let Ok(host) = std::env::var("INSTAGRAM_SCRAPER_SECONDARY_HOST") {
            self.scraper.secondary_host = host;
        }
        if let Ok(host) = std::env::var("RAPIDAPI_ALT_HOST_20251") {
            self.scraper.alt_host_20251 = host;
        }

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.llm.openai_api_key = key;
        }

        if let Ok(url) = std::env::var("SUPABASE_URL") {
            self.storage.supabase_url = url;
        }
        if let Ok(key) = std::env::var("SUPABASE_SERVICE_ROLE_KEY") {
            self.storage.supabase_service_role_key = key;
        }
        if let Ok(flag) = std::env::var("USE_SUPABASE")
            && let Ok(flag) = flag.parse()
        {
            self.storage.use_supabase = flag;
        }
        if let Ok(flag) = std::env::var("KEEP_LOCAL_CSV")
            && let Ok(flag) = flag.parse()
        {
            self.storage.keep_local_csv = flag;
        }
        if let Ok(flag) = std::env::var("UPLOAD_IMAGES_TO_SUPABASE")
            && let Ok(flag) = flag.parse()
        {
            self.storage.upload_images_to_supabase = flag;
        }

        if let Ok(n) = std::env::var("MAX_CONCURRENT_HIGH_PRIORITY")
            && let Ok(n) = n.parse()
        {
            self.queue.max_concurrent_high = n;
        }
        if let Ok(n) = std::env::var("MAX_CONCURRENT_LOW_PRIORITY")
            && let Ok(n) = n.parse()
        {
            self.queue.max_concurrent_low = n;
        }

        if let Ok(level) = std::env::var("APP_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Apply command line argument overrides (highest priority).
    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(host) = &args.server_host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.server_port {
            self.server.port = port;
        }
        if let Some(url) = &args.database_url {
            self.database.url = url.clone();
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if let Some(n) = args.max_concurrent_high {
            self.queue.max_concurrent_high = n;
        }
        if let Some(n) = args.max_concurrent_low {
            self.queue.max_concurrent_low = n;
        }
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.server.port == 0 {
            anyhow::bail!("server.port cannot be 0");
        }
        if self.database.url.is_empty() {
            anyhow::bail!("database.url cannot be empty");
        }
        if self.queue.max_concurrent_high == 0 || self.queue.max_concurrent_low == 0 {
            anyhow::bail!("queue concurrency caps must be > 0");
        }
        if self.storage.supabase_url.is_empty() && self.storage.use_supabase {
            tracing::warn!("use_supabase is true but storage.supabase_url is empty");
        }
        Ok(())
    }

    fn find_config_file() -> Option<String> {
        let possible_paths = ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];
        possible_paths.iter().find(|path| Path::new(path).exists()).map(|p| p.to_string())
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080 }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/viralspot".to_string(),
            batch_size: 100,
            max_retries: 3,
            retry_delay_secs: 1,
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_host: String::new(),
            similar_profiles_host: String::new(),
            secondary_host: String::new(),
            alt_host_20251: String::new(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self { openai_api_key: String::new() }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_service_role_key: String::new(),
            use_supabase: true,
            keep_local_csv: false,
            upload_images_to_supabase: true,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { max_concurrent_high: 3, max_concurrent_low: 2, stuck_threshold_secs: 60 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info,viralspot=debug".to_string(), file: Some("logs/viralspot.log".to_string()) }
    }
}

fn parse_duration_to_secs(input: &str) -> Result<u64, String> {
    if let Ok(val) = input.parse::<u64>() {
        return Ok(val);
    }
    let s = input.trim().to_lowercase();
    let (num_str, unit) = s.split_at(s.chars().take_while(|c| c.is_ascii_digit()).count());
    if num_str.is_empty() || unit.is_empty() {
        return Err("missing number or unit".into());
    }
    let n: u64 = num_str.parse().map_err(|_| "invalid number".to_string())?;
    match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => Ok(n),
        "m" | "min" | "mins" | "minute" | "minutes" => Ok(n * 60),
        "h" | "hr" | "hour" | "hours" => Ok(n * 60 * 60),
        "d" | "day" | "days" => Ok(n * 60 * 60 * 24),
        _ => Err(format!("unsupported unit: {}", unit)),
    }
}

fn deserialize_duration_secs<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct Visitor;
    impl<'de> serde::de::Visitor<'de> for Visitor {
        type Value = u64;
        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "a number of seconds or a string like '30s', '5m', '1h'")
        }
        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v)
        }
        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            if v >= 0 { Ok(v as u64) } else { Err(E::custom("negative not allowed")) }
        }
        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_duration_to_secs(v).map_err(E::custom)
        }
        fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_duration_to_secs(&v).map_err(E::custom)
        }
    }
    deserializer.deserialize_any(Visitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_human_durations() {
        assert_eq!(parse_duration_to_secs("30s").unwrap(), 30);
        assert_eq!(parse_duration_to_secs("5m").unwrap(), 300);
        assert_eq!(parse_duration_to_secs("1h").unwrap(), 3600);
        assert_eq!(parse_duration_to_secs("7").unwrap(), 7);
    }
}
