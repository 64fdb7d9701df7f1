use serde::Deserialize;
use std::time::Duration;

/// Browser identity sent with every request
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const DEFAULT_TITLE_SELECTORS: &[&str] = &["h1", "#info h1", ".book-title"];

const DEFAULT_CATALOG_SELECTORS: &[&str] = &[
    "#list",
    "#chapterlist",
    ".listmain",
    ".chapter-list",
    "div.box_con dl",
];

const DEFAULT_CONTENT_SELECTORS: &[&str] = &[
    "#content",
    "#chaptercontent",
    ".content",
    ".read-content",
    "div.txtnav",
];

/// Main configuration structure for Novel-Ripple
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(rename = "profile", default)]
    pub profiles: Vec<SelectorProfile>,
}

impl Config {
    /// Returns the selector profile for a catalog host
    ///
    /// The first profile listing `host` wins; otherwise the built-in profile
    /// is used.
    pub fn profile_for(&self, host: &str) -> SelectorProfile {
        let host = host.to_lowercase();
        self.profiles
            .iter()
            .find(|p| p.hosts.iter().any(|h| h.eq_ignore_ascii_case(&host)))
            .cloned()
            .unwrap_or_else(SelectorProfile::builtin)
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Width of the chapter worker pool
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Per-request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Extra attempts for a chapter whose fetch failed transiently
    #[serde(rename = "max-retries", default)]
    pub max_retries: u32,

    /// Delay between chapter retry attempts (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            request_timeout_secs: default_timeout_secs(),
            max_retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Outbound identity configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Full User-Agent header value
    #[serde(default = "default_user_agent")]
    pub value: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            value: default_user_agent(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Per-site selector profile
///
/// Selector lists are probed in order; the first one matching a usable
/// container wins. Omitted lists fall back to the built-in defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorProfile {
    pub name: String,

    /// Catalog hosts this profile applies to
    #[serde(default)]
    pub hosts: Vec<String>,

    #[serde(default = "default_title_selectors")]
    pub title: Vec<String>,

    #[serde(default = "default_catalog_selectors")]
    pub catalog: Vec<String>,

    #[serde(default = "default_content_selectors")]
    pub content: Vec<String>,

    /// Extra boilerplate regex patterns, applied after the built-in list
    #[serde(default)]
    pub boilerplate: Vec<String>,
}

impl SelectorProfile {
    /// The profile used when no configured profile matches the host
    pub fn builtin() -> Self {
        Self {
            name: "default".to_string(),
            hosts: Vec::new(),
            title: default_title_selectors(),
            catalog: default_catalog_selectors(),
            content: default_content_selectors(),
            boilerplate: Vec::new(),
        }
    }
}

fn default_workers() -> usize {
    12
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_database_path() -> String {
    "./novels.db".to_string()
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_title_selectors() -> Vec<String> {
    to_strings(DEFAULT_TITLE_SELECTORS)
}

fn default_catalog_selectors() -> Vec<String> {
    to_strings(DEFAULT_CATALOG_SELECTORS)
}

fn default_content_selectors() -> Vec<String> {
    to_strings(DEFAULT_CONTENT_SELECTORS)
}
