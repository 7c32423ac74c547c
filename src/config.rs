//! Configuration for boothscan.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (BOOTHSCAN_HOME, EXTRACTION_API_KEY, MAIL_API_KEY)
//! 2. Config file (.boothscan/config.yaml)
//! 3. Defaults (~/.boothscan, localhost server, public extraction endpoint)
//!
//! Config file discovery:
//! - Searches current directory and parents for .boothscan/config.yaml
//! - Relative paths in the config file resolve against the project root

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<std::result::Result<ResolvedConfig, String>> = OnceLock::new();

const DEFAULT_EXTRACTION_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5000";
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub extraction: Option<ExtractionConfig>,
    #[serde(default)]
    pub mail: Option<MailConfig>,
    #[serde(default)]
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractionConfig {
    pub endpoint: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MailConfig {
    pub relay_url: Option<String>,
    pub from_address: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: Option<String>,
    /// Data directory (relative to config file)
    pub data_dir: Option<String>,
}

/// Resolved configuration with absolute paths and parsed values
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to the boothscan home (state directory)
    pub home: PathBuf,
    /// Extraction service endpoint (generateContent-style)
    pub extraction_endpoint: String,
    /// API key for the extraction service (EXTRACTION_API_KEY)
    pub extraction_api_key: String,
    /// Bounded timeout for extraction calls
    pub extraction_timeout: Duration,
    /// Mail relay endpoint
    pub mail_relay_url: String,
    /// API key for the mail relay (MAIL_API_KEY)
    pub mail_api_key: String,
    /// From address for outbound mail
    pub mail_from: String,
    /// Bounded timeout for mail dispatch
    pub mail_timeout: Duration,
    /// Server listen address
    pub listen_addr: SocketAddr,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Path to the visitor store database
    pub fn store_path(&self) -> PathBuf {
        self.home.join("visitors.db")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".boothscan").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".boothscan");

    let config_file = find_config_file();
    let file = match &config_file {
        Some(path) => Some(load_config_file(path)?),
        None => None,
    };

    let extraction = file.as_ref().and_then(|f| f.extraction.clone());
    let mail = file.as_ref().and_then(|f| f.mail.clone());
    let server = file.as_ref().and_then(|f| f.server.clone());

    // Home: env > config file data_dir > ~/.boothscan
    let home = if let Ok(env_home) = std::env::var("BOOTHSCAN_HOME") {
        PathBuf::from(env_home)
    } else if let (Some(config_path), Some(data_dir)) = (
        &config_file,
        server.as_ref().and_then(|s| s.data_dir.as_deref()),
    ) {
        let base_dir = config_path
            .parent() // .boothscan/
            .and_then(|p| p.parent()) // project root
            .unwrap_or(Path::new("."));
        resolve_path(base_dir, data_dir)
    } else {
        default_home
    };

    let listen_addr_raw = server
        .as_ref()
        .and_then(|s| s.listen_addr.clone())
        .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
    let listen_addr: SocketAddr = listen_addr_raw
        .parse()
        .with_context(|| format!("Invalid listen address: {}", listen_addr_raw))?;

    let extraction_timeout = Duration::from_secs(
        extraction
            .as_ref()
            .and_then(|e| e.timeout_seconds)
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
    );
    let mail_timeout = Duration::from_secs(
        mail.as_ref()
            .and_then(|m| m.timeout_seconds)
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
    );

    Ok(ResolvedConfig {
        home,
        extraction_endpoint: extraction
            .as_ref()
            .and_then(|e| e.endpoint.clone())
            .unwrap_or_else(|| DEFAULT_EXTRACTION_ENDPOINT.to_string()),
        extraction_api_key: std::env::var("EXTRACTION_API_KEY").unwrap_or_default(),
        extraction_timeout,
        mail_relay_url: mail
            .as_ref()
            .and_then(|m| m.relay_url.clone())
            .unwrap_or_default(),
        mail_api_key: std::env::var("MAIL_API_KEY").unwrap_or_default(),
        mail_from: mail
            .as_ref()
            .and_then(|m| m.from_address.clone())
            .unwrap_or_else(|| "Universal Card Reader <noreply@boothscan.local>".to_string()),
        mail_timeout,
        listen_addr,
        config_file,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
