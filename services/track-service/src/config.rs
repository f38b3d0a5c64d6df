//!
//! src/config.rs
//!
//! Typed configuration for the service, populated once at startup
//! from the environment (and a .env file when present)
//!

use std::net::SocketAddr;
use std::time;
use url::Url;

use crate::ServiceError;

/// Constants for HTTP Config
pub const HTTP_TIMEOUT: u64 = 8000;
pub const HTTP_CONNECT_TIMEOUT: u64 = 2000;
pub const HTTP_POOL_MAX_IDLE: usize = 16;
pub const HTTP_POOL_IDLE_TIMEOUT: u64 = 90000;
pub const HTTP_MAX_REDIRECTS: u8 = 4;

pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1/";
pub const DEFAULT_DATABASE_URL: &str = "sqlite:./data/tracks.db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Wrapper over env::var to return an invalid enviroment var error
fn env_check(s: &str) -> Result<String, ServiceError> {
    match std::env::var(s) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ServiceError::Config(format!("{s} was not set"))),
    }
}

/// Ensures that url is https
fn ensure_https(url: &Url) -> Result<(), String> {
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(format!("URL must be https: {url}"))
    }
}

fn ensure_host(url: &Url, expected_host: &str) -> Result<(), String> {
    match url.host_str() {
        Some(h) if h.eq_ignore_ascii_case(expected_host) => Ok(()),
        Some(h) => Err(
            format!("Unexpected host for {url} (got {h}, expected {expected_host})")
        ),
        None => Err(format!("URL missing host: {url}"))
    }
}

// Url::join drops the last path segment unless the base ends in '/'
fn ensure_trailing_slash(url: &mut Url) {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_string();
        path.push('/');
        url.set_path(&path);
    }
}

fn parse_url(name: &str, raw: &str, expected_host: &str) -> Result<Url, ServiceError> {
    let url = Url::parse(raw)
        .map_err(|e| ServiceError::Config(format!("{name} invalid {e}")))?;
    ensure_https(&url).map_err(ServiceError::Config)?;
    ensure_host(&url, expected_host).map_err(ServiceError::Config)?;
    Ok(url)
}

/// Client credentials and endpoints for the Spotify catalog
#[derive(Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: Url,
    pub api_base: Url,
}

// keep the secret out of startup logs
impl std::fmt::Debug for SpotifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_url", &self.token_url.as_str())
            .field("api_base", &self.api_base.as_str())
            .finish()
    }
}

fn build_spotify() -> Result<SpotifyConfig, ServiceError> {
    let client_id     = env_check("SPOTIFY_CLIENT_ID")?;
    let client_secret = env_check("SPOTIFY_CLIENT_SECRET")?;

    let token_url = std::env::var("SPOTIFY_TOKEN_URL")
        .unwrap_or_else(|_| SPOTIFY_TOKEN_URL.to_string());
    let api_base  = std::env::var("SPOTIFY_API_BASE")
        .unwrap_or_else(|_| SPOTIFY_API_BASE.to_string());

    let token_url = parse_url("SPOTIFY_TOKEN_URL", &token_url, "accounts.spotify.com")?;
    let mut api_base = parse_url("SPOTIFY_API_BASE", &api_base, "api.spotify.com")?;
    ensure_trailing_slash(&mut api_base);

    Ok( SpotifyConfig { client_id, client_secret, token_url, api_base })
}

///
/// Configuration for outbound Http timeouts and pooling
///
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: time::Duration,
    pub connect_timeout: time::Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: time::Duration,
    pub max_redirects: u8,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: time::Duration::from_millis(HTTP_TIMEOUT),
            connect_timeout: time::Duration::from_millis(HTTP_CONNECT_TIMEOUT),
            pool_max_idle_per_host: HTTP_POOL_MAX_IDLE,
            pool_idle_timeout: time::Duration::from_millis(HTTP_POOL_IDLE_TIMEOUT),
            max_redirects: HTTP_MAX_REDIRECTS,
        }
    }
}

///
/// Configuration for the sqlite track store
///
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub db_url: String,
    pub max_connections: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            db_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 8,
        }
    }
}

fn build_persistence() -> PersistenceConfig {
    let mut cfg = PersistenceConfig::default();
    if let Ok(url) = env_check("DATABASE_URL") {
        cfg.db_url = url;
    }
    cfg
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

fn parse_bind_addr(raw: &str) -> Result<SocketAddr, ServiceError> {
    raw.trim()
        .parse::<SocketAddr>()
        .map_err(|e| ServiceError::Config(format!("BIND_ADDR invalid {e}")))
}

fn build_server() -> Result<ServerConfig, ServiceError> {
    let raw = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    Ok( ServerConfig { bind_addr: parse_bind_addr(&raw)? } )
}

///
/// Configuration for Logger
///

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<LogFormat> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "json"   => Some(LogFormat::Json),
            _ => None
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub include_file_line: bool,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_directives: "info,track_service=debug,sqlx=warn,reqwest=warn".to_string(),
            format: LogFormat::Json,
            with_ansi: true,
            include_file_line: true,
            include_target: true,
        }
    }
}

fn build_logging() -> Result<LoggingConfig, ServiceError> {
    let mut cfg = LoggingConfig::default();
    if let Ok(raw) = std::env::var("LOG_FORMAT") {
        cfg.format = LogFormat::parse(&raw).ok_or_else(|| ServiceError::Config(
            format!("LOG_FORMAT must be json or pretty, got {raw}")
        ))?;
    }
    Ok(cfg)
}

///
/// AppConfig which holds everything main needs to wire the service
///
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub spotify: SpotifyConfig,
    pub http: HttpConfig,
    pub persistence: PersistenceConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig
}

///
/// Return all environment variables to caller at program start.
///
pub fn load_config() -> Result<AppConfig, ServiceError> {
    dotenvy::dotenv().ok();

    let spotify     = build_spotify()?;
    let http        = HttpConfig::default();
    let persistence = build_persistence();
    let server      = build_server()?;
    let logging     = build_logging()?;

    Ok( AppConfig { spotify, http, persistence, server, logging } )
}
