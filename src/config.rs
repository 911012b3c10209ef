//! Configuration loading and validation.
//!
//! The TOML file is deserialized into [`Config`], then [`Config::validate`]
//! turns it into the [`ResolverConfig`] the server runs with. Any problem
//! found there is fatal: the server never starts with a broken config.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::overrides::OverrideTable;

const DNS_PORT: u16 = 53;

/// Configuration file contents.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: IpAddr,

    /// UDP port to listen on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Maximum number of cached responses.
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    /// TTL in seconds for override replies and for responses with no answers.
    #[serde(default = "default_ttl")]
    pub default_ttl: u32,

    /// Per-upstream exchange timeout in milliseconds.
    #[serde(default = "default_upstream_timeout_ms")]
    pub upstream_timeout_ms: u64,

    /// Upstream resolvers in fallback order ("ip" or "ip:port").
    #[serde(default)]
    pub upstreams: Vec<String>,

    /// Domain to IPv4 address overrides.
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,

    #[serde(default)]
    pub log: LogConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level filter (e.g., "info", "dnscache=debug,warn").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen_addr() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_listen_port() -> u16 {
    DNS_PORT
}

fn default_cache_size() -> usize {
    1024
}

fn default_ttl() -> u32 {
    300
}

fn default_upstream_timeout_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Validated settings the server runs with.
#[derive(Debug)]
pub struct ResolverConfig {
    pub listen_addr: SocketAddr,
    pub cache_capacity: NonZeroUsize,
    pub default_ttl: u32,
    pub upstream_timeout: Duration,
    pub upstreams: Vec<SocketAddr>,
    pub overrides: OverrideTable,
}

impl Config {
    /// Read and deserialize a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<ResolverConfig, ConfigError> {
        let cache_capacity = NonZeroUsize::new(self.cache_size).ok_or(ConfigError::ZeroCacheSize)?;

        if self.upstream_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        if self.upstreams.is_empty() {
            return Err(ConfigError::NoUpstreams);
        }
        let upstreams = self
            .upstreams
            .iter()
            .map(|s| parse_upstream(s))
            .collect::<Result<Vec<_>, _>>()?;

        let overrides = OverrideTable::from_entries(&self.overrides)?;

        Ok(ResolverConfig {
            listen_addr: SocketAddr::new(self.listen_addr, self.listen_port),
            cache_capacity,
            default_ttl: self.default_ttl,
            upstream_timeout: Duration::from_millis(self.upstream_timeout_ms),
            upstreams,
            overrides,
        })
    }
}

/// Parse "ip:port", "[v6]:port" or a bare IP (port 53).
fn parse_upstream(s: &str) -> Result<SocketAddr, ConfigError> {
    let s = s.trim();
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Ok(addr);
    }
    s.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DNS_PORT))
        .map_err(|_| ConfigError::InvalidUpstream(s.to_string()))
}
