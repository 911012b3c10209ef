//! Error types for dnscache.

use std::net::{Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level errors surfaced by the server.
#[derive(Debug, Error)]
pub enum DnsError {
    /// IO error (socket bind, send, ...)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Startup configuration errors. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid IP {value:?} for override {domain:?}")]
    InvalidOverride { domain: String, value: String },

    #[error("override {domain:?} maps to IPv6 address {addr}, only IPv4 is supported")]
    Ipv6Override { domain: String, addr: Ipv6Addr },

    #[error("invalid upstream address {0:?}")]
    InvalidUpstream(String),

    #[error("no upstream resolvers configured")]
    NoUpstreams,

    #[error("cache_size must be greater than zero")]
    ZeroCacheSize,

    #[error("upstream_timeout_ms must be greater than zero")]
    ZeroTimeout,
}

/// Wire format decoding errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("message truncated")]
    Truncated,

    #[error("invalid label")]
    InvalidLabel,

    #[error("compression pointer loop")]
    PointerLoop,

    #[error("name exceeds 255 octets")]
    NameTooLong,
}

/// Failure to obtain an upstream response.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("upstream IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("upstream {upstream} timed out after {after:?}")]
    Timeout { upstream: SocketAddr, after: Duration },

    #[error("malformed reply from {upstream}: {source}")]
    Malformed {
        upstream: SocketAddr,
        #[source]
        source: ParseError,
    },

    #[error("all {attempted} upstreams failed")]
    Exhausted { attempted: usize },
}
