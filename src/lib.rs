//! dnscache - A caching DNS forwarding resolver.
//!
//! Queries are answered from a static override table, then from a bounded
//! TTL/LRU cache, and otherwise forwarded to an ordered list of upstream
//! resolvers whose replies are cached for their shortest record TTL.

pub mod cache;
pub mod config;
pub mod dns;
pub mod error;
pub mod forwarder;
pub mod message;
pub mod overrides;
pub mod resolver;
pub mod server;
pub mod stats;
pub mod telemetry;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::{Config, ResolverConfig};
pub use error::{ConfigError, DnsError, ForwardError, ParseError};
pub use message::DnsMessage;
pub use resolver::{Resolution, Resolver};
pub use server::{DnsServer, RunningServer};
