//! Static name to address overrides.
//!
//! Built once from configuration and read-only afterwards. An override hit
//! is answered authoritatively and never touches the cache.

use std::net::{IpAddr, Ipv4Addr};

use rustc_hash::FxHashMap;

use crate::dns::{TYPE_A, normalize_name};
use crate::error::ConfigError;

/// Exact-match table of overridden domains.
#[derive(Debug, Default)]
pub struct OverrideTable {
    records: FxHashMap<String, Ipv4Addr>,
}

impl OverrideTable {
    /// Build the table from `(domain, address)` pairs.
    ///
    /// Every address must parse as an IPv4 address; anything else is a
    /// configuration error.
    pub fn from_entries<I, K, V>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut records = FxHashMap::default();

        for (domain, value) in entries {
            let (domain, value) = (domain.as_ref(), value.as_ref());
            let addr = match value.trim().parse::<IpAddr>() {
                Ok(IpAddr::V4(addr)) => addr,
                Ok(IpAddr::V6(addr)) => {
                    return Err(ConfigError::Ipv6Override {
                        domain: domain.to_string(),
                        addr,
                    });
                }
                Err(_) => {
                    return Err(ConfigError::InvalidOverride {
                        domain: domain.to_string(),
                        value: value.to_string(),
                    });
                }
            };
            records.insert(normalize_name(domain).into_owned(), addr);
        }

        Ok(Self { records })
    }

    /// Look up an override. Only A queries are answered.
    pub fn lookup(&self, domain: &str, qtype: u16) -> Option<Ipv4Addr> {
        if qtype != TYPE_A {
            return None;
        }
        self.records.get(&*normalize_name(domain)).copied()
    }

    /// Returns the number of overridden domains.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
