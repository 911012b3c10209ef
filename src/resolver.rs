//! DNS query resolution pipeline.
//!
//! Every query runs the same steps and ends in exactly one of them:
//! 1. Drop it if it carries no question
//! 2. Answer authoritatively from the override table (A queries only)
//! 3. Answer from the cache, stamped with the query's transaction ID
//! 4. Forward upstream; cache the reply for the minimum answer TTL, or
//!    reply SERVFAIL when no upstream answered
//!
//! Transports handle the I/O, the resolver handles decisions.

use std::io;
use std::time::Instant;

use tracing::{debug, warn};

use crate::cache::{CacheKey, DnsCache};
use crate::forwarder::{Exchange, Forwarder};
use crate::message::DnsMessage;
use crate::overrides::OverrideTable;
use crate::stats::{Outcome, Stats, StatsSnapshot};
use crate::transport::ReplySink;

/// The reply produced for a query, tagged with how it was obtained.
#[derive(Debug, Clone)]
pub enum Resolution<M> {
    /// Synthesized from the override table.
    Overridden(M),
    /// Served from the cache.
    Cached(M),
    /// Relayed from an upstream and written to the cache.
    Forwarded(M),
    /// Every upstream failed; SERVFAIL.
    Failed(M),
}

impl<M> Resolution<M> {
    pub fn outcome(&self) -> Outcome {
        match self {
            Resolution::Overridden(_) => Outcome::Overridden,
            Resolution::Cached(_) => Outcome::Cached,
            Resolution::Forwarded(_) => Outcome::Forwarded,
            Resolution::Failed(_) => Outcome::Failed,
        }
    }

    pub fn message(&self) -> &M {
        match self {
            Resolution::Overridden(m)
            | Resolution::Cached(m)
            | Resolution::Forwarded(m)
            | Resolution::Failed(m) => m,
        }
    }

    pub fn into_message(self) -> M {
        match self {
            Resolution::Overridden(m)
            | Resolution::Cached(m)
            | Resolution::Forwarded(m)
            | Resolution::Failed(m) => m,
        }
    }
}

/// Resolver owns the override table, the cache and the forwarder.
///
/// Only the cache is mutable; it synchronizes internally, so a resolver can
/// be shared across concurrently running handlers.
pub struct Resolver<M, E> {
    overrides: OverrideTable,
    cache: DnsCache<M>,
    forwarder: Forwarder<E>,
    default_ttl: u32,
    stats: Stats,
}

impl<M, E> Resolver<M, E>
where
    M: DnsMessage,
    E: Exchange<M>,
{
    /// `default_ttl` is used for override replies and for responses with
    /// an empty answer section.
    pub fn new(
        overrides: OverrideTable,
        cache: DnsCache<M>,
        forwarder: Forwarder<E>,
        default_ttl: u32,
    ) -> Self {
        Self {
            overrides,
            cache,
            forwarder,
            default_ttl,
            stats: Stats::new(),
        }
    }

    /// Resolve a query. Returns `None` when the query has no question and
    /// must not be answered.
    pub async fn resolve(&self, query: &M) -> Option<Resolution<M>> {
        let (domain, qtype) = query.question()?;

        if let Some(addr) = self.overrides.lookup(domain, qtype) {
            return Some(Resolution::Overridden(M::authoritative_a(
                query,
                addr,
                self.default_ttl,
            )));
        }

        let key = CacheKey::new(domain, qtype);
        if let Some(entry) = self.cache.get(&key) {
            let mut response = entry.response;
            response.set_id(query.id());
            return Some(Resolution::Cached(response));
        }

        match self.forwarder.forward(query).await {
            Ok(response) => {
                let ttl = response.min_answer_ttl().unwrap_or(self.default_ttl);
                self.cache.put(key, response.clone(), ttl);
                Some(Resolution::Forwarded(response))
            }
            Err(e) => {
                warn!(domain, qtype, error = %e, "no upstream answered");
                Some(Resolution::Failed(M::server_failure(query)))
            }
        }
    }

    /// Handler entry point: resolve `query` and send at most one reply.
    pub async fn handle<S>(&self, query: M, sink: &mut S) -> io::Result<()>
    where
        S: ReplySink<M>,
    {
        let start = Instant::now();

        let Some(resolution) = self.resolve(&query).await else {
            self.stats.record(Outcome::Dropped, start.elapsed());
            debug!(id = query.id(), "dropping query without question");
            return Ok(());
        };

        let outcome = resolution.outcome();
        let result = sink.send(resolution.message()).await;
        let elapsed = start.elapsed();
        self.stats.record(outcome, elapsed);

        if let Some((domain, qtype)) = query.question() {
            debug!(
                domain,
                qtype,
                outcome = outcome.as_str(),
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                "resolved"
            );
        }
        result
    }

    pub fn cache(&self) -> &DnsCache<M> {
        &self.cache
    }

    pub fn forwarder(&self) -> &Forwarder<E> {
        &self.forwarder
    }

    pub fn overrides(&self) -> &OverrideTable {
        &self.overrides
    }

    pub fn stats_snapshot_and_reset(&self) -> StatsSnapshot {
        self.stats.snapshot_and_reset()
    }
}
