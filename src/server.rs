//! Server orchestration.
//!
//! Builds the resolver from a validated config, binds the UDP transport and
//! runs until asked to stop.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::cache::DnsCache;
use crate::config::ResolverConfig;
use crate::dns::Message;
use crate::error::DnsError;
use crate::forwarder::{Forwarder, UdpExchange};
use crate::resolver::Resolver;
use crate::transport::udp::UdpTransport;

/// Interval between stats log lines.
const STATS_INTERVAL: Duration = Duration::from_secs(60);

pub type UdpResolver = Resolver<Message, UdpExchange>;

/// Caching forwarding DNS server.
pub struct DnsServer {
    listen_addr: SocketAddr,
    resolver: Arc<UdpResolver>,
}

impl DnsServer {
    pub fn new(config: ResolverConfig) -> Self {
        let forwarder = Forwarder::new(config.upstreams, UdpExchange::new(config.upstream_timeout));
        let resolver = Resolver::new(
            config.overrides,
            DnsCache::new(config.cache_capacity),
            forwarder,
            config.default_ttl,
        );

        Self {
            listen_addr: config.listen_addr,
            resolver: Arc::new(resolver),
        }
    }

    /// Bind the listener and start serving in the background.
    pub async fn start(self) -> io::Result<RunningServer> {
        let udp = UdpTransport::bind(self.listen_addr).await?;
        let local_addr = udp.local_addr()?;

        let upstreams: Vec<_> = self
            .resolver
            .forwarder()
            .upstreams()
            .iter()
            .map(|a| a.to_string())
            .collect();
        info!(
            addr = %local_addr,
            upstreams = %upstreams.join(", "),
            overrides = self.resolver.overrides().len(),
            cache_capacity = self.resolver.cache().capacity(),
            "DNS resolver listening"
        );

        let udp_handle = udp.start(self.resolver.clone());
        let stats_handle = tokio::spawn(stats_loop(self.resolver.clone()));

        Ok(RunningServer {
            local_addr,
            resolver: self.resolver,
            tasks: vec![udp_handle, stats_handle],
        })
    }

    /// Serve until `shutdown` completes.
    pub async fn run<F>(self, shutdown: F) -> Result<(), DnsError>
    where
        F: Future<Output = ()>,
    {
        let server = self.start().await?;
        shutdown.await;
        info!("DNS resolver shutdown requested");
        server.shutdown().await;
        Ok(())
    }
}

/// Handle to a server started with [`DnsServer::start`].
pub struct RunningServer {
    local_addr: SocketAddr,
    resolver: Arc<UdpResolver>,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn resolver(&self) -> &Arc<UdpResolver> {
        &self.resolver
    }

    /// Stop the receive and stats loops. In-flight queries finish on their
    /// own tasks.
    pub async fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        for task in self.tasks {
            let _ = task.await;
        }
        info!("DNS resolver stopped");
    }
}

/// Resolve once `signal` fires.
///
/// If the signal listener itself fails there is no way left to be asked to
/// stop, so the failure is logged and this never resolves; the server keeps
/// serving until the process is killed.
pub async fn wait_for_signal<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

/// Log stats every interval and reset the counters.
async fn stats_loop(resolver: Arc<UdpResolver>) {
    let mut interval = tokio::time::interval(STATS_INTERVAL);
    interval.tick().await; // Skip first immediate tick
    loop {
        interval.tick().await;
        let stats = resolver.stats_snapshot_and_reset();
        info!(
            cache = resolver.cache().len(),
            requests = stats.requests,
            overridden = stats.overridden,
            cached = stats.cached,
            forwarded = stats.forwarded,
            failed = stats.failed,
            dropped = stats.dropped,
            avg_response_ms = stats.avg_response_ms,
            "stats"
        );
    }
}
