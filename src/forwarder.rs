//! Upstream forwarding with ordered fallback.
//!
//! Upstreams are tried one at a time in configured order. Any reply that
//! arrives counts as an answer, including NXDOMAIN or SERVFAIL; only a
//! transport failure (timeout, socket error, unreadable reply) moves on to
//! the next upstream.

use std::future::Future;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, trace, warn};

use crate::dns::Message;
use crate::error::ForwardError;
use crate::transport::MAX_DNS_PACKET_SIZE;

/// A single query/response transaction against one upstream.
pub trait Exchange<M>: Send + Sync {
    fn exchange(
        &self,
        query: &M,
        upstream: SocketAddr,
    ) -> impl Future<Output = Result<M, ForwardError>> + Send;
}

/// Plain DNS over UDP, one fresh socket per attempt.
#[derive(Debug, Clone)]
pub struct UdpExchange {
    timeout: Duration,
}

impl UdpExchange {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Exchange<Message> for UdpExchange {
    async fn exchange(&self, query: &Message, upstream: SocketAddr) -> Result<Message, ForwardError> {
        let local: SocketAddr = if upstream.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(upstream).await?;
        socket.send(query.as_bytes()).await?;

        let deadline = Instant::now() + self.timeout;
        let mut buf = [0u8; MAX_DNS_PACKET_SIZE];

        loop {
            let len = timeout_at(deadline, socket.recv(&mut buf))
                .await
                .map_err(|_| ForwardError::Timeout {
                    upstream,
                    after: self.timeout,
                })??;

            let response = Message::parse(&buf[..len])
                .map_err(|source| ForwardError::Malformed { upstream, source })?;

            // Late replies to someone else's query share nothing with ours
            if response.id() != query.id() {
                trace!(%upstream, id = response.id(), "ignoring reply with foreign id");
                continue;
            }
            return Ok(response);
        }
    }
}

/// Sends queries to an ordered list of upstream resolvers.
pub struct Forwarder<E> {
    upstreams: Vec<SocketAddr>,
    exchange: E,
}

impl<E> Forwarder<E> {
    pub fn new(upstreams: Vec<SocketAddr>, exchange: E) -> Self {
        Self {
            upstreams,
            exchange,
        }
    }

    pub fn upstreams(&self) -> &[SocketAddr] {
        &self.upstreams
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    /// Return the first reply obtained, trying upstreams in order.
    pub async fn forward<M>(&self, query: &M) -> Result<M, ForwardError>
    where
        E: Exchange<M>,
    {
        for &upstream in &self.upstreams {
            match self.exchange.exchange(query, upstream).await {
                Ok(response) => {
                    debug!(%upstream, "upstream answered");
                    return Ok(response);
                }
                Err(e) => {
                    warn!(%upstream, error = %e, "upstream exchange failed");
                }
            }
        }

        Err(ForwardError::Exhausted {
            attempted: self.upstreams.len(),
        })
    }
}
