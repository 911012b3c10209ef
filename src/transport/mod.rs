//! Transport layer for the resolver.
//!
//! Receives DNS queries from clients, hands them to the resolver and sends
//! back whatever reply it produces.

pub mod udp;

use std::future::Future;
use std::io;

/// Maximum size of a DNS packet (with some headroom).
pub const MAX_DNS_PACKET_SIZE: usize = 4096;

/// Where the reply to one query is delivered.
pub trait ReplySink<M>: Send {
    fn send(&mut self, reply: &M) -> impl Future<Output = io::Result<()>> + Send;
}
