//! The message capabilities the resolver pipeline relies on.

use std::net::Ipv4Addr;

use crate::dns::Message;

/// Operations the pipeline needs from a DNS message type.
///
/// The resolver, cache and forwarder are generic over this trait so they do
/// not depend on one wire format library.
pub trait DnsMessage: Clone + Send + Sync + 'static {
    fn id(&self) -> u16;

    fn set_id(&mut self, id: u16);

    /// Name and record type of the first question, if any.
    fn question(&self) -> Option<(&str, u16)>;

    /// Minimum TTL of the answer section, `None` when it is empty.
    fn min_answer_ttl(&self) -> Option<u32>;

    /// A SERVFAIL reply matched to `query`'s ID and question.
    fn server_failure(query: &Self) -> Self;

    /// An authoritative reply answering `query` with a single A record.
    fn authoritative_a(query: &Self, addr: Ipv4Addr, ttl: u32) -> Self;
}

impl DnsMessage for Message {
    fn id(&self) -> u16 {
        Message::id(self)
    }

    fn set_id(&mut self, id: u16) {
        Message::set_id(self, id)
    }

    fn question(&self) -> Option<(&str, u16)> {
        self.questions()
            .first()
            .map(|q| (q.domain.as_str(), q.qtype))
    }

    fn min_answer_ttl(&self) -> Option<u32> {
        Message::min_answer_ttl(self)
    }

    fn server_failure(query: &Self) -> Self {
        Message::server_failure(query)
    }

    fn authoritative_a(query: &Self, addr: Ipv4Addr, ttl: u32) -> Self {
        Message::authoritative_a(query, addr, ttl)
    }
}
