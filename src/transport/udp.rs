//! UDP transport for DNS queries.
//!
//! Each datagram is parsed on the receive loop and then handled in its own
//! task, so a slow upstream never holds up other clients.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::dns::Message;
use crate::forwarder::Exchange;
use crate::resolver::Resolver;

use super::{MAX_DNS_PACKET_SIZE, ReplySink};

/// UDP listener feeding a resolver.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Bind the listening socket.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);

        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Start the receive loop.
    pub fn start<E>(self, resolver: Arc<Resolver<Message, E>>) -> JoinHandle<()>
    where
        E: Exchange<Message> + 'static,
    {
        tokio::spawn(run(self.socket, resolver))
    }
}

/// Reply path back to the client that sent a datagram.
pub struct UdpReply {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
}

impl UdpReply {
    pub fn new(socket: Arc<UdpSocket>, peer: SocketAddr) -> Self {
        Self { socket, peer }
    }
}

impl ReplySink<Message> for UdpReply {
    async fn send(&mut self, reply: &Message) -> io::Result<()> {
        self.socket.send_to(reply.as_bytes(), self.peer).await?;
        Ok(())
    }
}

async fn run<E>(socket: Arc<UdpSocket>, resolver: Arc<Resolver<Message, E>>)
where
    E: Exchange<Message> + 'static,
{
    let mut buf = [0u8; MAX_DNS_PACKET_SIZE];

    loop {
        let (len, src) = match socket.recv_from(&mut buf).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "UDP recv error");
                continue;
            }
        };

        let query = match Message::parse(&buf[..len]) {
            Ok(query) => query,
            Err(e) => {
                debug!(%src, error = %e, "dropping malformed datagram");
                continue;
            }
        };
        if query.is_response() {
            debug!(%src, "dropping unsolicited response");
            continue;
        }

        let mut reply = UdpReply::new(socket.clone(), src);
        let resolver = resolver.clone();
        tokio::spawn(async move {
            if let Err(e) = resolver.handle(query, &mut reply).await {
                warn!(%src, error = %e, "UDP response error");
            }
        });
    }
}
