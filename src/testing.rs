//! Test doubles shared by the unit tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use crate::dns::{Message, Rcode, Record};
use crate::error::ForwardError;
use crate::forwarder::Exchange;

/// Scripted behaviour of one upstream address.
#[derive(Debug, Clone)]
pub enum Upstream {
    /// Reply NOERROR with these answers.
    Answer(Vec<Record>),
    /// Reply with an empty answer section and this code.
    Rcode(Rcode),
    /// Never reply.
    Timeout,
}

/// In-memory `Exchange` that records every attempted upstream.
#[derive(Debug, Default)]
pub struct ScriptedExchange {
    script: HashMap<SocketAddr, Upstream>,
    calls: Mutex<Vec<SocketAddr>>,
}

impl ScriptedExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, upstream: SocketAddr, behaviour: Upstream) -> Self {
        self.script.insert(upstream, behaviour);
        self
    }

    pub fn calls(&self) -> Vec<SocketAddr> {
        self.calls.lock().unwrap().clone()
    }
}

impl Exchange<Message> for ScriptedExchange {
    async fn exchange(&self, query: &Message, upstream: SocketAddr) -> Result<Message, ForwardError> {
        self.calls.lock().unwrap().push(upstream);

        match self.script.get(&upstream) {
            Some(Upstream::Answer(answers)) => {
                Ok(Message::reply(query, Rcode::NO_ERROR, answers.clone()))
            }
            Some(Upstream::Rcode(rcode)) => Ok(Message::reply(query, *rcode, Vec::new())),
            Some(Upstream::Timeout) | None => Err(ForwardError::Timeout {
                upstream,
                after: Duration::from_secs(2),
            }),
        }
    }
}
