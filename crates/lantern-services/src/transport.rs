//! Transport seam between the discovery core and whatever carries datagrams.
//!
//! The core needs exactly two capabilities: fire a payload at a peer and
//! pop one pending inbound payload. Delivery is unreliable by design, so
//! `send` reports nothing; adapters log link failures themselves.

use std::collections::VecDeque;

/// Abstract datagram carrier. `peer_id` is opaque to the core — a MAC-style
/// node id, a socket address, or a broadcast alias, the adapter decides.
pub trait Transport {
    /// Hand a payload to the link. Best effort, never blocks meaningfully.
    fn send(&mut self, peer_id: &str, payload: &[u8]);

    /// Pop one pending inbound payload, or `None` when nothing is waiting.
    /// Must never block.
    fn recv(&mut self) -> Option<(String, Vec<u8>)>;
}

/// Loopback transport: everything sent comes back out of `recv` in order,
/// tagged with the destination peer id. Used by tests and demos.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    queue: VecDeque<(String, Vec<u8>)>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a payload as if a peer had sent it.
    pub fn push_inbound(&mut self, peer_id: &str, payload: &[u8]) {
        self.queue.push_back((peer_id.to_string(), payload.to_vec()));
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, peer_id: &str, payload: &[u8]) {
        self.queue.push_back((peer_id.to_string(), payload.to_vec()));
    }

    fn recv(&mut self) -> Option<(String, Vec<u8>)> {
        self.queue.pop_front()
    }
}
