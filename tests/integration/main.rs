//! Lantern integration tests.
//!
//! These exercise the discovery stack end to end through the library seam:
//! endpoints wired to in-memory transports, payloads carried between nodes
//! by the harness below. No radio, no sockets — the link adapter has its
//! own crate-level tests.

use lantern_core::codec::MessageCodec;
use lantern_services::{Endpoint, MemoryTransport, ServiceRegistry};

mod discovery;
mod wire;

// ── Harness ───────────────────────────────────────────────────────────────────

/// An endpoint with a fresh codec/registry pair on a loopback transport.
pub fn endpoint(node_id: &str) -> Endpoint<MemoryTransport> {
    Endpoint::with_parts(
        node_id,
        MemoryTransport::new(),
        MessageCodec::new(),
        ServiceRegistry::new(),
    )
}

/// Carry an encoded payload from one node to another, as the link would.
pub fn deliver(from_node: &str, payload: &str, to: &mut Endpoint<MemoryTransport>) {
    to.transport_mut()
        .push_inbound(from_node, payload.as_bytes());
}
