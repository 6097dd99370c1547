//! Messaging endpoint — binds one node identity and one transport to the
//! codec/registry pair.
//!
//! Outbound intents become encoded sends; inbound payloads become decoded
//! messages, with Advertise and Profile fed to the registry on the way
//! through. `poll` handles at most one message per call and never blocks;
//! draining loops belong to the caller.

use lantern_core::codec::{CodecError, MessageCodec};
use lantern_core::message::{Message, ServiceEntry};
use serde_json::{Map, Value};

use crate::registry::{ProviderSummary, ServiceRegistry};
use crate::transport::Transport;

pub struct Endpoint<T: Transport> {
    node_id: String,
    transport: T,
    codec: MessageCodec,
    registry: ServiceRegistry,
}

impl<T: Transport> Endpoint<T> {
    /// An endpoint with a default codec and an empty registry.
    pub fn new(node_id: impl Into<String>, transport: T) -> Self {
        Self::with_parts(node_id, transport, MessageCodec::new(), ServiceRegistry::new())
    }

    pub fn with_parts(
        node_id: impl Into<String>,
        transport: T,
        codec: MessageCodec,
        registry: ServiceRegistry,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            transport,
            codec,
            registry,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Mutable registry access, for externally-triggered maintenance
    /// such as stale sweeps.
    pub fn registry_mut(&mut self) -> &mut ServiceRegistry {
        &mut self.registry
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // ── Outbound ──────────────────────────────────────────────────────────────

    /// Each send operation encodes, forwards to the transport, and returns
    /// the encoded payload so callers can observe exactly what went out.
    pub fn send_advertise(
        &mut self,
        peer_id: &str,
        profile_hash: &str,
        service_ids: &[u16],
    ) -> Result<String, CodecError> {
        let payload = self
            .codec
            .encode_advertise(&self.node_id, profile_hash, service_ids)?;
        self.transport.send(peer_id, payload.as_bytes());
        Ok(payload)
    }

    pub fn send_query(&mut self, peer_id: &str, service_id: u16) -> Result<String, CodecError> {
        let payload = self.codec.encode_query(&self.node_id, service_id)?;
        self.transport.send(peer_id, payload.as_bytes());
        Ok(payload)
    }

    pub fn send_query_result(
        &mut self,
        peer_id: &str,
        service_id: u16,
        providers: &[String],
    ) -> Result<String, CodecError> {
        let payload = self
            .codec
            .encode_query_result(&self.node_id, service_id, providers)?;
        self.transport.send(peer_id, payload.as_bytes());
        Ok(payload)
    }

    pub fn send_get_profile(
        &mut self,
        peer_id: &str,
        target_node_id: &str,
    ) -> Result<String, CodecError> {
        let payload = self
            .codec
            .encode_get_profile(&self.node_id, target_node_id)?;
        self.transport.send(peer_id, payload.as_bytes());
        Ok(payload)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn send_profile(
        &mut self,
        peer_id: &str,
        profile_hash: &str,
        services: &[ServiceEntry],
        name: Option<&str>,
        role: Option<&str>,
        firmware: Option<&str>,
        meta: Option<&Map<String, Value>>,
    ) -> Result<String, CodecError> {
        let payload = self.codec.encode_profile(
            &self.node_id,
            profile_hash,
            services,
            name,
            role,
            firmware,
            meta,
        )?;
        self.transport.send(peer_id, payload.as_bytes());
        Ok(payload)
    }

    // ── Inbound ───────────────────────────────────────────────────────────────

    /// Receive and decode at most one message.
    ///
    /// Returns `Ok(None)` when the transport has nothing pending. Advertise
    /// and Profile messages update the registry before being returned; other
    /// types pass straight through. Malformed or invalid payloads surface as
    /// [`CodecError`] so callers can count the two kinds separately.
    pub fn poll(&mut self) -> Result<Option<(String, Message)>, CodecError> {
        let Some((peer_id, payload)) = self.transport.recv() else {
            return Ok(None);
        };

        let message = self.codec.decode(&payload)?;
        tracing::trace!(peer = %peer_id, tag = message.type_tag(), "message received");

        match &message {
            Message::Advertise(adv) => self.registry.register_advertisement(adv, None),
            Message::Profile(profile) => self.registry.register_profile(profile, None),
            _ => {}
        }

        Ok(Some((peer_id, message)))
    }

    /// Known providers of a service, freshest first.
    pub fn find_providers(&self, service_id: u16) -> Vec<ProviderSummary> {
        self.registry.find_service(service_id)
    }
}
