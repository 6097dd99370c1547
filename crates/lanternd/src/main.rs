//! lanternd — Lantern capability discovery daemon.
//!
//! Advertises this node's services over the multicast link, keeps a registry
//! of what nearby nodes offer, answers provider queries, and serves the
//! local profile on request.

use std::time::Duration;

use anyhow::{Context, Result};

use lantern_core::codec::{CodecError, MessageCodec};
use lantern_core::config::LanternConfig;
use lantern_core::message::{Message, ServiceEntry};
use lantern_services::{now_ms, Endpoint, ServiceRegistry};

mod link;

use link::{UdpLink, BROADCAST_PEER};

/// What this node tells the link about itself.
struct LocalProfile {
    profile_hash: String,
    service_ids: Vec<u16>,
    services: Vec<ServiceEntry>,
    name: Option<String>,
    role: Option<String>,
    firmware: Option<String>,
}

impl LocalProfile {
    fn from_config(config: &LanternConfig) -> Self {
        let service_ids = config.discovery.service_ids.clone();
        let services: Vec<ServiceEntry> =
            service_ids.iter().map(|id| ServiceEntry::new(*id)).collect();

        let name = non_empty(&config.discovery.name);
        let role = non_empty(&config.discovery.role);
        let firmware = non_empty(&config.discovery.firmware);
        let profile_hash = profile_digest(&service_ids, &name, &role, &firmware);

        Self {
            profile_hash,
            service_ids,
            services,
            name,
            role,
            firmware,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Short digest over the advertised profile, so peers can tell from a
/// compact advertisement whether a node's full profile changed.
fn profile_digest(
    service_ids: &[u16],
    name: &Option<String>,
    role: &Option<String>,
    firmware: &Option<String>,
) -> String {
    let canonical = serde_json::json!({
        "s": service_ids,
        "name": name,
        "role": role,
        "fw": firmware,
    })
    .to_string();
    hex::encode(&blake3::hash(canonical.as_bytes()).as_bytes()[..4])
}

fn resolve_node_id(config: &LanternConfig) -> String {
    if !config.identity.node_id.is_empty() {
        return config.identity.node_id.clone();
    }
    // No configured identity — derive a session-stable one.
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "lantern".to_string());
    let seed = format!("{host}:{}", std::process::id());
    hex::encode(&blake3::hash(seed.as_bytes()).as_bytes()[..6])
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = LanternConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = LanternConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        LanternConfig::default()
    });

    let interface = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config.network.interface.clone());
    if interface.is_empty() {
        anyhow::bail!("no network interface given (argument or config)");
    }
    let interface_index = link::if_index(&interface)?;

    let node_id = resolve_node_id(&config);
    let local = LocalProfile::from_config(&config);
    tracing::info!(
        node_id,
        interface,
        profile_hash = %local.profile_hash,
        services = ?local.service_ids,
        "lanternd starting"
    );
    if local.service_ids.is_empty() {
        tracing::warn!("no services configured; listening without advertising");
    }

    let udp_link = UdpLink::open(interface_index, config.network.announce_port)
        .await
        .context("failed to open multicast link")?;
    let inbound = udp_link.wakeup();

    let mut endpoint = Endpoint::with_parts(
        node_id,
        udp_link,
        MessageCodec::new(),
        ServiceRegistry::new(),
    );

    let mut announce = tokio::time::interval(interval_period(
        "announce_interval_secs",
        config.discovery.announce_interval_secs,
    ));
    let mut sweep = tokio::time::interval(interval_period(
        "sweep_interval_secs",
        config.discovery.sweep_interval_secs,
    ));
    let stale_after_ms = config.discovery.stale_after_secs.saturating_mul(1000);

    loop {
        tokio::select! {
            _ = announce.tick() => {
                if !local.service_ids.is_empty() {
                    match endpoint.send_advertise(
                        BROADCAST_PEER,
                        &local.profile_hash,
                        &local.service_ids,
                    ) {
                        Ok(payload) => tracing::trace!(bytes = payload.len(), "advertisement sent"),
                        Err(e) => tracing::warn!(error = %e, "advertisement rejected"),
                    }
                }
            }
            _ = sweep.tick() => {
                let cutoff = now_ms().saturating_sub(stale_after_ms);
                let removed = endpoint.registry_mut().sweep_stale(cutoff);
                if removed > 0 {
                    tracing::debug!(removed, "swept stale registry entries");
                }
            }
            _ = inbound.notified() => {
                drain(&mut endpoint, &local);
            }
        }
    }
}

/// Timer periods must be non-zero; a zero in the config becomes one second.
fn interval_period(setting: &str, configured_secs: u64) -> Duration {
    if configured_secs == 0 {
        tracing::warn!(setting, "zero interval in config, using 1s");
        Duration::from_secs(1)
    } else {
        Duration::from_secs(configured_secs)
    }
}

/// Pull everything pending off the link. One message per poll, by contract.
fn drain(endpoint: &mut Endpoint<UdpLink>, local: &LocalProfile) {
    loop {
        match endpoint.poll() {
            Ok(None) => break,
            Ok(Some((peer_id, message))) => handle_message(endpoint, local, &peer_id, message),
            Err(CodecError::Malformed(e)) => {
                tracing::debug!(error = %e, "dropped malformed payload");
            }
            Err(CodecError::Invalid(e)) => {
                tracing::debug!(error = %e, "dropped invalid message");
            }
        }
    }
}

fn handle_message(
    endpoint: &mut Endpoint<UdpLink>,
    local: &LocalProfile,
    peer_id: &str,
    message: Message,
) {
    // Multicast loops our own broadcasts back; nothing to do with them.
    if message.node_id() == endpoint.node_id() {
        tracing::trace!("ignoring own broadcast");
        return;
    }

    match message {
        Message::Advertise(adv) => {
            tracing::debug!(node = adv.node_id, services = ?adv.service_ids, "peer advertised");
        }
        Message::Profile(profile) => {
            tracing::debug!(node = profile.node_id, "peer profile received");
        }
        Message::Query(query) => {
            let mut providers: Vec<String> = endpoint
                .find_providers(query.service_id)
                .into_iter()
                .map(|p| p.node_id)
                .collect();
            if local.service_ids.contains(&query.service_id) {
                let own = endpoint.node_id().to_string();
                if !providers.contains(&own) {
                    providers.insert(0, own);
                }
            }
            if let Err(e) = endpoint.send_query_result(peer_id, query.service_id, &providers) {
                tracing::warn!(error = %e, "failed to answer query");
            }
        }
        Message::GetProfile(request) => {
            if request.target != endpoint.node_id() {
                return;
            }
            if let Err(e) = endpoint.send_profile(
                peer_id,
                &local.profile_hash,
                &local.services,
                local.name.as_deref(),
                local.role.as_deref(),
                local.firmware.as_deref(),
                None,
            ) {
                tracing::warn!(error = %e, "failed to send profile");
            }
        }
        Message::QueryResult(result) => {
            tracing::info!(
                service_id = result.service_id,
                providers = ?result.providers,
                "query result received"
            );
        }
    }
}
