//! Capability registry — tracks known nodes and the services they offer.
//!
//! Records are built solely from received Advertise and Profile messages,
//! which arrive pre-validated through the codec, so nothing here can fail.
//! The registry is exclusively owned and mutated only through these
//! operations; there is no interior locking.

use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use lantern_core::message::{Advertise, Profile, ServiceEntry};
use serde_json::{Map, Value};

/// Everything known about one node.
///
/// `profile_hash` and `service_ids` come from advertisements; the optional
/// descriptive fields are populated once a full Profile has been received.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub node_id: String,
    pub profile_hash: String,
    pub service_ids: Vec<u16>,
    /// Unix milliseconds of the last advertisement or profile.
    pub last_seen_ms: u64,
    pub name: Option<String>,
    pub role: Option<String>,
    pub firmware: Option<String>,
    pub meta: Option<Map<String, Value>>,
    /// Full service detail. Only present after a Profile message.
    pub services: Option<Vec<ServiceEntry>>,
}

impl NodeRecord {
    fn new(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            profile_hash: String::new(),
            service_ids: Vec::new(),
            last_seen_ms: 0,
            name: None,
            role: None,
            firmware: None,
            meta: None,
            services: None,
        }
    }
}

/// One provider of a queried service, freshest data only.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSummary {
    pub node_id: String,
    pub profile_hash: String,
    pub name: Option<String>,
    pub role: Option<String>,
    pub last_seen_ms: u64,
}

/// In-memory discovery registry: node records plus a reverse index from
/// service id to the nodes known to provide it.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    nodes: HashMap<String, NodeRecord>,
    providers: HashMap<u16, HashSet<String>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a capability advertisement.
    ///
    /// The sender's service list is replaced, not merged; descriptive fields
    /// from an earlier profile are kept. The provider index only ever gains
    /// entries here — a node that stops advertising a service stays indexed
    /// until [`sweep_stale`](Self::sweep_stale) removes it.
    pub fn register_advertisement(&mut self, adv: &Advertise, seen_at_ms: Option<u64>) {
        let seen = seen_at_ms.unwrap_or_else(now_ms);
        let record = self
            .nodes
            .entry(adv.node_id.clone())
            .or_insert_with(|| NodeRecord::new(&adv.node_id));
        record.profile_hash = adv.profile_hash.clone();
        record.service_ids = adv.service_ids.clone();
        record.last_seen_ms = seen;

        for service_id in &adv.service_ids {
            self.providers
                .entry(*service_id)
                .or_default()
                .insert(adv.node_id.clone());
        }
    }

    /// Record a full profile. Overwrites the descriptive fields (absent
    /// optionals clear earlier values) and derives `service_ids` from the
    /// structured service list.
    pub fn register_profile(&mut self, profile: &Profile, seen_at_ms: Option<u64>) {
        let seen = seen_at_ms.unwrap_or_else(now_ms);
        let service_ids: Vec<u16> = profile.services.iter().map(|s| s.service_id).collect();

        let record = self
            .nodes
            .entry(profile.node_id.clone())
            .or_insert_with(|| NodeRecord::new(&profile.node_id));
        record.profile_hash = profile.profile_hash.clone();
        record.last_seen_ms = seen;
        record.name = profile.name.clone();
        record.role = profile.role.clone();
        record.firmware = profile.firmware.clone();
        record.meta = profile.meta.clone();
        record.services = Some(profile.services.clone());
        record.service_ids = service_ids.clone();

        for service_id in &service_ids {
            self.providers
                .entry(*service_id)
                .or_default()
                .insert(profile.node_id.clone());
        }
    }

    /// Known providers of a service, most recently heard first.
    /// Ties are broken arbitrarily. Unknown service ids yield an empty list.
    pub fn find_service(&self, service_id: u16) -> Vec<ProviderSummary> {
        let Some(provider_ids) = self.providers.get(&service_id) else {
            return Vec::new();
        };

        let mut results: Vec<ProviderSummary> = provider_ids
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|node| ProviderSummary {
                node_id: node.node_id.clone(),
                profile_hash: node.profile_hash.clone(),
                name: node.name.clone(),
                role: node.role.clone(),
                last_seen_ms: node.last_seen_ms,
            })
            .collect();
        results.sort_by(|a, b| b.last_seen_ms.cmp(&a.last_seen_ms));
        results
    }

    pub fn get_node(&self, node_id: &str) -> Option<&NodeRecord> {
        self.nodes.get(node_id)
    }

    /// Read-only view of every known node.
    pub fn all_nodes(&self) -> &HashMap<String, NodeRecord> {
        &self.nodes
    }

    /// Remove every node last seen before `older_than_ms` and prune the
    /// provider index to match. Returns how many records were removed.
    ///
    /// This is the only removal path; register/find never prune. Callers
    /// decide when staleness matters and trigger the sweep explicitly.
    pub fn sweep_stale(&mut self, older_than_ms: u64) -> usize {
        let stale: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.last_seen_ms < older_than_ms)
            .map(|(id, _)| id.clone())
            .collect();

        for node_id in &stale {
            self.nodes.remove(node_id);
        }
        self.providers.retain(|_, ids| {
            for node_id in &stale {
                ids.remove(node_id);
            }
            !ids.is_empty()
        });

        stale.len()
    }
}

/// Current Unix time in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advertise(node_id: &str, service_ids: Vec<u16>) -> Advertise {
        Advertise {
            node_id: node_id.to_string(),
            profile_hash: "5fe921aa".to_string(),
            service_ids,
        }
    }

    #[test]
    fn find_service_orders_by_recency_descending() {
        let mut registry = ServiceRegistry::new();
        registry.register_advertisement(&advertise("aa11", vec![205]), Some(1_000));
        registry.register_advertisement(&advertise("bb22", vec![205]), Some(2_000));

        let providers = registry.find_service(205);
        let ids: Vec<&str> = providers.iter().map(|p| p.node_id.as_str()).collect();
        assert_eq!(ids, vec!["bb22", "aa11"]);
    }

    #[test]
    fn find_service_with_no_providers_is_empty() {
        let registry = ServiceRegistry::new();
        assert!(registry.find_service(9999).is_empty());
    }

    #[test]
    fn re_advertising_replaces_the_service_list() {
        let mut registry = ServiceRegistry::new();
        registry.register_advertisement(&advertise("aa11", vec![100, 205]), Some(1_000));
        registry.register_advertisement(&advertise("aa11", vec![205]), Some(2_000));

        let node = registry.get_node("aa11").unwrap();
        assert_eq!(node.service_ids, vec![205]);
        assert_eq!(node.last_seen_ms, 2_000);

        // Known gap: the provider index is not pruned until a sweep.
        assert_eq!(registry.find_service(100).len(), 1);
    }

    #[test]
    fn repeated_advertisements_are_idempotent_in_the_index() {
        let mut registry = ServiceRegistry::new();
        registry.register_advertisement(&advertise("aa11", vec![205]), Some(1_000));
        registry.register_advertisement(&advertise("aa11", vec![205]), Some(2_000));

        assert_eq!(registry.find_service(205).len(), 1);
    }

    #[test]
    fn profile_populates_descriptive_fields_and_index() {
        let mut registry = ServiceRegistry::new();
        registry.register_advertisement(&advertise("aa11", vec![205]), Some(1_000));

        let profile = Profile {
            node_id: "aa11".to_string(),
            profile_hash: "01b3e9a0".to_string(),
            services: vec![ServiceEntry::new(205), ServiceEntry::new(900)],
            name: Some("probe-7".to_string()),
            role: Some("sensor".to_string()),
            firmware: Some("2.4.1".to_string()),
            meta: None,
        };
        registry.register_profile(&profile, Some(2_000));

        let node = registry.get_node("aa11").unwrap();
        assert_eq!(node.profile_hash, "01b3e9a0");
        assert_eq!(node.name.as_deref(), Some("probe-7"));
        assert_eq!(node.service_ids, vec![205, 900]);
        assert!(node.services.is_some());

        let providers = registry.find_service(900);
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].role.as_deref(), Some("sensor"));
    }

    #[test]
    fn advertisement_keeps_profile_detail() {
        let mut registry = ServiceRegistry::new();
        let profile = Profile {
            node_id: "aa11".to_string(),
            profile_hash: "01".to_string(),
            services: vec![ServiceEntry::new(205)],
            name: Some("probe-7".to_string()),
            ..Profile::default()
        };
        registry.register_profile(&profile, Some(1_000));
        registry.register_advertisement(&advertise("aa11", vec![205]), Some(2_000));

        let node = registry.get_node("aa11").unwrap();
        assert_eq!(node.name.as_deref(), Some("probe-7"));
        assert_eq!(node.last_seen_ms, 2_000);
    }

    #[test]
    fn sweep_removes_stale_nodes_and_prunes_the_index() {
        let mut registry = ServiceRegistry::new();
        registry.register_advertisement(&advertise("aa11", vec![205]), Some(1_000));
        registry.register_advertisement(&advertise("bb22", vec![205, 900]), Some(5_000));

        let removed = registry.sweep_stale(2_000);
        assert_eq!(removed, 1);
        assert!(registry.get_node("aa11").is_none());

        let ids: Vec<String> = registry
            .find_service(205)
            .into_iter()
            .map(|p| p.node_id)
            .collect();
        assert_eq!(ids, vec!["bb22".to_string()]);

        // Fresh entries survive.
        assert_eq!(registry.find_service(900).len(), 1);
        assert_eq!(registry.all_nodes().len(), 1);
    }

    #[test]
    fn sweep_on_empty_registry_is_a_noop() {
        let mut registry = ServiceRegistry::new();
        assert_eq!(registry.sweep_stale(now_ms()), 0);
    }
}
