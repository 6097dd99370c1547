//! End-to-end discovery flows between endpoints.

use lantern_core::message::{Message, ServiceEntry};
use lantern_services::{now_ms, ServiceRegistry};

use crate::{deliver, endpoint};

/// The loopback smoke test: advertise, hear yourself, find yourself.
#[test]
fn advertise_poll_find() {
    let mut node_a = endpoint("node_a");

    let payload = node_a
        .send_advertise("ff:ff:ff:ff:ff:ff", "5fe921aa", &[100, 205, 900])
        .unwrap();
    assert!(payload.len() <= 205);

    let (_, message) = node_a.poll().unwrap().unwrap();
    assert!(matches!(message, Message::Advertise(_)));

    let providers = node_a.find_providers(205);
    assert_eq!(providers[0].node_id, "node_a");
}

/// Two nodes: A advertises, B hears it, B answers A's query from its registry.
#[test]
fn query_is_answered_from_a_peer_registry() {
    let mut node_a = endpoint("node_a");
    let mut node_b = endpoint("node_b");

    // A broadcasts; the harness carries the payload to B.
    let advert = node_a
        .send_advertise("broadcast", "5fe921aa", &[205])
        .unwrap();
    deliver("node_a", &advert, &mut node_b);
    let (peer, _) = node_b.poll().unwrap().unwrap();
    assert_eq!(peer, "node_a");

    // A asks B who provides 205; B answers from its registry.
    let query = node_a.send_query("node_b", 205).unwrap();
    deliver("node_a", &query, &mut node_b);
    let polled = node_b.poll().unwrap().unwrap();
    let Message::Query(query) = polled.1 else {
        panic!("expected query, got {:?}", polled.1);
    };
    let providers: Vec<String> = node_b
        .find_providers(query.service_id)
        .into_iter()
        .map(|p| p.node_id)
        .collect();
    let result = node_b
        .send_query_result(&polled.0, query.service_id, &providers)
        .unwrap();

    // The answer travels back to A.
    deliver("node_b", &result, &mut node_a);
    let (_, message) = node_a.poll().unwrap().unwrap();
    let Message::QueryResult(result) = message else {
        panic!("expected query result, got {message:?}");
    };
    assert_eq!(result.service_id, 205);
    assert_eq!(result.providers, vec!["node_a".to_string()]);
}

/// GetProfile round trip: the requester ends up with the full node record.
#[test]
fn profile_exchange_enriches_the_requester() {
    let mut node_a = endpoint("node_a");
    let mut node_b = endpoint("node_b");

    let request = node_a.send_get_profile("node_b", "node_b").unwrap();
    deliver("node_a", &request, &mut node_b);
    let (peer, message) = node_b.poll().unwrap().unwrap();
    assert!(matches!(message, Message::GetProfile(_)));

    let mut entry = ServiceEntry::new(205);
    entry
        .detail
        .insert("unit".to_string(), serde_json::Value::from("celsius"));
    let profile = node_b
        .send_profile(
            &peer,
            "01b3e9a0",
            &[entry],
            Some("probe-7"),
            Some("sensor"),
            Some("2.4.1"),
            None,
        )
        .unwrap();

    deliver("node_b", &profile, &mut node_a);
    let (_, message) = node_a.poll().unwrap().unwrap();
    assert!(matches!(message, Message::Profile(_)));

    let record = node_a.registry().get_node("node_b").unwrap();
    assert_eq!(record.profile_hash, "01b3e9a0");
    assert_eq!(record.name.as_deref(), Some("probe-7"));
    assert_eq!(record.role.as_deref(), Some("sensor"));
    assert_eq!(record.service_ids, vec![205]);

    let providers = node_a.find_providers(205);
    assert_eq!(providers[0].node_id, "node_b");
}

/// Freshness ordering end to end, with explicit timestamps at the
/// registry seam: the most recently heard provider comes first.
#[test]
fn providers_are_ordered_by_recency() {
    use lantern_core::message::Advertise;

    let mut registry = ServiceRegistry::new();
    let adv = |node_id: &str| Advertise {
        node_id: node_id.to_string(),
        profile_hash: "5fe921aa".to_string(),
        service_ids: vec![205],
    };

    registry.register_advertisement(&adv("aa11"), Some(1_000));
    registry.register_advertisement(&adv("bb22"), Some(2_000));

    let ids: Vec<String> = registry
        .find_service(205)
        .into_iter()
        .map(|p| p.node_id)
        .collect();
    assert_eq!(ids, vec!["bb22".to_string(), "aa11".to_string()]);

    // Hearing aa11 again flips the order.
    registry.register_advertisement(&adv("aa11"), Some(3_000));
    let ids: Vec<String> = registry
        .find_service(205)
        .into_iter()
        .map(|p| p.node_id)
        .collect();
    assert_eq!(ids, vec!["aa11".to_string(), "bb22".to_string()]);
}

#[test]
fn unknown_services_have_no_providers() {
    let node_a = endpoint("node_a");
    assert!(node_a.find_providers(9_999).is_empty());
}

/// A silent peer disappears only when the sweep is triggered, never on its own.
#[test]
fn stale_peers_survive_until_an_explicit_sweep() {
    let mut node_a = endpoint("node_a");

    let advert = endpoint("node_b")
        .send_advertise("broadcast", "5fe921aa", &[205])
        .unwrap();
    deliver("node_b", &advert, &mut node_a);
    node_a.poll().unwrap();

    // Queries keep answering long after the peer went quiet.
    assert_eq!(node_a.find_providers(205).len(), 1);

    let removed = node_a.registry_mut().sweep_stale(now_ms() + 1);
    assert_eq!(removed, 1);
    assert!(node_a.find_providers(205).is_empty());
    assert!(node_a.registry().get_node("node_b").is_none());
}
