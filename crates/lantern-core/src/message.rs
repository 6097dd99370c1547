//! Typed message model for Lantern discovery traffic.
//!
//! One variant per wire message. The wire form is a compact JSON object with
//! single-letter keys (see [`crate::schema`]); `to_wire` produces that object
//! with fields in canonical order: `v`, `t`, `n`, then the per-type fields.

use serde_json::{Map, Value};

use crate::schema;

/// A service entry inside a long-form profile.
///
/// Carries the mandatory service id plus whatever extra detail fields the
/// node chose to publish (units, endpoints, capability flags — opaque here).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServiceEntry {
    pub service_id: u16,
    pub detail: Map<String, Value>,
}

impl ServiceEntry {
    pub fn new(service_id: u16) -> Self {
        Self {
            service_id,
            detail: Map::new(),
        }
    }
}

/// Short capability advertisement. Subject to the short-packet ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct Advertise {
    pub node_id: String,
    pub profile_hash: String,
    /// Must be non-empty.
    pub service_ids: Vec<u16>,
}

/// Query for providers of one service.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub node_id: String,
    pub service_id: u16,
}

/// Answer to a [`Query`]. `providers` may be empty and is not deduplicated.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub node_id: String,
    pub service_id: u16,
    pub providers: Vec<String>,
}

/// Request the full profile of `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct GetProfile {
    pub node_id: String,
    pub target: String,
}

/// Long-form profile. Exempt from the short-packet ceiling.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Profile {
    pub node_id: String,
    pub profile_hash: String,
    pub services: Vec<ServiceEntry>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub firmware: Option<String>,
    pub meta: Option<Map<String, Value>>,
}

/// A decoded (or to-be-encoded) discovery message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Advertise(Advertise),
    Query(Query),
    QueryResult(QueryResult),
    GetProfile(GetProfile),
    Profile(Profile),
}

impl Message {
    /// The one-byte wire tag for this variant.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Message::Advertise(_) => schema::TYPE_ADVERTISE,
            Message::Query(_) => schema::TYPE_QUERY,
            Message::QueryResult(_) => schema::TYPE_QUERY_RESULT,
            Message::GetProfile(_) => schema::TYPE_GET_PROFILE,
            Message::Profile(_) => schema::TYPE_PROFILE,
        }
    }

    /// The sending node's id.
    pub fn node_id(&self) -> &str {
        match self {
            Message::Advertise(m) => &m.node_id,
            Message::Query(m) => &m.node_id,
            Message::QueryResult(m) => &m.node_id,
            Message::GetProfile(m) => &m.node_id,
            Message::Profile(m) => &m.node_id,
        }
    }

    /// Short-form messages are bounded by the packet ceiling;
    /// profiles are the only long form.
    pub fn is_short_form(&self) -> bool {
        !matches!(self, Message::Profile(_))
    }

    /// Build the canonical wire mapping: `v`, `t`, `n`, then per-type fields.
    /// Optional profile fields are present only when set.
    pub fn to_wire(&self) -> Map<String, Value> {
        let mut obj = Map::new();
        obj.insert(
            schema::F_VERSION.to_string(),
            Value::from(schema::PROTOCOL_VERSION),
        );
        obj.insert(schema::F_TYPE.to_string(), Value::from(self.type_tag()));
        obj.insert(schema::F_NODE_ID.to_string(), Value::from(self.node_id()));

        match self {
            Message::Advertise(m) => {
                obj.insert(
                    schema::F_PROFILE_HASH.to_string(),
                    Value::from(m.profile_hash.as_str()),
                );
                obj.insert(
                    schema::F_SERVICES.to_string(),
                    Value::from(m.service_ids.iter().map(|id| Value::from(*id)).collect::<Vec<_>>()),
                );
            }
            Message::Query(m) => {
                obj.insert(schema::F_SERVICE_ID.to_string(), Value::from(m.service_id));
            }
            Message::QueryResult(m) => {
                obj.insert(schema::F_SERVICE_ID.to_string(), Value::from(m.service_id));
                obj.insert(
                    schema::F_PROVIDERS.to_string(),
                    Value::from(m.providers.iter().map(|p| Value::from(p.as_str())).collect::<Vec<_>>()),
                );
            }
            Message::GetProfile(m) => {
                obj.insert(schema::F_TARGET.to_string(), Value::from(m.target.as_str()));
            }
            Message::Profile(m) => {
                obj.insert(
                    schema::F_PROFILE_HASH.to_string(),
                    Value::from(m.profile_hash.as_str()),
                );
                obj.insert(
                    schema::F_SERVICES.to_string(),
                    Value::from(m.services.iter().map(service_entry_to_wire).collect::<Vec<_>>()),
                );
                if let Some(name) = &m.name {
                    obj.insert(schema::F_NODE_NAME.to_string(), Value::from(name.as_str()));
                }
                if let Some(role) = &m.role {
                    obj.insert(schema::F_ROLE.to_string(), Value::from(role.as_str()));
                }
                if let Some(firmware) = &m.firmware {
                    obj.insert(schema::F_FIRMWARE.to_string(), Value::from(firmware.as_str()));
                }
                if let Some(meta) = &m.meta {
                    obj.insert(schema::F_META.to_string(), Value::Object(meta.clone()));
                }
            }
        }

        obj
    }
}

fn service_entry_to_wire(entry: &ServiceEntry) -> Value {
    let mut obj = Map::new();
    obj.insert(
        schema::F_SERVICE_ID.to_string(),
        Value::from(entry.service_id),
    );
    for (key, value) in &entry.detail {
        obj.insert(key.clone(), value.clone());
    }
    Value::Object(obj)
}
