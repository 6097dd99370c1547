//! Encoder/validator for Lantern discovery messages.
//!
//! Every encode path and the decode path funnel through [`MessageCodec::validate`].
//! Validation is symmetric on purpose: a node can never locally construct a
//! message it would reject on receipt, which is what keeps nodes interoperable
//! with no schema negotiation beyond the single version field.
//!
//! The wire form is compact JSON — no whitespace between tokens — with fields
//! in the canonical order produced by [`Message::to_wire`].

use serde_json::{Map, Value};

use crate::message::{
    Advertise, GetProfile, Message, Profile, Query, QueryResult, ServiceEntry,
};
use crate::schema;

/// A message violated the schema: missing or mistyped field, wrong version,
/// unknown type tag, out-of-range service id, or an oversized short form.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("message must be a JSON object")]
    NotAnObject,

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' must be {expected}")]
    FieldType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("unsupported version: {0}")]
    UnsupportedVersion(Value),

    #[error("unsupported message type: {0}")]
    UnknownType(String),

    #[error("service id out of uint16 range: {0}")]
    ServiceIdRange(i64),

    #[error("short advertise exceeds {limit} bytes (got {got})")]
    Oversize { limit: usize, got: usize },
}

/// Why a received payload was rejected. Malformed bytes (not JSON at all)
/// and well-formed-but-invalid messages are distinct so callers can count
/// the two kinds of bad traffic separately.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Stateless encoder/decoder. The only configuration is the short-packet
/// ceiling, overridable for tests and links with tighter budgets.
#[derive(Debug, Clone)]
pub struct MessageCodec {
    max_short_packet_bytes: usize,
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageCodec {
    pub fn new() -> Self {
        Self {
            max_short_packet_bytes: schema::SHORT_PACKET_MAX_BYTES,
        }
    }

    /// A codec with a non-default short-packet ceiling.
    pub fn with_limit(max_short_packet_bytes: usize) -> Self {
        Self {
            max_short_packet_bytes,
        }
    }

    pub fn max_short_packet_bytes(&self) -> usize {
        self.max_short_packet_bytes
    }

    // ── Encoding ──────────────────────────────────────────────────────────────

    /// Validate and serialize a message to its compact wire form.
    ///
    /// Advertise is the one variant whose encoded size is checked against the
    /// short-packet ceiling: its service list is unbounded by the caller, so
    /// an oversized packet must be caught here, at construction time.
    pub fn encode(&self, message: &Message) -> Result<String, CodecError> {
        let wire = Value::Object(message.to_wire());
        self.validate(&wire)?;
        let encoded = serde_json::to_string(&wire)?;
        if matches!(message, Message::Advertise(_)) && encoded.len() > self.max_short_packet_bytes
        {
            return Err(ValidationError::Oversize {
                limit: self.max_short_packet_bytes,
                got: encoded.len(),
            }
            .into());
        }
        Ok(encoded)
    }

    pub fn encode_advertise(
        &self,
        node_id: &str,
        profile_hash: &str,
        service_ids: &[u16],
    ) -> Result<String, CodecError> {
        self.encode(&Message::Advertise(Advertise {
            node_id: node_id.to_string(),
            profile_hash: profile_hash.to_string(),
            service_ids: service_ids.to_vec(),
        }))
    }

    pub fn encode_query(&self, node_id: &str, service_id: u16) -> Result<String, CodecError> {
        self.encode(&Message::Query(Query {
            node_id: node_id.to_string(),
            service_id,
        }))
    }

    pub fn encode_query_result(
        &self,
        node_id: &str,
        service_id: u16,
        providers: &[String],
    ) -> Result<String, CodecError> {
        self.encode(&Message::QueryResult(QueryResult {
            node_id: node_id.to_string(),
            service_id,
            providers: providers.to_vec(),
        }))
    }

    pub fn encode_get_profile(
        &self,
        node_id: &str,
        target_node_id: &str,
    ) -> Result<String, CodecError> {
        self.encode(&Message::GetProfile(GetProfile {
            node_id: node_id.to_string(),
            target: target_node_id.to_string(),
        }))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn encode_profile(
        &self,
        node_id: &str,
        profile_hash: &str,
        services: &[ServiceEntry],
        name: Option<&str>,
        role: Option<&str>,
        firmware: Option<&str>,
        meta: Option<&Map<String, Value>>,
    ) -> Result<String, CodecError> {
        self.encode(&Message::Profile(Profile {
            node_id: node_id.to_string(),
            profile_hash: profile_hash.to_string(),
            services: services.to_vec(),
            name: name.map(str::to_string),
            role: role.map(str::to_string),
            firmware: firmware.map(str::to_string),
            meta: meta.cloned(),
        }))
    }

    // ── Decoding ──────────────────────────────────────────────────────────────

    /// Parse and validate a received payload. Wire data is never trusted:
    /// decode re-runs the exact validation the encode paths use.
    pub fn decode(&self, raw: &[u8]) -> Result<Message, CodecError> {
        let value: Value = serde_json::from_slice(raw)?;
        self.validate(&value)?;
        Ok(message_from_wire(&value)?)
    }

    // ── Validation ────────────────────────────────────────────────────────────

    /// The single validation chokepoint. Checks the universal fields and the
    /// version, then dispatches on the type tag using the schema table.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        let obj = value.as_object().ok_or(ValidationError::NotAnObject)?;

        validate_common(obj)?;

        // type was checked to be a string by validate_common
        let tag = require_str(obj, schema::F_TYPE)?;
        let required = schema::required_fields(tag)
            .ok_or_else(|| ValidationError::UnknownType(tag.to_string()))?;
        for &field in required {
            if !obj.contains_key(field) {
                return Err(ValidationError::MissingField(field));
            }
        }

        match tag {
            schema::TYPE_ADVERTISE => validate_advertise(obj),
            schema::TYPE_QUERY => validate_query(obj),
            schema::TYPE_QUERY_RESULT => validate_query_result(obj),
            schema::TYPE_GET_PROFILE => validate_get_profile(obj),
            schema::TYPE_PROFILE => validate_profile(obj),
            // required_fields() already rejected anything else
            other => Err(ValidationError::UnknownType(other.to_string())),
        }
    }
}

// ── Per-type validation ───────────────────────────────────────────────────────

fn validate_common(obj: &Map<String, Value>) -> Result<(), ValidationError> {
    for &field in schema::UNIVERSAL_REQUIRED {
        if !obj.contains_key(field) {
            return Err(ValidationError::MissingField(field));
        }
    }

    let version = require(obj, schema::F_VERSION)?;
    if version.as_u64() != Some(schema::PROTOCOL_VERSION) {
        return Err(ValidationError::UnsupportedVersion(version.clone()));
    }

    require_str(obj, schema::F_TYPE)?;
    require_nonempty_str(obj, schema::F_NODE_ID)?;
    Ok(())
}

fn validate_advertise(obj: &Map<String, Value>) -> Result<(), ValidationError> {
    require_str(obj, schema::F_PROFILE_HASH)?;

    let services = require(obj, schema::F_SERVICES)?
        .as_array()
        .ok_or(ValidationError::FieldType {
            field: schema::F_SERVICES,
            expected: "a non-empty array of service ids",
        })?;
    if services.is_empty() {
        return Err(ValidationError::FieldType {
            field: schema::F_SERVICES,
            expected: "a non-empty array of service ids",
        });
    }
    for value in services {
        validate_service_id_value(value, schema::F_SERVICES)?;
    }
    Ok(())
}

fn validate_query(obj: &Map<String, Value>) -> Result<(), ValidationError> {
    validate_service_id_value(require(obj, schema::F_SERVICE_ID)?, schema::F_SERVICE_ID)
}

fn validate_query_result(obj: &Map<String, Value>) -> Result<(), ValidationError> {
    validate_service_id_value(require(obj, schema::F_SERVICE_ID)?, schema::F_SERVICE_ID)?;

    let providers = require(obj, schema::F_PROVIDERS)?
        .as_array()
        .ok_or(ValidationError::FieldType {
            field: schema::F_PROVIDERS,
            expected: "an array of non-empty node ids",
        })?;
    // May be empty; duplicates are allowed.
    for provider in providers {
        match provider.as_str() {
            Some(id) if !id.is_empty() => {}
            _ => {
                return Err(ValidationError::FieldType {
                    field: schema::F_PROVIDERS,
                    expected: "an array of non-empty node ids",
                })
            }
        }
    }
    Ok(())
}

fn validate_get_profile(obj: &Map<String, Value>) -> Result<(), ValidationError> {
    require_nonempty_str(obj, schema::F_TARGET)?;
    Ok(())
}

fn validate_profile(obj: &Map<String, Value>) -> Result<(), ValidationError> {
    require_str(obj, schema::F_PROFILE_HASH)?;

    let services = require(obj, schema::F_SERVICES)?
        .as_array()
        .ok_or(ValidationError::FieldType {
            field: schema::F_SERVICES,
            expected: "an array of service objects",
        })?;
    for entry in services {
        let entry = entry.as_object().ok_or(ValidationError::FieldType {
            field: schema::F_SERVICES,
            expected: "an array of service objects",
        })?;
        let sid = entry
            .get(schema::F_SERVICE_ID)
            .ok_or(ValidationError::MissingField(schema::F_SERVICE_ID))?;
        validate_service_id_value(sid, schema::F_SERVICE_ID)?;
    }

    for field in [schema::F_NODE_NAME, schema::F_ROLE, schema::F_FIRMWARE] {
        if let Some(value) = obj.get(field) {
            if !value.is_string() {
                return Err(ValidationError::FieldType {
                    field,
                    expected: "a string",
                });
            }
        }
    }
    if let Some(meta) = obj.get(schema::F_META) {
        if !meta.is_object() {
            return Err(ValidationError::FieldType {
                field: schema::F_META,
                expected: "an object",
            });
        }
    }
    Ok(())
}

fn validate_service_id_value(
    value: &Value,
    field: &'static str,
) -> Result<(), ValidationError> {
    let id = value.as_i64().ok_or(ValidationError::FieldType {
        field,
        expected: "an integer service id",
    })?;
    if !(0..=i64::from(u16::MAX)).contains(&id) {
        return Err(ValidationError::ServiceIdRange(id));
    }
    Ok(())
}

// ── Field access helpers ──────────────────────────────────────────────────────

fn require<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, ValidationError> {
    obj.get(field).ok_or(ValidationError::MissingField(field))
}

fn require_str<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    require(obj, field)?
        .as_str()
        .ok_or(ValidationError::FieldType {
            field,
            expected: "a string",
        })
}

fn require_nonempty_str<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    let s = require_str(obj, field)?;
    if s.is_empty() {
        return Err(ValidationError::FieldType {
            field,
            expected: "a non-empty string",
        });
    }
    Ok(s)
}

fn require_service_id(value: &Value, field: &'static str) -> Result<u16, ValidationError> {
    validate_service_id_value(value, field)?;
    let id = value.as_i64().ok_or(ValidationError::FieldType {
        field,
        expected: "an integer service id",
    })?;
    Ok(id as u16)
}

// ── Wire → typed conversion ───────────────────────────────────────────────────

/// Build the typed message from an already-validated wire object.
fn message_from_wire(value: &Value) -> Result<Message, ValidationError> {
    let obj = value.as_object().ok_or(ValidationError::NotAnObject)?;
    let tag = require_str(obj, schema::F_TYPE)?;
    let node_id = require_nonempty_str(obj, schema::F_NODE_ID)?.to_string();

    match tag {
        schema::TYPE_ADVERTISE => {
            let service_ids = require(obj, schema::F_SERVICES)?
                .as_array()
                .ok_or(ValidationError::FieldType {
                    field: schema::F_SERVICES,
                    expected: "a non-empty array of service ids",
                })?
                .iter()
                .map(|v| require_service_id(v, schema::F_SERVICES))
                .collect::<Result<Vec<u16>, _>>()?;
            Ok(Message::Advertise(Advertise {
                node_id,
                profile_hash: require_str(obj, schema::F_PROFILE_HASH)?.to_string(),
                service_ids,
            }))
        }
        schema::TYPE_QUERY => Ok(Message::Query(Query {
            node_id,
            service_id: require_service_id(
                require(obj, schema::F_SERVICE_ID)?,
                schema::F_SERVICE_ID,
            )?,
        })),
        schema::TYPE_QUERY_RESULT => {
            let providers = require(obj, schema::F_PROVIDERS)?
                .as_array()
                .ok_or(ValidationError::FieldType {
                    field: schema::F_PROVIDERS,
                    expected: "an array of non-empty node ids",
                })?
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or(ValidationError::FieldType {
                            field: schema::F_PROVIDERS,
                            expected: "an array of non-empty node ids",
                        })
                })
                .collect::<Result<Vec<String>, _>>()?;
            Ok(Message::QueryResult(QueryResult {
                node_id,
                service_id: require_service_id(
                    require(obj, schema::F_SERVICE_ID)?,
                    schema::F_SERVICE_ID,
                )?,
                providers,
            }))
        }
        schema::TYPE_GET_PROFILE => Ok(Message::GetProfile(GetProfile {
            node_id,
            target: require_nonempty_str(obj, schema::F_TARGET)?.to_string(),
        })),
        schema::TYPE_PROFILE => {
            let services = require(obj, schema::F_SERVICES)?
                .as_array()
                .ok_or(ValidationError::FieldType {
                    field: schema::F_SERVICES,
                    expected: "an array of service objects",
                })?
                .iter()
                .map(service_entry_from_wire)
                .collect::<Result<Vec<ServiceEntry>, _>>()?;
            Ok(Message::Profile(Profile {
                node_id,
                profile_hash: require_str(obj, schema::F_PROFILE_HASH)?.to_string(),
                services,
                name: optional_string(obj, schema::F_NODE_NAME),
                role: optional_string(obj, schema::F_ROLE),
                firmware: optional_string(obj, schema::F_FIRMWARE),
                meta: obj
                    .get(schema::F_META)
                    .and_then(Value::as_object)
                    .cloned(),
            }))
        }
        other => Err(ValidationError::UnknownType(other.to_string())),
    }
}

fn service_entry_from_wire(value: &Value) -> Result<ServiceEntry, ValidationError> {
    let obj = value.as_object().ok_or(ValidationError::FieldType {
        field: schema::F_SERVICES,
        expected: "an array of service objects",
    })?;
    let service_id = require_service_id(
        obj.get(schema::F_SERVICE_ID)
            .ok_or(ValidationError::MissingField(schema::F_SERVICE_ID))?,
        schema::F_SERVICE_ID,
    )?;
    let mut detail = obj.clone();
    detail.remove(schema::F_SERVICE_ID);
    Ok(ServiceEntry { service_id, detail })
}

fn optional_string(obj: &Map<String, Value>, field: &str) -> Option<String> {
    obj.get(field).and_then(Value::as_str).map(str::to_string)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
