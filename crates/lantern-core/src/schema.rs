//! Lantern wire schema — the authoritative protocol contract.
//!
//! These constants ARE the protocol. Type tags and field tokens are one to
//! three bytes each because short-form messages must fit inside small
//! wireless packet budgets. Changing anything here is a breaking change.
//!
//! This module is pure data: the version constant, the five type tags, the
//! field tokens, the short-packet ceiling, and the per-type required-field
//! sets. A new message type is added here — and nowhere else — and every
//! validator defers to this table.

/// The single supported protocol version.
pub const PROTOCOL_VERSION: u64 = 1;

/// Hard byte ceiling for encoded short-form messages.
pub const SHORT_PACKET_MAX_BYTES: usize = 205;

// ── Type tags ─────────────────────────────────────────────────────────────────

/// Short capability advertisement (broadcast).
pub const TYPE_ADVERTISE: &str = "a";
/// Query for providers of a service.
pub const TYPE_QUERY: &str = "q";
/// Response with candidate providers.
pub const TYPE_QUERY_RESULT: &str = "i";
/// Request a full profile from a node.
pub const TYPE_GET_PROFILE: &str = "g";
/// Full profile response (long form, exempt from the packet ceiling).
pub const TYPE_PROFILE: &str = "p";

// ── Field tokens ──────────────────────────────────────────────────────────────

pub const F_VERSION: &str = "v";
pub const F_TYPE: &str = "t";
pub const F_NODE_ID: &str = "n";
pub const F_PROFILE_HASH: &str = "h";
pub const F_SERVICES: &str = "s";
pub const F_SERVICE_ID: &str = "sid";
pub const F_PROVIDERS: &str = "p";
pub const F_TARGET: &str = "to";

// Long-form-only optional fields.
pub const F_NODE_NAME: &str = "name";
pub const F_ROLE: &str = "role";
pub const F_FIRMWARE: &str = "fw";
pub const F_META: &str = "meta";

// ── Required-field sets ───────────────────────────────────────────────────────

/// Fields every message must carry, regardless of type.
pub const UNIVERSAL_REQUIRED: &[&str] = &[F_VERSION, F_TYPE, F_NODE_ID];

pub const ADVERTISE_REQUIRED: &[&str] =
    &[F_VERSION, F_TYPE, F_NODE_ID, F_PROFILE_HASH, F_SERVICES];
pub const QUERY_REQUIRED: &[&str] = &[F_VERSION, F_TYPE, F_NODE_ID, F_SERVICE_ID];
pub const QUERY_RESULT_REQUIRED: &[&str] =
    &[F_VERSION, F_TYPE, F_NODE_ID, F_SERVICE_ID, F_PROVIDERS];
pub const GET_PROFILE_REQUIRED: &[&str] = &[F_VERSION, F_TYPE, F_NODE_ID, F_TARGET];
pub const PROFILE_REQUIRED: &[&str] =
    &[F_VERSION, F_TYPE, F_NODE_ID, F_PROFILE_HASH, F_SERVICES];

/// Required-field set for a type tag. `None` means the tag is unknown.
pub fn required_fields(type_tag: &str) -> Option<&'static [&'static str]> {
    match type_tag {
        TYPE_ADVERTISE => Some(ADVERTISE_REQUIRED),
        TYPE_QUERY => Some(QUERY_REQUIRED),
        TYPE_QUERY_RESULT => Some(QUERY_RESULT_REQUIRED),
        TYPE_GET_PROFILE => Some(GET_PROFILE_REQUIRED),
        TYPE_PROFILE => Some(PROFILE_REQUIRED),
        _ => None,
    }
}
