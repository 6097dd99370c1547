//! lantern-core — wire schema, typed messages, codec, and configuration.
//! All other Lantern crates depend on this one.

pub mod codec;
pub mod config;
pub mod message;
pub mod schema;

pub use codec::{CodecError, MessageCodec, ValidationError};
pub use message::{Advertise, GetProfile, Message, Profile, Query, QueryResult, ServiceEntry};
