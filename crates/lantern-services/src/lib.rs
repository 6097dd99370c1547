//! lantern-services — discovery registry, transport seam, and the endpoint
//! that ties them to the wire codec.

pub mod endpoint;
pub mod registry;
pub mod transport;

pub use endpoint::Endpoint;
pub use registry::{now_ms, NodeRecord, ProviderSummary, ServiceRegistry};
pub use transport::{MemoryTransport, Transport};
