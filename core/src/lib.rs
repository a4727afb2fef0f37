pub mod analytics;
pub mod components;
pub mod engine;
pub mod error;
pub mod experiment;
pub mod header;
pub mod network;
pub mod random;
pub mod runtime;
pub mod traits;
pub mod transport;

pub use analytics::{ClientStats, LatencySummary, ResponseTimes, ServedRequest, ServerStats, TrafficSummary};
pub use components::client::{Client, ClientConfig, ClientState, ObjectRequest};
pub use components::server::{Server, ServerConfig};
pub use components::{component_kinds, create_component};
pub use engine::{Event, EventType, ScheduleCmd, Simulation};
pub use error::{ConfigError, HeaderError};
pub use experiment::{Experiment, Testbed, SERVER_NODE};
pub use header::{HttpSeqHeader, Packet, HTTP_SEQ_HEADER_SIZE};
pub use network::{canonical_key, EdgeConfig, Link};
pub use random::{HttpRandomVariable, TrafficModel, VariableKind};
pub use runtime::RuntimeVariable;
pub use traits::{Component, NodeId};
pub use transport::{ConnId, RequestDirective};

pub const US_PER_SEC: f64 = 1_000_000.0;

/// Seconds to simulation microseconds. Negative and non-finite inputs map to zero.
pub fn secs_to_us(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        (secs * US_PER_SEC).round() as u64
    } else {
        0
    }
}
