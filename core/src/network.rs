use serde::{Deserialize, Serialize};

use crate::NodeId;

#[derive(Serialize, Deserialize, Clone, Debug, Copy, PartialEq)]
pub struct EdgeConfig {
    pub latency_us: u64,     // One-way propagation delay
    pub data_rate_bps: u64, // Serialization rate
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            latency_us: 2_000,
            data_rate_bps: 5_000_000,
        }
    }
}

impl EdgeConfig {
    pub fn transmission_us(&self, bytes: u64) -> u64 {
        if self.data_rate_bps == 0 {
            return 0;
        }
        (bytes * 8 * 1_000_000).div_ceil(self.data_rate_bps)
    }
}

/// A point-to-point link between two nodes.
/// It contains configuration for both directions and each direction is a FIFO.
/// Stored by canonical key (min_id, max_id).
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Link {
    pub min_to_max: EdgeConfig,
    pub max_to_min: EdgeConfig,
    #[serde(skip)]
    busy_until: [u64; 2],
}

impl Link {
    pub fn symmetric(config: EdgeConfig) -> Self {
        Self {
            min_to_max: config,
            max_to_min: config,
            busy_until: [0; 2],
        }
    }

    pub fn get_config(&self, from: NodeId, to: NodeId) -> &EdgeConfig {
        if from < to {
            &self.min_to_max
        } else {
            &self.max_to_min
        }
    }

    pub fn get_config_mut(&mut self, from: NodeId, to: NodeId) -> &mut EdgeConfig {
        if from < to {
            &mut self.min_to_max
        } else {
            &mut self.max_to_min
        }
    }

    /// Queue `bytes` for transmission at `now` and return the arrival time.
    /// A frame waits for the previous one in the same direction to finish.
    pub fn transmit(&mut self, from: NodeId, to: NodeId, now: u64, bytes: u64) -> u64 {
        let cfg = *self.get_config(from, to);
        let dir = usize::from(from >= to);
        let departure = now.max(self.busy_until[dir]) + cfg.transmission_us(bytes);
        self.busy_until[dir] = departure;
        departure + cfg.latency_us
    }
}

pub fn canonical_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}
