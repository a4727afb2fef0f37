//! One experiment: a server node and a star of client nodes around it, all
//! sharing the same runtime parameters.

use crate::analytics::{ClientStats, ServerStats, TrafficSummary};
use crate::components::client::{Client, ClientConfig};
use crate::components::server::{Server, ServerConfig};
use crate::engine::Simulation;
use crate::error::ConfigError;
use crate::network::{EdgeConfig, Link};
use crate::runtime::{RuntimeVariable, DEFAULT_FLOW_RATE};
use crate::traits::NodeId;
use crate::{secs_to_us, ResponseTimes};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

pub const SERVER_NODE: NodeId = 0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Experiment {
    pub run_no: u64,
    pub flow_rate: f64,
    pub clients: u32,
    pub link: EdgeConfig,
    pub server_start: f64, // seconds
    pub client_start: f64, // seconds
    pub stop: f64,         // seconds
    pub client: ClientConfig,
    pub server: ServerConfig,
}

impl Default for Experiment {
    fn default() -> Self {
        Self {
            run_no: 1,
            flow_rate: DEFAULT_FLOW_RATE,
            clients: 1,
            link: EdgeConfig::default(),
            server_start: 1.0,
            client_start: 2.0,
            stop: 10.0,
            client: ClientConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Experiment {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let times = [self.server_start, self.client_start, self.stop];
        if times.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(ConfigError::Invalid(format!("start/stop times {times:?} must be non-negative")));
        }
        if self.server_start > self.stop || self.client_start > self.stop {
            return Err(ConfigError::Invalid("applications must start before the stop time".to_string()));
        }
        if self.clients == 0 {
            return Err(ConfigError::Invalid("at least one client is required".to_string()));
        }
        if self.link.data_rate_bps == 0 {
            return Err(ConfigError::Invalid("link data rate must be positive".to_string()));
        }
        self.client.validate()?;
        self.server.validate()
    }

    /// Wire up the topology. Nothing runs until `Testbed::run`.
    pub fn build(&self) -> Result<Testbed, ConfigError> {
        self.validate()?;
        let runtime = Arc::new(RuntimeVariable::with_rate(self.run_no, self.flow_rate)?);
        let mut sim = Simulation::new();
        let stop_us = secs_to_us(self.stop);

        let server = Server::new("Server", self.server.clone(), runtime.clone())?;
        let server_stats = Arc::clone(&server.stats);
        sim.add_component(SERVER_NODE, Box::new(server));
        sim.start_app(SERVER_NODE, secs_to_us(self.server_start), stop_us);

        let mut clients = Vec::new();
        for id in 1..=self.clients {
            let config = ClientConfig { remote: Some(SERVER_NODE), ..self.client.clone() };
            let client = Client::with_runtime(&format!("Client-{id}"), config, runtime.clone())?;
            clients.push((id, Arc::clone(&client.stats)));
            sim.add_component(id, Box::new(client));
            sim.connect_node(id, SERVER_NODE, Link::symmetric(self.link));
            sim.start_app(id, secs_to_us(self.client_start), stop_us);
        }

        Ok(Testbed { sim, runtime, clients, server_stats, stop_us })
    }
}

pub struct Testbed {
    pub sim: Simulation,
    pub runtime: Arc<RuntimeVariable>,
    pub clients: Vec<(NodeId, Arc<RwLock<ClientStats>>)>,
    pub server_stats: Arc<RwLock<ServerStats>>,
    pub stop_us: u64,
}

impl Testbed {
    pub fn run(&mut self) -> TrafficSummary {
        self.sim.run_until(self.stop_us);
        let summary = self.summary();
        info!(
            "run {} finished: {} objects, {} sessions, {} failures",
            self.runtime.run_no(),
            summary.objects_received,
            summary.sessions_completed,
            summary.delivery_failures
        );
        summary
    }

    pub fn summary(&self) -> TrafficSummary {
        let mut summary = TrafficSummary::default();
        let mut latencies = ResponseTimes::default();
        for (_, stats) in &self.clients {
            let stats = stats.read().unwrap_or_else(PoisonError::into_inner);
            summary.add_client(&stats);
            latencies.merge(&stats.response_times);
        }
        summary.requests_served = self.server_stats.read().unwrap_or_else(PoisonError::into_inner).served.len() as u64;
        summary.response_times = latencies.summary();
        summary
    }
}
