use httptraffic_core::*;
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

pub struct TestHarness {
    pub sim: Simulation,
    pub runtime: Arc<RuntimeVariable>,
}

pub struct ClientHandle {
    pub id: NodeId,
    pub config: Arc<RwLock<ClientConfig>>,
    pub stats: Arc<RwLock<ClientStats>>,
}

impl ClientHandle {
    pub fn received(&self) -> u64 {
        self.stats.read().unwrap().objects_received
    }

    pub fn connections_opened(&self) -> u64 {
        self.stats.read().unwrap().connections_opened
    }
}

pub struct ServerHandle {
    pub id: NodeId,
    pub stats: Arc<RwLock<ServerStats>>,
}

impl ServerHandle {
    pub fn served_for(&self, client: NodeId) -> Vec<ServedRequest> {
        self.stats
            .read()
            .unwrap()
            .served
            .iter()
            .filter(|s| s.client == client)
            .copied()
            .collect()
    }

    pub fn connections_used_by(&self, client: NodeId) -> usize {
        self.served_for(client)
            .iter()
            .map(|s| s.conn_seq)
            .collect::<BTreeSet<_>>()
            .len()
    }
}

/// Deterministic single-object browsing client: the original acceptance setup.
pub fn manual_client(pages: u32, objects: u32) -> ClientConfig {
    ClientConfig {
        max_sessions: 1,
        user_pages: pages,
        user_objects: objects,
        user_server_delay: 0.1,
        user_request_gap: 0.1,
        user_request_size: 100,
        user_response_size: 100,
        http1_1: false,
        automatic: false,
        ..ClientConfig::default()
    }
}

impl TestHarness {
    pub fn new() -> Self {
        Self::new_with_seed(1)
    }

    pub fn new_with_seed(run_no: u64) -> Self {
        Self {
            sim: Simulation::new(),
            runtime: Arc::new(RuntimeVariable::new(run_no).unwrap()),
        }
    }

    pub fn add(&mut self, id: NodeId, component: Box<dyn Component>) {
        self.sim.add_component(id, component);
    }

    pub fn add_server(&mut self, id: NodeId) -> ServerHandle {
        let server = Server::new("Server", ServerConfig::default(), self.runtime.clone()).unwrap();
        let stats = Arc::clone(&server.stats);
        self.add(id, Box::new(server));
        ServerHandle { id, stats }
    }

    pub fn add_client(&mut self, id: NodeId, config: ClientConfig) -> ClientHandle {
        let client = Client::with_runtime("Client", config, self.runtime.clone()).unwrap();
        let config = Arc::clone(&client.config);
        let stats = Arc::clone(&client.stats);
        self.add(id, Box::new(client));
        ClientHandle { id, config, stats }
    }

    /// 5 Mbps, 2 ms point-to-point link.
    pub fn connect(&mut self, from: NodeId, to: NodeId) {
        self.connect_with_link(from, to, Link::default());
    }

    pub fn connect_with_link(&mut self, from: NodeId, to: NodeId, link: Link) {
        self.sim.connect_node(from, to, link);
    }

    pub fn start_app(&mut self, id: NodeId, start_s: f64, stop_s: f64) {
        self.sim.start_app(id, secs_to_us(start_s), secs_to_us(stop_s));
    }

    pub fn run_until(&mut self, secs: f64) {
        self.sim.run_until(secs_to_us(secs));
    }

    pub fn is_running(&self, id: NodeId) -> bool {
        self.sim.components.get(&id).map(|c| c.is_running()).unwrap_or(false)
    }
}

/// Checks one client's requests as the server saw them: every session walks
/// pages 1.. and objects 1.. with no gaps or repeats.
pub fn assert_ascending(served: &[ServedRequest]) {
    let mut prev: Option<(u32, u32)> = None;
    for s in served {
        let cur = (s.page, s.object);
        let ok = match prev {
            None => cur == (1, 1),
            Some((page, object)) => {
                cur == (page, object + 1) || cur == (page + 1, 1) || cur == (1, 1)
            }
        };
        assert!(ok, "{cur:?} cannot follow {prev:?}");
        prev = Some(cur);
    }
}
