use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use crate::analytics::{ServedRequest, ServerStats};
use crate::engine::{Event, EventType, ScheduleCmd};
use crate::error::ConfigError;
use crate::header::{HttpSeqHeader, Packet};
use crate::random::VariableKind;
use crate::runtime::RuntimeVariable;
use crate::traits::{Component, NodeId};
use crate::transport::{self, ConnId, Progress, Reassembler, RequestDirective, DEFAULT_MSS};
use log::{debug, warn};
use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub mss: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { mss: DEFAULT_MSS }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mss == 0 {
            return Err(ConfigError::Invalid("server mss must be positive".to_string()));
        }
        Ok(())
    }
}

/// Per-connection state. Nothing is shared between connections.
#[derive(Debug, Default)]
struct Inbound {
    requests: Reassembler,
}

pub struct Server {
    pub name: String,
    pub config: Arc<RwLock<ServerConfig>>,
    pub stats: Arc<RwLock<ServerStats>>,
    runtime: Arc<RuntimeVariable>,
    running: bool,
    connections: BTreeMap<ConnId, Inbound>,
}

impl Server {
    pub fn new(name: &str, config: ServerConfig, runtime: Arc<RuntimeVariable>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            name: name.to_string(),
            config: Arc::new(RwLock::new(config)),
            stats: Arc::new(RwLock::new(ServerStats::default())),
            runtime,
            running: false,
            connections: BTreeMap::new(),
        })
    }

    pub fn from_json(data: serde_json::Value, runtime: Arc<RuntimeVariable>) -> Result<Self, ConfigError> {
        let config = if data.is_null() { ServerConfig::default() } else { serde_json::from_value(data)? };
        Self::new("Server", config, runtime)
    }

    pub fn open_connections(&self) -> usize {
        self.connections.len()
    }

    fn stats_mut(&self) -> RwLockWriteGuard<'_, ServerStats> {
        self.stats.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn mss(&self) -> u32 {
        self.config.read().unwrap_or_else(PoisonError::into_inner).mss
    }

    fn response_size(&self, object: u32, persistent: bool) -> u32 {
        let kind = if object == 1 {
            VariableKind::SingleObj
        } else if persistent {
            VariableKind::PersistRspSize
        } else {
            VariableKind::NonPersistRspSize
        };
        self.runtime.sample_bytes(kind).max(1)
    }

    fn on_segment(&mut self, node_id: NodeId, conn: ConnId, mut packet: Packet) -> Vec<ScheduleCmd> {
        let header = match packet.remove_header() {
            Ok((h, _)) => h,
            Err(e) => {
                warn!("{}: discarding fragment on {conn:?}: {e}", self.name);
                self.stats_mut().malformed += 1;
                return vec![];
            }
        };
        let Some(inbound) = self.connections.get_mut(&conn) else {
            debug!("{}: segment for unknown connection {conn:?}", self.name);
            return vec![];
        };
        let body = match inbound.requests.accept(header, &packet) {
            Progress::Partial => return vec![],
            Progress::Complete { body, .. } => body,
        };
        let Some(directive) = RequestDirective::decode(&body) else {
            warn!("{}: request body on {conn:?} is {} bytes, need {}", self.name, body.len(), RequestDirective::SIZE);
            self.stats_mut().malformed += 1;
            return vec![];
        };
        self.stats_mut().requests_received += 1;

        let size = directive
            .response_size
            .unwrap_or_else(|| self.response_size(header.object(), directive.persistent));
        let delay = directive
            .server_delay_us
            .map(u64::from)
            .unwrap_or_else(|| self.runtime.sample_us(VariableKind::ServerDelay));

        // Indices came off a valid header, so they fit.
        let mut reply = header;
        reply.set_length(size);
        debug!(
            "{}: page {} object {} from node {} -> {size} bytes after {delay}us",
            self.name,
            header.page(),
            header.object(),
            conn.client
        );
        vec![ScheduleCmd::local(delay, node_id, EventType::ReplyReady { conn, header: reply })]
    }

    fn on_reply_ready(&mut self, conn: ConnId, header: HttpSeqHeader) -> Vec<ScheduleCmd> {
        if !self.connections.contains_key(&conn) {
            debug!("{}: {conn:?} closed before the reply was ready", self.name);
            return vec![];
        }
        {
            let mut stats = self.stats_mut();
            stats.bytes_sent += u64::from(header.length());
            stats.served.push(ServedRequest {
                client: conn.client,
                conn_seq: conn.seq,
                page: header.page(),
                object: header.object(),
                response_size: header.length(),
            });
        }
        transport::send(conn.client, conn, header, &[], self.mss())
    }
}

impl Component for Server {
    fn on_event(&mut self, event: Event) -> Vec<ScheduleCmd> {
        match event.event_type {
            EventType::AppStart => {
                self.running = true;
                vec![]
            }
            EventType::AppStop => {
                self.running = false;
                let open = std::mem::take(&mut self.connections);
                open.into_keys().map(|conn| transport::close(conn.client, conn)).collect()
            }
            _ if !self.running => vec![],
            EventType::Connect { conn } => {
                self.connections.insert(conn, Inbound::default());
                self.stats_mut().connections_accepted += 1;
                vec![transport::accept(conn)]
            }
            EventType::Segment { conn, packet } => self.on_segment(event.node_id, conn, packet),
            EventType::ReplyReady { conn, header } => self.on_reply_ready(conn, header),
            EventType::Close { conn } => {
                if let Some(inbound) = self.connections.remove(&conn) {
                    if inbound.requests.in_flight() > 0 {
                        debug!("{}: {conn:?} closed with a partial request", self.name);
                    }
                }
                vec![]
            }
            _ => vec![],
        }
    }
    fn name(&self) -> &str { &self.name }
    fn kind(&self) -> &str { "HttpServer" }
    fn encode_config(&self) -> serde_json::Value {
        serde_json::to_value(&*self.config.read().unwrap_or_else(PoisonError::into_inner)).unwrap_or(serde_json::Value::Null)
    }
    fn is_running(&self) -> bool { self.running }
    fn add_target(&mut self, _target: NodeId) {}
    fn get_targets(&self) -> Vec<NodeId> { vec![] }
}
