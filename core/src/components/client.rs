use crate::analytics::ClientStats;
use crate::engine::{Event, EventType, ScheduleCmd};
use crate::error::ConfigError;
use crate::header::{HttpSeqHeader, Packet};
use crate::random::VariableKind;
use crate::runtime::RuntimeVariable;
use crate::traits::{Component, NodeId};
use crate::transport::{self, ConnId, Progress, Reassembler, RequestDirective, DEFAULT_MSS};
use crate::secs_to_us;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub remote: Option<NodeId>,
    pub run_no: u64,
    /// Sessions to run back to back; 0 runs until the application stops.
    pub max_sessions: u32,
    pub user_pages: u32,
    pub user_objects: u32,
    pub user_request_size: u32,
    /// Declared reply size; 0 leaves it to the server.
    pub user_response_size: u32,
    pub user_server_delay: f64, // seconds
    pub user_request_gap: f64,  // seconds
    pub http1_1: bool,
    pub force_persistent: Option<bool>,
    pub automatic: bool,
    pub mss: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            remote: None,
            run_no: 1,
            max_sessions: 0,
            user_pages: 1,
            user_objects: 1,
            user_request_size: 100,
            user_response_size: 100,
            user_server_delay: 0.1,
            user_request_gap: 0.1,
            http1_1: false,
            force_persistent: None,
            automatic: true,
            mss: DEFAULT_MSS,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if (self.mss as usize) < RequestDirective::SIZE {
            return invalid(format!("mss {} is below the {}-byte request body", self.mss, RequestDirective::SIZE));
        }
        if !self.automatic {
            let max_index = u32::from(u16::MAX);
            if self.user_pages == 0 || self.user_pages > max_index {
                return invalid(format!("user_pages {} outside 1..={max_index}", self.user_pages));
            }
            if self.user_objects == 0 || self.user_objects > max_index {
                return invalid(format!("user_objects {} outside 1..={max_index}", self.user_objects));
            }
        }
        let max_delay = f64::from(u32::MAX - 1) / crate::US_PER_SEC;
        if !(self.user_server_delay.is_finite() && (0.0..=max_delay).contains(&self.user_server_delay)) {
            return invalid(format!("user_server_delay {} outside 0..={max_delay}", self.user_server_delay));
        }
        if !(self.user_request_gap.is_finite() && self.user_request_gap >= 0.0) {
            return invalid(format!("user_request_gap {} must be non-negative", self.user_request_gap));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientState {
    Idle,
    SessionActive,
    PageActive,
    ObjectPending,
    SessionComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectRequest {
    pub page: u32,
    pub object: u32,
    pub request_size: u32,
    pub response_size: Option<u32>,
    pub server_delay_us: Option<u32>,
    pub persistent: bool,
}

#[derive(Debug)]
struct Session {
    id: u64,
    target_pages: u32,
    page: u32,
}

#[derive(Debug)]
struct Page {
    index: u32,
    target_objects: u32,
    objects_done: u32,
    persistent: bool,
}

#[derive(Debug)]
struct Pending {
    request: ObjectRequest,
    issued_at: u64,
    sent: bool,
}

#[derive(Debug, Clone, Copy)]
struct Connection {
    id: ConnId,
    established: bool,
}

/// Browsing client: runs sessions of pages of objects against one server.
pub struct Client {
    pub name: String,
    pub config: Arc<RwLock<ClientConfig>>,
    pub stats: Arc<RwLock<ClientStats>>,
    runtime: Arc<RuntimeVariable>,
    node_id: NodeId,
    running: bool,
    state: ClientState,
    generation: u64,
    session: Option<Session>,
    page: Option<Page>,
    pending: Option<Pending>,
    conn: Option<Connection>,
    next_conn_seq: u32,
    inbound: Reassembler,
}

impl Client {
    /// Standalone client with its own runtime parameters seeded from `run_no`.
    pub fn new(name: &str, config: ClientConfig) -> Result<Self, ConfigError> {
        let runtime = Arc::new(RuntimeVariable::new(config.run_no)?);
        Self::with_runtime(name, config, runtime)
    }

    pub fn with_runtime(name: &str, config: ClientConfig, runtime: Arc<RuntimeVariable>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            name: name.to_string(),
            config: Arc::new(RwLock::new(config)),
            stats: Arc::new(RwLock::new(ClientStats::default())),
            runtime,
            node_id: 0,
            running: false,
            state: ClientState::Idle,
            generation: 0,
            session: None,
            page: None,
            pending: None,
            conn: None,
            next_conn_seq: 0,
            inbound: Reassembler::default(),
        })
    }

    pub fn from_json(data: serde_json::Value, runtime: Arc<RuntimeVariable>) -> Result<Self, ConfigError> {
        let config = if data.is_null() { ClientConfig::default() } else { serde_json::from_value(data)? };
        Self::with_runtime("Client", config, runtime)
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn received(&self) -> u64 {
        self.stats.read().unwrap_or_else(PoisonError::into_inner).objects_received
    }

    pub fn failed(&self) -> u64 {
        self.stats.read().unwrap_or_else(PoisonError::into_inner).delivery_failures
    }

    pub fn connections_opened(&self) -> u64 {
        self.stats.read().unwrap_or_else(PoisonError::into_inner).connections_opened
    }

    pub fn sessions_completed(&self) -> u64 {
        self.stats.read().unwrap_or_else(PoisonError::into_inner).sessions_completed
    }

    pub fn runtime(&self) -> &Arc<RuntimeVariable> {
        &self.runtime
    }

    fn settings(&self) -> ClientConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn stats_mut(&self) -> RwLockWriteGuard<'_, ClientStats> {
        self.stats.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn start(&mut self, now: u64) -> Vec<ScheduleCmd> {
        if self.running {
            return vec![];
        }
        if let Err(e) = self.settings().validate() {
            warn!("{}: not starting, {e}", self.name);
            return vec![];
        }
        self.running = true;
        self.generation += 1;
        self.state = ClientState::Idle;
        self.start_session(now)
    }

    fn stop(&mut self) -> Vec<ScheduleCmd> {
        if !self.running {
            return vec![];
        }
        self.running = false;
        self.generation += 1;
        if let Some(p) = &self.pending {
            debug!("{}: abandoning page {} object {}", self.name, p.request.page, p.request.object);
        }
        let cmds = match self.settings().remote {
            Some(remote) => self.close_connection(remote),
            None => vec![],
        };
        self.session = None;
        self.page = None;
        self.pending = None;
        self.inbound = Reassembler::default();
        self.state = ClientState::Idle;
        cmds
    }

    fn start_session(&mut self, now: u64) -> Vec<ScheduleCmd> {
        let cfg = self.settings();
        if cfg.remote.is_none() {
            warn!("{}: no remote configured", self.name);
            return vec![];
        }
        let id = {
            let mut stats = self.stats_mut();
            if cfg.max_sessions > 0 && stats.sessions_started >= u64::from(cfg.max_sessions) {
                return vec![];
            }
            stats.sessions_started += 1;
            stats.sessions_started
        };
        let target_pages = if cfg.automatic {
            self.runtime.sample_count(VariableKind::NumPages)
        } else {
            cfg.user_pages
        };
        info!("{}: session {id} starts at {now}us with {target_pages} pages", self.name);
        self.session = Some(Session { id, target_pages, page: 0 });
        self.state = ClientState::SessionActive;
        self.start_page(now)
    }

    fn decide_persistence(&self, cfg: &ClientConfig, objects: u32) -> bool {
        match cfg.force_persistent {
            Some(forced) => forced,
            // HTTP/1.1 keeps the connection when the page has embedded objects.
            None if cfg.http1_1 => objects > 1,
            None if cfg.automatic => self.runtime.sample_flag(VariableKind::Persistent),
            None => false,
        }
    }

    fn start_page(&mut self, now: u64) -> Vec<ScheduleCmd> {
        let cfg = self.settings();
        let Some(remote) = cfg.remote else { return vec![] };
        let Some(session) = self.session.as_mut() else { return vec![] };
        session.page += 1;
        let index = session.page;

        let target_objects = if cfg.automatic {
            self.runtime.sample_count(VariableKind::ObjsPerPage)
        } else {
            cfg.user_objects
        };
        let persistent = self.decide_persistence(&cfg, target_objects);
        debug!("{}: page {index} with {target_objects} objects, persistent={persistent}", self.name);

        let mut cmds = Vec::new();
        if !persistent {
            cmds.extend(self.close_connection(remote));
        }
        self.page = Some(Page { index, target_objects, objects_done: 0, persistent });
        self.state = ClientState::PageActive;
        cmds.extend(self.issue_object(now));
        cmds
    }

    fn issue_object(&mut self, now: u64) -> Vec<ScheduleCmd> {
        let cfg = self.settings();
        let Some(remote) = cfg.remote else { return vec![] };
        let Some(page) = &self.page else { return vec![] };

        let request_size = if cfg.automatic {
            self.runtime.sample_bytes(VariableKind::ReqSize)
        } else {
            cfg.user_request_size
        };
        let (response_size, server_delay_us) = if cfg.automatic {
            (None, None)
        } else {
            let delay = u32::try_from(secs_to_us(cfg.user_server_delay)).unwrap_or(u32::MAX - 1);
            (Some(cfg.user_response_size), Some(delay))
        };
        let request = ObjectRequest {
            page: page.index,
            object: page.objects_done + 1,
            request_size: request_size.max(RequestDirective::SIZE as u32),
            response_size,
            server_delay_us,
            persistent: page.persistent,
        };
        self.pending = Some(Pending { request, issued_at: now, sent: false });
        self.inbound = Reassembler::default();
        self.state = ClientState::ObjectPending;
        self.stats_mut().objects_requested += 1;

        match self.conn {
            Some(Connection { established: true, .. }) => self.send_request(remote, cfg.mss),
            // Handshake in flight; the request leaves on `Connected`.
            Some(_) => vec![],
            None => self.open_connection(remote),
        }
    }

    fn open_connection(&mut self, remote: NodeId) -> Vec<ScheduleCmd> {
        let id = ConnId { client: self.node_id, seq: self.next_conn_seq };
        self.next_conn_seq += 1;
        self.conn = Some(Connection { id, established: false });
        self.stats_mut().connections_opened += 1;
        vec![transport::connect(remote, id)]
    }

    fn close_connection(&mut self, remote: NodeId) -> Vec<ScheduleCmd> {
        match self.conn.take() {
            Some(c) => vec![transport::close(remote, c.id)],
            None => vec![],
        }
    }

    fn send_request(&mut self, remote: NodeId, mss: u32) -> Vec<ScheduleCmd> {
        let (Some(conn), Some(pending)) = (self.conn, self.pending.as_mut()) else {
            return vec![];
        };
        let req = pending.request;
        let header = match HttpSeqHeader::new(req.request_size, req.object, req.page) {
            Ok(h) => h,
            Err(e) => {
                warn!("{}: cannot frame request: {e}", self.name);
                return vec![];
            }
        };
        pending.sent = true;
        let directive = RequestDirective {
            response_size: req.response_size,
            server_delay_us: req.server_delay_us,
            persistent: req.persistent,
        };
        self.stats_mut().bytes_requested += u64::from(req.request_size);
        transport::send(remote, conn.id, header, &directive.encode(), mss)
    }

    fn on_connected(&mut self, conn: ConnId) -> Vec<ScheduleCmd> {
        match self.conn.as_mut() {
            Some(c) if c.id == conn => c.established = true,
            _ => {
                debug!("{}: accept for stale connection {conn:?}", self.name);
                return vec![];
            }
        }
        let cfg = self.settings();
        let unsent = self.pending.as_ref().is_some_and(|p| !p.sent);
        match cfg.remote {
            Some(remote) if unsent => self.send_request(remote, cfg.mss),
            _ => vec![],
        }
    }

    fn on_segment(&mut self, conn: ConnId, mut packet: Packet, now: u64) -> Vec<ScheduleCmd> {
        if self.conn.map(|c| c.id) != Some(conn) {
            debug!("{}: segment for closed connection {conn:?}", self.name);
            return vec![];
        }
        let Some(pending) = &self.pending else { return vec![] };
        let expected = (pending.request.page, pending.request.object);

        let header = match packet.remove_header() {
            Ok((h, _)) => h,
            Err(e) => {
                warn!("{}: discarding fragment: {e}", self.name);
                self.stats_mut().delivery_failures += 1;
                return vec![];
            }
        };
        if (header.page(), header.object()) != expected {
            warn!(
                "{}: reply for page {} object {} while waiting on {expected:?}",
                self.name,
                header.page(),
                header.object()
            );
            self.stats_mut().delivery_failures += 1;
            return vec![];
        }
        match self.inbound.accept(header, &packet) {
            Progress::Partial => vec![],
            Progress::Complete { header, .. } => self.complete_object(now, header.length()),
        }
    }

    fn complete_object(&mut self, now: u64, bytes: u32) -> Vec<ScheduleCmd> {
        let cfg = self.settings();
        let Some(remote) = cfg.remote else { return vec![] };
        let Some(pending) = self.pending.take() else { return vec![] };
        {
            let mut stats = self.stats_mut();
            stats.objects_received += 1;
            stats.bytes_received += u64::from(bytes);
            stats.response_times.record(now.saturating_sub(pending.issued_at));
        }

        let Some(page) = self.page.as_mut() else { return vec![] };
        page.objects_done += 1;
        let (done, target, persistent) = (page.objects_done, page.target_objects, page.persistent);
        debug!(
            "{}: page {} object {} complete after {}us",
            self.name,
            pending.request.page,
            pending.request.object,
            now.saturating_sub(pending.issued_at)
        );

        let mut cmds = Vec::new();
        if !persistent {
            cmds.extend(self.close_connection(remote));
        }
        if done < target {
            self.state = ClientState::PageActive;
            let gap = if cfg.automatic {
                self.runtime.sample_us(VariableKind::TimeBtwnObjs)
            } else {
                secs_to_us(cfg.user_request_gap)
            };
            cmds.push(ScheduleCmd::local(gap, self.node_id, EventType::NextObject { generation: self.generation }));
            return cmds;
        }

        self.page = None;
        self.stats_mut().pages_completed += 1;
        let more_pages = self.session.as_ref().is_some_and(|s| s.page < s.target_pages);
        if more_pages {
            self.state = ClientState::SessionActive;
            let gap = if cfg.automatic {
                self.runtime.sample_us(VariableKind::TimeBtwnPages)
            } else {
                secs_to_us(cfg.user_request_gap)
            };
            cmds.push(ScheduleCmd::local(gap, self.node_id, EventType::NextPage { generation: self.generation }));
        } else {
            cmds.extend(self.finish_session(now, &cfg, remote));
        }
        cmds
    }

    fn finish_session(&mut self, now: u64, cfg: &ClientConfig, remote: NodeId) -> Vec<ScheduleCmd> {
        let mut cmds = self.close_connection(remote);
        let id = self.session.take().map_or(0, |s| s.id);
        self.state = ClientState::SessionComplete;
        let started = {
            let mut stats = self.stats_mut();
            stats.sessions_completed += 1;
            stats.sessions_started
        };
        info!("{}: session {id} complete at {now}us", self.name);

        if cfg.max_sessions == 0 || started < u64::from(cfg.max_sessions) {
            let gap = if cfg.automatic {
                self.runtime.sample_us(VariableKind::FlowArrive)
            } else {
                secs_to_us(cfg.user_request_gap)
            };
            cmds.push(ScheduleCmd::local(gap, self.node_id, EventType::NextSession { generation: self.generation }));
        }
        cmds
    }
}

impl Component for Client {
    fn on_event(&mut self, event: Event) -> Vec<ScheduleCmd> {
        self.node_id = event.node_id;
        let now = event.time;
        let current = self.generation;

        match event.event_type {
            EventType::AppStart => self.start(now),
            EventType::AppStop => self.stop(),
            _ if !self.running => vec![],
            EventType::NextSession { generation } if generation == current => {
                self.state = ClientState::Idle;
                self.start_session(now)
            }
            EventType::NextPage { generation } if generation == current => self.start_page(now),
            EventType::NextObject { generation } if generation == current => self.issue_object(now),
            EventType::Connected { conn } => self.on_connected(conn),
            EventType::Segment { conn, packet } => self.on_segment(conn, packet, now),
            EventType::Close { conn } => {
                if self.conn.map(|c| c.id) == Some(conn) {
                    debug!("{}: server closed {conn:?}", self.name);
                    self.conn = None;
                }
                vec![]
            }
            _ => vec![],
        }
    }
    fn name(&self) -> &str { &self.name }
    fn kind(&self) -> &str { "HttpClient" }
    fn encode_config(&self) -> serde_json::Value {
        serde_json::to_value(self.settings()).unwrap_or(serde_json::Value::Null)
    }
    fn is_running(&self) -> bool { self.running }
    fn add_target(&mut self, target: NodeId) {
        self.config.write().unwrap_or_else(PoisonError::into_inner).remote = Some(target);
    }
    fn get_targets(&self) -> Vec<NodeId> { self.settings().remote.into_iter().collect() }
}
