use crate::header::{HttpSeqHeader, Packet};
use crate::network::{canonical_key, Link};
use crate::traits::{Component, NodeId};
use crate::transport::ConnId;
use log::{debug, warn};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

#[derive(Debug, Clone)]
pub enum EventType {
    AppStart,
    AppStop,
    /// Connection request, delivered to the server.
    Connect { conn: ConnId },
    /// Connection accepted, delivered to the client.
    Connected { conn: ConnId },
    Segment { conn: ConnId, packet: Packet },
    Close { conn: ConnId },
    NextSession { generation: u64 },
    NextPage { generation: u64 },
    NextObject { generation: u64 },
    /// Server processing finished; `header` describes the reply to send.
    ReplyReady { conn: ConnId, header: HttpSeqHeader },
}

#[derive(Debug, Clone)]
pub struct Event {
    pub time: u64,
    pub seq: u64,
    pub node_id: NodeId,
    pub event_type: EventType,
}

// Time order, then scheduling order for simultaneous events.
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        (self.time, self.seq) == (other.time, other.seq)
    }
}
impl Eq for Event {}
impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Event {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.time, self.seq).cmp(&(other.time, other.seq))
    }
}

pub struct ScheduleCmd {
    pub delay: u64,
    pub node_id: NodeId,
    pub event_type: EventType,
    /// Bytes on the wire. When set, the event crosses the link from the
    /// emitting node to `node_id` and pays its transmission and latency.
    pub wire_bytes: Option<u64>,
}

impl ScheduleCmd {
    pub fn local(delay: u64, node_id: NodeId, event_type: EventType) -> Self {
        Self { delay, node_id, event_type, wire_bytes: None }
    }

    pub fn wire(node_id: NodeId, event_type: EventType, bytes: u64) -> Self {
        Self { delay: 0, node_id, event_type, wire_bytes: Some(bytes) }
    }
}

pub struct Simulation {
    pub time: u64,
    pub components: HashMap<NodeId, Box<dyn Component>>,
    pub links: HashMap<(NodeId, NodeId), Link>,
    pub events: BinaryHeap<Reverse<Event>>,
    pub dispatched: u64,
    pub dropped: u64,
    next_seq: u64,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    pub fn new() -> Self {
        Self {
            time: 0,
            components: HashMap::new(),
            links: HashMap::new(),
            events: BinaryHeap::new(),
            dispatched: 0,
            dropped: 0,
            next_seq: 0,
        }
    }

    pub fn add_component(&mut self, id: NodeId, component: Box<dyn Component>) {
        self.components.insert(id, component);
    }

    pub fn connect_node(&mut self, from: NodeId, to: NodeId, link: Link) {
        self.links.insert(canonical_key(from, to), link);
        if let Some(comp) = self.components.get_mut(&from) {
            comp.add_target(to);
        }
    }

    pub fn schedule(&mut self, time: u64, node_id: NodeId, event_type: EventType) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(Reverse(Event {
            time,
            seq,
            node_id,
            event_type,
        }));
    }

    /// Schedule the start and stop of the application on `node_id`.
    pub fn start_app(&mut self, node_id: NodeId, start_us: u64, stop_us: u64) {
        self.schedule(start_us, node_id, EventType::AppStart);
        self.schedule(stop_us, node_id, EventType::AppStop);
    }

    /// Drop every pending event addressed to `node_id`.
    pub fn cancel_all(&mut self, node_id: NodeId) -> usize {
        let before = self.events.len();
        self.events.retain(|Reverse(e)| e.node_id != node_id);
        before - self.events.len()
    }

    /// Drop the application's timers and deliveries on `node_id`, keeping any
    /// start/stop already scheduled for it.
    pub fn cancel_activity(&mut self, node_id: NodeId) -> usize {
        let before = self.events.len();
        self.events.retain(|Reverse(e)| {
            e.node_id != node_id || matches!(e.event_type, EventType::AppStart | EventType::AppStop)
        });
        before - self.events.len()
    }

    pub fn pending_for(&self, node_id: NodeId) -> usize {
        self.events.iter().filter(|Reverse(e)| e.node_id == node_id).count()
    }

    fn route(&mut self, from: NodeId, cmd: ScheduleCmd) {
        let at = self.time + cmd.delay;
        let at = match cmd.wire_bytes {
            None => at,
            Some(bytes) => match self.links.get_mut(&canonical_key(from, cmd.node_id)) {
                Some(link) => link.transmit(from, cmd.node_id, at, bytes),
                None => {
                    warn!("no link {from} -> {}, dropping {:?}", cmd.node_id, cmd.event_type);
                    self.dropped += 1;
                    return;
                }
            },
        };
        self.schedule(at, cmd.node_id, cmd.event_type);
    }

    pub fn step(&mut self) -> bool {
        let Some(Reverse(event)) = self.events.pop() else {
            return false;
        };
        self.time = event.time;
        self.dispatched += 1;
        let node_id = event.node_id;
        let stopping = matches!(event.event_type, EventType::AppStop);

        let cmds = match self.components.get_mut(&node_id) {
            Some(comp) => comp.on_event(event),
            None => Vec::new(),
        };
        for cmd in cmds {
            self.route(node_id, cmd);
        }
        if stopping {
            let cancelled = self.cancel_activity(node_id);
            let name = self.components.get(&node_id).map_or("?", |c| c.name());
            debug!("{name} (node {node_id}) stopped at {}us, {cancelled} events cancelled", self.time);
        }
        true
    }

    /// Dispatch every event up to and including `end_us`, then park the clock there.
    pub fn run_until(&mut self, end_us: u64) {
        while let Some(Reverse(next)) = self.events.peek() {
            if next.time > end_us {
                break;
            }
            self.step();
        }
        self.time = self.time.max(end_us);
    }

    pub fn run(&mut self) {
        while self.step() {}
    }
}
