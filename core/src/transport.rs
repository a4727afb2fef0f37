//! Connection contract between the HTTP applications and the simulated
//! transport: connection ids, MSS segmentation, reassembly and the request
//! body the client prefixes to every request.

use crate::engine::{EventType, ScheduleCmd};
use crate::header::{HttpSeqHeader, Packet};
use crate::traits::NodeId;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_MSS: u32 = 536;
/// TCP/IP header bytes added to every segment on the wire.
pub const SEGMENT_OVERHEAD: u64 = 40;
/// SYN, SYN/ACK and FIN are bare headers.
pub const CONTROL_SEGMENT_SIZE: u64 = SEGMENT_OVERHEAD;

/// Opaque connection handle. The client that opened it owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnId {
    pub client: NodeId,
    pub seq: u32,
}

pub fn connect(server: NodeId, conn: ConnId) -> ScheduleCmd {
    ScheduleCmd::wire(server, EventType::Connect { conn }, CONTROL_SEGMENT_SIZE)
}

pub fn accept(conn: ConnId) -> ScheduleCmd {
    ScheduleCmd::wire(conn.client, EventType::Connected { conn }, CONTROL_SEGMENT_SIZE)
}

pub fn close(peer: NodeId, conn: ConnId) -> ScheduleCmd {
    ScheduleCmd::wire(peer, EventType::Close { conn }, CONTROL_SEGMENT_SIZE)
}

/// Split a message of `header.length()` payload bytes into MSS-sized
/// fragments. `body` (stored bytes) leads the first fragment; the rest is padding.
pub fn send(peer: NodeId, conn: ConnId, header: HttpSeqHeader, body: &[u8], mss: u32) -> Vec<ScheduleCmd> {
    let mss = mss.max(1);
    let total = header.length().max(body.len() as u32);
    let mut cmds = Vec::new();
    let mut offset = 0u32;
    loop {
        let chunk = (total - offset).min(mss);
        let stored = if offset == 0 { &body[..body.len().min(chunk as usize)] } else { &[][..] };
        let mut packet = Packet::new(stored, chunk - stored.len() as u32);
        packet.add_header(&header);
        let bytes = packet.size() + SEGMENT_OVERHEAD;
        cmds.push(ScheduleCmd::wire(peer, EventType::Segment { conn, packet }, bytes));
        offset += chunk;
        if offset >= total {
            break;
        }
    }
    cmds
}

/// What the client tells the server about the reply it expects.
/// Unset fields are left to the server's own distributions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestDirective {
    pub response_size: Option<u32>,
    pub server_delay_us: Option<u32>,
    pub persistent: bool,
}

impl RequestDirective {
    pub const SIZE: usize = 12;

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_u32(self.response_size.unwrap_or(0));
        buf.put_u32(self.server_delay_us.unwrap_or(u32::MAX));
        buf.put_u32(u32::from(self.persistent));
        buf
    }

    pub fn decode(mut buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }
        let size = buf.get_u32();
        let delay = buf.get_u32();
        let flags = buf.get_u32();
        Some(Self {
            response_size: (size != 0).then_some(size),
            server_delay_us: (delay != u32::MAX).then_some(delay),
            persistent: flags & 1 == 1,
        })
    }
}

#[derive(Debug)]
pub enum Progress {
    Partial,
    Complete { header: HttpSeqHeader, body: Bytes },
}

#[derive(Debug, Default)]
struct Partial {
    received: u64,
    body: Bytes,
}

/// Collects fragments per (page, object) until the declared length arrived.
#[derive(Debug, Default)]
pub struct Reassembler {
    partial: HashMap<(u32, u32), Partial>,
}

impl Reassembler {
    /// `packet` must already have its header removed.
    pub fn accept(&mut self, header: HttpSeqHeader, packet: &Packet) -> Progress {
        let key = (header.page(), header.object());
        let entry = self.partial.entry(key).or_insert_with(|| Partial {
            received: 0,
            body: packet.body(),
        });
        entry.received += packet.size();
        if entry.received >= u64::from(header.length()) {
            let done = self.partial.remove(&key).unwrap_or_default();
            Progress::Complete { header, body: done.body }
        } else {
            Progress::Partial
        }
    }

    pub fn in_flight(&self) -> usize {
        self.partial.len()
    }
}
