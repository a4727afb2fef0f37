//! The per-fragment sequencing header and the frame it rides on.
//!
//! Wire layout, big-endian:
//!
//! ```text
//!  0               4       6       8
//!  +---------------+-------+-------+
//!  |    length     | object|  page |
//!  +---------------+-------+-------+
//! ```
//!
//! `length` is the payload size of the whole object message. Object and page
//! indices wider than 16 bits are rejected, never wrapped.

use crate::error::HeaderError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

pub const HTTP_SEQ_HEADER_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSeqHeader {
    length: u32,
    object: u16,
    page: u16,
}

fn narrow(field: &'static str, value: u32) -> Result<u16, HeaderError> {
    u16::try_from(value).map_err(|_| HeaderError::FieldOverflow { field, value })
}

impl HttpSeqHeader {
    pub fn new(length: u32, object: u32, page: u32) -> Result<Self, HeaderError> {
        Ok(Self {
            length,
            object: narrow("object", object)?,
            page: narrow("page", page)?,
        })
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn set_length(&mut self, length: u32) {
        self.length = length;
    }

    pub fn object(&self) -> u32 {
        u32::from(self.object)
    }

    pub fn set_object(&mut self, object: u32) -> Result<(), HeaderError> {
        self.object = narrow("object", object)?;
        Ok(())
    }

    pub fn page(&self) -> u32 {
        u32::from(self.page)
    }

    pub fn set_page(&mut self, page: u32) -> Result<(), HeaderError> {
        self.page = narrow("page", page)?;
        Ok(())
    }

    pub fn serialized_size(&self) -> usize {
        HTTP_SEQ_HEADER_SIZE
    }

    pub fn serialize<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32(self.length);
        buf.put_u16(self.object);
        buf.put_u16(self.page);
    }

    pub fn to_bytes(&self) -> [u8; HTTP_SEQ_HEADER_SIZE] {
        let mut out = [0u8; HTTP_SEQ_HEADER_SIZE];
        self.serialize(&mut &mut out[..]);
        out
    }

    /// Reads one header from the front of `buf`, advancing it by 8 bytes.
    pub fn deserialize<B: Buf>(buf: &mut B) -> Result<Self, HeaderError> {
        if buf.remaining() < HTTP_SEQ_HEADER_SIZE {
            return Err(HeaderError::Truncated {
                needed: HTTP_SEQ_HEADER_SIZE,
                available: buf.remaining(),
            });
        }
        Ok(Self {
            length: buf.get_u32(),
            object: buf.get_u16(),
            page: buf.get_u16(),
        })
    }
}

/// A transport frame: real bytes (headers, request body) followed by
/// `padding` bytes of opaque payload that are only counted, never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    data: BytesMut,
    padding: u32,
}

impl Packet {
    pub fn new(body: &[u8], padding: u32) -> Self {
        Self {
            data: BytesMut::from(body),
            padding,
        }
    }

    pub fn with_padding(padding: u32) -> Self {
        Self::new(&[], padding)
    }

    pub fn add_header(&mut self, header: &HttpSeqHeader) {
        let mut framed = BytesMut::with_capacity(header.serialized_size() + self.data.len());
        header.serialize(&mut framed);
        framed.extend_from_slice(&self.data);
        self.data = framed;
    }

    /// Strips the leading header and reports how many bytes it occupied.
    pub fn remove_header(&mut self) -> Result<(HttpSeqHeader, usize), HeaderError> {
        let before = self.data.len();
        let header = HttpSeqHeader::deserialize(&mut self.data)?;
        Ok((header, before - self.data.len()))
    }

    /// Stored bytes not yet consumed by `remove_header`.
    pub fn body(&self) -> Bytes {
        self.data.clone().freeze()
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64 + u64::from(self.padding)
    }
}
