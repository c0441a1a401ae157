//! Module that contains the fixed-size records exchanged between the ringmaster and the players.
//!
//! Records carry no delimiter or length prefix: both ends know which record
//! comes next from where they are in the protocol, so the codec is told what
//! to expect (see [`Expect`]) before each read. All integers are big-endian.

use crate::error::RingError;
use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;
use std::io;
use tokio_util::codec::{Decoder, Encoder};

/// Maximum number of positions a token can record.
pub const TRACE_CAPACITY: usize = 512;

/// Width of the textual address field, enough for any IPv6 address.
pub const ADDRESS_FIELD_LEN: usize = 46;

/// `remaining_hops` value that tells players the game is over.
pub const STOP_SENTINEL: i32 = -1;

pub const HANDSHAKE_LEN: usize = 8;
pub const PORT_REPORT_LEN: usize = 4;
pub const TOPOLOGY_RECORD_LEN: usize = ADDRESS_FIELD_LEN + 4;
pub const TOKEN_RECORD_LEN: usize = 8 + 4 * TRACE_CAPACITY;

/// Errors raised while framing records.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("stream ended after {available} of {expected} bytes")]
    Truncated { expected: usize, available: usize },

    #[error("{0}")]
    Malformed(String),
}

/// Position and ring size, sent by the ringmaster right after accepting a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    pub position: usize,
    pub ring_size: usize,
}

/// Endpoint of a player's listener, relayed to its successor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyRecord {
    pub address: String,
    pub port: u16,
}

/// Ordered positions visited by the token, bounded by [`TRACE_CAPACITY`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Trace(Vec<u32>);

/// The hot potato.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub remaining_hops: i32,
    pub trace: Trace,
}

/// Every record that can travel over a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Handshake(Handshake),
    PortReport(u16),
    Topology(TopologyRecord),
    Token(Token),
}

/// Which record the next read on a link must produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    Handshake,
    PortReport,
    Topology,
    Token,
}

impl Expect {
    pub fn record_len(self) -> usize {
        match self {
            Self::Handshake => HANDSHAKE_LEN,
            Self::PortReport => PORT_REPORT_LEN,
            Self::Topology => TOPOLOGY_RECORD_LEN,
            Self::Token => TOKEN_RECORD_LEN,
        }
    }
}

impl Trace {
    pub fn new() -> Self {
        Self(Vec::with_capacity(TRACE_CAPACITY))
    }

    /// Function that appends a position, refusing to grow past the capacity.
    pub fn push(&mut self, position: u32) -> Result<(), RingError> {
        if self.0.len() >= TRACE_CAPACITY {
            return Err(RingError::MalformedMessage(format!(
                "trace is already at its capacity of {TRACE_CAPACITY}"
            )));
        }
        self.0.push(position);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn positions(&self) -> &[u32] {
        &self.0
    }
}

impl std::fmt::Display for Trace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sep = "";
        for position in &self.0 {
            write!(f, "{sep}{position}")?;
            sep = ",";
        }
        Ok(())
    }
}

impl Token {
    /// Function that creates a fresh token with an empty trace.
    pub fn new(remaining_hops: i32) -> Self {
        Self {
            remaining_hops,
            trace: Trace::new(),
        }
    }

    /// Function that turns this token into the game over broadcast, keeping its trace.
    pub fn into_stop(mut self) -> Self {
        self.remaining_hops = STOP_SENTINEL;
        self
    }

    pub fn is_stop(&self) -> bool {
        self.remaining_hops == STOP_SENTINEL
    }
}

/// Codec that frames the fixed-size records of the protocol.
#[derive(Debug, Clone, Copy)]
pub struct WireCodec {
    expect: Expect,
}

impl WireCodec {
    pub fn new(expect: Expect) -> Self {
        Self { expect }
    }

    pub fn expect(&mut self, expect: Expect) {
        self.expect = expect;
    }
}

fn malformed(msg: String) -> WireError {
    WireError::Malformed(msg)
}

fn read_count(src: &mut BytesMut, what: &str) -> Result<usize, WireError> {
    let value = src.get_i32();
    usize::try_from(value).map_err(|_| malformed(format!("negative {what} {value}")))
}

fn read_port(src: &mut BytesMut) -> Result<u16, WireError> {
    let value = src.get_i32();
    match u16::try_from(value) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(malformed(format!("port {value} is out of range"))),
    }
}

fn write_count(dst: &mut BytesMut, value: usize, what: &str) -> Result<(), WireError> {
    let value =
        i32::try_from(value).map_err(|_| malformed(format!("{what} {value} does not fit")))?;
    dst.put_i32(value);
    Ok(())
}

impl Decoder for WireCodec {
    type Item = Frame;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, WireError> {
        let len = self.expect.record_len();
        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }
        let mut record = src.split_to(len);

        let frame = match self.expect {
            Expect::Handshake => {
                let position = read_count(&mut record, "position")?;
                let ring_size = read_count(&mut record, "ring size")?;
                if position >= ring_size {
                    return Err(malformed(format!(
                        "position {position} is outside a ring of {ring_size}"
                    )));
                }
                Frame::Handshake(Handshake {
                    position,
                    ring_size,
                })
            }
            Expect::PortReport => Frame::PortReport(read_port(&mut record)?),
            Expect::Topology => {
                let field = record.split_to(ADDRESS_FIELD_LEN);
                let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
                let address = std::str::from_utf8(&field[..end])
                    .map_err(|_| malformed("address is not valid text".to_string()))?;
                if address.is_empty() {
                    return Err(malformed("address is empty".to_string()));
                }
                Frame::Topology(TopologyRecord {
                    address: address.to_string(),
                    port: read_port(&mut record)?,
                })
            }
            Expect::Token => {
                let remaining_hops = record.get_i32();
                if remaining_hops < STOP_SENTINEL {
                    return Err(malformed(format!("remaining hops {remaining_hops}")));
                }
                let trace_length = record.get_u32() as usize;
                if trace_length > TRACE_CAPACITY {
                    return Err(malformed(format!(
                        "trace length {trace_length} exceeds capacity {TRACE_CAPACITY}"
                    )));
                }
                let mut trace = Trace::new();
                for _ in 0..trace_length {
                    trace.0.push(record.get_u32());
                }
                Frame::Token(Token {
                    remaining_hops,
                    trace,
                })
            }
        };
        Ok(Some(frame))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, WireError> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None => Err(WireError::Truncated {
                expected: self.expect.record_len(),
                available: buf.len(),
            }),
        }
    }
}

impl Encoder<Frame> for WireCodec {
    type Error = WireError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), WireError> {
        match item {
            Frame::Handshake(handshake) => {
                dst.reserve(HANDSHAKE_LEN);
                write_count(dst, handshake.position, "position")?;
                write_count(dst, handshake.ring_size, "ring size")?;
            }
            Frame::PortReport(port) => {
                dst.reserve(PORT_REPORT_LEN);
                dst.put_i32(i32::from(port));
            }
            Frame::Topology(record) => {
                let address = record.address.as_bytes();
                if address.is_empty() || address.len() > ADDRESS_FIELD_LEN {
                    return Err(malformed(format!(
                        "address {:?} does not fit in {ADDRESS_FIELD_LEN} bytes",
                        record.address
                    )));
                }
                dst.reserve(TOPOLOGY_RECORD_LEN);
                dst.put_slice(address);
                dst.put_bytes(0, ADDRESS_FIELD_LEN - address.len());
                dst.put_i32(i32::from(record.port));
            }
            Frame::Token(token) => {
                let trace = token.trace.positions();
                dst.reserve(TOKEN_RECORD_LEN);
                dst.put_i32(token.remaining_hops);
                dst.put_u32(trace.len() as u32);
                for position in trace {
                    dst.put_u32(*position);
                }
                dst.put_bytes(0, 4 * (TRACE_CAPACITY - trace.len()));
            }
        }
        Ok(())
    }
}
