//! Addressed frames.
//!
//! Every message on a connection is one frame:
//!
//! ```text
//! [u32 length][i32 target][u64 payload length][payload]
//! ```
//!
//! `length` counts everything after itself, so it is always
//! `12 + payload length`. All integers are little-endian.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

/// Bytes of the body header: target id plus payload length.
pub const BODY_HEADER_LEN: usize = 12;

/// Upper bound on a frame body accepted from a peer.
pub const MAX_FRAME_LEN: usize = 256 * 1024 * 1024;

/// Wire value for "work complete, no result".
pub const TARGET_DONE: i32 = -1;

/// Wire value for "final composed result attached".
pub const TARGET_RESULT: i32 = -2;

/// Where a frame is headed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    /// Deliver to the worker with this id.
    Worker(usize),
    /// The sending worker finished without a result.
    Done,
    /// The payload is the final result.
    Result,
}

impl Address {
    /// Raw target id.
    pub fn to_wire(self) -> i32 {
        match self {
            Self::Worker(id) => i32::try_from(id).unwrap_or(i32::MAX),
            Self::Done => TARGET_DONE,
            Self::Result => TARGET_RESULT,
        }
    }

    /// Interprets a raw target id.
    pub fn from_wire(target: i32) -> Result<Self, ProtocolError> {
        match target {
            TARGET_DONE => Ok(Self::Done),
            TARGET_RESULT => Ok(Self::Result),
            id if id >= 0 => Ok(Self::Worker(id as usize)),
            other => Err(ProtocolError::InvalidTarget(other)),
        }
    }

    /// `true` for the two terminal addresses.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Worker(_))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Worker(id) => write!(f, "worker {id}"),
            Self::Done => f.write_str("done"),
            Self::Result => f.write_str("result"),
        }
    }
}

impl From<usize> for Address {
    fn from(worker: usize) -> Self {
        Self::Worker(worker)
    }
}

/// A target id and an opaque payload.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use pla_compose::shared::{Address, Envelope};
///
/// let envelope = Envelope::new(Address::Worker(3), Bytes::from_static(b"hi\0"));
/// let frame = envelope.encode();
/// assert_eq!(frame.len(), 4 + 12 + 3);
///
/// let decoded = Envelope::decode_body(frame.slice(4..)).unwrap();
/// assert_eq!(decoded, envelope);
/// assert_eq!(decoded.address().unwrap(), Address::Worker(3));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Raw target id.
    pub target: i32,
    /// Encoded payload.
    pub payload: Bytes,
}

impl Envelope {
    /// Creates an envelope for `address`.
    pub fn new(address: Address, payload: Bytes) -> Self {
        Self {
            target: address.to_wire(),
            payload,
        }
    }

    /// Interprets the target id.
    pub fn address(&self) -> Result<Address, ProtocolError> {
        Address::from_wire(self.target)
    }

    /// Length of the frame body (everything after the `u32` prefix).
    pub fn body_len(&self) -> usize {
        BODY_HEADER_LEN + self.payload.len()
    }

    /// Encodes the complete frame, length prefix included.
    pub fn encode(&self) -> Bytes {
        let body_len = self.body_len();
        let mut buf = BytesMut::with_capacity(4 + body_len);
        buf.put_u32_le(body_len as u32);
        buf.put_i32_le(self.target);
        buf.put_u64_le(self.payload.len() as u64);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    /// Decodes a frame body. The declared payload length must match the
    /// bytes present exactly.
    pub fn decode_body(mut body: Bytes) -> Result<Self, ProtocolError> {
        if body.len() < BODY_HEADER_LEN {
            return Err(ProtocolError::Truncated {
                what: "frame header",
                needed: BODY_HEADER_LEN,
                remaining: body.len(),
            });
        }
        let target = body.get_i32_le();
        let declared = body.get_u64_le();
        let available = body.len() as u64;
        if declared != available {
            return Err(ProtocolError::LengthMismatch {
                declared,
                available,
            });
        }
        Ok(Self {
            target,
            payload: body,
        })
    }
}

/// Checks a frame length prefix read from a peer.
pub fn check_frame_len(len: u32) -> Result<usize, ProtocolError> {
    let len = len as usize;
    if !(BODY_HEADER_LEN..=MAX_FRAME_LEN).contains(&len) {
        return Err(ProtocolError::InvalidLength {
            what: "frame length",
            value: len as i64,
        });
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_addresses() {
        assert_eq!(Address::from_wire(-1).unwrap(), Address::Done);
        assert_eq!(Address::from_wire(-2).unwrap(), Address::Result);
        assert_eq!(Address::from_wire(7).unwrap(), Address::Worker(7));
        assert_eq!(Address::from_wire(-3), Err(ProtocolError::InvalidTarget(-3)));
        assert_eq!(
            Address::from_wire(i32::MIN),
            Err(ProtocolError::InvalidTarget(i32::MIN))
        );
        assert!(Address::Result.is_terminal());
        assert!(!Address::Worker(0).is_terminal());
    }

    #[test]
    fn frame_layout_is_little_endian() {
        let frame = Envelope::new(Address::Done, Bytes::from_static(&[0xAA])).encode();
        assert_eq!(
            frame.as_ref(),
            &[
                13, 0, 0, 0, // body length
                0xFF, 0xFF, 0xFF, 0xFF, // target -1
                1, 0, 0, 0, 0, 0, 0, 0, // payload length
                0xAA,
            ]
        );
    }

    #[test]
    fn declared_length_must_match() {
        let mut body = BytesMut::new();
        body.put_i32_le(0);
        body.put_u64_le(5);
        body.extend_from_slice(b"abc");
        assert_eq!(
            Envelope::decode_body(body.freeze()).unwrap_err(),
            ProtocolError::LengthMismatch {
                declared: 5,
                available: 3
            }
        );
    }

    #[test]
    fn short_body_is_truncated() {
        assert!(matches!(
            Envelope::decode_body(Bytes::from_static(&[0, 0, 0])),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn frame_length_bounds() {
        assert!(check_frame_len(11).is_err());
        assert_eq!(check_frame_len(12).unwrap(), 12);
        assert!(check_frame_len(u32::MAX).is_err());
    }
}
