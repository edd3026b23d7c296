//! Wire PDU encoding and decoding.
//!
//! The socket/framing layer that delivers a full, already-length-prefixed
//! buffer to [`decode`] is out of scope here (see
//! [`crate::collaborators`] for where a real transport would plug in);
//! this module owns only turning such a buffer into a typed [`Pdu`] and
//! back, mirroring the split the `rtr` module draws between `pdu` (wire
//! format) and `net` (socket I/O) -- `net` has no counterpart in this
//! crate.
//!
//! Every multi-byte field is big-endian, matching RTR's own PDUs.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::as_path::{RelationshipDirection, SegmentKind};
use crate::error::ProtocolError;
use crate::ids::{AsNumber, ClientId, PathId, ProxyId, UpdateId};
use crate::outcome::{AxesMask, RequestFlags, ValidationOutcome};
use crate::prefix::Prefix;
use std::net::{Ipv4Addr, Ipv6Addr};

/// The compile-time protocol version every `HELLO` must match.
pub const PROTOCOL_VERSION: u16 = 1;

const HEADER_LEN: usize = 8;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
enum PduType {
    Hello = 0,
    HelloResponse = 1,
    VerifyV4Request = 2,
    VerifyV6Request = 3,
    VerifyNotification = 4,
    SignRequest = 5,
    DeleteUpdate = 6,
    Goodbye = 7,
    SyncRequest = 8,
    Error = 9,
}

impl PduType {
    fn from_u8(value: u8) -> Result<Self, ProtocolError> {
        Ok(match value {
            0 => PduType::Hello,
            1 => PduType::HelloResponse,
            2 => PduType::VerifyV4Request,
            3 => PduType::VerifyV6Request,
            4 => PduType::VerifyNotification,
            5 => PduType::SignRequest,
            6 => PduType::DeleteUpdate,
            7 => PduType::Goodbye,
            8 => PduType::SyncRequest,
            9 => PduType::Error,
            _ => return Err(ProtocolError::InvalidPacket),
        })
    }
}

/// A validation request's optional AS-path, carried on verify requests.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathPayload {
    pub segment_kind: SegmentKind,
    pub hops: Vec<AsNumber>,
}

/// A typed, decoded protocol message.
#[derive(Clone, Debug, PartialEq)]
pub enum Pdu {
    Hello { version: u16, proxy_id: ProxyId },
    HelloResponse { proxy_id: ProxyId },
    VerifyV4Request {
        flags: RequestFlags,
        direction: RelationshipDirection,
        prefix: Prefix,
        origin: AsNumber,
        update_id: UpdateId,
        path: Option<PathPayload>,
        bgpsec_blob: Bytes,
    },
    VerifyV6Request {
        flags: RequestFlags,
        direction: RelationshipDirection,
        prefix: Prefix,
        origin: AsNumber,
        update_id: UpdateId,
        path: Option<PathPayload>,
        bgpsec_blob: Bytes,
    },
    VerifyNotification {
        axes: AxesMask,
        roa: ValidationOutcome,
        bgpsec: ValidationOutcome,
        aspa: ValidationOutcome,
        update_id: UpdateId,
    },
    SignRequest,
    DeleteUpdate { keep_window: u16, update_id: UpdateId },
    Goodbye { keep_window: u16 },
    SyncRequest,
    Error { code: u16 },
}

impl Pdu {
    fn pdu_type(&self) -> PduType {
        match self {
            Pdu::Hello { .. } => PduType::Hello,
            Pdu::HelloResponse { .. } => PduType::HelloResponse,
            Pdu::VerifyV4Request { .. } => PduType::VerifyV4Request,
            Pdu::VerifyV6Request { .. } => PduType::VerifyV6Request,
            Pdu::VerifyNotification { .. } => PduType::VerifyNotification,
            Pdu::SignRequest => PduType::SignRequest,
            Pdu::DeleteUpdate { .. } => PduType::DeleteUpdate,
            Pdu::Goodbye { .. } => PduType::Goodbye,
            Pdu::SyncRequest => PduType::SyncRequest,
            Pdu::Error { .. } => PduType::Error,
        }
    }

    /// Encodes this PDU, including its 8-byte header, into a fresh
    /// buffer.
    pub fn encode(&self) -> BytesMut {
        let mut body = BytesMut::new();
        match self {
            Pdu::Hello { version, proxy_id } => {
                body.put_u16(*version);
                body.put_u32(proxy_id.0);
            }
            Pdu::HelloResponse { proxy_id } => {
                body.put_u32(proxy_id.0);
            }
            Pdu::VerifyV4Request { flags, direction, prefix, origin, update_id, path, bgpsec_blob } => {
                encode_verify_request(&mut body, *flags, *direction, prefix, *origin, *update_id, path, bgpsec_blob);
            }
            Pdu::VerifyV6Request { flags, direction, prefix, origin, update_id, path, bgpsec_blob } => {
                encode_verify_request(&mut body, *flags, *direction, prefix, *origin, *update_id, path, bgpsec_blob);
            }
            Pdu::VerifyNotification { axes, roa, bgpsec, aspa, update_id } => {
                body.put_u8(axes.to_bits());
                body.put_u8(roa.to_wire());
                body.put_u8(bgpsec.to_wire());
                body.put_u8(aspa.to_wire());
                body.put_u32(update_id.0);
            }
            Pdu::SignRequest | Pdu::SyncRequest => {}
            Pdu::DeleteUpdate { keep_window, update_id } => {
                body.put_u16(*keep_window);
                body.put_u32(update_id.0);
            }
            Pdu::Goodbye { keep_window } => {
                body.put_u16(*keep_window);
            }
            Pdu::Error { code } => {
                body.put_u16(*code);
            }
        }

        let mut framed = BytesMut::with_capacity(HEADER_LEN + body.len());
        framed.put_u8(self.pdu_type() as u8);
        framed.put_u8(0); // reserved/flags, unused by any defined PDU today
        framed.put_u16(0); // auxiliary, unused by any defined PDU today
        framed.put_u32((HEADER_LEN + body.len()) as u32);
        framed.extend_from_slice(&body);
        framed
    }

    /// Decodes a fully framed buffer (header plus payload) into a `Pdu`.
    ///
    /// Returns [`ProtocolError::InvalidPacket`] for anything truncated,
    /// over-length, or carrying an unrecognised type tag. Never panics on
    /// attacker-controlled input.
    pub fn decode(buf: &[u8]) -> Result<Pdu, ProtocolError> {
        if buf.len() < HEADER_LEN {
            return Err(ProtocolError::InvalidPacket);
        }
        let mut header = &buf[..HEADER_LEN];
        let pdu_type = PduType::from_u8(header.get_u8())?;
        let _reserved = header.get_u8();
        let _aux = header.get_u16();
        let length = header.get_u32() as usize;
        if length != buf.len() {
            return Err(ProtocolError::InvalidPacket);
        }

        let mut body = &buf[HEADER_LEN..];
        match pdu_type {
            PduType::Hello => {
                if body.len() < 6 {
                    return Err(ProtocolError::InvalidPacket);
                }
                let version = body.get_u16();
                let proxy_id = ProxyId(body.get_u32());
                Ok(Pdu::Hello { version, proxy_id })
            }
            PduType::HelloResponse => {
                if body.len() < 4 {
                    return Err(ProtocolError::InvalidPacket);
                }
                Ok(Pdu::HelloResponse { proxy_id: ProxyId(body.get_u32()) })
            }
            PduType::VerifyV4Request => decode_verify_v4(&mut body),
            PduType::VerifyV6Request => decode_verify_v6(&mut body),
            PduType::VerifyNotification => {
                if body.len() < 8 {
                    return Err(ProtocolError::InvalidPacket);
                }
                let axes = AxesMask::from_bits(body.get_u8());
                let roa = ValidationOutcome::from_wire(body.get_u8());
                let bgpsec = ValidationOutcome::from_wire(body.get_u8());
                let aspa = ValidationOutcome::from_wire(body.get_u8());
                let update_id = UpdateId(body.get_u32());
                Ok(Pdu::VerifyNotification { axes, roa, bgpsec, aspa, update_id })
            }
            PduType::SignRequest => Ok(Pdu::SignRequest),
            PduType::DeleteUpdate => {
                if body.len() < 6 {
                    return Err(ProtocolError::InvalidPacket);
                }
                let keep_window = body.get_u16();
                let update_id = UpdateId(body.get_u32());
                Ok(Pdu::DeleteUpdate { keep_window, update_id })
            }
            PduType::Goodbye => {
                if body.len() < 2 {
                    return Err(ProtocolError::InvalidPacket);
                }
                Ok(Pdu::Goodbye { keep_window: body.get_u16() })
            }
            PduType::SyncRequest => Ok(Pdu::SyncRequest),
            PduType::Error => {
                if body.len() < 2 {
                    return Err(ProtocolError::InvalidPacket);
                }
                Ok(Pdu::Error { code: body.get_u16() })
            }
        }
    }
}

fn encode_verify_request(
    body: &mut BytesMut,
    flags: RequestFlags,
    direction: RelationshipDirection,
    prefix: &Prefix,
    origin: AsNumber,
    update_id: UpdateId,
    path: &Option<PathPayload>,
    bgpsec_blob: &Bytes,
) {
    let direction_bit = if direction.to_bit() { 0b1000 } else { 0 };
    body.put_u8(flags.to_bits() | direction_bit);
    body.put_u8(prefix.prefix_len());
    body.put_u32(origin.0);
    match prefix {
        Prefix::V4 { addr, .. } => body.extend_from_slice(&addr.octets()),
        Prefix::V6 { addr, .. } => body.extend_from_slice(&addr.octets()),
    }
    body.put_u32(update_id.0);
    match path {
        None => body.put_u8(0),
        Some(path) => {
            body.put_u8(1);
            body.put_u8(match path.segment_kind {
                SegmentKind::Sequence => 0,
                SegmentKind::Set => 1,
            });
            body.put_u8(path.hops.len() as u8);
            for hop in &path.hops {
                body.put_u32(hop.0);
            }
        }
    }
    body.put_u16(bgpsec_blob.len() as u16);
    body.extend_from_slice(bgpsec_blob);
}

fn decode_path(body: &mut &[u8]) -> Result<Option<PathPayload>, ProtocolError> {
    if body.is_empty() {
        return Err(ProtocolError::InvalidPacket);
    }
    let present = body.get_u8();
    if present == 0 {
        return Ok(None);
    }
    if body.len() < 2 {
        return Err(ProtocolError::InvalidPacket);
    }
    let segment_kind = match body.get_u8() {
        0 => SegmentKind::Sequence,
        1 => SegmentKind::Set,
        _ => return Err(ProtocolError::InvalidPacket),
    };
    let hop_count = body.get_u8() as usize;
    if body.len() < hop_count * 4 {
        return Err(ProtocolError::InvalidPacket);
    }
    let mut hops = Vec::with_capacity(hop_count);
    for _ in 0..hop_count {
        hops.push(AsNumber(body.get_u32()));
    }
    Ok(Some(PathPayload { segment_kind, hops }))
}

fn decode_bgpsec_blob(body: &mut &[u8]) -> Result<Bytes, ProtocolError> {
    if body.len() < 2 {
        return Err(ProtocolError::InvalidPacket);
    }
    let len = body.get_u16() as usize;
    if body.len() < len {
        return Err(ProtocolError::InvalidPacket);
    }
    let blob = Bytes::copy_from_slice(&body[..len]);
    body.advance(len);
    Ok(blob)
}

fn decode_verify_v4(body: &mut &[u8]) -> Result<Pdu, ProtocolError> {
    if body.len() < 14 {
        return Err(ProtocolError::InvalidPacket);
    }
    let raw_flags = body.get_u8();
    let flags = RequestFlags::from_bits(raw_flags);
    let direction = RelationshipDirection::from_bit(raw_flags & 0b1000 != 0);
    let prefix_len = body.get_u8();
    let origin = AsNumber(body.get_u32());
    let mut octets = [0u8; 4];
    octets.copy_from_slice(&body[..4]);
    body.advance(4);
    let update_id = UpdateId(body.get_u32());
    let prefix = checked_v4(Ipv4Addr::from(octets), prefix_len)?;
    let path = decode_path(body)?;
    let bgpsec_blob = decode_bgpsec_blob(body)?;
    Ok(Pdu::VerifyV4Request { flags, direction, prefix, origin, update_id, path, bgpsec_blob })
}

fn decode_verify_v6(body: &mut &[u8]) -> Result<Pdu, ProtocolError> {
    if body.len() < 26 {
        return Err(ProtocolError::InvalidPacket);
    }
    let raw_flags = body.get_u8();
    let flags = RequestFlags::from_bits(raw_flags);
    let direction = RelationshipDirection::from_bit(raw_flags & 0b1000 != 0);
    let prefix_len = body.get_u8();
    let origin = AsNumber(body.get_u32());
    let mut octets = [0u8; 16];
    octets.copy_from_slice(&body[..16]);
    body.advance(16);
    let update_id = UpdateId(body.get_u32());
    let prefix = checked_v6(Ipv6Addr::from(octets), prefix_len)?;
    let path = decode_path(body)?;
    let bgpsec_blob = decode_bgpsec_blob(body)?;
    Ok(Pdu::VerifyV6Request { flags, direction, prefix, origin, update_id, path, bgpsec_blob })
}

fn checked_v4(addr: Ipv4Addr, prefix_len: u8) -> Result<Prefix, ProtocolError> {
    if prefix_len > 32 {
        return Err(ProtocolError::InvalidPacket);
    }
    Ok(Prefix::v4(addr, prefix_len))
}

fn checked_v6(addr: Ipv6Addr, prefix_len: u8) -> Result<Prefix, ProtocolError> {
    if prefix_len > 128 {
        return Err(ProtocolError::InvalidPacket);
    }
    Ok(Prefix::v6(addr, prefix_len))
}

/// Maps a [`ClientId`] slot index into the `proxy-ID` field carried on a
/// `HELLO_RESPONSE` in tests and diagnostics that want a deterministic,
/// round-trippable stand-in. Production code always echoes back the
/// proxy ID the client actually sent.
#[cfg(test)]
fn test_proxy_id(client_id: ClientId) -> ProxyId {
    ProxyId(0xD000_0000 | u32::from(client_id.0))
}
