//! Fixed-layout response-packet codec.
//!
//! Header (4 bytes): command:i8, version:i8, from_router_id:i16.
//! Entry (20 bytes): afi:i16, pad:2, destination:i32, pad:8, cost:i32.
//! All multi-byte fields use the host's native byte order; every router in a
//! deployment must agree on that, same as the reference implementation's
//! unprefixed `struct` format.

use crate::types::{Cost, RouterId};
use thiserror::Error;

pub const HEADER_LEN: usize = 4;
pub const ENTRY_LEN: usize = 20;
pub const COMMAND_RESPONSE: i8 = 2;
pub const VERSION: i8 = 2;
pub const AFI_IPV4: i16 = 2;

/// Minimum size an input socket's receive buffer must provide.
pub const MIN_RECV_BUFFER: usize = 512;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("packet too short: {0} bytes (need at least {HEADER_LEN})")]
    TooShort(usize),
    #[error("entry region length {0} is not a multiple of {ENTRY_LEN}")]
    Misaligned(usize),
    #[error("unsupported command {0}, expected {COMMAND_RESPONSE}")]
    BadCommand(i8),
    #[error("unsupported version {0}, expected {VERSION}")]
    BadVersion(i8),
    #[error("from_router_id {0} outside [1, 64000]")]
    BadFromRouterId(i32),
    #[error("entry destination id {0} outside [1, 64000]")]
    BadDestination(i32),
    #[error("entry address family {0} unsupported, expected {AFI_IPV4}")]
    BadAfi(i16),
    #[error("entry cost {0} is negative")]
    NegativeCost(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub destination: RouterId,
    pub cost: Cost,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePacket {
    pub from_router_id: RouterId,
    pub entries: Vec<Entry>,
}

/// The 16-bit wire field for a router id is a bit-pattern container, not a
/// value-range-respecting signed integer: [1, 64000] does not fit in i16, so
/// we round-trip the low 16 bits verbatim and apply the [1, 64000] range
/// check ourselves rather than relying on the field's nominal signedness.
fn encode_router_id_u16(id: RouterId) -> [u8; 2] {
    id.get().to_ne_bytes()
}

fn decode_router_id_u16(bytes: [u8; 2]) -> u16 {
    u16::from_ne_bytes(bytes)
}

impl ResponsePacket {
    pub fn new(from_router_id: RouterId) -> Self {
        Self {
            from_router_id,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, destination: RouterId, cost: Cost) {
        self.entries.push(Entry { destination, cost });
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.entries.len() * ENTRY_LEN);
        buf.push(COMMAND_RESPONSE as u8);
        buf.push(VERSION as u8);
        buf.extend_from_slice(&encode_router_id_u16(self.from_router_id));

        for entry in &self.entries {
            buf.extend_from_slice(&AFI_IPV4.to_ne_bytes());
            buf.extend_from_slice(&[0u8; 2]);
            buf.extend_from_slice(&(entry.destination.get() as i32).to_ne_bytes());
            buf.extend_from_slice(&[0u8; 8]);
            buf.extend_from_slice(&(entry.cost.get() as i32).to_ne_bytes());
        }
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < HEADER_LEN {
            return Err(WireError::TooShort(buf.len()));
        }
        let entries_len = buf.len() - HEADER_LEN;
        if entries_len % ENTRY_LEN != 0 {
            return Err(WireError::Misaligned(entries_len));
        }

        let command = buf[0] as i8;
        let version = buf[1] as i8;
        if command != COMMAND_RESPONSE {
            return Err(WireError::BadCommand(command));
        }
        if version != VERSION {
            return Err(WireError::BadVersion(version));
        }

        let from_raw = decode_router_id_u16([buf[2], buf[3]]);
        let from_router_id = validate_router_id(from_raw as i32)
            .ok_or(WireError::BadFromRouterId(from_raw as i32))?;

        let num_entries = entries_len / ENTRY_LEN;
        let mut entries = Vec::with_capacity(num_entries);
        for i in 0..num_entries {
            let base = HEADER_LEN + i * ENTRY_LEN;
            let afi = i16::from_ne_bytes([buf[base], buf[base + 1]]);
            if afi != AFI_IPV4 {
                return Err(WireError::BadAfi(afi));
            }
            let dest_raw = i32::from_ne_bytes([
                buf[base + 4],
                buf[base + 5],
                buf[base + 6],
                buf[base + 7],
            ]);
            let destination =
                validate_router_id(dest_raw).ok_or(WireError::BadDestination(dest_raw))?;
            let cost_raw = i32::from_ne_bytes([
                buf[base + 16],
                buf[base + 17],
                buf[base + 18],
                buf[base + 19],
            ]);
            if cost_raw < 0 {
                return Err(WireError::NegativeCost(cost_raw));
            }
            let cost = Cost::saturating(cost_raw as i64);
            entries.push(Entry { destination, cost });
        }

        Ok(ResponsePacket {
            from_router_id,
            entries,
        })
    }
}

fn validate_router_id(raw: i32) -> Option<RouterId> {
    if raw < crate::types::MIN_ROUTER_ID as i32 || raw > crate::types::MAX_ROUTER_ID as i32 {
        return None;
    }
    Some(RouterId::from_validated(raw as u16))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rid(n: u16) -> RouterId {
        RouterId::new(n).unwrap()
    }

    #[test]
    fn round_trips_empty_packet() {
        let pkt = ResponsePacket::new(rid(1));
        let bytes = pkt.encode();
        assert_eq!(bytes.len(), HEADER_LEN);
        let decoded = ResponsePacket::decode(&bytes).unwrap();
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn round_trips_with_entries() {
        let mut pkt = ResponsePacket::new(rid(1));
        pkt.push(rid(2), Cost::saturating(1));
        pkt.push(rid(3), Cost::saturating(16));
        let bytes = pkt.encode();
        assert_eq!(bytes.len(), HEADER_LEN + 2 * ENTRY_LEN);
        let decoded = ResponsePacket::decode(&bytes).unwrap();
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn round_trips_high_router_id() {
        // 64000 doesn't fit in a signed 16-bit value; the bit pattern must
        // still round-trip exactly.
        let pkt = ResponsePacket::new(rid(64000));
        let bytes = pkt.encode();
        let decoded = ResponsePacket::decode(&bytes).unwrap();
        assert_eq!(decoded.from_router_id.get(), 64000);
    }

    #[test]
    fn rejects_too_short() {
        assert_eq!(ResponsePacket::decode(&[2, 2]), Err(WireError::TooShort(2)));
    }

    #[test]
    fn rejects_misaligned_entries() {
        let mut bytes = vec![2u8, 2, 0, 1];
        bytes.extend_from_slice(&[0u8; 17]); // 17, not a multiple of 20
        assert_eq!(
            ResponsePacket::decode(&bytes),
            Err(WireError::Misaligned(17))
        );
    }

    #[test]
    fn rejects_bad_command() {
        let mut bytes = vec![9u8, 2, 0, 1];
        bytes.extend_from_slice(&[0u8; 0]);
        assert_eq!(ResponsePacket::decode(&bytes), Err(WireError::BadCommand(9)));
    }

    #[test]
    fn rejects_bad_version() {
        let bytes = vec![2u8, 9, 0, 1];
        assert_eq!(ResponsePacket::decode(&bytes), Err(WireError::BadVersion(9)));
    }

    #[test]
    fn rejects_entry_with_negative_cost() {
        let mut pkt_bytes = vec![2u8, 2];
        pkt_bytes.extend_from_slice(&1i16.to_ne_bytes());
        pkt_bytes.extend_from_slice(&AFI_IPV4.to_ne_bytes());
        pkt_bytes.extend_from_slice(&[0u8; 2]);
        pkt_bytes.extend_from_slice(&2i32.to_ne_bytes());
        pkt_bytes.extend_from_slice(&[0u8; 8]);
        pkt_bytes.extend_from_slice(&(-1i32).to_ne_bytes());
        assert_eq!(
            ResponsePacket::decode(&pkt_bytes),
            Err(WireError::NegativeCost(-1))
        );
    }

    #[test]
    fn saturates_entry_cost_above_ceiling_instead_of_rejecting() {
        let mut pkt_bytes = vec![2u8, 2];
        pkt_bytes.extend_from_slice(&1i16.to_ne_bytes());
        pkt_bytes.extend_from_slice(&AFI_IPV4.to_ne_bytes());
        pkt_bytes.extend_from_slice(&[0u8; 2]);
        pkt_bytes.extend_from_slice(&2i32.to_ne_bytes());
        pkt_bytes.extend_from_slice(&[0u8; 8]);
        pkt_bytes.extend_from_slice(&1000i32.to_ne_bytes());
        let decoded = ResponsePacket::decode(&pkt_bytes).unwrap();
        assert_eq!(decoded.entries[0].cost, Cost::INFINITY);
    }

    #[test]
    fn rejects_bad_afi() {
        let mut pkt_bytes = vec![2u8, 2];
        pkt_bytes.extend_from_slice(&1i16.to_ne_bytes());
        pkt_bytes.extend_from_slice(&7i16.to_ne_bytes());
        pkt_bytes.extend_from_slice(&[0u8; 2]);
        pkt_bytes.extend_from_slice(&2i32.to_ne_bytes());
        pkt_bytes.extend_from_slice(&[0u8; 8]);
        pkt_bytes.extend_from_slice(&1i32.to_ne_bytes());
        assert_eq!(ResponsePacket::decode(&pkt_bytes), Err(WireError::BadAfi(7)));
    }
}
