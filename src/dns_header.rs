use bytes::BufMut;

use crate::error::{DnsError, Result};

/// Size of the fixed DNS header in bytes
pub const HEADER_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsHeader {
    pub id: u16,
    pub flags: u16,
    pub question_count: u16,
    pub answer_count: u16,
    pub authority_count: u16,
    pub additional_count: u16,
}

/// Direction of a message, carried in the QR bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Query,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DnsFlags {
    pub qr: bool,              // Query/Response (false = query, true = response)
    pub opcode: u8,            // Operation code (0 = standard query)
    pub aa: bool,              // Authoritative Answer
    pub tc: bool,              // Truncation
    pub rd: bool,              // Recursion Desired
    pub ra: bool,              // Recursion Available
    pub z: u8,                 // Reserved (must be 0)
    pub rcode: u8,             // Response code (0 = no error, 3 = NXDOMAIN, etc.)
}

impl DnsFlags {
    /// Flags for a message of the given direction with recursion desired.
    /// Responses also advertise recursion available.
    pub fn for_kind(kind: MessageKind) -> Self {
        let response = kind == MessageKind::Response;
        DnsFlags {
            qr: response,
            rd: true,
            ra: response,
            ..Default::default()
        }
    }

    pub fn kind(&self) -> MessageKind {
        if self.qr {
            MessageKind::Response
        } else {
            MessageKind::Query
        }
    }

    pub fn to_u16(&self) -> u16 {
        let mut flags: u16 = 0;

        if self.qr { flags |= 1 << 15; }           // QR at bit 15
        flags |= (self.opcode as u16 & 0xF) << 11; // OPCODE at bits 11-14
        if self.aa { flags |= 1 << 10; }           // AA at bit 10
        if self.tc { flags |= 1 << 9; }            // TC at bit 9
        if self.rd { flags |= 1 << 8; }            // RD at bit 8
        if self.ra { flags |= 1 << 7; }            // RA at bit 7
        flags |= (self.z as u16 & 0x7) << 4;       // Z at bits 4-6
        flags |= self.rcode as u16 & 0xF;          // RCODE at bits 0-3

        flags
    }

    pub fn from_u16(flags: u16) -> Self {
        DnsFlags {
            qr: (flags & (1 << 15)) != 0,
            opcode: ((flags >> 11) & 0xF) as u8,
            aa: (flags & (1 << 10)) != 0,
            tc: (flags & (1 << 9)) != 0,
            rd: (flags & (1 << 8)) != 0,
            ra: (flags & (1 << 7)) != 0,
            z: ((flags >> 4) & 0x7) as u8,
            rcode: (flags & 0xF) as u8,
        }
    }
}

impl DnsHeader {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(DnsError::parse(format!(
                "truncated header: {} of {} bytes",
                bytes.len(),
                HEADER_LEN
            )));
        }

        let word = |i: usize| u16::from_be_bytes([bytes[i], bytes[i + 1]]);

        Ok(DnsHeader {
            id: word(0),
            flags: word(2),
            question_count: word(4),
            answer_count: word(6),
            authority_count: word(8),
            additional_count: word(10),
        })
    }

    pub fn write_to(&self, buf: &mut impl BufMut) {
        buf.put_u16(self.id);
        buf.put_u16(self.flags);
        buf.put_u16(self.question_count);
        buf.put_u16(self.answer_count);
        buf.put_u16(self.authority_count);
        buf.put_u16(self.additional_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_bit_layout() {
        let flags = DnsFlags {
            qr: true,
            opcode: 2,
            rd: true,
            rcode: 3,
            ..Default::default()
        };
        assert_eq!(flags.to_u16(), 0x8000 | (2 << 11) | 0x0100 | 3);
        assert_eq!(DnsFlags::from_u16(flags.to_u16()), flags);
    }

    #[test]
    fn test_flags_for_kind() {
        assert_eq!(DnsFlags::for_kind(MessageKind::Query).to_u16(), 0x0100);
        assert_eq!(DnsFlags::for_kind(MessageKind::Response).to_u16(), 0x8180);
        assert_eq!(DnsFlags::from_u16(0x8180).kind(), MessageKind::Response);
    }

    #[test]
    fn test_header_truncated() {
        let err = DnsHeader::from_bytes(&[0u8; 11]).unwrap_err();
        assert!(matches!(err, DnsError::MessageParse(_)));
    }

    #[test]
    fn test_header_write_then_read() {
        let header = DnsHeader {
            id: 0xBEEF,
            flags: 0x8180,
            question_count: 1,
            answer_count: 2,
            authority_count: 0,
            additional_count: 1,
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf);
        assert_eq!(buf.len(), HEADER_LEN);
        assert_eq!(&buf[..4], &[0xBE, 0xEF, 0x81, 0x80]);
        assert_eq!(DnsHeader::from_bytes(&buf).unwrap(), header);
    }
}
