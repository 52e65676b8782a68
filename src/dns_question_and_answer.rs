use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::BufMut;

use crate::error::{DnsError, Result};

/// The Internet class, the only class this resolver deals in
pub const CLASS_INET: u16 = 1;

/// Longest encoded domain name allowed on the wire
const MAX_NAME_LEN: usize = 255;

/// Longest single label allowed on the wire
const MAX_LABEL_LEN: usize = 63;

/// Compression pointers followed before a name is rejected as looping
const MAX_POINTER_JUMPS: usize = 16;

/// DNS Question Section
/// Format: QNAME + QTYPE (2 bytes) + QCLASS (2 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    pub name: String, // Domain name (e.g., "example.com")
    pub qtype: u16,   // Query type (A, AAAA, CNAME, etc.)
    pub qclass: u16,  // Query class (IN)
}

/// DNS Answer/Resource Record Section
/// Format: NAME + TYPE (2 bytes) + CLASS (2 bytes) + TTL (4 bytes) + RDLENGTH (2 bytes) + RDATA
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsAnswer {
    pub name: String,       // Owner name
    pub rtype: u16,         // Record type
    pub rclass: u16,        // Record class
    pub ttl: u32,           // Time to live in seconds
    pub rdata: Vec<u8>,     // Resource data, kept opaque
    pub ip: Option<IpAddr>, // Decoded address for A/AAAA records
}

/// Common DNS record types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    A = 1,     // IPv4 address
    NS = 2,    // Name server
    CNAME = 5, // Canonical name
    SOA = 6,   // Start of authority
    PTR = 12,  // Pointer record
    MX = 15,   // Mail exchange
    TXT = 16,  // Text record
    AAAA = 28, // IPv6 address
}

impl RecordType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(RecordType::A),
            2 => Some(RecordType::NS),
            5 => Some(RecordType::CNAME),
            6 => Some(RecordType::SOA),
            12 => Some(RecordType::PTR),
            15 => Some(RecordType::MX),
            16 => Some(RecordType::TXT),
            28 => Some(RecordType::AAAA),
            _ => None,
        }
    }

    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Printable name of a raw type code, e.g. `A` or `TYPE65`
    pub fn describe(value: u16) -> String {
        match Self::from_u16(value) {
            Some(rtype) => format!("{:?}", rtype),
            None => format!("TYPE{}", value),
        }
    }
}

impl DnsQuestion {
    /// An Internet-class question
    pub fn new(name: impl Into<String>, qtype: u16) -> Self {
        DnsQuestion {
            name: name.into(),
            qtype,
            qclass: CLASS_INET,
        }
    }

    /// Parse a DNS question from bytes starting at the given offset
    /// Returns the question and the new offset after parsing
    pub fn from_bytes(bytes: &[u8], offset: usize) -> Result<(Self, usize)> {
        let (name, offset) = parse_domain_name(bytes, offset)?;

        let fixed = bytes
            .get(offset..offset + 4)
            .ok_or_else(|| DnsError::parse("truncated question type and class"))?;

        let qtype = u16::from_be_bytes([fixed[0], fixed[1]]);
        let qclass = u16::from_be_bytes([fixed[2], fixed[3]]);

        Ok((
            DnsQuestion {
                name,
                qtype,
                qclass,
            },
            offset + 4,
        ))
    }

    pub fn write_to(&self, buf: &mut impl BufMut) -> Result<()> {
        encode_domain_name(&self.name, buf)?;
        buf.put_u16(self.qtype);
        buf.put_u16(self.qclass);
        Ok(())
    }
}

impl DnsAnswer {
    /// Parse a resource record starting at the given offset
    /// Returns the answer and the new offset after parsing
    pub fn from_bytes(bytes: &[u8], offset: usize) -> Result<(Self, usize)> {
        let (name, offset) = parse_domain_name(bytes, offset)?;

        let fixed = bytes
            .get(offset..offset + 10)
            .ok_or_else(|| DnsError::parse(format!("truncated record fields for {}", name)))?;

        let rtype = u16::from_be_bytes([fixed[0], fixed[1]]);
        let rclass = u16::from_be_bytes([fixed[2], fixed[3]]);
        let ttl = u32::from_be_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]);
        let rdlength = u16::from_be_bytes([fixed[8], fixed[9]]) as usize;

        let data_offset = offset + 10;
        let rdata = bytes
            .get(data_offset..data_offset + rdlength)
            .ok_or_else(|| {
                DnsError::parse(format!(
                    "record data length {} overruns message at offset {}",
                    rdlength, data_offset
                ))
            })?
            .to_vec();

        let ip = decode_address(rtype, &rdata)?;

        Ok((
            DnsAnswer {
                name,
                rtype,
                rclass,
                ttl,
                rdata,
                ip,
            },
            data_offset + rdlength,
        ))
    }

    /// Create an A or AAAA answer, depending on the address family
    pub fn from_ip(name: impl Into<String>, ttl: u32, ip: IpAddr) -> Self {
        let (rtype, rdata) = match ip {
            IpAddr::V4(v4) => (RecordType::A, v4.octets().to_vec()),
            IpAddr::V6(v6) => (RecordType::AAAA, v6.octets().to_vec()),
        };

        DnsAnswer {
            name: name.into(),
            rtype: rtype.to_u16(),
            rclass: CLASS_INET,
            ttl,
            rdata,
            ip: Some(ip),
        }
    }

    pub fn write_to(&self, buf: &mut impl BufMut) -> Result<()> {
        let rdlength = u16::try_from(self.rdata.len()).map_err(|_| {
            DnsError::parse(format!("record data of {} bytes", self.rdata.len()))
        })?;

        encode_domain_name(&self.name, buf)?;
        buf.put_u16(self.rtype);
        buf.put_u16(self.rclass);
        buf.put_u32(self.ttl);
        buf.put_u16(rdlength);
        buf.put_slice(&self.rdata);
        Ok(())
    }
}

fn decode_address(rtype: u16, rdata: &[u8]) -> Result<Option<IpAddr>> {
    let ip = match RecordType::from_u16(rtype) {
        Some(RecordType::A) => <[u8; 4]>::try_from(rdata)
            .map(|octets| IpAddr::V4(Ipv4Addr::from(octets)))
            .map_err(|_| DnsError::parse(format!("A record with {} bytes of data", rdata.len())))?,
        Some(RecordType::AAAA) => <[u8; 16]>::try_from(rdata)
            .map(|octets| IpAddr::V6(Ipv6Addr::from(octets)))
            .map_err(|_| {
                DnsError::parse(format!("AAAA record with {} bytes of data", rdata.len()))
            })?,
        _ => return Ok(None),
    };
    Ok(Some(ip))
}

/// Parse a domain name from DNS message format
/// Supports DNS name compression (pointers)
/// Returns the parsed domain name and the offset just past it
pub fn parse_domain_name(bytes: &[u8], mut offset: usize) -> Result<(String, usize)> {
    let mut labels = Vec::new();
    let mut resume_at = None;
    let mut jumps = 0;

    loop {
        let length = *bytes
            .get(offset)
            .ok_or_else(|| DnsError::parse("domain name runs past end of message"))?;

        match length & 0xC0 {
            0xC0 => {
                let low = *bytes
                    .get(offset + 1)
                    .ok_or_else(|| DnsError::parse("incomplete compression pointer"))?;

                // Pointer: the next 14 bits indicate the offset
                let pointer = (((length & 0x3F) as usize) << 8) | low as usize;
                if pointer >= bytes.len() {
                    return Err(DnsError::parse(format!(
                        "compression pointer {} outside message of {} bytes",
                        pointer,
                        bytes.len()
                    )));
                }

                if resume_at.is_none() {
                    resume_at = Some(offset + 2);
                }

                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return Err(DnsError::parse("too many compression pointers in name"));
                }
                offset = pointer;
            }
            0x00 => {
                offset += 1;

                if length == 0 {
                    break;
                }

                let end = offset + length as usize;
                let label = bytes
                    .get(offset..end)
                    .ok_or_else(|| DnsError::parse("label extends beyond message"))?;

                labels.push(String::from_utf8_lossy(label).into_owned());
                offset = end;
            }
            _ => {
                return Err(DnsError::parse(format!(
                    "malformed label length byte {:#04x} at offset {}",
                    length, offset
                )))
            }
        }
    }

    let domain_name = if labels.is_empty() {
        ".".to_string() // Root domain
    } else {
        labels.join(".")
    };

    Ok((domain_name, resume_at.unwrap_or(offset)))
}

/// Encode a domain name to DNS message format, without compression
/// Example: "example.com" -> [7]example[3]com[0]
pub fn encode_domain_name(name: &str, buf: &mut impl BufMut) -> Result<()> {
    let mut encoded_len = 1;

    for label in name.split('.').filter(|label| !label.is_empty()) {
        if label.len() > MAX_LABEL_LEN {
            return Err(DnsError::parse(format!("label too long: {}", label)));
        }

        encoded_len += label.len() + 1;
        if encoded_len > MAX_NAME_LEN {
            return Err(DnsError::parse(format!("domain name too long: {}", name)));
        }

        buf.put_u8(label.len() as u8);
        buf.put_slice(label.as_bytes());
    }

    buf.put_u8(0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(name: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_domain_name(name, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_encode_domain_name() {
        assert_eq!(
            encode("example.com"),
            vec![7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 3, b'c', b'o', b'm', 0]
        );
        assert_eq!(encode("example.com."), encode("example.com"));
    }

    #[test]
    fn test_encode_root_domain() {
        assert_eq!(encode("."), vec![0]);
    }

    #[test]
    fn test_encode_rejects_long_label() {
        let name = format!("{}.com", "a".repeat(64));
        let mut buf = Vec::new();
        assert!(encode_domain_name(&name, &mut buf).is_err());
    }

    #[test]
    fn test_parse_domain_name() {
        let bytes = encode("example.com");
        let (name, offset) = parse_domain_name(&bytes, 0).unwrap();
        assert_eq!(name, "example.com");
        assert_eq!(offset, 13);
    }

    #[test]
    fn test_parse_compressed_name() {
        // "example.com" at 0, then "www" + pointer to 0
        let mut bytes = encode("example.com");
        bytes.extend_from_slice(&[3, b'w', b'w', b'w', 0xC0, 0x00]);

        let (name, offset) = parse_domain_name(&bytes, 13).unwrap();
        assert_eq!(name, "www.example.com");
        assert_eq!(offset, bytes.len());
    }

    #[test]
    fn test_pointer_outside_message() {
        let bytes = [3, b'w', b'w', b'w', 0xC0, 0x40];
        let err = parse_domain_name(&bytes, 0).unwrap_err();
        assert!(err.to_string().contains("outside message"));
    }

    #[test]
    fn test_pointer_loop_is_rejected() {
        let bytes = [0xC0, 0x00];
        assert!(parse_domain_name(&bytes, 0).is_err());
    }

    #[test]
    fn test_reserved_label_length_bits() {
        let bytes = [0x40, b'a', 0];
        let err = parse_domain_name(&bytes, 0).unwrap_err();
        assert!(err.to_string().contains("label length"));
    }

    #[test]
    fn test_label_overruns_buffer() {
        let bytes = [5, b'a', b'b'];
        assert!(parse_domain_name(&bytes, 0).is_err());
    }

    #[test]
    fn test_question_bytes() {
        let question = DnsQuestion::new("example.com", RecordType::AAAA.to_u16());
        let mut bytes = Vec::new();
        question.write_to(&mut bytes).unwrap();

        let (parsed, offset) = DnsQuestion::from_bytes(&bytes, 0).unwrap();
        assert_eq!(parsed, question);
        assert_eq!(offset, bytes.len());

        assert!(DnsQuestion::from_bytes(&bytes[..bytes.len() - 1], 0).is_err());
    }

    #[test]
    fn test_answer_decodes_ipv4() {
        let answer = DnsAnswer::from_ip("example.com", 60, "192.168.1.1".parse().unwrap());
        assert_eq!(answer.rtype, RecordType::A.to_u16());
        assert_eq!(answer.rdata, vec![192, 168, 1, 1]);

        let mut bytes = Vec::new();
        answer.write_to(&mut bytes).unwrap();
        let (parsed, _) = DnsAnswer::from_bytes(&bytes, 0).unwrap();
        assert_eq!(parsed, answer);
    }

    #[test]
    fn test_answer_decodes_ipv6() {
        let ip: IpAddr = "2606:2800:220:1:248:1893:25c8:1946".parse().unwrap();
        let answer = DnsAnswer::from_ip("example.com", 300, ip);
        assert_eq!(answer.rtype, RecordType::AAAA.to_u16());

        let mut bytes = Vec::new();
        answer.write_to(&mut bytes).unwrap();
        let (parsed, _) = DnsAnswer::from_bytes(&bytes, 0).unwrap();
        assert_eq!(parsed.ip, Some(ip));
        assert_eq!(parsed.ttl, 300);
    }

    #[test]
    fn test_answer_with_wrong_address_length() {
        let mut bytes = encode("example.com");
        bytes.put_u16(RecordType::A.to_u16());
        bytes.put_u16(CLASS_INET);
        bytes.put_u32(60);
        bytes.put_u16(3);
        bytes.extend_from_slice(&[10, 0, 0]);

        let err = DnsAnswer::from_bytes(&bytes, 0).unwrap_err();
        assert!(err.to_string().contains("A record with 3 bytes"));
    }

    #[test]
    fn test_answer_rdlength_overruns() {
        let mut bytes = encode("example.com");
        bytes.put_u16(RecordType::TXT.to_u16());
        bytes.put_u16(CLASS_INET);
        bytes.put_u32(60);
        bytes.put_u16(20);
        bytes.extend_from_slice(b"short");

        assert!(DnsAnswer::from_bytes(&bytes, 0).is_err());
    }

    #[test]
    fn test_non_address_answer_is_opaque() {
        let mut bytes = encode("www.example.com");
        bytes.put_u16(RecordType::CNAME.to_u16());
        bytes.put_u16(CLASS_INET);
        bytes.put_u32(60);
        let target = encode("example.com");
        bytes.put_u16(target.len() as u16);
        bytes.extend_from_slice(&target);

        let (answer, offset) = DnsAnswer::from_bytes(&bytes, 0).unwrap();
        assert_eq!(answer.ip, None);
        assert_eq!(answer.rdata, target);
        assert_eq!(offset, bytes.len());
    }

    #[test]
    fn test_describe_record_type() {
        assert_eq!(RecordType::describe(1), "A");
        assert_eq!(RecordType::describe(28), "AAAA");
        assert_eq!(RecordType::describe(65), "TYPE65");
    }
}
