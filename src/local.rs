use std::net::IpAddr;

use crate::dns_header::MessageKind;
use crate::dns_message::DnsMessage;
use crate::dns_question_and_answer::{encode_domain_name, DnsAnswer, DnsQuestion};
use crate::error::{DnsError, Result};

/// A locally injected `domain -> address` mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticRecord {
    pub domain: String,
    pub ip: IpAddr,
}

impl std::str::FromStr for StaticRecord {
    type Err = DnsError;

    /// Format: `www.example.com/1.2.3.4` or `www.example.com/2606:2800:220:1::1946`
    fn from_str(s: &str) -> Result<Self> {
        let (domain, ip) = s
            .split_once('/')
            .ok_or_else(|| DnsError::InvalidRecord(format!("missing '/' in {:?}", s)))?;

        if domain.is_empty() {
            return Err(DnsError::InvalidRecord(format!("empty domain in {:?}", s)));
        }

        encode_domain_name(domain, &mut Vec::<u8>::new())
            .map_err(|e| DnsError::InvalidRecord(format!("{} in {:?}", e, s)))?;

        Ok(StaticRecord {
            domain: domain.to_string(),
            ip: parse_ip(ip)?,
        })
    }
}

/// IPv4-mapped IPv6 literals (`::ffff:10.0.0.1`) come back as IPv4
fn parse_ip(ip: &str) -> Result<IpAddr> {
    ip.parse::<IpAddr>()
        .map(|ip| ip.to_canonical())
        .map_err(|_| DnsError::InvalidRecord(format!("invalid ip format: {:?}", ip)))
}

/// Build a response holding one question and the matching A or AAAA answer.
/// The answer TTL is zero; the cache entry holding it decides its lifetime.
pub fn gen_response(domain: &str, ip: &str) -> Result<DnsMessage> {
    Ok(response_for(domain, parse_ip(ip)?))
}

pub(crate) fn response_for(domain: &str, ip: IpAddr) -> DnsMessage {
    let answer = DnsAnswer::from_ip(domain, 0, ip);

    let mut msg = DnsMessage::new(0, MessageKind::Response);
    msg.set_question(DnsQuestion::new(domain, answer.rtype));
    msg.add_answer(answer);
    msg
}
