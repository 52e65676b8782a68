//! Error types for the forwarder

use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

use crate::connector::Network;

/// Errors that can occur while resolving a query
#[derive(Debug, Error)]
pub enum DnsError {
    /// Malformed wire bytes: truncated header, bad name encoding, inconsistent record length
    #[error("malformed DNS message: {0}")]
    MessageParse(String),

    /// Dial, write or read failure against an upstream server
    #[error("transport error talking to {server} over {network}: {source}")]
    Transport {
        server: String,
        network: Network,
        #[source]
        source: std::io::Error,
    },

    /// The per-exchange deadline elapsed before the upstream replied
    #[error("exchange with {server} timed out after {timeout:?}")]
    Timeout { server: String, timeout: Duration },

    /// Malformed static record text or unparseable IP literal
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// The upstream replied with bytes this resolver cannot decode.
    /// The reply is still carried so it can be forwarded to the client.
    #[error("upstream reply could not be decoded: {source}")]
    UndecodedReply {
        reply: Bytes,
        #[source]
        source: Box<DnsError>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl DnsError {
    pub(crate) fn parse(msg: impl Into<String>) -> Self {
        DnsError::MessageParse(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, DnsError>;
