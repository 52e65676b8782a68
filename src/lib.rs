//! A caching DNS forwarder for a forward proxy.
//!
//! Client queries are answered from a TTL cache when possible, otherwise
//! forwarded to an upstream server chosen by domain suffix, over TCP or UDP,
//! through a pluggable [`Connector`]. Address answers are cached and reported
//! to registered [`AnswerHandler`]s. Static records can be injected and never
//! expire.
//!
//! Every buffer entering or leaving [`Resolver::exchange`] carries a 2-byte
//! big-endian length prefix, whatever transport the upstream leg used.

pub mod cache;
pub mod config;
pub mod connector;
pub mod dns_header;
pub mod dns_message;
pub mod dns_question_and_answer;
pub mod error;
pub mod forwarder;
pub mod local;
pub mod resolver;
pub mod server;
pub mod upstream;

pub use cache::{DnsCache, DEFAULT_TTL, LONG_TTL};
pub use config::{Config, ForwardRule};
pub use connector::{Conn, Connector, Dialer, DirectConnector, Network};
pub use dns_message::DnsMessage;
pub use error::{DnsError, Result};
pub use local::{gen_response, StaticRecord};
pub use resolver::{AnswerHandler, Resolver};
pub use server::DnsServer;
pub use upstream::UpstreamRouter;
