//! The forwarding resolver: cache lookup, upstream routing, exchange, caching
//! of address answers and answer notification.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::{debug, info, warn};

use crate::cache::{cache_key, DnsCache, DEFAULT_TTL, LONG_TTL};
use crate::connector::{Connector, Network};
use crate::dns_message::{set_message_id, unframe, DnsMessage};
use crate::dns_question_and_answer::RecordType;
use crate::error::{DnsError, Result};
use crate::forwarder;
use crate::local::{response_for, StaticRecord};
use crate::upstream::UpstreamRouter;

/// Deadline for one upstream dial + write + read
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(3);

/// Observes every address resolved through the resolver.
///
/// Handlers run synchronously, in registration order. Their errors are logged
/// and otherwise ignored.
pub trait AnswerHandler: Send + Sync {
    fn handle(&self, domain: &str, ip: IpAddr) -> anyhow::Result<()>;
}

impl<F> AnswerHandler for F
where
    F: Fn(&str, IpAddr) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(&self, domain: &str, ip: IpAddr) -> anyhow::Result<()> {
        self(domain, ip)
    }
}

/// Reply from an upstream server and how it was obtained
struct UpstreamReply {
    server: String,
    network: Network,
    bytes: Bytes,
}

pub struct Resolver {
    connector: Arc<dyn Connector>,
    cache: DnsCache,
    router: UpstreamRouter,
    handlers: Vec<Box<dyn AnswerHandler>>,
    timeout: Duration,
}

impl Resolver {
    /// `servers` is the ordered default upstream list and must not be empty
    pub fn new(connector: Arc<dyn Connector>, servers: Vec<String>) -> Result<Self> {
        Ok(Self {
            connector,
            cache: DnsCache::new(),
            router: UpstreamRouter::new(servers)?,
            handlers: Vec::new(),
            timeout: DEFAULT_EXCHANGE_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache(&self) -> &DnsCache {
        &self.cache
    }

    pub fn set_server<I, S>(&mut self, domain: &str, servers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.router.set_server(domain, servers);
    }

    pub fn get_server(&self, domain: &str) -> &str {
        self.router.get_server(domain)
    }

    pub fn add_handler(&mut self, handler: impl AnswerHandler + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Inject a record such as `www.example.com/1.2.3.4` that never expires
    pub fn add_record(&self, record: &str) -> Result<()> {
        let record: StaticRecord = record.parse()?;
        let msg = response_for(&record.domain, record.ip);

        if let Some(key) = cache_key(&msg.question) {
            self.cache.put(key, msg.marshal_framed()?, LONG_TTL);
        }

        debug!(domain = %record.domain, ip = %record.ip, "static record added");
        Ok(())
    }

    /// Resolve one framed client query, returning the framed reply.
    ///
    /// When the upstream reply cannot be decoded it is still handed back, inside
    /// [`DnsError::UndecodedReply`].
    pub async fn exchange(&self, req_bytes: &[u8], client: &str, prefer_tcp: bool) -> Result<Bytes> {
        let req = DnsMessage::unmarshal(unframe(req_bytes)?)?;
        let qtype = RecordType::describe(req.question.qtype);

        let key = cache_key(&req.question);
        if let Some(cached) = key.as_deref().and_then(|key| self.cache.get(key)) {
            let mut reply = BytesMut::from(&cached[..]);
            set_message_id(&mut reply, req.id);

            info!(client, qtype = %qtype, qname = %req.question.name, "answered from cache");
            return Ok(reply.freeze());
        }

        let upstream = self
            .forward(&req.question.name, req_bytes, prefer_tcp)
            .await?;

        if key.is_none() {
            info!(
                client,
                server = %upstream.server,
                network = %upstream.network,
                qtype = %qtype,
                qname = %req.question.name,
                "forwarded"
            );
            return Ok(upstream.bytes);
        }

        let resp = match unframe(&upstream.bytes).and_then(DnsMessage::unmarshal) {
            Ok(resp) => resp,
            Err(e) => {
                warn!(
                    client,
                    server = %upstream.server,
                    qname = %req.question.name,
                    error = %e,
                    "forwarding undecodable reply"
                );
                return Err(DnsError::UndecodedReply {
                    reply: upstream.bytes,
                    source: Box::new(e),
                });
            }
        };

        let mut ips = Vec::new();
        let mut ttl = 0;
        for answer in &resp.answers {
            let Some(ip) = answer.ip else { continue };
            self.notify(&resp.question.name, ip);
            ips.push(ip);
            ttl = ttl.max(answer.ttl);
        }

        // Only replies that carry an address are cached
        if !ips.is_empty() {
            let ttl = if ttl == 0 { DEFAULT_TTL } else { u64::from(ttl) };
            if let Some(key) = cache_key(&resp.question) {
                self.cache.put(key, upstream.bytes.clone(), ttl);
            }
        }

        info!(
            client,
            server = %upstream.server,
            network = %upstream.network,
            qtype = %qtype,
            qname = %resp.question.name,
            ips = ?ips,
            "resolved"
        );

        Ok(upstream.bytes)
    }

    /// Pick a server and transport for `qname` and run one round trip
    async fn forward(&self, qname: &str, req_bytes: &[u8], prefer_tcp: bool) -> Result<UpstreamReply> {
        let dialer = self.connector.next_dialer(&format!("{}:53", qname));
        let network = Network::select(prefer_tcp, dialer.is_direct());
        let server = self.router.get_server(qname).to_string();

        let round_trip = async {
            let conn = dialer.dial(network, &server).await?;
            forwarder::exchange(network, conn, req_bytes).await
        };

        let outcome = tokio::time::timeout(self.timeout, round_trip).await;
        let bytes = match outcome {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(source)) => {
                warn!(server = %server, network = %network, error = %source, "upstream exchange failed");
                return Err(DnsError::Transport {
                    server,
                    network,
                    source,
                });
            }
            Err(_) => {
                warn!(server = %server, network = %network, "upstream exchange timed out");
                return Err(DnsError::Timeout {
                    server,
                    timeout: self.timeout,
                });
            }
        };

        Ok(UpstreamReply {
            server,
            network,
            bytes,
        })
    }

    fn notify(&self, domain: &str, ip: IpAddr) {
        for handler in &self.handlers {
            if let Err(e) = handler.handle(domain, ip) {
                debug!(domain, ip = %ip, error = %e, "answer handler failed");
            }
        }
    }
}
