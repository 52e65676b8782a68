//! Command line configuration

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use crate::connector::Connector;
use crate::error::{DnsError, Result};
use crate::resolver::Resolver;

#[derive(Parser, Debug, Clone)]
#[command(name = "dns-forwarder")]
#[command(about = "Caching DNS forwarder with per-domain upstream servers")]
pub struct Config {
    /// Address to serve DNS on, over both UDP and TCP
    #[arg(long, default_value = "127.0.0.1:5353")]
    pub listen: SocketAddr,

    /// Default upstream server; repeat to list more (the first one is used)
    #[arg(long = "server", value_name = "HOST:PORT", default_value = "8.8.8.8:53")]
    pub servers: Vec<String>,

    /// Route a domain to other servers, e.g. corp.example=10.0.0.53:53,10.0.0.54:53
    #[arg(long = "forward", value_name = "DOMAIN=SERVERS")]
    pub forwards: Vec<ForwardRule>,

    /// Static record, e.g. router.lan/192.168.1.1
    #[arg(long = "record", value_name = "DOMAIN/IP")]
    pub records: Vec<String>,

    /// Use TCP upstream even for queries that arrived over UDP
    #[arg(long)]
    pub always_tcp: bool,

    /// Upstream exchange deadline in seconds
    #[arg(long, default_value_t = 3)]
    pub timeout: u64,

    /// Seconds between sweeps of expired cache entries (0 disables)
    #[arg(long, default_value_t = 60)]
    pub cache_sweep: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// `domain=server[,server...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardRule {
    pub domain: String,
    pub servers: Vec<String>,
}

impl FromStr for ForwardRule {
    type Err = DnsError;

    fn from_str(s: &str) -> Result<Self> {
        let (domain, servers) = s
            .split_once('=')
            .ok_or_else(|| DnsError::Config(format!("expected DOMAIN=SERVERS, got {:?}", s)))?;

        let servers: Vec<String> = servers
            .split(',')
            .map(str::trim)
            .filter(|server| !server.is_empty())
            .map(String::from)
            .collect();

        if domain.is_empty() || servers.is_empty() {
            return Err(DnsError::Config(format!("incomplete forward rule {:?}", s)));
        }

        Ok(ForwardRule {
            domain: domain.trim_end_matches('.').to_string(),
            servers,
        })
    }
}

impl Config {
    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.cache_sweep > 0).then(|| Duration::from_secs(self.cache_sweep))
    }

    /// A resolver with every configured route and static record applied
    pub fn build_resolver(&self, connector: Arc<dyn Connector>) -> Result<Resolver> {
        if self.timeout == 0 {
            return Err(DnsError::Config("timeout must be at least one second".into()));
        }

        let mut resolver =
            Resolver::new(connector, self.servers.clone())?.with_timeout(self.exchange_timeout());

        for rule in &self.forwards {
            resolver.set_server(&rule.domain, rule.servers.iter().cloned());
        }

        for record in &self.records {
            resolver.add_record(record)?;
        }

        Ok(resolver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::DirectConnector;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["dns-forwarder"]).unwrap();
        assert_eq!(config.listen, "127.0.0.1:5353".parse().unwrap());
        assert_eq!(config.servers, vec!["8.8.8.8:53"]);
        assert!(config.forwards.is_empty());
        assert!(!config.always_tcp);
        assert_eq!(config.exchange_timeout(), Duration::from_secs(3));
        assert_eq!(config.sweep_interval(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_full_command_line() {
        let config = Config::try_parse_from([
            "dns-forwarder",
            "--listen",
            "0.0.0.0:53",
            "--server",
            "1.1.1.1:53",
            "--server",
            "9.9.9.9:53",
            "--forward",
            "corp.example=10.0.0.53:53,10.0.0.54:53",
            "--record",
            "router.lan/192.168.1.1",
            "--always-tcp",
            "--cache-sweep",
            "0",
        ])
        .unwrap();

        assert_eq!(config.servers, vec!["1.1.1.1:53", "9.9.9.9:53"]);
        assert_eq!(
            config.forwards,
            vec![ForwardRule {
                domain: "corp.example".into(),
                servers: vec!["10.0.0.53:53".into(), "10.0.0.54:53".into()],
            }]
        );
        assert!(config.always_tcp);
        assert_eq!(config.sweep_interval(), None);

        let resolver = config
            .build_resolver(Arc::new(DirectConnector::default()))
            .unwrap();
        assert_eq!(resolver.get_server("intranet.corp.example"), "10.0.0.53:53");
        assert_eq!(resolver.get_server("example.org"), "1.1.1.1:53");
        assert!(resolver.cache().get("router.lan/A").is_some());
    }

    #[test]
    fn test_bad_forward_rule() {
        for bad in ["corp.example", "=10.0.0.53:53", "corp.example=", "corp.example= , "] {
            assert!(bad.parse::<ForwardRule>().is_err(), "{} should be rejected", bad);
        }
        assert!(Config::try_parse_from(["dns-forwarder", "--forward", "nope"]).is_err());
    }

    #[test]
    fn test_bad_record_fails_build() {
        let config =
            Config::try_parse_from(["dns-forwarder", "--record", "router.lan/not-an-ip"]).unwrap();
        assert!(matches!(
            config.build_resolver(Arc::new(DirectConnector::default())),
            Err(DnsError::InvalidRecord(_))
        ));
    }
}
