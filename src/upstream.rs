use std::collections::HashMap;

use crate::error::{DnsError, Result};

/// Picks the upstream server for a query domain by suffix.
///
/// Populated before serving starts; lookups afterwards only need `&self`.
#[derive(Debug, Clone)]
pub struct UpstreamRouter {
    default_servers: Vec<String>,
    servers: HashMap<String, Vec<String>>,
}

impl UpstreamRouter {
    /// Requires at least one default server
    pub fn new(default_servers: Vec<String>) -> Result<Self> {
        if default_servers.is_empty() {
            return Err(DnsError::Config("no default upstream server".into()));
        }

        Ok(Self {
            default_servers,
            servers: HashMap::new(),
        })
    }

    /// Append servers for queries under `domain`
    pub fn set_server<I, S>(&mut self, domain: &str, servers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.servers
            .entry(domain.to_string())
            .or_default()
            .extend(servers.into_iter().map(Into::into));
    }

    /// The server for `domain`.
    ///
    /// Candidate suffixes are probed from the registrable-looking one
    /// (`example.com` for `www.example.com`) towards the full name, and the first
    /// registered one wins. A broader registration therefore shadows a more
    /// specific one.
    pub fn get_server(&self, domain: &str) -> &str {
        let labels: Vec<&str> = domain.split('.').collect();
        let len = labels.len();

        for i in (0..len.saturating_sub(1)).rev() {
            let suffix = labels[i..].join(".");
            if let Some(server) = self.servers.get(&suffix).and_then(|s| s.first()) {
                return server;
            }
        }

        &self.default_servers[0]
    }
}
