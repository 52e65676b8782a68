//! TTL-bounded answer cache
//!
//! Maps `QNAME/TYPE` keys to framed wire responses exactly as they were received.
//! Expiry is checked lazily on read; `purge_expired` reclaims memory in bulk.

use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;

use crate::dns_question_and_answer::{DnsQuestion, RecordType};

/// TTL applied when every address answer reports zero, in seconds
pub const DEFAULT_TTL: u64 = 600;

/// TTL of injected static records, in seconds (50 years)
pub const LONG_TTL: u64 = 50 * 365 * 24 * 3600;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Bytes,
    /// `None` when the deadline does not fit in an `Instant`
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// Concurrency-safe TTL store
#[derive(Debug, Default)]
pub struct DnsCache {
    entries: DashMap<String, CacheEntry>,
}

impl DnsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `key`, expiring `ttl_secs` seconds from now
    pub fn put(&self, key: impl Into<String>, value: Bytes, ttl_secs: u64) {
        let expires_at = Instant::now().checked_add(Duration::from_secs(ttl_secs));
        self.entries
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    /// The stored bytes, unless absent or expired
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        None
    }

    /// Time left before `key` expires
    pub fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entry = self.entries.get(key)?;
        match entry.expires_at {
            Some(deadline) if now >= deadline => None,
            Some(deadline) => Some(deadline - now),
            None => Some(Duration::MAX),
        }
    }

    /// Drop every expired entry, returning how many went
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cache key for a question, `None` unless it asks for an address type
pub fn cache_key(question: &DnsQuestion) -> Option<String> {
    match RecordType::from_u16(question.qtype)? {
        RecordType::A => Some(format!("{}/A", question.name)),
        RecordType::AAAA => Some(format!("{}/AAAA", question.name)),
        _ => None,
    }
}
