//! Suppression of re-delivered messages.
//!
//! The channel may deliver the same activity more than once; an identical body from the
//! same user inside the window is dropped.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

type DedupKey = (String, String, String);

#[derive(Clone)]
pub struct DedupCache {
    seen: Arc<DashMap<DedupKey, DateTime<Utc>>>,
    window: chrono::Duration,
}

impl DedupCache {
    pub fn new(window: Duration) -> Self {
        Self {
            seen: Arc::new(DashMap::new()),
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::seconds(30)),
        }
    }

    /// Records the message and returns `true` if it was already seen inside the window.
    pub fn check_and_record(&self, tenant_id: &str, user_id: &str, body: &str) -> bool {
        self.check_and_record_at(tenant_id, user_id, body, Utc::now())
    }

    pub fn check_and_record_at(&self, tenant_id: &str, user_id: &str, body: &str, now: DateTime<Utc>) -> bool {
        let key = (tenant_id.to_string(), user_id.to_string(), body.trim().to_string());

        let mut duplicate = false;
        self.seen
            .entry(key)
            .and_modify(|seen_at| {
                if now - *seen_at < self.window {
                    duplicate = true;
                } else {
                    *seen_at = now;
                }
            })
            .or_insert(now);

        duplicate
    }

    /// Forgets one message, so that a retry is handled again.
    pub fn forget(&self, tenant_id: &str, user_id: &str, body: &str) {
        self.seen.remove(&(tenant_id.to_string(), user_id.to_string(), body.trim().to_string()));
    }

    /// Forgets entries older than the window.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.seen.len();
        self.seen.retain(|_, seen_at| now - *seen_at < self.window);
        let purged = before.saturating_sub(self.seen.len());

        if purged > 0 {
            debug!("Purged {purged} deduplication entries.");
        }

        purged
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_inside_window() {
        let cache = DedupCache::new(Duration::from_secs(30));
        let now = Utc::now();

        assert!(!cache.check_and_record_at("t1", "u1", "office", now));
        assert!(cache.check_and_record_at("t1", "u1", "office ", now + chrono::Duration::seconds(5)));
        assert!(!cache.check_and_record_at("t1", "u2", "office", now));
        assert!(!cache.check_and_record_at("t2", "u1", "office", now));
    }

    #[test]
    fn test_accepted_again_after_window() {
        let cache = DedupCache::new(Duration::from_secs(30));
        let now = Utc::now();

        assert!(!cache.check_and_record_at("t1", "u1", "office", now));
        assert!(!cache.check_and_record_at("t1", "u1", "office", now + chrono::Duration::seconds(31)));
    }

    #[test]
    fn test_forgotten_message_is_accepted_again() {
        let cache = DedupCache::new(Duration::from_secs(30));
        let now = Utc::now();

        assert!(!cache.check_and_record_at("t1", "u1", "office", now));
        cache.forget("t1", "u1", " office");
        assert!(!cache.check_and_record_at("t1", "u1", "office", now + chrono::Duration::seconds(5)));
    }

    #[test]
    fn test_purge() {
        let cache = DedupCache::new(Duration::from_secs(30));
        let now = Utc::now();

        cache.check_and_record_at("t1", "u1", "office", now);
        cache.check_and_record_at("t1", "u1", "remote", now + chrono::Duration::seconds(20));

        assert_eq!(cache.purge_expired_at(now + chrono::Duration::seconds(40)), 1);
        assert_eq!(cache.len(), 1);
    }
}
