//! Contact lookups cached per (local account, remote address).
//!
//! Remote addresses are keyed by their minimized form, so every spelling
//! of a phone number shares one entry. Entries are evicted least recently
//! used first and invalidated on contact change notifications.

use std::num::NonZeroUsize;

use calllog_core::ContactRef;
use calllog_core::address::minimize_remote;
use calllog_store::{ContactResolver, StoreError};
use lru::LruCache;
use metrics::counter;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    local_uid: String,
    remote: String,
}

/// Bounded contact cache owned by the controller.
pub struct ContactCache {
    entries: LruCache<CacheKey, Vec<ContactRef>>,
    match_digits: usize,
}

impl ContactCache {
    /// Cache holding at most `capacity` address pairs (at least one).
    pub fn new(capacity: usize, match_digits: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            match_digits,
        }
    }

    fn key(&self, local_uid: &str, remote_uid: &str) -> CacheKey {
        CacheKey {
            local_uid: local_uid.to_owned(),
            remote: minimize_remote(remote_uid, self.match_digits),
        }
    }

    /// Cached contacts for the pair.
    pub fn get(&mut self, local_uid: &str, remote_uid: &str) -> Option<Vec<ContactRef>> {
        let key = self.key(local_uid, remote_uid);
        self.entries.get(&key).cloned()
    }

    /// Store the contacts for the pair.
    pub fn insert(&mut self, local_uid: &str, remote_uid: &str, contacts: Vec<ContactRef>) {
        let key = self.key(local_uid, remote_uid);
        let _ = self.entries.put(key, contacts);
    }

    /// Contacts for the pair, asking `resolver` on a miss.
    pub async fn resolve(
        &mut self,
        resolver: &dyn ContactResolver,
        local_uid: &str,
        remote_uid: &str,
    ) -> Result<Vec<ContactRef>, StoreError> {
        if let Some(hit) = self.get(local_uid, remote_uid) {
            counter!("calllog_contact_cache_total", "result" => "hit").increment(1);
            return Ok(hit);
        }
        counter!("calllog_contact_cache_total", "result" => "miss").increment(1);
        let contacts = resolver.resolve_contacts(local_uid, remote_uid).await?;
        self.insert(local_uid, remote_uid, contacts.clone());
        Ok(contacts)
    }

    /// Drop every entry for the given remote addresses, on any local
    /// account. Returns how many entries went.
    pub fn invalidate<S: AsRef<str>>(&mut self, remote_uids: &[S]) -> usize {
        let remotes: Vec<String> = remote_uids
            .iter()
            .map(|r| minimize_remote(r.as_ref(), self.match_digits))
            .collect();
        let stale: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(key, _)| remotes.contains(&key.remote))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            let _ = self.entries.pop(key);
        }
        if !stale.is_empty() {
            debug!(entries = stale.len(), "contact cache entries invalidated");
        }
        stale.len()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Cached pairs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use calllog_store::sqlite::{ConnectionConfig, SqliteContactResolver, SqliteEventStore, new_in_memory};

    fn alice() -> Vec<ContactRef> {
        vec![ContactRef {
            id: 1,
            name: "Alice".into(),
        }]
    }

    #[test]
    fn spellings_share_an_entry() {
        let mut cache = ContactCache::new(8, 7);
        cache.insert("ring", "+1 (555) 123-4567", alice());
        assert_eq!(cache.get("ring", "5551234567"), Some(alice()));
        assert_eq!(cache.get("other", "5551234567"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn least_recently_used_is_evicted() {
        let mut cache = ContactCache::new(2, 7);
        cache.insert("ring", "5550000001", Vec::new());
        cache.insert("ring", "5550000002", Vec::new());
        let _ = cache.get("ring", "5550000001");
        cache.insert("ring", "5550000003", Vec::new());
        assert!(cache.get("ring", "5550000002").is_none());
        assert!(cache.get("ring", "5550000001").is_some());
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut cache = ContactCache::new(0, 7);
        cache.insert("ring", "a@example.com", alice());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalidate_by_remote_on_every_account() {
        let mut cache = ContactCache::new(8, 7);
        cache.insert("ring", "+15551234567", alice());
        cache.insert("sip", "5551234567", alice());
        cache.insert("ring", "5559999999", Vec::new());
        assert_eq!(cache.invalidate(&["555-123-4567"]), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.invalidate::<&str>(&[]), 0);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn resolve_fills_on_miss() {
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        let _store = SqliteEventStore::new(pool.clone(), 7).unwrap();
        let resolver = SqliteContactResolver::new(pool, 7);
        resolver
            .upsert_contact(1, "Alice", vec!["+15551234567".into()])
            .await
            .unwrap();

        let mut cache = ContactCache::new(8, 7);
        let found = cache.resolve(&resolver, "ring", "5551234567").await.unwrap();
        assert_eq!(found, alice());
        assert_eq!(cache.len(), 1);

        // Served from the cache after the contact is gone.
        resolver.remove_contact(1).await.unwrap();
        assert_eq!(cache.resolve(&resolver, "ring", "5551234567").await.unwrap(), alice());
        let _ = cache.invalidate(&["5551234567"]);
        assert!(cache.resolve(&resolver, "ring", "5551234567").await.unwrap().is_empty());
    }
}
