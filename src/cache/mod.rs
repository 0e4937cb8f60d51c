// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process identity cache.
//!
//! Two logical namespaces behind one store:
//!
//! - **identity**: credential key (fingerprint, CN) → resolved
//!   tenant/device identity;
//! - **validated flag**: hash of a basic-credential pair → "this exact pair
//!   was validated remotely before".
//!
//! Entries carry no TTL. Correctness relies on explicit invalidation driven
//! by device lifecycle events, not on expiry; the LRU capacity bound only
//! costs an evicted credential one extra remote validation.
//!
//! Lifecycle events address devices as `tenant@deviceId`, while entries are
//! keyed by credential material. The cache therefore keeps a device-key
//! index mapping each device to the cache keys populated for it, so a
//! `remove` event can evict them without knowing the credential. The index
//! is pruned whenever the LRU evicts or replaces an entry, keeping it
//! bounded by the namespaces it mirrors.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::auth::ResolvedIdentity;

/// Cache keys recorded for one device.
#[derive(Debug, Default)]
struct DeviceKeys {
    identity_keys: HashSet<String>,
    flag_keys: HashSet<String>,
}

struct CacheInner {
    identities: LruCache<String, ResolvedIdentity>,
    /// Validated basic-credential pairs. Presence means "validated"; the
    /// value is the owning device key, kept so eviction can prune the index.
    flags: LruCache<String, String>,
    device_index: HashMap<String, DeviceKeys>,
}

impl CacheInner {
    fn unindex_identity(&mut self, device_key: &str, cache_key: &str) {
        if let Some(keys) = self.device_index.get_mut(device_key) {
            keys.identity_keys.remove(cache_key);
            if keys.identity_keys.is_empty() && keys.flag_keys.is_empty() {
                self.device_index.remove(device_key);
            }
        }
    }

    fn unindex_flag(&mut self, device_key: &str, cache_key: &str) {
        if let Some(keys) = self.device_index.get_mut(device_key) {
            keys.flag_keys.remove(cache_key);
            if keys.identity_keys.is_empty() && keys.flag_keys.is_empty() {
                self.device_index.remove(device_key);
            }
        }
    }
}

/// Shared identity cache. Sole owner of cached entries; the identification
/// service populates it and the invalidation listener deletes from it.
pub struct IdentityCache {
    inner: Mutex<CacheInner>,
}

impl IdentityCache {
    /// Create a cache holding up to `capacity` entries per namespace.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                identities: LruCache::new(capacity),
                flags: LruCache::new(capacity),
                device_index: HashMap::new(),
            }),
        }
    }

    /// Look up the identity cached under a credential key. Absence is a
    /// miss, never an error.
    pub fn get(&self, key: &str) -> Option<ResolvedIdentity> {
        let mut inner = self.inner.lock().ok()?;
        inner.identities.get(key).cloned()
    }

    /// Cache a freshly resolved identity under its credential key.
    pub fn put(&self, key: &str, identity: ResolvedIdentity) {
        if let Ok(mut inner) = self.inner.lock() {
            // `push` hands back the evicted (or replaced) entry; its index
            // record must go with it.
            if let Some((evicted_key, evicted)) =
                inner.identities.push(key.to_string(), identity.clone())
            {
                inner.unindex_identity(&evicted.device_key(), &evicted_key);
            }
            inner
                .device_index
                .entry(identity.device_key())
                .or_default()
                .identity_keys
                .insert(key.to_string());
        }
    }

    /// Delete the identity entry for a credential key. Deleting an absent
    /// key is a no-op.
    pub fn delete(&self, key: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            if let Some(evicted) = inner.identities.pop(key) {
                inner.unindex_identity(&evicted.device_key(), key);
            }
        }
    }

    /// Whether this basic-credential pair was validated before. Absent
    /// means `false`.
    pub fn get_flag(&self, key: &str) -> bool {
        self.inner
            .lock()
            .ok()
            .map(|mut inner| inner.flags.get(key).is_some())
            .unwrap_or(false)
    }

    /// Record a successful remote validation of a basic-credential pair.
    ///
    /// The flag must only ever be set right after the remote validator
    /// accepted this exact pair; `owner` ties it to the device so lifecycle
    /// removal can clear it.
    pub fn set_flag(&self, key: &str, owner: &ResolvedIdentity) {
        if let Ok(mut inner) = self.inner.lock() {
            if let Some((evicted_key, owner_key)) =
                inner.flags.push(key.to_string(), owner.device_key())
            {
                inner.unindex_flag(&owner_key, &evicted_key);
            }
            inner
                .device_index
                .entry(owner.device_key())
                .or_default()
                .flag_keys
                .insert(key.to_string());
        }
    }

    /// Evict everything cached for a device, addressed as the lifecycle
    /// stream addresses it. Removing an unknown device is a no-op.
    pub fn remove_device(&self, tenant: &str, device_id: &str) {
        let device_key = format!("{tenant}@{device_id}");
        if let Ok(mut inner) = self.inner.lock() {
            if let Some(keys) = inner.device_index.remove(&device_key) {
                for key in &keys.identity_keys {
                    inner.identities.pop(key);
                }
                for key in &keys.flag_keys {
                    inner.flags.pop(key);
                }
            }
            // Some deployments key credentials directly by the device key
            // (CN == tenant@deviceId); cover that form as well.
            if let Some(evicted) = inner.identities.pop(&device_key) {
                inner.unindex_identity(&evicted.device_key(), &device_key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> ResolvedIdentity {
        ResolvedIdentity::new("acme", "dev1")
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = IdentityCache::new(16);
        assert!(cache.get("fp-1").is_none());

        cache.put("fp-1", identity());
        assert_eq!(cache.get("fp-1").unwrap(), identity());
    }

    #[test]
    fn delete_is_idempotent() {
        let cache = IdentityCache::new(16);
        cache.delete("never-cached");

        cache.put("fp-1", identity());
        cache.delete("fp-1");
        cache.delete("fp-1");
        assert!(cache.get("fp-1").is_none());
    }

    #[test]
    fn flag_defaults_to_false_and_sticks_once_set() {
        let cache = IdentityCache::new(16);
        assert!(!cache.get_flag("hash-1"));

        cache.set_flag("hash-1", &identity());
        assert!(cache.get_flag("hash-1"));
    }

    #[test]
    fn remove_device_evicts_identity_and_flag_entries() {
        let cache = IdentityCache::new(16);
        cache.put("fp-1", identity());
        cache.set_flag("hash-1", &identity());

        cache.remove_device("acme", "dev1");

        assert!(cache.get("fp-1").is_none());
        assert!(!cache.get_flag("hash-1"));
    }

    #[test]
    fn remove_device_for_unknown_device_is_a_noop() {
        let cache = IdentityCache::new(16);
        cache.put("fp-1", identity());

        cache.remove_device("other", "dev9");
        assert!(cache.get("fp-1").is_some());
    }

    #[test]
    fn remove_device_covers_device_keyed_entries() {
        let cache = IdentityCache::new(16);
        cache.put("acme@dev1", identity());

        cache.remove_device("acme", "dev1");
        assert!(cache.get("acme@dev1").is_none());
    }

    #[test]
    fn lru_eviction_keeps_the_device_index_bounded() {
        let cache = IdentityCache::new(2);
        for i in 0..100 {
            let owner = ResolvedIdentity::new("acme", format!("dev{i}"));
            cache.put(&format!("fp-{i}"), owner.clone());
            cache.set_flag(&format!("hash-{i}"), &owner);
        }

        let inner = cache.inner.lock().unwrap();
        assert_eq!(inner.identities.len(), 2);
        assert_eq!(inner.flags.len(), 2);
        // Only the devices still present in a namespace stay indexed.
        assert_eq!(inner.device_index.len(), 2);
    }

    #[test]
    fn delete_prunes_the_device_index() {
        let cache = IdentityCache::new(16);
        cache.put("fp-1", identity());
        cache.delete("fp-1");

        assert!(cache.inner.lock().unwrap().device_index.is_empty());
    }

    #[test]
    fn replacing_a_key_moves_the_index_to_the_new_device() {
        let cache = IdentityCache::new(16);
        cache.put("cn-1", ResolvedIdentity::new("acme", "dev1"));
        cache.put("cn-1", ResolvedIdentity::new("acme", "dev2"));

        // The old owner no longer reaches the entry; the new one does.
        cache.remove_device("acme", "dev1");
        assert!(cache.get("cn-1").is_some());
        cache.remove_device("acme", "dev2");
        assert!(cache.get("cn-1").is_none());
    }

    #[test]
    fn namespaces_delete_independently() {
        let cache = IdentityCache::new(16);
        cache.put("fp-1", identity());
        cache.set_flag("hash-1", &identity());

        cache.delete("fp-1");
        assert!(cache.get_flag("hash-1"));
    }
}
