//! In-memory store of pending products awaiting a price
//!
//! One entry per chat session. A single lock guards the map and is only held
//! for the map operation itself, never across I/O.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::ProductSuggestion;
use crate::tenant::Tenant;

/// A product draft waiting for the user to send a price
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingProduct {
    pub tenant: Tenant,
    /// Where the image was written on disk
    pub image_path: PathBuf,
    /// Public URL of the stored image
    pub image_url: String,
    pub suggestion: ProductSuggestion,
}

#[derive(Debug)]
struct Slot {
    product: PendingProduct,
    opened_at: Instant,
}

/// Session-keyed pending product store
#[derive(Debug, Default)]
pub struct PendingProducts {
    slots: Mutex<HashMap<String, Slot>>,
    /// Drop sessions older than this; `None` keeps them indefinitely
    ttl: Option<Duration>,
}

impl PendingProducts {
    #[must_use]
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Open (or overwrite) the pending product for a session
    ///
    /// Anonymous sessions (empty id) are not tracked; returns `false` then.
    pub fn open(&self, session_id: &str, product: PendingProduct) -> bool {
        if session_id.is_empty() {
            return false;
        }

        let mut slots = self.lock();
        if let Some(ttl) = self.ttl {
            let before = slots.len();
            slots.retain(|_, slot| slot.opened_at.elapsed() < ttl);
            let swept = before - slots.len();
            if swept > 0 {
                tracing::debug!(swept, "expired pending products dropped");
            }
        }

        let replaced = slots
            .insert(
                session_id.to_string(),
                Slot {
                    product,
                    opened_at: Instant::now(),
                },
            )
            .is_some();
        drop(slots);

        tracing::debug!(session_id, replaced, "pending product opened");
        true
    }

    /// Current pending product for a session
    #[must_use]
    pub fn get(&self, session_id: &str) -> Option<PendingProduct> {
        let mut slots = self.lock();
        self.live_slot(&mut slots, session_id)
            .map(|slot| slot.product.clone())
    }

    /// Whether a session has a pending product
    #[must_use]
    pub fn contains(&self, session_id: &str) -> bool {
        let mut slots = self.lock();
        self.live_slot(&mut slots, session_id).is_some()
    }

    /// Remove and return the pending product for a session
    ///
    /// When two requests race, exactly one of them gets the entry.
    #[must_use]
    pub fn take(&self, session_id: &str) -> Option<PendingProduct> {
        let mut slots = self.lock();
        let slot = slots.remove(session_id)?;
        drop(slots);

        if self.is_expired(&slot) {
            tracing::debug!(session_id, "pending product expired");
            return None;
        }
        Some(slot.product)
    }

    /// Put back an entry removed by [`take`](Self::take)
    ///
    /// A newer entry opened in the meantime wins; returns whether the entry
    /// was restored.
    pub fn restore(&self, session_id: &str, product: PendingProduct) -> bool {
        if session_id.is_empty() {
            return false;
        }

        match self.lock().entry(session_id.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    product,
                    opened_at: Instant::now(),
                });
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Drop the pending product for a session
    pub fn clear(&self, session_id: &str) -> bool {
        self.lock().remove(session_id).is_some()
    }

    /// Number of tracked sessions (expired ones included until swept)
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, slot: &Slot) -> bool {
        self.ttl.is_some_and(|ttl| slot.opened_at.elapsed() >= ttl)
    }

    /// Slot for a session, dropping it first if it has expired
    fn live_slot<'a>(
        &self,
        slots: &'a mut HashMap<String, Slot>,
        session_id: &str,
    ) -> Option<&'a Slot> {
        if slots.get(session_id).is_some_and(|slot| self.is_expired(slot)) {
            slots.remove(session_id);
            tracing::debug!(session_id, "pending product expired");
            return None;
        }
        slots.get(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(title: &str) -> PendingProduct {
        PendingProduct {
            tenant: Tenant::new(1, 1),
            image_path: PathBuf::from("uploads/prod_1.png"),
            image_url: "/uploads/prod_1.png".to_string(),
            suggestion: ProductSuggestion {
                title: title.to_string(),
                description: "desc".to_string(),
                category: "Geral".to_string(),
                tags: vec![],
            },
        }
    }

    #[test]
    fn empty_session_is_not_tracked() {
        let store = PendingProducts::default();
        assert!(!store.open("", product("x")));
        assert!(store.is_empty());
    }

    #[test]
    fn open_overwrites() {
        let store = PendingProducts::default();
        store.open("s1", product("first"));
        store.open("s1", product("second"));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("s1").unwrap().suggestion.title, "second");
    }

    #[test]
    fn take_is_destructive() {
        let store = PendingProducts::default();
        store.open("s1", product("x"));

        assert!(store.take("s1").is_some());
        assert!(store.take("s1").is_none());
        assert!(!store.contains("s1"));
    }

    #[test]
    fn restore_does_not_clobber_newer_entry() {
        let store = PendingProducts::default();
        store.open("s1", product("old"));
        let taken = store.take("s1").unwrap();

        store.open("s1", product("new"));
        assert!(!store.restore("s1", taken.clone()));
        assert_eq!(store.get("s1").unwrap().suggestion.title, "new");

        store.clear("s1");
        assert!(store.restore("s1", taken));
        assert_eq!(store.get("s1").unwrap().suggestion.title, "old");
    }

    #[test]
    fn ttl_expires_lazily() {
        let store = PendingProducts::new(Some(Duration::from_millis(20)));
        store.open("s1", product("x"));
        assert!(store.contains("s1"));

        std::thread::sleep(Duration::from_millis(40));
        assert!(store.get("s1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn open_sweeps_expired_sessions() {
        let store = PendingProducts::new(Some(Duration::from_millis(20)));
        store.open("old", product("x"));
        std::thread::sleep(Duration::from_millis(40));

        store.open("fresh", product("y"));
        assert_eq!(store.len(), 1);
        assert!(store.contains("fresh"));
    }

    #[test]
    fn no_ttl_keeps_sessions() {
        let store = PendingProducts::new(None);
        store.open("s1", product("x"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(store.contains("s1"));
    }
}
