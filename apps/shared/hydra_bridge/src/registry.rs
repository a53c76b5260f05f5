//! Name-keyed registry of live object handles
//!
//! Entries are weak: the registry never keeps a proxy alive. It exists so
//! that engine notifications (rename, removal) reach every proxy sharing a
//! handle, and so that one live name maps to one handle.
//!
//! Lock order is registry first, handle second. Nothing takes them the
//! other way round.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, warn};

use crate::proxy::Handle;

/// Dead entries are swept once the map grows past this many slots
const PRUNE_FLOOR: usize = 64;

struct Entries {
    by_name: HashMap<String, Weak<Handle>>,
    prune_at: usize,
}

pub struct ObjectRegistry {
    entries: Mutex<Entries>,
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Entries {
                by_name: HashMap::new(),
                prune_at: PRUNE_FLOOR,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `handle` under `name`, replacing any previous entry
    pub fn register(&self, name: &str, handle: &Arc<Handle>) {
        let mut entries = self.lock();
        entries.by_name.insert(name.to_string(), Arc::downgrade(handle));
        Self::maybe_prune(&mut entries);
    }

    /// Live handle registered under `name`
    pub fn lookup(&self, name: &str) -> Option<Arc<Handle>> {
        self.lock().by_name.get(name).and_then(Weak::upgrade)
    }

    /// Live handle for `name`, or a new one built by `make` and registered
    pub fn bind_or_insert<F>(&self, name: &str, make: F) -> Arc<Handle>
    where
        F: FnOnce() -> Arc<Handle>,
    {
        let mut entries = self.lock();
        if let Some(handle) = entries.by_name.get(name).and_then(Weak::upgrade) {
            return handle;
        }
        let handle = make();
        entries.by_name.insert(name.to_string(), Arc::downgrade(&handle));
        Self::maybe_prune(&mut entries);
        handle
    }

    /// Move the entry for `old` to `new` and rename its handle
    ///
    /// A stale entry still registered under `new` loses its name. Returns
    /// the moved handle, or `None` when nothing live was registered under
    /// `old`.
    pub fn rename(&self, old: &str, new: &str) -> Option<Arc<Handle>> {
        let mut entries = self.lock();
        let handle = entries.by_name.remove(old).and_then(|w| w.upgrade())?;

        handle.set_name(Some(new.to_string()));
        let displaced = entries
            .by_name
            .insert(new.to_string(), Arc::downgrade(&handle))
            .and_then(|w| w.upgrade());

        if let Some(displaced) = &displaced {
            if !Arc::ptr_eq(displaced, &handle) {
                warn!("'{}' renamed onto live name '{}'; dropping the previous holder", old, new);
                displaced.set_name(None);
            }
        }
        debug!("Registry: '{}' -> '{}'", old, new);
        drop(entries);
        Some(handle)
    }

    /// Remove the entry for `name` without touching its handle
    pub fn unregister(&self, name: &str) -> Option<Arc<Handle>> {
        self.lock().by_name.remove(name).and_then(|w| w.upgrade())
    }

    /// Remove the entry for `name` and invalidate its handle
    pub fn invalidate(&self, name: &str) -> Option<Arc<Handle>> {
        let mut entries = self.lock();
        let handle = entries.by_name.remove(name).and_then(|w| w.upgrade())?;
        handle.set_name(None);
        debug!("Registry: '{}' invalidated", name);
        Some(handle)
    }

    /// Invalidate `handle`, removing its entry if it is still the registered one
    pub fn invalidate_handle(&self, handle: &Arc<Handle>) {
        let mut entries = self.lock();
        if let Some(name) = handle.name() {
            let registered = entries
                .by_name
                .get(&name)
                .is_some_and(|w| std::ptr::eq(w.as_ptr(), Arc::as_ptr(handle)));
            if registered {
                entries.by_name.remove(&name);
            }
        }
        handle.set_name(None);
    }

    /// Number of entries, dead ones included
    pub fn len(&self) -> usize {
        self.lock().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries whose handle is gone
    pub fn prune(&self) -> usize {
        let mut entries = self.lock();
        let before = entries.by_name.len();
        entries.by_name.retain(|_, w| w.strong_count() > 0);
        before - entries.by_name.len()
    }

    fn maybe_prune(entries: &mut Entries) {
        if entries.by_name.len() >= entries.prune_at {
            entries.by_name.retain(|_, w| w.strong_count() > 0);
            entries.prune_at = (entries.by_name.len() * 2).max(PRUNE_FLOOR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedChannel, ready_session};

    #[tokio::test]
    async fn test_register_and_lookup() {
        let session = ready_session(ScriptedChannel::new()).await;
        let registry = ObjectRegistry::new();
        let handle = Handle::new("A", session);

        registry.register("A", &handle);
        let found = registry.lookup("A").unwrap();
        assert!(Arc::ptr_eq(&found, &handle));
        assert!(registry.lookup("B").is_none());
    }

    #[tokio::test]
    async fn test_entries_are_weak() {
        let session = ready_session(ScriptedChannel::new()).await;
        let registry = ObjectRegistry::new();
        let handle = Handle::new("A", session);
        registry.register("A", &handle);

        drop(handle);
        assert!(registry.lookup("A").is_none());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.prune(), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_rename_rekeys_and_renames_handle() {
        let session = ready_session(ScriptedChannel::new()).await;
        let registry = ObjectRegistry::new();
        let handle = Handle::new("A", session);
        registry.register("A", &handle);

        let moved = registry.rename("A", "František").unwrap();
        assert!(Arc::ptr_eq(&moved, &handle));
        assert_eq!(handle.name().as_deref(), Some("František"));
        assert!(registry.lookup("A").is_none());
        assert!(registry.lookup("František").is_some());

        // Unknown names are ignored
        assert!(registry.rename("Z", "Y").is_none());
    }

    #[tokio::test]
    async fn test_invalidate() {
        let session = ready_session(ScriptedChannel::new()).await;
        let registry = ObjectRegistry::new();
        let handle = Handle::new("A", session);
        registry.register("A", &handle);

        assert!(registry.invalidate("A").is_some());
        assert_eq!(handle.name(), None);
        assert!(registry.lookup("A").is_none());
        assert!(registry.invalidate("A").is_none());
    }

    #[tokio::test]
    async fn test_invalidate_handle_keeps_other_entries() {
        let session = ready_session(ScriptedChannel::new()).await;
        let registry = ObjectRegistry::new();
        let stale = Handle::new("A", session.clone());
        let current = Handle::new("A", session);
        registry.register("A", &current);

        registry.invalidate_handle(&stale);
        assert_eq!(stale.name(), None);
        assert!(registry.lookup("A").is_some());

        registry.invalidate_handle(&current);
        assert!(registry.lookup("A").is_none());
    }

    #[tokio::test]
    async fn test_bind_or_insert_shares_handles() {
        let session = ready_session(ScriptedChannel::new()).await;
        let registry = ObjectRegistry::new();

        let first = registry.bind_or_insert("A", || Handle::new("A", session.clone()));
        let second = registry.bind_or_insert("A", || Handle::new("A", session.clone()));
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.unregister("A").is_some());
        assert!(registry.lookup("A").is_none());
    }
}
