//! Subscriber registry: id → subscriber record.
//!
//! Membership changes take the write lock for a single map operation;
//! `snapshot` takes the read lock just long enough to clone the `Arc`s.
//! No lock here is ever held while a delivery is attempted.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::subscriber::{SubscriberEntry, SubscriberId, SubscriberState};

#[derive(Default)]
pub(crate) struct Registry {
    entries: RwLock<HashMap<SubscriberId, Arc<SubscriberEntry>>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, entry: Arc<SubscriberEntry>) {
        self.write().insert(entry.id, entry);
    }

    pub(crate) fn remove(&self, id: SubscriberId) -> Option<Arc<SubscriberEntry>> {
        self.write().remove(&id)
    }

    /// Point-in-time copy of every `Active` subscriber.
    pub(crate) fn snapshot(&self) -> Vec<Arc<SubscriberEntry>> {
        self.read()
            .values()
            .filter(|e| e.state() == SubscriberState::Active)
            .cloned()
            .collect()
    }

    /// Remove every subscriber at once (shutdown).
    pub(crate) fn drain(&self) -> Vec<Arc<SubscriberEntry>> {
        self.write().drain().map(|(_, e)| e).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.read().len()
    }

    // A poisoned lock means a panic happened mid-mutation; the subscriber set
    // can no longer be trusted, so the panic is propagated.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<SubscriberId, Arc<SubscriberEntry>>> {
        self.entries.read().expect("subscriber registry poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SubscriberId, Arc<SubscriberEntry>>> {
        self.entries.write().expect("subscriber registry poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn entry(id: u64) -> (Arc<SubscriberEntry>, mpsc::Receiver<crate::Delivery>) {
        let (tx, rx) = mpsc::channel(1);
        (Arc::new(SubscriberEntry::new(SubscriberId(id), tx)), rx)
    }

    #[test]
    fn insert_remove() {
        let reg = Registry::new();
        let (e, _rx) = entry(1);
        reg.insert(e);
        assert_eq!(reg.len(), 1);
        assert!(reg.remove(SubscriberId(1)).is_some());
        assert!(reg.remove(SubscriberId(1)).is_none());
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn snapshot_skips_non_active() {
        let reg = Registry::new();
        let (a, _ra) = entry(1);
        let (b, _rb) = entry(2);
        reg.insert(a);
        reg.insert(b.clone());
        b.begin_drain();

        let snap = reg.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].id, SubscriberId(1));
    }

    #[test]
    fn snapshot_is_detached_from_later_changes() {
        let reg = Registry::new();
        let (a, _ra) = entry(1);
        reg.insert(a);
        let snap = reg.snapshot();
        reg.remove(SubscriberId(1));
        assert_eq!(snap.len(), 1);
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn drain_empties() {
        let reg = Registry::new();
        let (a, _ra) = entry(1);
        let (b, _rb) = entry(2);
        reg.insert(a);
        reg.insert(b);
        assert_eq!(reg.drain().len(), 2);
        assert_eq!(reg.len(), 0);
    }
}
