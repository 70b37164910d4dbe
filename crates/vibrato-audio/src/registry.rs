//! Registry of open streams keyed by identity.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use vibrato_core::{Error, Result, StreamId};

use crate::stream::StreamHandle;

/// Owns every open [`StreamHandle`].
///
/// Backed by a sharded concurrent map: insert and remove are atomic with
/// respect to lookups, and operations on different shards never block each
/// other. The output device only ever holds `Weak` references, so dropping
/// an entry here is what ends a stream's life.
#[derive(Debug, Default)]
pub struct StreamRegistry {
    streams: DashMap<StreamId, Arc<StreamHandle>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly created handle under its own identity.
    pub fn insert(&self, handle: Arc<StreamHandle>) -> Result<()> {
        match self.streams.entry(handle.id()) {
            Entry::Occupied(entry) => Err(Error::DuplicateIdentity(*entry.key())),
            Entry::Vacant(entry) => {
                entry.insert(handle);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, id: StreamId) -> Result<Arc<StreamHandle>> {
        self.streams
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(Error::NotFound(id))
    }

    /// Take the handle out of the registry; later lookups fail with `NotFound`.
    pub fn remove(&self, id: StreamId) -> Result<Arc<StreamHandle>> {
        self.streams
            .remove(&id)
            .map(|(_, handle)| handle)
            .ok_or(Error::NotFound(id))
    }

    /// Snapshot of identity to display name. May be stale as soon as it returns.
    pub fn enumerate(&self) -> HashMap<StreamId, String> {
        self.streams
            .iter()
            .map(|entry| (*entry.key(), entry.value().name().to_string()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Remove every handle, returning them for the caller to close.
    pub fn drain(&self) -> Vec<Arc<StreamHandle>> {
        let ids: Vec<StreamId> = self.streams.iter().map(|entry| *entry.key()).collect();
        ids.into_iter()
            .filter_map(|id| self.streams.remove(&id).map(|(_, handle)| handle))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::frame::MemorySource;
    use std::thread;

    fn handle(name: &str) -> Arc<StreamHandle> {
        Arc::new(StreamHandle::new(
            StreamId::new(),
            name,
            44100,
            Box::new(MemorySource::new(vec![[0.0, 0.0]; 16])),
        ))
    }

    #[test]
    fn test_insert_lookup_remove() {
        let registry = StreamRegistry::new();
        let stream = handle("A");
        let id = stream.id();

        registry.insert(stream).unwrap();
        assert_eq!(registry.lookup(id).unwrap().name(), "A");

        let removed = registry.remove(id).unwrap();
        assert_eq!(removed.id(), id);
        assert!(matches!(registry.lookup(id), Err(Error::NotFound(_))));
        assert!(matches!(registry.remove(id), Err(Error::NotFound(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let registry = StreamRegistry::new();
        let stream = handle("A");
        registry.insert(stream.clone()).unwrap();

        let err = registry.insert(stream).unwrap_err();
        assert!(matches!(err, Error::DuplicateIdentity(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_enumerate_snapshot() {
        let registry = StreamRegistry::new();
        let a = handle("A");
        let b = handle("B");
        let (a_id, b_id) = (a.id(), b.id());
        registry.insert(a).unwrap();
        registry.insert(b).unwrap();

        let listing = registry.enumerate();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[&a_id], "A");
        assert_eq!(listing[&b_id], "B");
    }

    #[test]
    fn test_concurrent_insert_and_remove() {
        let registry = Arc::new(StreamRegistry::new());

        let workers: Vec<_> = (0..8)
            .map(|t| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        let stream = handle(&format!("{t}-{i}"));
                        let id = stream.id();
                        registry.insert(stream).unwrap();
                        assert!(registry.lookup(id).is_ok());
                        if i % 2 == 0 {
                            registry.remove(id).unwrap();
                            assert!(registry.lookup(id).is_err());
                        }
                        let _ = registry.enumerate();
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(registry.len(), 8 * 50);

        let drained = registry.drain();
        assert_eq!(drained.len(), 400);
        assert!(registry.is_empty());
    }
}
