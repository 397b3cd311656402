//! VU registry
//!
//! Maps unit identities to their live transport sessions.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::transport::TransportSession;

/// Identity of one virtual unit. Pool identities start at 1.
pub type VuId = u32;

/// A session shared between the registry and whoever is driving the unit.
/// The mutex keeps each unit to one caller at a time.
pub type SharedSession = Arc<Mutex<TransportSession>>;

struct Units {
    sessions: HashMap<VuId, SharedSession>,
    last_id: VuId,
}

/// Registry for tracking live units
pub struct VuRegistry {
    units: RwLock<Units>,
}

impl VuRegistry {
    pub fn new() -> Self {
        Self {
            units: RwLock::new(Units {
                sessions: HashMap::new(),
                last_id: 0,
            }),
        }
    }

    /// Store `session` under `id`, returning whatever was there before.
    pub async fn put(&self, id: VuId, session: TransportSession) -> Option<SharedSession> {
        let mut units = self.units.write().await;
        units.last_id = units.last_id.max(id);
        units.sessions.insert(id, Arc::new(Mutex::new(session)))
    }

    /// Store `session` under the next free identity and return it.
    pub async fn register(&self, session: TransportSession) -> VuId {
        let mut units = self.units.write().await;
        units.last_id += 1;
        let id = units.last_id;
        units.sessions.insert(id, Arc::new(Mutex::new(session)));
        id
    }

    pub async fn get(&self, id: VuId) -> Option<SharedSession> {
        self.units.read().await.sessions.get(&id).cloned()
    }

    pub async fn remove(&self, id: VuId) -> Option<SharedSession> {
        self.units.write().await.sessions.remove(&id)
    }

    /// Take every entry out of the registry and reset the identity counter.
    pub async fn drain(&self) -> Vec<(VuId, SharedSession)> {
        let mut units = self.units.write().await;
        units.last_id = 0;
        let mut drained: Vec<_> = units.sessions.drain().collect();
        drained.sort_by_key(|(id, _)| *id);
        drained
    }

    pub async fn len(&self) -> usize {
        self.units.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.units.read().await.sessions.is_empty()
    }

    /// Registered identities in ascending order.
    pub async fn ids(&self) -> Vec<VuId> {
        let mut ids: Vec<_> = self.units.read().await.sessions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for VuRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryDialer;
    use crate::transport::testing::test_config;

    fn session(dialer: &MemoryDialer) -> TransportSession {
        TransportSession::establish(dialer, &test_config(), "host", 22).unwrap()
    }

    #[tokio::test]
    async fn test_register_assigns_incrementing_ids() {
        let dialer = MemoryDialer::new();
        let registry = VuRegistry::new();

        assert_eq!(registry.register(session(&dialer)).await, 1);
        assert_eq!(registry.register(session(&dialer)).await, 2);
        assert_eq!(registry.ids().await, vec![1, 2]);

        registry.remove(1).await;
        assert!(registry.get(1).await.is_none());
        assert!(registry.get(2).await.is_some());
        assert_eq!(registry.register(session(&dialer)).await, 3);
    }

    #[tokio::test]
    async fn test_put_after_bulk_fill_continues_numbering() {
        let dialer = MemoryDialer::new();
        let registry = VuRegistry::new();

        for id in [3, 1, 2] {
            assert!(registry.put(id, session(&dialer)).await.is_none());
        }
        assert_eq!(registry.len().await, 3);
        assert_eq!(registry.register(session(&dialer)).await, 4);
    }

    #[tokio::test]
    async fn test_drain_empties_and_resets() {
        let dialer = MemoryDialer::new();
        let registry = VuRegistry::new();
        registry.register(session(&dialer)).await;
        registry.register(session(&dialer)).await;

        let drained = registry.drain().await;
        assert_eq!(drained.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(registry.is_empty().await);
        assert_eq!(registry.register(session(&dialer)).await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_puts_land_in_own_slots() {
        let dialer = MemoryDialer::new();
        let registry = Arc::new(VuRegistry::new());

        let mut tasks = Vec::new();
        for id in 1..=20 {
            let registry = Arc::clone(&registry);
            let s = session(&dialer);
            tasks.push(tokio::spawn(async move { registry.put(id, s).await }));
        }
        for task in tasks {
            assert!(task.await.unwrap().is_none());
        }
        assert_eq!(registry.ids().await, (1..=20).collect::<Vec<_>>());
    }
}
