//! Subscriber registry.
//!
//! Tracks every chat that has talked to the bot and which of them opted in
//! to periodic digests. The digest set is always a subset of the known set.
//!
//! Readers take point-in-time snapshots and act on those; a subscriber added
//! or toggled after the snapshot is picked up by the next delivery cycle.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Chat/session identifier of a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Per-subscriber flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriberFlags {
    /// Receives change notifications.
    pub is_known: bool,

    /// Also receives periodic digests.
    pub wants_digest: bool,
}

impl SubscriberFlags {
    fn known() -> Self {
        Self {
            is_known: true,
            wants_digest: false,
        }
    }
}

/// Concurrency-safe subscriber registry.
#[derive(Debug, Default)]
pub struct Registry {
    subscribers: RwLock<HashMap<ChatId, SubscriberFlags>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber with default flags. Idempotent.
    ///
    /// Returns `true` if the subscriber was not known before.
    pub async fn register(&self, id: ChatId) -> bool {
        let mut subscribers = self.subscribers.write().await;
        let mut inserted = false;
        let flags = subscribers.entry(id).or_insert_with(|| {
            inserted = true;
            SubscriberFlags::known()
        });
        flags.is_known = true;

        if inserted {
            info!(chat_id = %id, subscriber_count = subscribers.len(), "New subscriber");
        }
        inserted
    }

    /// Set the digest flag, registering the subscriber first if needed.
    pub async fn set_digest(&self, id: ChatId, enabled: bool) {
        let mut subscribers = self.subscribers.write().await;
        let flags = subscribers.entry(id).or_insert_with(SubscriberFlags::known);
        flags.is_known = true;
        flags.wants_digest = enabled;
        debug!(chat_id = %id, enabled, "Digest flag updated");
    }

    /// Every subscriber that receives change notifications.
    pub async fn snapshot_known(&self) -> BTreeSet<ChatId> {
        let subscribers = self.subscribers.read().await;
        subscribers
            .iter()
            .filter(|(_, flags)| flags.is_known)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Every subscriber that opted in to digests.
    pub async fn snapshot_digest(&self) -> BTreeSet<ChatId> {
        let subscribers = self.subscribers.read().await;
        subscribers
            .iter()
            .filter(|(_, flags)| flags.is_known && flags.wants_digest)
            .map(|(id, _)| *id)
            .collect()
    }

    pub async fn digest_flag(&self, id: ChatId) -> bool {
        let subscribers = self.subscribers.read().await;
        subscribers.get(&id).is_some_and(|flags| flags.wants_digest)
    }

    pub async fn flags(&self, id: ChatId) -> Option<SubscriberFlags> {
        self.subscribers.read().await.get(&id).copied()
    }

    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscribers.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use proptest::prelude::*;

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let registry = Registry::new();
        assert!(registry.register(ChatId(1)).await);
        assert!(!registry.register(ChatId(1)).await);
        assert_eq!(registry.len().await, 1);
        assert_eq!(
            registry.flags(ChatId(1)).await,
            Some(SubscriberFlags {
                is_known: true,
                wants_digest: false
            })
        );
    }

    #[tokio::test]
    async fn test_register_keeps_digest_flag() {
        let registry = Registry::new();
        registry.set_digest(ChatId(7), true).await;
        registry.register(ChatId(7)).await;
        assert!(registry.digest_flag(ChatId(7)).await);
    }

    #[tokio::test]
    async fn test_enable_then_disable_digest() {
        let registry = Registry::new();
        assert!(registry.is_empty().await);

        registry.set_digest(ChatId(42), true).await;
        assert_eq!(registry.snapshot_known().await, BTreeSet::from([ChatId(42)]));
        assert_eq!(registry.snapshot_digest().await, BTreeSet::from([ChatId(42)]));

        registry.set_digest(ChatId(42), false).await;
        assert!(registry.snapshot_digest().await.is_empty());
        assert_eq!(registry.snapshot_known().await, BTreeSet::from([ChatId(42)]));
    }

    #[tokio::test]
    async fn test_unknown_subscriber_has_no_digest() {
        let registry = Registry::new();
        assert!(!registry.digest_flag(ChatId(5)).await);
        assert!(registry.flags(ChatId(5)).await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_is_detached_from_later_writes() {
        let registry = Registry::new();
        registry.register(ChatId(1)).await;
        let snapshot = registry.snapshot_known().await;

        registry.register(ChatId(2)).await;
        assert_eq!(snapshot, BTreeSet::from([ChatId(1)]));
        assert_eq!(registry.snapshot_known().await.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mutations_are_not_lost() {
        let registry = Arc::new(Registry::new());

        let mut handles = Vec::new();
        for id in 0..200i64 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry.register(ChatId(id)).await;
                if id % 2 == 0 {
                    registry.set_digest(ChatId(id), true).await;
                }
                registry.snapshot_digest().await
            }));
        }

        for handle in handles {
            let digest = handle.await.unwrap();
            assert!(digest.iter().all(|id| id.0 % 2 == 0));
        }

        assert_eq!(registry.snapshot_known().await.len(), 200);
        assert_eq!(registry.snapshot_digest().await.len(), 100);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Register(i64),
        SetDigest(i64, bool),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..16i64).prop_map(Op::Register),
            (0..16i64, any::<bool>()).prop_map(|(id, on)| Op::SetDigest(id, on)),
        ]
    }

    proptest! {
        #[test]
        fn digest_set_is_subset_of_known(ops in proptest::collection::vec(op(), 0..64)) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(async {
                let registry = Registry::new();
                for op in ops {
                    match op {
                        Op::Register(id) => { registry.register(ChatId(id)).await; }
                        Op::SetDigest(id, on) => registry.set_digest(ChatId(id), on).await,
                    }
                    let known = registry.snapshot_known().await;
                    let digest = registry.snapshot_digest().await;
                    prop_assert!(digest.is_subset(&known));
                }
                Ok(())
            })?;
        }
    }
}
