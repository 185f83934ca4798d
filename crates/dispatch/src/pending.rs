//! Per-sender staging area for rows awaiting a yes/no reply.
//!
//! Each sender gets its own async mutex. A handler holds that mutex for a
//! whole transition, including the store write, so two replies from the same
//! sender can never both consume one staged row. Different senders never
//! contend.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use {
    dashmap::DashMap,
    sheetbot_common::{FieldMap, Platform},
    tokio::sync::{Mutex, OwnedMutexGuard},
    tracing::debug,
};

/// Identity of a conversation partner. Platforms never share keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SenderKey {
    pub platform: Platform,
    pub sender: String,
}

impl SenderKey {
    pub fn new(platform: Platform, sender: impl Into<String>) -> Self {
        Self {
            platform,
            sender: sender.into(),
        }
    }
}

struct Staged {
    fields: FieldMap,
    expires_at: Option<Instant>,
}

impl Staged {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Default)]
struct SenderSlot {
    staged: Option<Staged>,
}

/// In-memory pending confirmations, keyed by sender.
pub struct PendingStore {
    slots: DashMap<SenderKey, Arc<Mutex<SenderSlot>>>,
    ttl: Option<Duration>,
}

impl Default for PendingStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl PendingStore {
    /// `ttl` bounds how long a staged row waits; `None` waits forever.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            slots: DashMap::new(),
            ttl,
        }
    }

    /// Wait for exclusive access to `key`'s slot.
    pub async fn lock(&self, key: &SenderKey) -> SenderGuard<'_> {
        // Clone the Arc out before awaiting so no shard lock is held.
        let slot = Arc::clone(self.slots.entry(key.clone()).or_default().value());
        let guard = slot.lock_owned().await;
        SenderGuard {
            store: self,
            key: key.clone(),
            guard: Some(guard),
        }
    }

    /// Whether `key` has an unexpired staged row. Returns `false` while the
    /// slot is locked by an in-flight message.
    pub fn is_pending(&self, key: &SenderKey) -> bool {
        let now = Instant::now();
        self.slots.get(key).is_some_and(|slot| {
            slot.try_lock().is_ok_and(|s| {
                s.staged
                    .as_ref()
                    .is_some_and(|staged| !staged.is_expired(now))
            })
        })
    }

    /// Number of tracked sender slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Exclusive handle on one sender's slot. Idle slots are dropped from the
/// store when the last handle goes away.
pub struct SenderGuard<'a> {
    store: &'a PendingStore,
    key: SenderKey,
    guard: Option<OwnedMutexGuard<SenderSlot>>,
}

impl SenderGuard<'_> {
    fn slot(&mut self) -> Option<&mut SenderSlot> {
        self.guard.as_deref_mut()
    }

    /// The staged row, discarding it first if it has expired.
    pub fn pending(&mut self) -> Option<&FieldMap> {
        let key = self.key.clone();
        let slot = self.slot()?;
        if slot
            .staged
            .as_ref()
            .is_some_and(|s| s.is_expired(Instant::now()))
        {
            debug!(platform = %key.platform, sender = %key.sender, "staged row expired");
            slot.staged = None;
        }
        slot.staged.as_ref().map(|s| &s.fields)
    }

    /// Remove and return the staged row.
    pub fn take(&mut self) -> Option<FieldMap> {
        self.pending()?;
        self.slot()?.staged.take().map(|s| s.fields)
    }

    /// Stage `fields`, replacing any previous row. Returns `true` when an
    /// unexpired row was replaced.
    pub fn stage(&mut self, fields: FieldMap) -> bool {
        let replaced = self.pending().is_some();
        let expires_at = self.store.ttl.map(|ttl| Instant::now() + ttl);
        if let Some(slot) = self.slot() {
            slot.staged = Some(Staged { fields, expires_at });
        }
        replaced
    }
}

impl Drop for SenderGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // The map's shard lock excludes concurrent `lock` calls, so a strong
        // count of one means nobody else is holding or waiting on the slot.
        self.store.slots.remove_if(&self.key, |_, slot| {
            Arc::strong_count(slot) == 1 && slot.try_lock().is_ok_and(|s| s.staged.is_none())
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, sheetbot_common::FieldValue};

    fn fields(n: i64) -> FieldMap {
        [("qty", FieldValue::Integer(n))].into_iter().collect()
    }

    fn key(sender: &str) -> SenderKey {
        SenderKey::new(Platform::Whatsapp, sender)
    }

    #[tokio::test]
    async fn stage_then_take() {
        let store = PendingStore::default();
        {
            let mut guard = store.lock(&key("alice")).await;
            assert!(!guard.stage(fields(1)));
        }
        assert!(store.is_pending(&key("alice")));

        let mut guard = store.lock(&key("alice")).await;
        assert_eq!(guard.take(), Some(fields(1)));
        assert_eq!(guard.take(), None);
        drop(guard);
        assert!(!store.is_pending(&key("alice")));
        assert!(store.is_empty(), "idle slot should be removed");
    }

    #[tokio::test]
    async fn stage_replaces_previous_row() {
        let store = PendingStore::default();
        let mut guard = store.lock(&key("alice")).await;
        guard.stage(fields(1));
        assert!(guard.stage(fields(2)));
        assert_eq!(guard.take(), Some(fields(2)));
    }

    #[tokio::test]
    async fn senders_are_isolated_across_platforms() {
        let store = PendingStore::default();
        store.lock(&key("+100")).await.stage(fields(1));
        let telegram = SenderKey::new(Platform::Telegram, "+100");
        assert!(!store.is_pending(&telegram));
        assert!(store.is_pending(&key("+100")));
    }

    #[tokio::test]
    async fn expired_rows_are_dropped() {
        let store = PendingStore::new(Some(Duration::from_millis(10)));
        store.lock(&key("alice")).await.stage(fields(1));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!store.is_pending(&key("alice")));
        let mut guard = store.lock(&key("alice")).await;
        assert!(guard.pending().is_none());
        assert!(!guard.stage(fields(2)), "expired row does not count as replaced");
    }

    #[tokio::test]
    async fn lock_serializes_same_sender() {
        let store = Arc::new(PendingStore::default());
        let first = store.lock(&key("alice")).await;

        let waiter = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let mut guard = store.lock(&key("alice")).await;
                guard.take()
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished(), "second lock must wait");

        let mut first = first;
        first.stage(fields(7));
        drop(first);

        assert_eq!(waiter.await.unwrap(), Some(fields(7)));
        assert!(store.is_empty());
    }
}
