// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared cache for remote design objects.
//!
//! Many nodes reference the same NPC, item or quest. The cache makes sure
//! each `(kind, id)` is fetched at most once at a time and that every caller
//! asking for it while the request runs receives the same result.
//!
//! Entries live for the lifetime of the cache; there is no eviction. Failed
//! loads are not cached, so the next call issues a fresh request.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Kind of remote design object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    /// Non-player character
    Npc,
    /// Inventory item
    Item,
    /// Skill
    Skill,
    /// Quest
    Quest,
    /// Wiki page
    WikiPage,
    /// Event of an NPC daily routine
    DailyRoutineEvent,
}

impl ResourceKind {
    /// Name used in URLs and persisted records
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Npc => "npc",
            Self::Item => "item",
            Self::Skill => "skill",
            Self::Quest => "quest",
            Self::WikiPage => "wikiPage",
            Self::DailyRoutineEvent => "dailyRoutineEvent",
        }
    }

    /// Get all resource kinds
    pub fn all() -> &'static [ResourceKind] {
        &[
            ResourceKind::Npc,
            ResourceKind::Item,
            ResourceKind::Skill,
            ResourceKind::Quest,
            ResourceKind::WikiPage,
            ResourceKind::DailyRoutineEvent,
        ]
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key of a cached object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Resource kind
    pub kind: ResourceKind,
    /// Object ID
    pub id: String,
}

impl ObjectKey {
    /// Create a key
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// A loaded design object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteObject {
    /// Object ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Remaining fields, untouched
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl RemoteObject {
    /// Object with only an ID and a name
    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            fields: serde_json::Map::new(),
        }
    }
}

/// Error of a remote load. Cloneable so one failure reaches every waiting caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// The object does not exist
    #[error("Object {0} not found")]
    NotFound(ObjectKey),

    /// Transport or decoding failure
    #[error("Failed to load {key}: {message}")]
    Failed {
        /// Object that failed to load
        key: ObjectKey,
        /// Cause
        message: String,
    },
}

/// Fetches design objects from the backend
pub trait ObjectLoader: Send + Sync {
    /// Issue one request for the object
    fn fetch(&self, key: &ObjectKey) -> BoxFuture<'static, Result<RemoteObject, LoadError>>;
}

type LoadResult = Result<Arc<RemoteObject>, LoadError>;
type PendingLoad = Shared<BoxFuture<'static, LoadResult>>;

#[derive(Clone)]
enum Slot {
    Ready(Arc<RemoteObject>),
    InFlight { generation: u64, request: PendingLoad },
}

#[derive(Default)]
struct CacheState {
    slots: HashMap<ObjectKey, Slot>,
    next_generation: u64,
    fetches: u64,
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Resolved entries
    pub ready: usize,
    /// Requests still running
    pub in_flight: usize,
    /// Requests issued since creation
    pub fetches: u64,
}

/// Deduplicating, memoizing loader of remote objects.
///
/// Cloning the cache yields another handle on the same entries.
#[derive(Clone)]
pub struct SharedObjectCache {
    loader: Arc<dyn ObjectLoader>,
    state: Arc<Mutex<CacheState>>,
}

impl SharedObjectCache {
    /// Create a cache backed by a loader
    pub fn new(loader: Arc<dyn ObjectLoader>) -> Self {
        Self {
            loader,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    /// Load an object, reusing a cached value or a running request
    pub async fn load(&self, key: &ObjectKey) -> LoadResult {
        let request = match self.lookup(key) {
            Some(Slot::Ready(object)) => return Ok(object),
            Some(Slot::InFlight { request, .. }) => {
                tracing::debug!(%key, "Joining in-flight load");
                request
            }
            // The loader runs without the lock held so it may use the cache itself.
            None => self.issue(key, self.loader.fetch(key)),
        };
        request.await
    }

    fn lookup(&self, key: &ObjectKey) -> Option<Slot> {
        self.state.lock().slots.get(key).cloned()
    }

    fn issue(&self, key: &ObjectKey, fetch: BoxFuture<'static, Result<RemoteObject, LoadError>>) -> PendingLoad {
        let mut state = self.state.lock();
        // Another caller may have started the same load while the lock was released.
        match state.slots.get(key) {
            Some(Slot::InFlight { request, .. }) => return request.clone(),
            Some(Slot::Ready(object)) => {
                let object = Arc::clone(object);
                return async move { Ok::<_, LoadError>(object) }.boxed().shared();
            }
            None => {}
        }

        let generation = state.next_generation;
        state.next_generation += 1;
        state.fetches += 1;
        tracing::debug!(%key, generation, "Fetching remote object");

        let weak = Arc::downgrade(&self.state);
        let settle_key = key.clone();
        let request = async move {
            let result = fetch.await.map(Arc::new);
            settle(&weak, &settle_key, generation, &result);
            result
        }
        .boxed()
        .shared();

        state.slots.insert(
            key.clone(),
            Slot::InFlight {
                generation,
                request: request.clone(),
            },
        );
        request
    }

    /// Resolved value, without touching the network
    pub fn peek(&self, key: &ObjectKey) -> Option<Arc<RemoteObject>> {
        match self.state.lock().slots.get(key) {
            Some(Slot::Ready(object)) => Some(Arc::clone(object)),
            _ => None,
        }
    }

    /// Whether a request for the key is running
    pub fn is_in_flight(&self, key: &ObjectKey) -> bool {
        matches!(self.state.lock().slots.get(key), Some(Slot::InFlight { .. }))
    }

    /// Forget both the resolved value and any running request for a key
    pub fn invalidate(&self, key: &ObjectKey) {
        if self.state.lock().slots.remove(key).is_some() {
            tracing::debug!(%key, "Invalidated cached object");
        }
    }

    /// Cache statistics
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let in_flight = state
            .slots
            .values()
            .filter(|s| matches!(s, Slot::InFlight { .. }))
            .count();
        CacheStats {
            ready: state.slots.len() - in_flight,
            in_flight,
            fetches: state.fetches,
        }
    }
}

/// Promote or clear the slot of a finished request, unless it was invalidated meanwhile
fn settle(state: &Weak<Mutex<CacheState>>, key: &ObjectKey, generation: u64, result: &LoadResult) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let mut state = state.lock();
    let current = matches!(
        state.slots.get(key),
        Some(Slot::InFlight { generation: g, .. }) if *g == generation
    );
    if !current {
        return;
    }
    match result {
        Ok(object) => {
            state.slots.insert(key.clone(), Slot::Ready(Arc::clone(object)));
        }
        Err(err) => {
            tracing::warn!(%key, "Remote load failed: {err}");
            state.slots.remove(key);
        }
    }
}

impl fmt::Debug for SharedObjectCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedObjectCache")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Loader answering from a fixed table, counting every fetch
    #[derive(Default)]
    pub(crate) struct TableLoader {
        pub(crate) objects: Mutex<HashMap<ObjectKey, RemoteObject>>,
        pub(crate) fetches: AtomicUsize,
    }

    impl TableLoader {
        pub(crate) fn with(objects: impl IntoIterator<Item = (ObjectKey, RemoteObject)>) -> Arc<Self> {
            Arc::new(Self {
                objects: Mutex::new(objects.into_iter().collect()),
                fetches: AtomicUsize::new(0),
            })
        }

        pub(crate) fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl ObjectLoader for TableLoader {
        fn fetch(&self, key: &ObjectKey) -> BoxFuture<'static, Result<RemoteObject, LoadError>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let result = self
                .objects
                .lock()
                .get(key)
                .cloned()
                .ok_or_else(|| LoadError::NotFound(key.clone()));
            async move {
                tokio::task::yield_now().await;
                result
            }
            .boxed()
        }
    }

    fn npc(id: &str, name: &str) -> (ObjectKey, RemoteObject) {
        (ObjectKey::new(ResourceKind::Npc, id), RemoteObject::named(id, name))
    }

    #[tokio::test]
    async fn test_concurrent_loads_are_coalesced() {
        let loader = TableLoader::with([npc("42", "Aria")]);
        let cache = SharedObjectCache::new(loader.clone());
        let key = ObjectKey::new(ResourceKind::Npc, "42");

        let (a, b, c) = futures::join!(cache.load(&key), cache.load(&key), cache.load(&key));
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

        assert_eq!(loader.fetch_count(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
        assert_eq!(a.name, "Aria");
    }

    #[tokio::test]
    async fn test_resolved_value_is_reused() {
        let loader = TableLoader::with([npc("42", "Aria")]);
        let cache = SharedObjectCache::new(loader.clone());
        let key = ObjectKey::new(ResourceKind::Npc, "42");

        cache.load(&key).await.unwrap();
        assert!(cache.peek(&key).is_some());
        assert!(!cache.is_in_flight(&key));

        cache.load(&key).await.unwrap();
        assert_eq!(loader.fetch_count(), 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                ready: 1,
                in_flight: 0,
                fetches: 1
            }
        );
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let loader = TableLoader::with([]);
        let cache = SharedObjectCache::new(loader.clone());
        let key = ObjectKey::new(ResourceKind::Item, "7");

        let err = cache.load(&key).await.unwrap_err();
        assert_eq!(err, LoadError::NotFound(key.clone()));
        assert!(!cache.is_in_flight(&key));

        loader
            .objects
            .lock()
            .insert(key.clone(), RemoteObject::named("7", "Lantern"));
        let object = cache.load(&key).await.unwrap();
        assert_eq!(object.name, "Lantern");
        assert_eq!(loader.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let loader = TableLoader::with([npc("1", "Old Name")]);
        let cache = SharedObjectCache::new(loader.clone());
        let key = ObjectKey::new(ResourceKind::Npc, "1");

        cache.load(&key).await.unwrap();
        loader
            .objects
            .lock()
            .insert(key.clone(), RemoteObject::named("1", "New Name"));

        cache.invalidate(&key);
        assert!(cache.peek(&key).is_none());

        let object = cache.load(&key).await.unwrap();
        assert_eq!(object.name, "New Name");
        assert_eq!(loader.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_invalidated_request_does_not_repopulate() {
        let loader = TableLoader::with([npc("1", "Aria")]);
        let cache = SharedObjectCache::new(loader.clone());
        let key = ObjectKey::new(ResourceKind::Npc, "1");

        let stale = cache.load(&key);
        let mut stale = Box::pin(stale);
        // Poll once so the request is issued, then drop the slot.
        assert!(futures::poll!(stale.as_mut()).is_pending());
        assert!(cache.is_in_flight(&key));
        cache.invalidate(&key);

        stale.await.unwrap();
        assert!(cache.peek(&key).is_none());
    }

    /// Loader that inspects the cache it feeds before answering
    struct ReentrantLoader {
        cache: Mutex<Option<SharedObjectCache>>,
    }

    impl ObjectLoader for ReentrantLoader {
        fn fetch(&self, key: &ObjectKey) -> BoxFuture<'static, Result<RemoteObject, LoadError>> {
            let running = self
                .cache
                .lock()
                .as_ref()
                .map(|cache| cache.is_in_flight(key) || cache.stats().fetches > 0);
            let key = key.clone();
            async move {
                match running {
                    Some(false) => Ok(RemoteObject::named(key.id.clone(), "Aria")),
                    _ => Err(LoadError::NotFound(key)),
                }
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_loader_may_use_the_cache() {
        let loader = Arc::new(ReentrantLoader {
            cache: Mutex::new(None),
        });
        let cache = SharedObjectCache::new(loader.clone());
        *loader.cache.lock() = Some(cache.clone());
        let key = ObjectKey::new(ResourceKind::Npc, "1");

        let object = cache.load(&key).await.unwrap();
        assert_eq!(object.name, "Aria");
        assert_eq!(cache.stats().fetches, 1);

        // Break the cycle between the loader and the cache.
        loader.cache.lock().take();
    }

    #[test]
    fn test_object_key_display() {
        let key = ObjectKey::new(ResourceKind::WikiPage, "abc");
        assert_eq!(key.to_string(), "wikiPage/abc");
    }
}
