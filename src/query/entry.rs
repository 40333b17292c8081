//! Entry state as seen by consumers

use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;

use super::key::QueryKey;
use super::QueryClient;
use crate::error::ApiError;

/// Lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    /// Never fetched, or evicted
    Idle,
    /// A fetch is in flight; previous data, if any, is still served
    Loading,
    /// The last fetch succeeded
    Success,
    /// The last fetch failed; previous data, if any, is still served
    Error,
}

/// A complete, consistent copy of one entry at one instant.
#[derive(Debug)]
pub struct QuerySnapshot<T> {
    pub data: Option<Arc<T>>,
    pub state: QueryState,
    pub error: Option<ApiError>,
    /// Invalidated or past its freshness window
    pub is_stale: bool,
    pub fetched_at: Option<Instant>,
}

impl<T> Clone for QuerySnapshot<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            state: self.state,
            error: self.error.clone(),
            is_stale: self.is_stale,
            fetched_at: self.fetched_at,
        }
    }
}

impl<T> QuerySnapshot<T> {
    pub(crate) fn empty() -> Self {
        Self {
            data: None,
            state: QueryState::Idle,
            error: None,
            is_stale: true,
            fetched_at: None,
        }
    }

    /// Waiting for a first value.
    pub fn is_loading(&self) -> bool {
        self.state == QueryState::Loading && self.data.is_none()
    }

    /// Any fetch in flight, including a background refresh.
    pub fn is_fetching(&self) -> bool {
        self.state == QueryState::Loading
    }

    pub fn is_error(&self) -> bool {
        self.state == QueryState::Error
    }

    pub fn is_success(&self) -> bool {
        self.state == QueryState::Success
    }
}

/// A consumer's subscription to one cache entry.
///
/// While at least one observer exists, invalidating the entry refetches it
/// immediately. Dropping the observer unsubscribes; results that settle
/// afterwards still land in the cache for other consumers but are no longer
/// seen through this handle.
pub struct QueryObserver<T> {
    client: QueryClient,
    key: QueryKey,
    slot_id: u64,
    rx: watch::Receiver<u64>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for QueryObserver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryObserver")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> QueryObserver<T> {
    pub(crate) fn new(
        client: QueryClient,
        key: QueryKey,
        slot_id: u64,
        rx: watch::Receiver<u64>,
    ) -> Self {
        Self {
            client,
            key,
            slot_id,
            rx,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Current `{data, is_loading, is_error, error}` view of the entry.
    pub fn snapshot(&self) -> QuerySnapshot<T> {
        self.client.snapshot_for(&self.key, Some(self.slot_id))
    }

    /// Waits for the entry to change. Returns `false` once the entry is gone
    /// (evicted or cleared on logout); no further changes will arrive.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Waits until no fetch is in flight and returns that snapshot.
    pub async fn settled(&mut self) -> QuerySnapshot<T> {
        loop {
            self.rx.borrow_and_update();
            let snapshot = self.snapshot();
            if snapshot.state != QueryState::Loading {
                return snapshot;
            }
            if !self.changed().await {
                return self.snapshot();
            }
        }
    }

    /// Marks the entry stale, which refetches it because this observer is
    /// subscribed.
    pub fn refetch(&self) {
        self.client.invalidate(&self.key);
    }
}

impl<T> Drop for QueryObserver<T> {
    fn drop(&mut self) {
        self.client.unsubscribe(&self.key, self.slot_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loading_only_without_data() {
        let mut snap: QuerySnapshot<u32> = QuerySnapshot::empty();
        assert!(!snap.is_loading());
        snap.state = QueryState::Loading;
        assert!(snap.is_loading());
        snap.data = Some(Arc::new(1));
        assert!(!snap.is_loading());
        assert!(snap.is_fetching());
    }

    #[test]
    fn test_snapshot_clone_does_not_require_clone_data() {
        struct Opaque;
        let snap = QuerySnapshot {
            data: Some(Arc::new(Opaque)),
            state: QueryState::Success,
            error: None,
            is_stale: false,
            fetched_at: None,
        };
        let copy = snap.clone();
        assert!(copy.is_success());
    }
}
