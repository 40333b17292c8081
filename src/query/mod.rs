//! Query/cache layer
//!
//! [`QueryClient`] owns the only shared mutable state in the crate: a map from
//! [`QueryKey`] to a cache entry. Every read goes through it:
//!
//! - a fresh entry is served with no request
//! - a stale entry (past its freshness window, or invalidated) is served
//!   immediately while a background refresh runs
//! - a missing entry starts a fetch; concurrent callers for the same key
//!   attach to the same in-flight request
//!
//! Fetches run on their own task, so a caller that stops waiting does not
//! cancel the request for everyone else. Each fetch and each direct write
//! carries a sequence number; a result older than the last applied write for
//! its key is discarded, so out-of-order responses never overwrite newer
//! data.
//!
//! The map lives behind a `std::sync::Mutex` that is never held across an
//! `.await`; readers always see a whole entry.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{ApiError, ApiResult};

pub mod entry;
pub mod key;
pub(crate) mod metrics;
pub mod retry;

pub use entry::{QueryObserver, QuerySnapshot, QueryState};
pub use key::{QueryKey, ResourceKind};
pub use retry::{run_with_retry, RetryPolicy};

use self::metrics::FetchTimer;

type AnyValue = Arc<dyn Any + Send + Sync>;
type SharedFetch = Shared<BoxFuture<'static, ApiResult<AnyValue>>>;
type Refetch = Arc<dyn Fn() -> BoxFuture<'static, ApiResult<AnyValue>> + Send + Sync>;

/// Freshness windows per resource kind, plus the eviction grace period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub conversation_list_fresh: Duration,
    pub conversation_fresh: Duration,
    /// Applies to gallery pages and single PDFs
    pub templates_fresh: Duration,
    /// How long an unobserved entry survives
    pub gc_grace: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            conversation_list_fresh: Duration::from_secs(60),
            conversation_fresh: Duration::from_secs(30),
            templates_fresh: Duration::from_secs(120),
            gc_grace: Duration::from_secs(300),
        }
    }
}

impl CachePolicy {
    /// Freshness window of `kind`.
    pub fn fresh_for(&self, kind: ResourceKind) -> Duration {
        match kind {
            ResourceKind::ConversationList => self.conversation_list_fresh,
            ResourceKind::Conversation => self.conversation_fresh,
            ResourceKind::Templates | ResourceKind::Template => self.templates_fresh,
        }
    }
}

/// Sequence number reserved when a mutation starts. Writes made with it lose
/// to any fetch or write that started later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WriteTicket(u64);

struct Slot {
    /// Distinguishes this entry from a later one under the same key
    id: u64,
    value: Option<AnyValue>,
    fetched_at: Option<Instant>,
    state: QueryState,
    error: Option<ApiError>,
    stale: bool,
    /// Bumped by every invalidation
    generation: u64,
    applied_seq: u64,
    in_flight: Option<SharedFetch>,
    refetch: Option<Refetch>,
    subscribers: usize,
    idle_since: Instant,
    notify: watch::Sender<u64>,
}

impl Slot {
    fn new(id: u64) -> Self {
        let (notify, _) = watch::channel(0);
        Self {
            id,
            value: None,
            fetched_at: None,
            state: QueryState::Idle,
            error: None,
            stale: false,
            generation: 0,
            applied_seq: 0,
            in_flight: None,
            refetch: None,
            subscribers: 0,
            idle_since: Instant::now(),
            notify,
        }
    }

    fn is_expired(&self, fresh_for: Duration) -> bool {
        self.fetched_at.map_or(true, |at| at.elapsed() >= fresh_for)
    }

    fn is_fresh(&self, fresh_for: Duration) -> bool {
        self.value.is_some() && !self.stale && !self.is_expired(fresh_for)
    }

    fn notify(&self) {
        self.notify.send_modify(|version| *version = version.wrapping_add(1));
    }
}

#[derive(Debug, Clone, Copy)]
struct FetchOrigin {
    slot_id: u64,
    generation: u64,
    seq: u64,
}

struct QueryInner {
    slots: Mutex<HashMap<QueryKey, Slot>>,
    write_locks: Mutex<HashMap<QueryKey, Arc<AsyncMutex<()>>>>,
    policy: CachePolicy,
    retry: RetryPolicy,
    seq: AtomicU64,
}

impl QueryInner {
    fn lock_slots(&self) -> MutexGuard<'_, HashMap<QueryKey, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn slot<'a>(&self, slots: &'a mut HashMap<QueryKey, Slot>, key: &QueryKey) -> &'a mut Slot {
        slots
            .entry(key.clone())
            .or_insert_with(|| Slot::new(self.next_seq()))
    }

    /// Returns the in-flight fetch for `slot`, starting one if needed.
    /// Must be called with the slot map locked.
    fn start_fetch(
        self: &Arc<Self>,
        key: &QueryKey,
        slot: &mut Slot,
        refetch: Refetch,
    ) -> SharedFetch {
        if let Some(pending) = &slot.in_flight {
            trace!(key = %key, "Joining in-flight fetch");
            return pending.clone();
        }

        let origin = FetchOrigin {
            slot_id: slot.id,
            generation: slot.generation,
            seq: self.next_seq(),
        };
        slot.state = QueryState::Loading;
        slot.notify();
        debug!(key = %key, seq = origin.seq, "Starting fetch");

        let inner = Arc::clone(self);
        let task_key = key.clone();
        let retry = self.retry;
        let task = tokio::spawn(async move {
            let kind = task_key.kind();
            let timer = FetchTimer::start(kind);
            let result = run_with_retry(&retry, kind, || refetch()).await;
            timer.finish(result.as_ref().err());
            inner.complete(&task_key, origin, &result);
            result
        });

        let pending = async move {
            task.await
                .unwrap_or_else(|e| Err(ApiError::Network(format!("fetch task aborted: {}", e))))
        }
        .boxed()
        .shared();
        slot.in_flight = Some(pending.clone());
        pending
    }

    fn complete(self: &Arc<Self>, key: &QueryKey, origin: FetchOrigin, result: &ApiResult<AnyValue>) {
        let mut slots = self.lock_slots();
        let Some(slot) = slots.get_mut(key).filter(|s| s.id == origin.slot_id) else {
            debug!(key = %key, "Entry gone before fetch settled, dropping result");
            return;
        };
        slot.in_flight = None;

        if origin.seq < slot.applied_seq {
            debug!(
                key = %key,
                seq = origin.seq,
                applied = slot.applied_seq,
                "Discarding result older than the last applied write"
            );
            slot.state = QueryState::Success;
            slot.notify();
            return;
        }

        match result {
            Ok(value) => {
                slot.value = Some(Arc::clone(value));
                slot.fetched_at = Some(Instant::now());
                slot.state = QueryState::Success;
                slot.error = None;
                slot.applied_seq = origin.seq;
                // Invalidated while in flight: keep it stale.
                slot.stale = slot.generation != origin.generation;
            }
            Err(e) => {
                debug!(key = %key, error = %e, "Fetch failed");
                slot.state = QueryState::Error;
                slot.error = Some(e.clone());
            }
        }
        slot.notify();

        if result.is_ok() && slot.stale && slot.subscribers > 0 {
            if let Some(refetch) = slot.refetch.clone() {
                self.start_fetch(key, slot, refetch);
            }
        }
    }
}

/// Shared cache of backend resources. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<QueryInner>,
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("entries", &self.len())
            .field("policy", &self.inner.policy)
            .field("retry", &self.inner.retry)
            .finish()
    }
}

fn erase<T, F, Fut>(fetcher: F) -> Refetch
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
{
    Arc::new(move || {
        let fut = fetcher();
        async move { fut.await.map(|v| Arc::new(v) as AnyValue) }.boxed()
    })
}

fn downcast<T: Send + Sync + 'static>(key: &QueryKey, value: AnyValue) -> ApiResult<Arc<T>> {
    value.downcast::<T>().map_err(|_| {
        ApiError::InvalidInput(format!("cache entry {} holds a different type", key))
    })
}

impl QueryClient {
    /// Creates an empty cache.
    pub fn new(policy: CachePolicy, retry: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(QueryInner {
                slots: Mutex::new(HashMap::new()),
                write_locks: Mutex::new(HashMap::new()),
                policy,
                retry,
                seq: AtomicU64::new(0),
            }),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.inner.policy
    }

    /// Reads `key`, fetching through `fetcher` when needed.
    ///
    /// Fresh entries return without calling `fetcher`. Stale entries return
    /// the stale value and refresh in the background. Missing entries wait
    /// for a fetch shared with every concurrent caller of the same key.
    /// Transient failures are retried per the [`RetryPolicy`].
    ///
    /// `fetcher` is kept with the entry and reused for background refreshes
    /// and invalidation-driven refetches.
    pub async fn fetch<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> ApiResult<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        self.collect_garbage();
        let kind = key.kind();
        let fresh_for = self.inner.policy.fresh_for(kind);

        let pending = {
            let mut slots = self.inner.lock_slots();
            let slot = self.inner.slot(&mut slots, &key);
            let refetch = erase(fetcher);
            slot.refetch = Some(refetch.clone());
            if slot.subscribers == 0 {
                slot.idle_since = Instant::now();
            }

            if let Some(value) = slot.value.clone() {
                if slot.is_fresh(fresh_for) {
                    trace!(key = %key, "Cache hit");
                    metrics::record_hit(kind);
                } else {
                    debug!(key = %key, "Serving stale value, revalidating");
                    metrics::record_stale(kind);
                    self.inner.start_fetch(&key, slot, refetch);
                }
                return downcast(&key, value);
            }

            trace!(key = %key, "Cache miss");
            metrics::record_miss(kind);
            self.inner.start_fetch(&key, slot, refetch)
        };

        let value = pending.await?;
        downcast(&key, value)
    }

    /// Fetches `key` regardless of freshness and waits for the result.
    ///
    /// Joins a fetch already in flight; if that fetch started before the
    /// latest invalidation, its result is not trusted and one more fetch is
    /// made.
    pub async fn refresh<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> ApiResult<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let refetch = erase(fetcher);
        let mut attempts = 0;
        loop {
            attempts += 1;
            let pending = {
                let mut slots = self.inner.lock_slots();
                let slot = self.inner.slot(&mut slots, &key);
                slot.refetch = Some(refetch.clone());
                self.inner.start_fetch(&key, slot, refetch.clone())
            };
            let value = pending.await?;

            let stale = self
                .inner
                .lock_slots()
                .get(&key)
                .map_or(false, |slot| slot.stale);
            if !stale || attempts >= 2 {
                return downcast(&key, value);
            }
            debug!(key = %key, "Joined fetch predates invalidation, fetching again");
        }
    }

    /// Subscribes to `key`, starting a fetch if the entry is missing or
    /// stale. The returned observer reports every change to the entry.
    pub fn observe<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> QueryObserver<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let fresh_for = self.inner.policy.fresh_for(key.kind());
        let mut slots = self.inner.lock_slots();
        let slot = self.inner.slot(&mut slots, &key);
        let refetch = erase(fetcher);
        slot.refetch = Some(refetch.clone());
        slot.subscribers += 1;
        let rx = slot.notify.subscribe();
        let slot_id = slot.id;
        debug!(key = %key, subscribers = slot.subscribers, "Observer subscribed");

        if !slot.is_fresh(fresh_for) {
            self.inner.start_fetch(&key, slot, refetch);
        }
        drop(slots);

        QueryObserver::new(self.clone(), key, slot_id, rx)
    }

    pub(crate) fn unsubscribe(&self, key: &QueryKey, slot_id: u64) {
        let mut slots = self.inner.lock_slots();
        if let Some(slot) = slots.get_mut(key).filter(|s| s.id == slot_id) {
            slot.subscribers = slot.subscribers.saturating_sub(1);
            if slot.subscribers == 0 {
                slot.idle_since = Instant::now();
            }
            debug!(key = %key, subscribers = slot.subscribers, "Observer unsubscribed");
        }
    }

    /// Copy of the entry for `key`; an empty idle snapshot when absent or
    /// holding another type.
    pub fn snapshot<T: Send + Sync + 'static>(&self, key: &QueryKey) -> QuerySnapshot<T> {
        self.snapshot_for(key, None)
    }

    pub(crate) fn snapshot_for<T: Send + Sync + 'static>(
        &self,
        key: &QueryKey,
        slot_id: Option<u64>,
    ) -> QuerySnapshot<T> {
        let fresh_for = self.inner.policy.fresh_for(key.kind());
        let slots = self.inner.lock_slots();
        let Some(slot) = slots
            .get(key)
            .filter(|s| slot_id.map_or(true, |id| s.id == id))
        else {
            return QuerySnapshot::empty();
        };

        QuerySnapshot {
            data: slot
                .value
                .clone()
                .and_then(|v| v.downcast::<T>().ok()),
            state: slot.state,
            error: slot.error.clone(),
            is_stale: slot.stale || slot.is_expired(fresh_for),
            fetched_at: slot.fetched_at,
        }
    }

    /// Reserves a sequence number for a mutation about to start.
    pub fn begin_write(&self) -> WriteTicket {
        WriteTicket(self.inner.next_seq())
    }

    /// Writes `value` into `key` unless a newer write or fetch has already
    /// been applied. Returns whether the value was applied.
    pub fn set_data<T: Send + Sync + 'static>(
        &self,
        key: &QueryKey,
        ticket: WriteTicket,
        value: T,
    ) -> bool {
        let mut slots = self.inner.lock_slots();
        let slot = self.inner.slot(&mut slots, key);
        if ticket.0 < slot.applied_seq {
            debug!(key = %key, seq = ticket.0, applied = slot.applied_seq, "Discarding outdated write");
            return false;
        }

        slot.value = Some(Arc::new(value));
        slot.fetched_at = Some(Instant::now());
        if slot.in_flight.is_none() {
            slot.state = QueryState::Success;
        }
        slot.error = None;
        slot.stale = false;
        slot.applied_seq = ticket.0;
        slot.notify();
        trace!(key = %key, seq = ticket.0, "Applied write");
        true
    }

    /// Marks `key` stale. The entry refetches right away when observed,
    /// otherwise on its next read. Returns `false` if nothing was cached.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        self.invalidate_where(|k| k == key) > 0
    }

    /// Marks every entry of `kind` stale.
    pub fn invalidate_kind(&self, kind: ResourceKind) -> usize {
        self.invalidate_where(|k| k.kind() == kind)
    }

    fn invalidate_where(&self, matches: impl Fn(&QueryKey) -> bool) -> usize {
        let mut slots = self.inner.lock_slots();
        let mut count = 0;
        for (key, slot) in slots.iter_mut().filter(|(k, _)| matches(k)) {
            slot.stale = true;
            slot.generation += 1;
            slot.notify();
            metrics::record_invalidation(key.kind());
            debug!(key = %key, subscribers = slot.subscribers, "Invalidated");
            count += 1;

            if slot.subscribers > 0 {
                if let Some(refetch) = slot.refetch.clone() {
                    self.inner.start_fetch(key, slot, refetch);
                }
            }
        }
        count
    }

    /// Drops every entry. Observers see their entry end; in-flight fetches
    /// finish but their results are discarded.
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *self.inner.lock_slots());
        self.inner
            .write_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        debug!(entries = drained.len(), "Cleared query cache");
    }

    /// Evicts entries nobody has observed or read for longer than the grace
    /// period, and write locks nobody holds. Runs on every
    /// [`QueryClient::fetch`]. Returns how many entries were evicted.
    pub fn collect_garbage(&self) -> usize {
        let grace = self.inner.policy.gc_grace;
        let evicted = {
            let mut slots = self.inner.lock_slots();
            let before = slots.len();
            slots.retain(|key, slot| {
                let keep = slot.subscribers > 0
                    || slot.in_flight.is_some()
                    || slot.idle_since.elapsed() < grace;
                if !keep {
                    trace!(key = %key, "Evicting unobserved entry");
                }
                keep
            });
            before - slots.len()
        };

        // The map holds the only reference to an unused lock.
        self.inner
            .write_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, lock| Arc::strong_count(lock) > 1);
        evicted
    }

    /// FIFO lock serializing mutations that target `key`. Hold the guard for
    /// the whole mutation, including its cache writes.
    pub fn write_lock(&self, key: &QueryKey) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .inner
            .write_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner.lock_slots().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock_slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn client() -> QueryClient {
        QueryClient::new(CachePolicy::default(), RetryPolicy::none())
    }

    /// Fetcher returning an incrementing counter, with a call count.
    fn counting(calls: &Arc<AtomicUsize>) -> impl Fn() -> BoxFuture<'static, ApiResult<usize>> + Send + Sync + 'static {
        let calls = Arc::clone(calls);
        move || {
            let calls = Arc::clone(&calls);
            async move {
                tokio::task::yield_now().await;
                Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_one_fetch() {
        let q = client();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::conversation("c1");

        let (a, b) = tokio::join!(
            q.fetch(key.clone(), counting(&calls)),
            q.fetch(key.clone(), counting(&calls))
        );
        assert_eq!(*a.unwrap(), 1);
        assert_eq!(*b.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fresh_hit_skips_fetcher() {
        let q = client();
        let calls = Arc::new(AtomicUsize::new(0));
        q.fetch(QueryKey::ConversationList, counting(&calls)).await.unwrap();
        q.fetch(QueryKey::ConversationList, counting(&calls)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_served_stale_then_refreshed() {
        let q = client();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::conversation("c1");
        q.fetch(key.clone(), counting(&calls)).await.unwrap();

        tokio::time::advance(Duration::from_secs(31)).await;
        let stale = q.fetch(key.clone(), counting(&calls)).await.unwrap();
        assert_eq!(*stale, 1);

        // let the background refresh run
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let snap: QuerySnapshot<usize> = q.snapshot(&key);
        assert_eq!(snap.data.as_deref(), Some(&2));
        assert!(!snap.is_stale);
    }

    #[tokio::test]
    async fn test_invalidate_marks_only_target_stale() {
        let q = client();
        let calls = Arc::new(AtomicUsize::new(0));
        let c1 = QueryKey::conversation("c1");
        let c2 = QueryKey::conversation("c2");
        q.fetch(c1.clone(), counting(&calls)).await.unwrap();
        q.fetch(c2.clone(), counting(&calls)).await.unwrap();

        assert!(q.invalidate(&c1));
        assert!(q.snapshot::<usize>(&c1).is_stale);
        assert!(!q.snapshot::<usize>(&c2).is_stale);

        // unobserved: no refetch until read
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_refetches_observed_entry() {
        let q = client();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::ConversationList;
        let mut observer: QueryObserver<usize> = q.observe(key.clone(), counting(&calls));
        assert_eq!(observer.settled().await.data.as_deref(), Some(&1));

        q.invalidate(&key);
        let snap = observer.settled().await;
        assert_eq!(snap.data.as_deref(), Some(&2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_error_captured_in_entry() {
        let q = client();
        let key = QueryKey::template("p1");
        let result = q
            .fetch(key.clone(), || async { Err::<u32, _>(ApiError::Unauthenticated) })
            .await;
        assert_eq!(result.unwrap_err(), ApiError::Unauthenticated);

        let snap: QuerySnapshot<u32> = q.snapshot(&key);
        assert!(snap.is_error());
        assert_eq!(snap.error, Some(ApiError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_outdated_write_discarded() {
        let q = client();
        let key = QueryKey::conversation("c1");
        let first = q.begin_write();
        let second = q.begin_write();
        assert!(q.set_data(&key, second, "newer".to_string()));
        assert!(!q.set_data(&key, first, "older".to_string()));
        let snap: QuerySnapshot<String> = q.snapshot(&key);
        assert_eq!(snap.data.as_deref().map(String::as_str), Some("newer"));
    }

    #[tokio::test]
    async fn test_type_mismatch_is_error_not_panic() {
        let q = client();
        let key = QueryKey::template("p1");
        q.fetch(key.clone(), || async { Ok(1u32) }).await.unwrap();
        let err = q
            .fetch::<String, _, _>(key, || async { Ok(String::new()) })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gc_evicts_only_unobserved_after_grace() {
        let q = client();
        let calls = Arc::new(AtomicUsize::new(0));
        q.fetch(QueryKey::conversation("c1"), counting(&calls)).await.unwrap();
        let mut observer: QueryObserver<usize> =
            q.observe(QueryKey::conversation("c2"), counting(&calls));
        observer.settled().await;

        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(q.collect_garbage(), 1);
        assert!(!q.contains(&QueryKey::conversation("c1")));
        assert!(q.contains(&QueryKey::conversation("c2")));

        drop(observer);
        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(q.collect_garbage(), 1);
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn test_clear_ends_observers() {
        let q = client();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut observer: QueryObserver<usize> =
            q.observe(QueryKey::ConversationList, counting(&calls));
        observer.settled().await;

        q.clear();
        assert!(!observer.changed().await);
        assert!(observer.snapshot().data.is_none());
    }

    #[tokio::test]
    async fn test_refresh_ignores_freshness() {
        let q = client();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::ConversationList;
        q.fetch(key.clone(), counting(&calls)).await.unwrap();
        q.invalidate(&key);
        let value = q.refresh(key.clone(), counting(&calls)).await.unwrap();
        assert_eq!(*value, 2);
        assert!(!q.snapshot::<usize>(&key).is_stale);
    }

    #[tokio::test]
    async fn test_result_of_fetch_invalidated_in_flight_stays_stale() {
        let q = client();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::conversation("c1");

        let reader = q.clone();
        let read_key = key.clone();
        let fetcher = counting(&calls);
        let read = tokio::spawn(async move { reader.fetch(read_key, fetcher).await });
        tokio::task::yield_now().await;
        q.invalidate(&key);

        assert_eq!(*read.await.unwrap().unwrap(), 1);
        assert!(q.snapshot::<usize>(&key).is_stale);
    }

    #[tokio::test]
    async fn test_write_lock_is_shared_per_key() {
        let q = client();
        let a = q.write_lock(&QueryKey::conversation("c1"));
        let b = q.write_lock(&QueryKey::conversation("c1"));
        let c = q.write_lock(&QueryKey::conversation("c2"));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn test_unused_write_locks_pruned() {
        let q = client();
        let held = q.write_lock(&QueryKey::conversation("c1"));
        drop(q.write_lock(&QueryKey::conversation("c2")));

        q.collect_garbage();
        let locks = q.inner.write_locks.lock().unwrap();
        assert!(locks.contains_key(&QueryKey::conversation("c1")));
        assert!(!locks.contains_key(&QueryKey::conversation("c2")));
        drop(locks);

        // A new handle for the held key is still the same lock.
        assert!(Arc::ptr_eq(&held, &q.write_lock(&QueryKey::conversation("c1"))));
    }

    #[tokio::test]
    async fn test_observer_dropped_before_settle_still_fills_cache() {
        let q = client();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(tokio::sync::Notify::new());
        let key = QueryKey::conversation("c1");

        let fetcher = {
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            move || {
                let calls = Arc::clone(&calls);
                let gate = Arc::clone(&gate);
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    gate.notified().await;
                    Ok::<_, ApiError>(n)
                }
            }
        };

        let observer: QueryObserver<usize> = q.observe(key.clone(), fetcher);
        assert!(observer.snapshot().is_loading());
        drop(observer);
        gate.notify_one();

        for _ in 0..50 {
            if q.snapshot::<usize>(&key).data.is_some() {
                break;
            }
            tokio::task::yield_now().await;
        }
        let snap: QuerySnapshot<usize> = q.snapshot(&key);
        assert_eq!(snap.data.as_deref(), Some(&1));
        assert!(snap.is_success());
        assert_eq!(q.inner.lock_slots().get(&key).map(|s| s.subscribers), Some(0));

        // Nobody is subscribed, so invalidation waits for the next read.
        assert!(q.invalidate(&key));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(q.snapshot::<usize>(&key).is_stale);
    }
}
