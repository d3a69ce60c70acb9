//! Stale-while-revalidate cache for calendar windows
//!
//! `load` serves a fresh cached entry immediately and refreshes it in a
//! background task; an absent or stale entry is fetched in the foreground.
//! Every fetch that completes successfully replaces the stored entry,
//! subject to the configured [`WritePolicy`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::entry::{is_fresh, CacheEntry, CacheKey};
use super::store::{read_entry, write_entry, KeyValueStore};
use crate::data::{Event, EventId, EventSource, EventWindow, InvitationStatus};
use crate::error::{ApiError, CalendarError};
use crate::refresh::{RefreshHandle, RefreshMessage, RefreshNotifier};

/// Default time-to-live for cached windows (5 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default bound on a single backend call
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// How completed fetches for the same key are ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// Each fetch carries a sequence number taken when it starts; a fetch
    /// that finishes after a newer one has already written is discarded.
    #[default]
    Sequenced,
    /// Whichever fetch completes last overwrites the entry.
    LastWriteWins,
}

impl FromStr for WritePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequenced" => Ok(WritePolicy::Sequenced),
            "last-write-wins" | "last_write_wins" | "lww" => Ok(WritePolicy::LastWriteWins),
            other => Err(format!(
                "unknown write policy '{}', expected 'sequenced' or 'last-write-wins'",
                other
            )),
        }
    }
}

impl fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WritePolicy::Sequenced => write!(f, "sequenced"),
            WritePolicy::LastWriteWins => write!(f, "last-write-wins"),
        }
    }
}

/// Configuration for the revalidating cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a stored entry is served without a foreground fetch
    pub ttl: Duration,
    /// Upper bound on each backend call
    pub fetch_timeout: Duration,
    /// Ordering of concurrent writes to the same key
    pub write_policy: WritePolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            write_policy: WritePolicy::default(),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_write_policy(mut self, policy: WritePolicy) -> Self {
        self.write_policy = policy;
        self
    }
}

/// Options for a single `load` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Emit loading messages if the load has to wait on the network
    pub show_indicator: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            show_indicator: true,
        }
    }
}

impl LoadOptions {
    /// A load that never emits loading messages
    pub fn quiet() -> Self {
        Self {
            show_indicator: false,
        }
    }
}

/// Where the events returned by `load` came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A fresh stored entry; a background revalidation was started
    Cache,
    /// A foreground fetch
    Network,
}

/// Result of a successful `load`
#[derive(Debug)]
pub struct Loaded {
    pub events: Vec<Event>,
    pub origin: Origin,
    /// Background revalidation task, present when served from cache
    pub revalidation: Option<JoinHandle<()>>,
}

impl Loaded {
    /// Waits for the background revalidation, if one was started
    pub async fn settle(&mut self) {
        if let Some(handle) = self.revalidation.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Revalidation task did not complete");
            }
        }
    }
}

/// Outcome of a completed fetch
struct Fetched {
    events: Vec<Event>,
    stored: bool,
}

struct Inner<S, K, C> {
    source: S,
    store: K,
    clock: C,
    config: CacheConfig,
    notifier: Mutex<Option<RefreshNotifier>>,
    next_seq: AtomicU64,
    /// Sequence number and write time of the last fetch written per key
    ///
    /// Records older than `fetch_timeout` are pruned on each write: any fetch
    /// they could still reject started before them and has timed out.
    written_seq: Mutex<HashMap<CacheKey, (u64, i64)>>,
}

/// Read-through cache of calendar events keyed by query window
///
/// Cloning is cheap and clones share storage and sequencing state.
pub struct RevalidatingCache<S, K, C = SystemClock> {
    inner: Arc<Inner<S, K, C>>,
}

impl<S, K, C> Clone for RevalidatingCache<S, K, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, K> RevalidatingCache<S, K, SystemClock>
where
    S: EventSource,
    K: KeyValueStore,
{
    /// Creates a cache timed by the system clock
    pub fn new(source: S, store: K, config: CacheConfig) -> Self {
        Self::with_clock(source, store, SystemClock, config)
    }
}

impl<S, K, C> RevalidatingCache<S, K, C>
where
    S: EventSource,
    K: KeyValueStore,
    C: Clock,
{
    pub fn with_clock(source: S, store: K, clock: C, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                store,
                clock,
                config,
                notifier: Mutex::new(None),
                next_seq: AtomicU64::new(0),
                written_seq: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &K {
        &self.inner.store
    }

    pub fn clock(&self) -> &C {
        &self.inner.clock
    }

    pub fn source(&self) -> &S {
        &self.inner.source
    }

    /// Registers a view to receive refresh messages
    ///
    /// Replaces any previously registered view.
    pub fn subscribe(&self) -> RefreshHandle {
        let (notifier, handle) = RefreshHandle::channel();
        let mut slot = self.inner.notifier.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(notifier);
        handle
    }

    /// Returns the stored entry for `window` without touching the network
    pub fn read(&self, window: &EventWindow) -> Option<CacheEntry> {
        read_entry(&self.inner.store, &CacheKey::calendar_events(*window))
    }

    /// Whether `entry` is inside the configured TTL right now
    pub fn is_fresh(&self, entry: &CacheEntry) -> bool {
        self.inner.is_fresh(entry)
    }

    /// Fetches `window` from the backend and stores the result
    ///
    /// On failure the stored entry is left as it was.
    pub async fn fetch_window(&self, window: &EventWindow) -> Result<Vec<Event>, CalendarError> {
        let key = CacheKey::calendar_events(*window);
        self.inner.fetch_and_store(key).await.map(|f| f.events)
    }

    /// Loads events for `window`, serving a fresh entry without waiting
    ///
    /// A fresh entry is returned as is and revalidated in the background.
    /// An absent or stale entry is fetched in the foreground; only then can
    /// this return [`CalendarError::FetchFailed`].
    pub async fn load(
        &self,
        window: &EventWindow,
        options: LoadOptions,
    ) -> Result<Loaded, CalendarError> {
        let key = CacheKey::calendar_events(*window);

        if let Some(entry) = read_entry(&self.inner.store, &key) {
            if self.inner.is_fresh(&entry) {
                debug!(%key, count = entry.payload.len(), "Serving fresh cache entry");
                let revalidation = self.spawn_revalidation(key);
                return Ok(Loaded {
                    events: entry.payload,
                    origin: Origin::Cache,
                    revalidation: Some(revalidation),
                });
            }
            debug!(%key, "Cache entry is stale");
        }

        if options.show_indicator {
            self.inner.notify(RefreshMessage::LoadingStarted(*window));
        }
        let result = self.inner.fetch_and_store(key).await;
        if options.show_indicator {
            self.inner.notify(RefreshMessage::LoadingFinished(*window));
        }

        let fetched = result?;
        Ok(Loaded {
            events: fetched.events,
            origin: Origin::Network,
            revalidation: None,
        })
    }

    /// Loads several windows concurrently
    pub async fn load_all(
        &self,
        windows: &[EventWindow],
        options: LoadOptions,
    ) -> Vec<Result<Loaded, CalendarError>> {
        join_all(windows.iter().map(|w| self.load(w, options))).await
    }

    /// Fetches `window` in the foreground regardless of what is cached
    pub async fn refresh(&self, window: &EventWindow) -> Result<Vec<Event>, CalendarError> {
        self.fetch_window(window).await
    }

    /// Submits an invitation response, then reloads `window` quietly
    ///
    /// The reload goes through the normal freshness check, so a fresh entry
    /// is served and the response only shows up once the background
    /// revalidation lands. Use [`refresh`](Self::refresh) to see it at once.
    pub async fn respond_and_reload(
        &self,
        window: &EventWindow,
        event_id: EventId,
        status: InvitationStatus,
    ) -> Result<Loaded, CalendarError> {
        let timeout = self.inner.config.fetch_timeout;
        let outcome = tokio::time::timeout(timeout, self.inner.source.respond(event_id, status))
            .await
            .unwrap_or(Err(ApiError::Timeout(timeout)));

        if let Err(source) = outcome {
            return Err(CalendarError::RespondFailed { event_id, source });
        }
        info!(event_id, %status, "Invitation response recorded");

        self.load(window, LoadOptions::quiet()).await
    }

    fn spawn_revalidation(&self, key: CacheKey) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let window = *key.window();
            match inner.fetch_and_store(key).await {
                Ok(fetched) if fetched.stored => {
                    inner.notify(RefreshMessage::WindowRevalidated {
                        window,
                        events: fetched.events,
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(%key, error = %e, "Background revalidation failed");
                    inner.notify(RefreshMessage::RevalidationFailed {
                        window,
                        error: e.to_string(),
                    });
                }
            }
        })
    }
}

impl<S, K, C> Inner<S, K, C>
where
    S: EventSource,
    K: KeyValueStore,
    C: Clock,
{
    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        let ttl_millis = i64::try_from(self.config.ttl.as_millis()).unwrap_or(i64::MAX);
        is_fresh(entry, self.clock.now_millis(), ttl_millis)
    }

    fn notify(&self, message: RefreshMessage) {
        let slot = self.notifier.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(notifier) = slot.as_ref() {
            notifier.notify(message);
        }
    }

    async fn fetch_and_store(&self, key: CacheKey) -> Result<Fetched, CalendarError> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let timeout = self.config.fetch_timeout;

        let events = tokio::time::timeout(timeout, self.source.fetch_window(key.window()))
            .await
            .unwrap_or(Err(ApiError::Timeout(timeout)))
            .map_err(|source| CalendarError::FetchFailed {
                key: key.to_string(),
                source,
            })?;

        info!(%key, count = events.len(), seq, "Fetched calendar events");
        let stored = self.store_if_current(&key, seq, &events);
        Ok(Fetched { events, stored })
    }

    /// Writes the entry unless a newer fetch already has (sequenced policy)
    fn store_if_current(&self, key: &CacheKey, seq: u64, events: &[Event]) -> bool {
        let mut written = self.written_seq.lock().unwrap_or_else(|e| e.into_inner());

        if self.config.write_policy == WritePolicy::Sequenced {
            if let Some(&(latest, _)) = written.get(key) {
                if latest > seq {
                    debug!(%key, seq, latest, "Discarding out-of-order fetch result");
                    return false;
                }
            }
        }

        let now = self.clock.now_millis();
        let entry = CacheEntry {
            payload: events.to_vec(),
            stored_at_millis: now,
        };
        if let Err(e) = write_entry(&self.store, key, &entry) {
            warn!(%key, error = %e, "Failed to persist cache entry");
            return false;
        }

        let horizon = i64::try_from(self.config.fetch_timeout.as_millis()).unwrap_or(i64::MAX);
        written.retain(|_, &mut (_, at)| now.saturating_sub(at) <= horizon);
        written.insert(*key, (seq, now));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use crate::cache::store::MemoryStore;
    use crate::data::test_event;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::oneshot;

    const TTL_MS: i64 = 300_000;

    struct Step {
        result: Result<Vec<Event>, u16>,
        gate: Option<oneshot::Receiver<()>>,
    }

    /// Event source that replays scripted results in call order
    #[derive(Default)]
    struct ScriptedSource {
        steps: Mutex<VecDeque<Step>>,
        calls: AtomicUsize,
        responses: Mutex<Vec<(EventId, InvitationStatus)>>,
    }

    impl ScriptedSource {
        fn then_ok(self, events: Vec<Event>) -> Self {
            self.push(Step { result: Ok(events), gate: None })
        }

        fn then_err(self, status: u16) -> Self {
            self.push(Step { result: Err(status), gate: None })
        }

        fn then_gated(self, events: Vec<Event>, gate: oneshot::Receiver<()>) -> Self {
            self.push(Step { result: Ok(events), gate: Some(gate) })
        }

        fn push(self, step: Step) -> Self {
            self.steps.lock().unwrap().push_back(step);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EventSource for ScriptedSource {
        async fn fetch_window(&self, _window: &EventWindow) -> Result<Vec<Event>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.steps.lock().unwrap().pop_front();
            let Some(step) = step else {
                return Err(ApiError::Status(500));
            };
            if let Some(gate) = step.gate {
                let _ = gate.await;
            }
            step.result.map_err(ApiError::Status)
        }

        async fn respond(&self, event_id: EventId, status: InvitationStatus) -> Result<(), ApiError> {
            self.responses.lock().unwrap().push((event_id, status));
            Ok(())
        }
    }

    type TestCache = RevalidatingCache<ScriptedSource, MemoryStore, ManualClock>;

    fn october() -> EventWindow {
        EventWindow::month(2026, 10).unwrap()
    }

    fn one() -> Vec<Event> {
        vec![test_event(1, "2026-10-05")]
    }

    fn two() -> Vec<Event> {
        vec![test_event(1, "2026-10-05"), test_event(2, "2026-10-06")]
    }

    fn make_cache(source: ScriptedSource, config: CacheConfig) -> TestCache {
        RevalidatingCache::with_clock(source, MemoryStore::new(), ManualClock::new(0), config)
    }

    fn seed(cache: &TestCache, payload: Vec<Event>, stored_at_millis: i64) {
        let key = CacheKey::calendar_events(october());
        let entry = CacheEntry { payload, stored_at_millis };
        write_entry(cache.store(), &key, &entry).unwrap();
    }

    async fn wait_for_calls(source: &ScriptedSource, n: usize) {
        while source.calls() < n {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_write_policy_parse() {
        assert_eq!("sequenced".parse::<WritePolicy>(), Ok(WritePolicy::Sequenced));
        assert_eq!(
            "Last-Write-Wins".parse::<WritePolicy>(),
            Ok(WritePolicy::LastWriteWins)
        );
        assert!("newest".parse::<WritePolicy>().is_err());
    }

    #[test]
    fn test_cache_config_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_millis(300_000));
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.write_policy, WritePolicy::Sequenced);
    }

    #[tokio::test]
    async fn test_absent_entry_fetches_and_stores() {
        let cache = make_cache(ScriptedSource::default().then_ok(one()), CacheConfig::default());
        cache.clock().set(42);

        let loaded = cache.load(&october(), LoadOptions::default()).await.unwrap();

        assert_eq!(loaded.origin, Origin::Network);
        assert_eq!(loaded.events, one());
        assert!(loaded.revalidation.is_none());
        let entry = cache.read(&october()).unwrap();
        assert_eq!(entry.payload, one());
        assert_eq!(entry.stored_at_millis, 42);
    }

    #[tokio::test]
    async fn test_fresh_entry_served_without_waiting_then_revalidated() {
        let cache = make_cache(ScriptedSource::default().then_ok(two()), CacheConfig::default());
        seed(&cache, one(), 0);
        cache.clock().set(100_000);

        let mut loaded = cache.load(&october(), LoadOptions::default()).await.unwrap();

        assert_eq!(loaded.origin, Origin::Cache);
        assert_eq!(loaded.events, one());
        assert_eq!(cache.source().calls(), 0, "no fetch before load returns");

        cache.clock().set(100_500);
        loaded.settle().await;

        assert_eq!(cache.source().calls(), 1);
        cache.clock().set(100_600);
        let entry = cache.read(&october()).unwrap();
        assert_eq!(entry.payload, two());
        assert_eq!(entry.stored_at_millis, 100_500);
    }

    #[tokio::test]
    async fn test_stale_entry_fetched_in_foreground() {
        let cache = make_cache(ScriptedSource::default().then_ok(two()), CacheConfig::default());
        seed(&cache, one(), 0);
        cache.clock().set(400_000);

        let loaded = cache.load(&october(), LoadOptions::default()).await.unwrap();

        assert_eq!(loaded.origin, Origin::Network);
        assert_eq!(loaded.events, two());
        assert_eq!(cache.read(&october()).unwrap().stored_at_millis, 400_000);
    }

    #[tokio::test]
    async fn test_entry_stale_exactly_at_ttl() {
        let cache = make_cache(ScriptedSource::default().then_ok(two()), CacheConfig::default());
        seed(&cache, one(), 0);
        cache.clock().set(TTL_MS);

        let loaded = cache.load(&october(), LoadOptions::default()).await.unwrap();

        assert_eq!(loaded.origin, Origin::Network);
    }

    #[tokio::test]
    async fn test_absent_entry_failure_surfaces_and_writes_nothing() {
        let cache = make_cache(ScriptedSource::default().then_err(502), CacheConfig::default());

        let err = cache.load(&october(), LoadOptions::default()).await.unwrap_err();

        assert!(matches!(
            err,
            CalendarError::FetchFailed { source: ApiError::Status(502), .. }
        ));
        assert!(cache.read(&october()).is_none());
        assert!(cache.store().is_empty());
    }

    #[tokio::test]
    async fn test_stale_entry_failure_surfaces_and_keeps_entry() {
        let cache = make_cache(ScriptedSource::default().then_err(503), CacheConfig::default());
        seed(&cache, one(), 0);
        cache.clock().set(400_000);

        let err = cache.load(&october(), LoadOptions::default()).await.unwrap_err();

        assert!(err.is_fetch_failed());
        let entry = cache.read(&october()).unwrap();
        assert_eq!(entry.payload, one());
        assert_eq!(entry.stored_at_millis, 0);
    }

    #[tokio::test]
    async fn test_background_failure_is_swallowed() {
        let cache = make_cache(ScriptedSource::default().then_err(500), CacheConfig::default());
        let mut handle = cache.subscribe();
        seed(&cache, one(), 0);
        cache.clock().set(1_000);

        let mut loaded = cache.load(&october(), LoadOptions::default()).await.unwrap();
        loaded.settle().await;

        assert_eq!(loaded.events, one());
        assert_eq!(cache.read(&october()).unwrap().stored_at_millis, 0);
        match handle.try_recv() {
            Some(RefreshMessage::RevalidationFailed { window, error }) => {
                assert_eq!(window, october());
                assert!(error.contains("500"));
            }
            other => panic!("expected RevalidationFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_two_loads_one_foreground_fetch() {
        let source = ScriptedSource::default().then_ok(one()).then_ok(one());
        let cache = make_cache(source, CacheConfig::default());

        let first = cache.load(&october(), LoadOptions::default()).await.unwrap();
        let mut second = cache.load(&october(), LoadOptions::default()).await.unwrap();

        assert_eq!(first.origin, Origin::Network);
        assert_eq!(second.origin, Origin::Cache);
        assert_eq!(first.events, second.events);
        assert_eq!(cache.source().calls(), 1);

        second.settle().await;
        assert_eq!(cache.source().calls(), 2);
    }

    #[tokio::test]
    async fn test_indicator_messages_only_for_foreground_loads() {
        let source = ScriptedSource::default().then_ok(one()).then_ok(two());
        let cache = make_cache(source, CacheConfig::default());
        let mut handle = cache.subscribe();

        cache.load(&october(), LoadOptions::default()).await.unwrap();
        assert_eq!(handle.try_recv(), Some(RefreshMessage::LoadingStarted(october())));
        assert_eq!(handle.try_recv(), Some(RefreshMessage::LoadingFinished(october())));

        let mut loaded = cache.load(&october(), LoadOptions::default()).await.unwrap();
        loaded.settle().await;
        assert_eq!(
            handle.try_recv(),
            Some(RefreshMessage::WindowRevalidated { window: october(), events: two() })
        );
        assert!(handle.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_quiet_load_emits_no_indicator() {
        let cache = make_cache(ScriptedSource::default().then_ok(one()), CacheConfig::default());
        let mut handle = cache.subscribe();

        cache.load(&october(), LoadOptions::quiet()).await.unwrap();

        assert!(handle.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_sequenced_policy_discards_older_background_result() {
        let (release, gate) = oneshot::channel();
        let source = ScriptedSource::default().then_gated(one(), gate).then_ok(two());
        let cache = make_cache(source, CacheConfig::default());
        seed(&cache, one(), 0);
        cache.clock().set(1_000);

        let mut loaded = cache.load(&october(), LoadOptions::default()).await.unwrap();
        wait_for_calls(cache.source(), 1).await;

        let refreshed = cache.refresh(&october()).await.unwrap();
        assert_eq!(refreshed, two());

        release.send(()).unwrap();
        loaded.settle().await;

        assert_eq!(cache.read(&october()).unwrap().payload, two());
    }

    #[tokio::test]
    async fn test_write_records_expire_after_fetch_timeout() {
        let source = ScriptedSource::default().then_ok(one()).then_ok(two()).then_ok(two());
        let cache = make_cache(source, CacheConfig::default());
        let november = october().next_month().unwrap();

        cache.refresh(&october()).await.unwrap();
        cache.clock().set(5_000);
        cache.refresh(&november).await.unwrap();
        assert_eq!(cache.inner.written_seq.lock().unwrap().len(), 2);

        cache.clock().set(400_000);
        cache.refresh(&november).await.unwrap();

        let written = cache.inner.written_seq.lock().unwrap();
        assert_eq!(written.len(), 1);
        assert!(written.contains_key(&CacheKey::calendar_events(november)));
    }

    #[tokio::test]
    async fn test_last_write_wins_policy_lets_slow_result_overwrite() {
        let (release, gate) = oneshot::channel();
        let source = ScriptedSource::default().then_gated(one(), gate).then_ok(two());
        let config = CacheConfig::default().with_write_policy(WritePolicy::LastWriteWins);
        let cache = make_cache(source, config);
        seed(&cache, one(), 0);
        cache.clock().set(1_000);

        let mut loaded = cache.load(&october(), LoadOptions::default()).await.unwrap();
        wait_for_calls(cache.source(), 1).await;

        cache.refresh(&october()).await.unwrap();
        release.send(()).unwrap();
        loaded.settle().await;

        assert_eq!(cache.read(&october()).unwrap().payload, one());
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_fetch_failed() {
        let (_release, gate) = oneshot::channel::<()>();
        let source = ScriptedSource::default().then_gated(one(), gate);
        let config = CacheConfig::default().with_fetch_timeout(Duration::from_millis(50));
        let cache = make_cache(source, config);

        let err = cache.load(&october(), LoadOptions::default()).await.unwrap_err();

        assert!(matches!(
            err,
            CalendarError::FetchFailed { source: ApiError::Timeout(_), .. }
        ));
        assert!(cache.read(&october()).is_none());
    }

    #[tokio::test]
    async fn test_disposed_view_still_gets_entry_written() {
        let cache = make_cache(ScriptedSource::default().then_ok(two()), CacheConfig::default());
        let handle = cache.subscribe();
        seed(&cache, one(), 0);
        cache.clock().set(1_000);

        let mut loaded = cache.load(&october(), LoadOptions::default()).await.unwrap();
        drop(handle);
        loaded.settle().await;

        assert_eq!(cache.read(&october()).unwrap().payload, two());
    }

    #[tokio::test]
    async fn test_respond_and_reload_serves_cache_and_records_response() {
        let cache = make_cache(ScriptedSource::default().then_ok(two()), CacheConfig::default());
        seed(&cache, one(), 0);
        cache.clock().set(1_000);

        let mut loaded = cache
            .respond_and_reload(&october(), 1, InvitationStatus::Accepted)
            .await
            .unwrap();

        assert_eq!(
            cache.source().responses.lock().unwrap().as_slice(),
            &[(1, InvitationStatus::Accepted)]
        );
        // Fresh entry is served; the change lands with the revalidation
        assert_eq!(loaded.origin, Origin::Cache);
        assert_eq!(loaded.events, one());
        loaded.settle().await;
        assert_eq!(cache.read(&october()).unwrap().payload, two());
    }

    #[tokio::test]
    async fn test_load_all_loads_each_window() {
        let source = ScriptedSource::default().then_ok(one()).then_ok(two());
        let cache = make_cache(source, CacheConfig::default());
        let windows = [october(), october().next_month().unwrap()];

        let results = cache.load_all(&windows, LoadOptions::quiet()).await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_ok()));
        assert!(cache.read(&windows[0]).is_some());
        assert!(cache.read(&windows[1]).is_some());
    }
}
