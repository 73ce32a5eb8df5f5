//! One shared cache of snapshots, keyed by resource.
//!
//! Every consumer of a resource reads the same snapshot through a watch
//! channel, so two views of the same data can never disagree. Concurrent
//! refreshes of one resource are coalesced into a single fetch whose outcome,
//! success or failure, every waiting caller receives. A failed fetch leaves
//! the previous snapshot in place.
//!
//! Local edits are applied optimistically and kept until a fetched snapshot
//! confirms or overtakes them, the newer version of each record winning.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use rocket::tokio::sync::{watch, Mutex};

use crate::dashboard::client::{ApiClient, ClientError, Resource, Snapshot, Source};
use crate::dashboard::normalize::{PetitionView, PollView};
use crate::dashboard::reconcile::{merge_snapshots, unconfirmed_snapshot};

pub type SharedSnapshot = Option<Arc<Snapshot>>;

#[derive(Default)]
struct State {
    /// Outcome of the latest fetch, handed to callers that waited on it.
    last: Option<Result<Arc<Snapshot>, ClientError>>,
    /// The latest snapshot as the server sent it, and when it was requested.
    server: Option<(Arc<Snapshot>, DateTime<Utc>)>,
    /// Local records the server has not caught up with yet.
    pending: Option<Snapshot>,
}

impl State {
    /// The server snapshot with pending records merged in. Drops pending
    /// records the server has confirmed or overtaken.
    fn reconciled(&mut self) -> SharedSnapshot {
        let (server, snapshot_at) = self.server.clone()?;
        Some(self.merge_pending(server, snapshot_at))
    }

    fn merge_pending(
        &mut self,
        server: Arc<Snapshot>,
        snapshot_at: DateTime<Utc>,
    ) -> Arc<Snapshot> {
        let Some(local) = self.pending.take() else {
            return server;
        };
        self.pending = unconfirmed_snapshot(&local, &server, snapshot_at);
        Arc::new(merge_snapshots(local, (*server).clone(), snapshot_at))
    }
}

struct Entry {
    current: watch::Sender<SharedSnapshot>,
    /// Held for the duration of a fetch.
    fetching: Mutex<()>,
    /// Bumped after every fetch, whether it succeeded or not.
    generation: AtomicU64,
    state: StdMutex<State>,
}

impl Entry {
    fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current,
            fetching: Mutex::new(()),
            generation: AtomicU64::new(0),
            state: StdMutex::new(State::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish while the state is still locked, so that publications
    /// happen in the order the state changed.
    fn publish(&self, shown: &Arc<Snapshot>) {
        self.current.send_replace(Some(shown.clone()));
    }
}

pub struct QueryCache<S> {
    source: Arc<S>,
    entries: Mutex<HashMap<Resource, Arc<Entry>>>,
}

impl<S: Source> QueryCache<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    async fn entry(&self, resource: Resource) -> Arc<Entry> {
        self.entries
            .lock()
            .await
            .entry(resource)
            .or_insert_with(|| Arc::new(Entry::new()))
            .clone()
    }

    /// Watch a resource. The receiver holds `None` until the first fetch succeeds.
    pub async fn subscribe(&self, resource: Resource) -> watch::Receiver<SharedSnapshot> {
        self.entry(resource).await.current.subscribe()
    }

    /// The latest snapshot, without fetching.
    pub async fn get(&self, resource: Resource) -> SharedSnapshot {
        self.entry(resource).await.current.borrow().clone()
    }

    /// Fetch a resource, unless a fetch that started while we waited has
    /// already finished, in which case its outcome is shared.
    pub async fn refresh(&self, resource: Resource) -> Result<Arc<Snapshot>, ClientError> {
        self.fetch(resource, false).await
    }

    /// Fetch a resource even if another fetch just finished, e.g. after a
    /// mutation that the in-flight fetch may have missed.
    pub async fn invalidate(&self, resource: Resource) -> Result<Arc<Snapshot>, ClientError> {
        self.fetch(resource, true).await
    }

    async fn fetch(&self, resource: Resource, force: bool) -> Result<Arc<Snapshot>, ClientError> {
        let entry = self.entry(resource).await;
        let seen = entry.generation.load(Ordering::SeqCst);
        let _fetching = entry.fetching.lock().await;

        if !force && entry.generation.load(Ordering::SeqCst) != seen {
            let last = entry.state().last.clone();
            if let Some(outcome) = last {
                debug!("Sharing concurrent fetch of {resource}");
                return outcome;
            }
        }

        let snapshot_at = Utc::now();
        let fetched = self.source.fetch(resource).await;

        let mut state = entry.state();
        let outcome = match fetched {
            Ok(snapshot) => {
                let server = Arc::new(snapshot);
                state.server = Some((server.clone(), snapshot_at));
                let shown = state.merge_pending(server, snapshot_at);
                entry.publish(&shown);
                Ok(shown)
            }
            Err(e) => {
                warn!("Refreshing {resource} failed, keeping previous data: {e}");
                Err(e)
            }
        };
        state.last = Some(outcome.clone());
        entry.generation.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    /// Show local records before the server confirms them, e.g. the result
    /// of a mutation. They take part in every later refresh until the server
    /// returns a version at least as new, or stops returning a record that
    /// predates its snapshot. Returns the snapshot now shown, if any has been
    /// fetched yet.
    pub async fn apply(&self, local: Snapshot) -> SharedSnapshot {
        let entry = self.entry(local.resource()).await;
        let mut state = entry.state();
        state.pending = Some(match state.pending.take() {
            Some(staged) => merge_snapshots(local, staged, DateTime::<Utc>::MIN_UTC),
            None => local,
        });
        let shown = state.reconciled();
        if let Some(shown) = &shown {
            entry.publish(shown);
        }
        shown
    }
}

impl QueryCache<ApiClient> {
    /// Sign a petition and show the updated petition straight away.
    pub async fn sign_petition(&self, petition_id: &str) -> Result<PetitionView, ClientError> {
        let petition = self.source.sign_petition(petition_id).await?;
        self.apply(Snapshot::Petitions(vec![petition.clone()])).await;
        Ok(petition)
    }

    /// Vote in a poll and show the updated poll straight away.
    pub async fn vote(&self, poll_id: &str, option: u32) -> Result<PollView, ClientError> {
        let poll = self.source.vote(poll_id, option).await?;
        self.apply(Snapshot::Polls(vec![poll.clone()])).await;
        Ok(poll)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    use rocket::tokio::time;

    use super::*;
    use crate::dashboard::normalize::{examples::raw_petition, PetitionView};

    /// A source that counts fetches and can be told to fail.
    #[derive(Default)]
    pub struct CountingSource {
        pub fetches: AtomicU64,
        pub failing: AtomicBool,
        /// Simulated latency of each fetch.
        pub delay: Option<Duration>,
    }

    impl CountingSource {
        pub fn fetches(&self) -> u64 {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[rocket::async_trait]
    impl Source for CountingSource {
        async fn fetch(&self, _resource: Resource) -> Result<Snapshot, ClientError> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = self.delay {
                time::sleep(delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(ClientError::Status {
                    code: 503,
                    message: "Service Unavailable".to_string(),
                });
            }
            let petition = PetitionView::from_raw(
                raw_petition(&format!("p{n}"), "active", 0, 10),
                chrono::Utc::now(),
            );
            Ok(Snapshot::Petitions(vec![petition]))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rocket::tokio;

    use super::testing::CountingSource;
    use super::*;
    use crate::dashboard::normalize::examples::raw_petition;

    fn petition_ids(snapshot: &Snapshot) -> Vec<String> {
        match snapshot {
            Snapshot::Petitions(petitions) => petitions.iter().map(|p| p.id.clone()).collect(),
            other => panic!("unexpected snapshot {other:?}"),
        }
    }

    fn signature_counts(snapshot: &Snapshot) -> Vec<u32> {
        match snapshot {
            Snapshot::Petitions(petitions) => {
                petitions.iter().map(|p| p.signatures_count).collect()
            }
            other => panic!("unexpected snapshot {other:?}"),
        }
    }

    /// Serves whatever petitions it currently holds.
    struct PetitionSource(StdMutex<Vec<PetitionView>>);

    impl PetitionSource {
        fn serve(&self, petitions: Vec<PetitionView>) {
            *self.0.lock().unwrap() = petitions;
        }
    }

    #[rocket::async_trait]
    impl Source for PetitionSource {
        async fn fetch(&self, _resource: Resource) -> Result<Snapshot, ClientError> {
            Ok(Snapshot::Petitions(self.0.lock().unwrap().clone()))
        }
    }

    fn petition(signatures: u32, updated_at: DateTime<Utc>) -> PetitionView {
        let raw = raw_petition("p1", "active", signatures, 10);
        let mut petition = PetitionView::from_raw(raw, Utc::now());
        petition.updated_at = updated_at;
        petition
    }

    #[tokio::test]
    async fn subscribers_see_refreshes() {
        let cache = QueryCache::new(Arc::new(CountingSource::default()));
        let mut rx = cache.subscribe(Resource::Petitions).await;
        assert!(rx.borrow().is_none());

        cache.refresh(Resource::Petitions).await.unwrap();
        rx.changed().await.unwrap();
        let snapshot = rx.borrow().clone().unwrap();
        assert_eq!(petition_ids(&snapshot), vec!["p1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_refreshes_share_one_fetch() {
        let source = Arc::new(CountingSource {
            delay: Some(Duration::from_secs(1)),
            ..Default::default()
        });
        let cache = QueryCache::new(source.clone());

        let (a, b, c) = tokio::join!(
            cache.refresh(Resource::Petitions),
            cache.refresh(Resource::Petitions),
            cache.refresh(Resource::Petitions),
        );
        assert_eq!(source.fetches(), 1);
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(petition_ids(&c.unwrap()), vec!["p1"]);

        cache.invalidate(Resource::Petitions).await.unwrap();
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_failing_refreshes_share_one_fetch() {
        let source = Arc::new(CountingSource {
            delay: Some(Duration::from_secs(1)),
            ..Default::default()
        });
        source.failing.store(true, Ordering::SeqCst);
        let cache = QueryCache::new(source.clone());

        let (a, b, c) = tokio::join!(
            cache.refresh(Resource::Petitions),
            cache.refresh(Resource::Petitions),
            cache.refresh(Resource::Petitions),
        );
        assert_eq!(source.fetches(), 1);
        for outcome in [a, b, c] {
            assert!(matches!(outcome, Err(ClientError::Status { code: 503, .. })));
        }
        assert!(cache.get(Resource::Petitions).await.is_none());

        source.failing.store(false, Ordering::SeqCst);
        cache.refresh(Resource::Petitions).await.unwrap();
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn newer_local_records_survive_refreshes() {
        let t = Utc::now() - chrono::Duration::hours(1);
        let source = Arc::new(PetitionSource(StdMutex::new(vec![petition(3, t)])));
        let cache = QueryCache::new(source.clone());
        cache.refresh(Resource::Petitions).await.unwrap();

        let signed = petition(4, t + chrono::Duration::seconds(10));
        let shown = cache.apply(Snapshot::Petitions(vec![signed])).await.unwrap();
        assert_eq!(signature_counts(&shown), vec![4]);

        // The server has not caught up yet.
        let refreshed = cache.refresh(Resource::Petitions).await.unwrap();
        assert_eq!(signature_counts(&refreshed), vec![4]);

        // Now it has, and moved on.
        source.serve(vec![petition(5, t + chrono::Duration::seconds(20))]);
        let refreshed = cache.refresh(Resource::Petitions).await.unwrap();
        assert_eq!(signature_counts(&refreshed), vec![5]);
        let shown = cache.get(Resource::Petitions).await.unwrap();
        assert_eq!(signature_counts(&shown), vec![5]);
    }

    #[tokio::test]
    async fn older_local_records_are_replaced() {
        let t = Utc::now() - chrono::Duration::hours(1);
        let source = Arc::new(PetitionSource(StdMutex::new(vec![petition(7, t)])));
        let cache = QueryCache::new(source.clone());

        // Applied before anything was fetched: nothing to show yet.
        let stale = petition(2, t - chrono::Duration::minutes(5));
        assert!(cache.apply(Snapshot::Petitions(vec![stale])).await.is_none());

        let refreshed = cache.refresh(Resource::Petitions).await.unwrap();
        assert_eq!(signature_counts(&refreshed), vec![7]);
        assert_eq!(petition_ids(&refreshed), vec!["p1"]);
    }

    #[tokio::test]
    async fn failures_keep_the_previous_snapshot() {
        let source = Arc::new(CountingSource::default());
        let cache = QueryCache::new(source.clone());
        cache.refresh(Resource::Petitions).await.unwrap();

        source.failing.store(true, Ordering::SeqCst);
        assert!(matches!(
            cache.refresh(Resource::Petitions).await,
            Err(ClientError::Status { code: 503, .. })
        ));
        let kept = cache.get(Resource::Petitions).await.unwrap();
        assert_eq!(petition_ids(&kept), vec!["p1"]);
    }

    #[tokio::test]
    async fn resources_are_cached_separately() {
        let cache = QueryCache::new(Arc::new(CountingSource::default()));
        cache.refresh(Resource::Petitions).await.unwrap();
        assert!(cache.get(Resource::Polls).await.is_none());
    }
}
