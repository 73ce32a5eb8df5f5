//! A single scheduler for automatic refreshes.
//!
//! Each watched resource gets exactly one timer, however many views watch
//! it. The timer fires immediately, then once per interval; the shortest
//! interval any watcher asked for wins. Dropping the last [`RefreshHandle`]
//! for a resource stops its timer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, trace};

use crate::dashboard::{
    cache::QueryCache,
    client::{Resource, Source},
};
use crate::scheduled_task::RepeatingTask;

/// Default auto-refresh interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

struct Timer {
    task: RepeatingTask,
    watchers: usize,
}

type TimerMap = HashMap<Resource, Timer>;

pub struct RefreshScheduler<S> {
    cache: Arc<QueryCache<S>>,
    timers: Arc<Mutex<TimerMap>>,
}

impl<S: Source> RefreshScheduler<S> {
    pub fn new(cache: Arc<QueryCache<S>>) -> Self {
        Self {
            cache,
            timers: Default::default(),
        }
    }

    fn start(&self, resource: Resource, interval: Duration) -> RepeatingTask {
        let cache = self.cache.clone();
        RepeatingTask::new(interval, move || {
            let cache = cache.clone();
            async move {
                trace!("Auto-refreshing {resource}");
                // Failures are logged by the cache, which keeps the old snapshot.
                let _ = cache.refresh(resource).await;
            }
        })
    }

    /// Keep `resource` refreshed at least every `interval` until the
    /// returned handle is dropped.
    pub fn watch(&self, resource: Resource, interval: Duration) -> RefreshHandle {
        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        match timers.get_mut(&resource) {
            Some(timer) => {
                timer.watchers += 1;
                if interval < timer.task.period() {
                    debug!(
                        "Refreshing {resource} every {interval:?} instead of {:?}",
                        timer.task.period()
                    );
                    timer.task = self.start(resource, interval);
                }
            }
            None => {
                debug!("Refreshing {resource} every {interval:?}");
                let task = self.start(resource, interval);
                timers.insert(resource, Timer { task, watchers: 1 });
            }
        }
        RefreshHandle {
            resource,
            timers: self.timers.clone(),
        }
    }

    /// How many resources currently have a timer.
    pub fn active_timers(&self) -> usize {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Keeps a resource's timer alive.
pub struct RefreshHandle {
    resource: Resource,
    timers: Arc<Mutex<TimerMap>>,
}

impl RefreshHandle {
    pub fn resource(&self) -> Resource {
        self.resource
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = timers.get_mut(&self.resource) {
            timer.watchers -= 1;
            if timer.watchers == 0 {
                // Dropping the task aborts it.
                timers.remove(&self.resource);
                debug!("Stopped refreshing {}", self.resource);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::tokio::time;

    use crate::dashboard::cache::testing::CountingSource;

    use super::*;

    fn scheduler() -> (Arc<CountingSource>, RefreshScheduler<CountingSource>) {
        let source = Arc::new(CountingSource::default());
        let cache = Arc::new(QueryCache::new(source.clone()));
        (source, RefreshScheduler::new(cache))
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_now_and_every_interval() {
        let (source, scheduler) = scheduler();
        let _handle = scheduler.watch(Resource::Petitions, DEFAULT_INTERVAL);

        time::sleep(Duration::from_millis(30_500)).await;
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn watchers_share_one_timer() {
        let (source, scheduler) = scheduler();
        let first = scheduler.watch(Resource::Polls, DEFAULT_INTERVAL);
        let second = scheduler.watch(Resource::Polls, DEFAULT_INTERVAL);
        assert_eq!(scheduler.active_timers(), 1);

        time::sleep(Duration::from_millis(30_500)).await;
        assert_eq!(source.fetches(), 2);

        drop(first);
        assert_eq!(scheduler.active_timers(), 1);
        drop(second);
        assert_eq!(scheduler.active_timers(), 0);

        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shortest_interval_wins() {
        let (source, scheduler) = scheduler();
        let _slow = scheduler.watch(Resource::Notifications, Duration::from_secs(60));
        // Let the slow timer's immediate tick happen.
        time::sleep(Duration::from_millis(500)).await;
        let _fast = scheduler.watch(Resource::Notifications, Duration::from_secs(10));

        // One initial fetch per timer, then the fast timer ticks at 10 and 20.
        time::sleep(Duration::from_secs(25)).await;
        assert_eq!(source.fetches(), 4);
    }
}
