//! Background tasks tied to wall-clock time: one-shot tasks that run at a
//! given instant, and repeating tasks that run on a fixed interval.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use rocket::tokio::{
    self,
    sync::Notify,
    task::{JoinError, JoinHandle},
    time::{self as tokio_time, Duration, MissedTickBehavior},
};

/// A task scheduled for a specific point in the future.
/// It will automatically execute at that point, or can be cancelled or triggered early.
pub struct ScheduledTask<T> {
    task_handle: JoinHandle<T>,
    wait_handle: JoinHandle<()>,
    signal: Arc<Notify>,
}

impl<T> ScheduledTask<T>
where
    T: Send + 'static,
{
    /// Schedule the given task to execute at time `run_at`.
    /// If `run_at` is in the past, the task will execute immediately.
    pub fn new<Fut>(task: Fut, run_at: DateTime<Utc>) -> Self
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        let signal = Arc::new(Notify::new());

        let task_signal = signal.clone();
        let task_handle = tokio::spawn(async move {
            task_signal.notified().await;
            task.await
        });

        let sleep_duration = duration_until(run_at);
        let wait_signal = signal.clone();
        let wait_handle = tokio::spawn(async move {
            tokio_time::sleep(sleep_duration).await;
            wait_signal.notify_one();
        });

        Self {
            task_handle,
            wait_handle,
            signal,
        }
    }

    /// Cancel the task. Returns true iff it had already completed before we could cancel it.
    pub async fn cancel(self) -> bool {
        self.task_handle.abort();
        self.wait_handle.abort();
        self.task_handle.await.is_ok()
    }

    /// Trigger the task now instead of waiting till the original time.
    pub fn trigger_now(&self) {
        self.wait_handle.abort();
        self.signal.notify_one();
    }
}

/// Implement `Future` for `ScheduledTask` so we can directly `await` it.
impl<T> Future for ScheduledTask<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.task_handle).poll(cx)
    }
}

/// A task that runs immediately and then once per `period`, until dropped.
///
/// A slow run delays the following ticks rather than causing a burst.
pub struct RepeatingTask {
    handle: JoinHandle<()>,
    period: Duration,
}

impl RepeatingTask {
    /// Start running `make_run()` every `period`, beginning now.
    pub fn new<F, Fut>(period: Duration, mut make_run: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = tokio_time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                make_run().await;
            }
        });
        Self { handle, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Stop the task. Also happens on drop.
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Convert a `DateTime` into a duration from the current instant.
/// A `DateTime` in the past will produce a duration of zero.
fn duration_until(datetime: DateTime<Utc>) -> Duration {
    (datetime - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Duration as ChronoDuration;

    use super::*;

    #[tokio::test]
    async fn past_tasks_run_immediately() {
        let task = ScheduledTask::new(async { 7 }, Utc::now() - ChronoDuration::seconds(5));
        assert_eq!(task.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn trigger_now_skips_the_wait() {
        let task = ScheduledTask::new(async { "done" }, Utc::now() + ChronoDuration::days(1));
        task.trigger_now();
        assert_eq!(task.await.unwrap(), "done");
    }

    #[tokio::test]
    async fn cancelled_tasks_never_run() {
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = ran.clone();
        let task = ScheduledTask::new(
            async move {
                flag.fetch_add(1, Ordering::SeqCst);
            },
            Utc::now() + ChronoDuration::days(1),
        );
        assert!(!task.cancel().await);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn repeating_task_runs_on_each_tick() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let task = RepeatingTask::new(Duration::from_secs(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio_time::sleep(Duration::from_millis(25_500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        drop(task);
        tokio_time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
