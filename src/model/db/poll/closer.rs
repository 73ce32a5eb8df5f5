use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use log::{debug, error, info, trace, warn};
use mongodb::{bson::doc, error::Error as DbError, Database};
use rocket::{
    fairing::{Fairing, Info, Kind},
    futures::{
        future::{BoxFuture, FutureExt},
        TryStreamExt,
    },
    tokio::sync::Mutex,
    Build, Rocket,
};

use crate::{
    error::Error,
    model::{
        common::PollStatus,
        db::admin_log::{AdminLogCore, NewAdminLog},
        mongodb::{Coll, Id},
    },
    scheduled_task::ScheduledTask,
};

use super::Poll;

/// Map from poll IDs to closer tasks.
type TaskMap = HashMap<Id, ScheduledTask<Result<(), Error>>>;

const RETRY_INTERVAL_SECONDS: i64 = 300;

/// Poll closers: scheduled tasks that close active polls once they expire.
pub struct PollClosers {
    tasks: Arc<Mutex<TaskMap>>,
}

impl PollClosers {
    /// Create an empty set of poll closers.
    pub fn new() -> Self {
        Self {
            tasks: Default::default(),
        }
    }

    /// Does the given poll have a closer scheduled?
    pub async fn has_closer(&self, poll: Id) -> bool {
        self.tasks.lock().await.contains_key(&poll)
    }

    /// Schedule a closer for every active poll.
    pub async fn schedule_polls(&self, db: &Database) -> Result<(), DbError> {
        let filter = doc! {
            "status": PollStatus::Active,
        };
        let active_polls: Vec<Poll> = Coll::<Poll>::from_db(db)
            .find(filter, None)
            .await?
            .try_collect()
            .await?;
        let count = active_polls.len();
        for poll in active_polls {
            self.schedule_poll(Coll::from_db(db), Coll::from_db(db), &poll)
                .await;
        }
        debug!("Scheduled closers for {count} active polls");
        Ok(())
    }

    /// Schedule a closer for the given poll, replacing any existing one.
    /// Polls that are not active have their closer cancelled instead.
    pub async fn schedule_poll(&self, polls: Coll<Poll>, logs: Coll<NewAdminLog>, poll: &Poll) {
        if poll.status != PollStatus::Active {
            self.cancel_poll(poll.id).await;
            return;
        }
        let closer = Self::closer(poll.id, polls, logs, self.tasks.clone());
        let mut tasks_locked = self.tasks.lock().await;
        if let Some(task) = tasks_locked.remove(&poll.id) {
            if task.cancel().await {
                // A completed task removes itself before finishing, so this is unexpected.
                warn!("Closer for poll {} had already completed when rescheduled", poll.id);
            }
        }
        tasks_locked.insert(poll.id, ScheduledTask::new(closer, poll.expires_at));
    }

    /// Cancel the closer for the given poll, if there is one.
    pub async fn cancel_poll(&self, poll_id: Id) {
        let task = self.tasks.lock().await.remove(&poll_id);
        if let Some(task) = task {
            task.cancel().await;
            trace!("Cancelled closer for poll {poll_id}");
        }
    }

    /// Immediately trigger the closer for the given poll.
    /// If no closer was scheduled, this has no effect.
    pub async fn close_now(&self, poll_id: Id) -> Result<(), Error> {
        let task = self.tasks.lock().await.remove(&poll_id);
        // The lock must be released before awaiting, as the closer needs it too.
        match task {
            Some(closer) => {
                closer.trigger_now();
                closer.await.unwrap_or_else(|_| {
                    Err(Error::Status(
                        rocket::http::Status::InternalServerError,
                        format!("Failed to close poll {poll_id}"),
                    ))
                })
            }
            None => Ok(()),
        }
    }

    /// Close the given poll if it is still active.
    /// Since this is a recursive async function, we must use `BoxFuture` to
    /// avoid an infinitely-recursive state machine.
    fn closer(
        poll_id: Id,
        polls: Coll<Poll>,
        logs: Coll<NewAdminLog>,
        tasks: Arc<Mutex<TaskMap>>,
    ) -> BoxFuture<'static, Result<(), Error>> {
        async fn close(
            poll_id: Id,
            polls: &Coll<Poll>,
            logs: &Coll<NewAdminLog>,
        ) -> Result<(), Error> {
            debug!("Running closer for poll {poll_id}");
            let filter = doc! {
                "_id": poll_id,
                "status": PollStatus::Active,
            };
            let update = doc! {
                "$set": {
                    "status": PollStatus::Closed,
                    "updated_at": mongodb::bson::DateTime::from_chrono(Utc::now()),
                }
            };
            let result = polls.update_one(filter, update, None).await?;
            if result.modified_count == 0 {
                debug!("Poll {poll_id} was no longer active; nothing to close");
                return Ok(());
            }
            if let Some(poll) = polls.find_one(poll_id.as_doc(), None).await? {
                logs.insert_one(AdminLogCore::poll_closed(&poll), None).await?;
            }
            info!("Closed expired poll {poll_id}");
            Ok(())
        }

        async move {
            let result = close(poll_id, &polls, &logs).await;
            match result {
                Ok(()) => {
                    tasks.lock().await.remove(&poll_id);
                    trace!("Closer completed; removed self from list");
                }
                Err(ref e) => {
                    error!("Closer for poll {poll_id} failed: {e}");
                    let retry = Self::closer(poll_id, polls, logs, tasks.clone());
                    let retry_time = Utc::now() + Duration::seconds(RETRY_INTERVAL_SECONDS);
                    tasks
                        .lock()
                        .await
                        .insert(poll_id, ScheduledTask::new(retry, retry_time));
                    warn!("Failed closer will be retried in {RETRY_INTERVAL_SECONDS} seconds");
                }
            }
            result
        }
        .boxed()
    }
}

impl Default for PollClosers {
    fn default() -> Self {
        Self::new()
    }
}

/// A fairing that schedules closers for all active polls during Rocket
/// ignition, and places a `PollClosers` into managed state.
/// This fairing depends on the database being available in managed state,
/// and so must be attached after the fairing responsible for that.
pub struct PollCloserFairing;

#[rocket::async_trait]
impl Fairing for PollCloserFairing {
    fn info(&self) -> Info {
        Info {
            name: "Poll Closers",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        info!("Scheduling poll closers...");
        let poll_closers = PollClosers::new();
        let db = match rocket.state::<Database>() {
            Some(db) => db,
            None => {
                error!("Database was not available when scheduling poll closers");
                return Err(rocket);
            }
        };
        if let Err(e) = poll_closers.schedule_polls(db).await {
            error!("Failed to schedule poll closers: {e}");
            return Err(rocket);
        }
        info!("...poll closers scheduled!");

        rocket = rocket.manage(poll_closers);
        Ok(rocket)
    }
}
