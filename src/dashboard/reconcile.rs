//! Reconciling optimistic local edits with fresh server snapshots.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, Utc};

use crate::dashboard::client::Snapshot;
use crate::dashboard::normalize::{FeedbackView, PetitionView, PollView};

/// A record that can be matched across snapshots and ordered by recency.
pub trait Record {
    type Key: Eq + Hash + Clone;

    fn key(&self) -> Self::Key;
    fn updated_at(&self) -> DateTime<Utc>;
}

/// Merge local records into a server snapshot taken at `snapshot_at`.
///
/// For each key the newer version wins, and the server wins ties. Records
/// only known locally are kept while they are newer than the snapshot
/// (pending creations); older ones were deleted on the server. Pending
/// records come first, then the snapshot in server order.
pub fn merge_by_timestamp<R: Record>(
    local: Vec<R>,
    server: Vec<R>,
    snapshot_at: DateTime<Utc>,
) -> Vec<R> {
    let mut local: HashMap<R::Key, R> = local
        .into_iter()
        .map(|record| (record.key(), record))
        .collect();

    let mut merged: Vec<R> = server
        .into_iter()
        .map(|record| match local.remove(&record.key()) {
            Some(mine) if mine.updated_at() > record.updated_at() => mine,
            _ => record,
        })
        .collect();

    let mut pending: Vec<R> = local
        .into_values()
        .filter(|record| record.updated_at() > snapshot_at)
        .collect();
    pending.sort_by_key(|record| std::cmp::Reverse(record.updated_at()));
    pending.append(&mut merged);
    pending
}

/// The local records that [`merge_by_timestamp`] would still prefer over
/// `server`. Everything else has been confirmed or overtaken by the server.
pub fn unconfirmed<R: Record + Clone>(
    local: &[R],
    server: &[R],
    snapshot_at: DateTime<Utc>,
) -> Vec<R> {
    let server: HashMap<R::Key, DateTime<Utc>> = server
        .iter()
        .map(|record| (record.key(), record.updated_at()))
        .collect();
    local
        .iter()
        .filter(|record| match server.get(&record.key()) {
            Some(&at) => record.updated_at() > at,
            None => record.updated_at() > snapshot_at,
        })
        .cloned()
        .collect()
}

/// [`merge_by_timestamp`] for whole snapshots. Only list snapshots are merged
/// record by record; otherwise the server's snapshot is taken as is.
pub fn merge_snapshots(local: Snapshot, server: Snapshot, snapshot_at: DateTime<Utc>) -> Snapshot {
    match (local, server) {
        (Snapshot::Petitions(local), Snapshot::Petitions(server)) => {
            Snapshot::Petitions(merge_by_timestamp(local, server, snapshot_at))
        }
        (Snapshot::Polls(local), Snapshot::Polls(server)) => {
            Snapshot::Polls(merge_by_timestamp(local, server, snapshot_at))
        }
        (Snapshot::MyFeedback(local), Snapshot::MyFeedback(server)) => {
            Snapshot::MyFeedback(merge_by_timestamp(local, server, snapshot_at))
        }
        (_, server) => server,
    }
}

/// [`unconfirmed`] for whole snapshots, `None` once nothing is left.
pub fn unconfirmed_snapshot(
    local: &Snapshot,
    server: &Snapshot,
    snapshot_at: DateTime<Utc>,
) -> Option<Snapshot> {
    let left = match (local, server) {
        (Snapshot::Petitions(local), Snapshot::Petitions(server)) => {
            Snapshot::Petitions(unconfirmed(local, server, snapshot_at))
        }
        (Snapshot::Polls(local), Snapshot::Polls(server)) => {
            Snapshot::Polls(unconfirmed(local, server, snapshot_at))
        }
        (Snapshot::MyFeedback(local), Snapshot::MyFeedback(server)) => {
            Snapshot::MyFeedback(unconfirmed(local, server, snapshot_at))
        }
        _ => return None,
    };
    match &left {
        Snapshot::Petitions(records) if records.is_empty() => None,
        Snapshot::Polls(records) if records.is_empty() => None,
        Snapshot::MyFeedback(records) if records.is_empty() => None,
        _ => Some(left),
    }
}

macro_rules! record_by_id {
    ($($ty:ty),+) => {
        $(
            impl Record for $ty {
                type Key = String;

                fn key(&self) -> String {
                    self.id.clone()
                }

                fn updated_at(&self) -> DateTime<Utc> {
                    self.updated_at
                }
            }
        )+
    };
}

record_by_id!(PetitionView, PollView, FeedbackView);
