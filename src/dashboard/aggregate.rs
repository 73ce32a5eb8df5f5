//! Counts and percentages over petitions and polls.
//!
//! Every function here is a linear scan over borrowed records; nothing is
//! mutated. The same code backs the server's `/petitions/analytics` endpoint
//! and the dashboard's summary cards.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::model::common::{PetitionStatus, PollStatus};

/// What the aggregator needs to know about a petition.
pub trait PetitionFacts {
    type UserId: PartialEq;

    /// `None` for statuses we don't recognise.
    fn status(&self) -> Option<PetitionStatus>;
    fn creator(&self) -> &Self::UserId;
    fn signatures(&self) -> u32;
    fn goal(&self) -> u32;
    fn category(&self) -> &str;
    fn location(&self) -> &str;
    fn verified(&self) -> bool;

    fn goal_reached(&self) -> bool {
        self.signatures() >= self.goal()
    }
}

/// What the aggregator needs to know about a poll.
pub trait PollFacts {
    type UserId: PartialEq;

    /// `None` for statuses we don't recognise.
    fn status(&self) -> Option<PollStatus>;
    fn creator(&self) -> &Self::UserId;
    fn has_voted(&self, user: &Self::UserId) -> bool;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetitionStats {
    pub total: u32,
    pub active: u32,
    pub under_review: u32,
    pub closed: u32,
    /// Created by the current user.
    pub mine: u32,
    /// Signature goal met, whatever the status.
    pub goal_reached: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollStats {
    pub total: u32,
    pub active: u32,
    pub closed: u32,
    pub draft: u32,
    /// Created by the current user.
    pub mine: u32,
    /// Voted in by the current user.
    pub voted: u32,
}

/// Votes per option of one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub counts: Vec<u32>,
    /// Rounded to the nearest whole percent; may not sum to exactly 100.
    pub percentages: Vec<u32>,
    pub total: u32,
}

/// A named count, e.g. petitions per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
    pub count: u32,
}

pub fn petition_stats<'a, P>(
    petitions: impl IntoIterator<Item = &'a P>,
    me: Option<&P::UserId>,
) -> PetitionStats
where
    P: PetitionFacts + 'a,
{
    let mut stats = PetitionStats::default();
    for petition in petitions {
        stats.total += 1;
        match petition.status() {
            Some(PetitionStatus::Active) => stats.active += 1,
            Some(PetitionStatus::UnderReview) => stats.under_review += 1,
            Some(PetitionStatus::Closed) => stats.closed += 1,
            None => {}
        }
        if me.map_or(false, |me| petition.creator() == me) {
            stats.mine += 1;
        }
        if petition.goal_reached() {
            stats.goal_reached += 1;
        }
    }
    stats
}

pub fn poll_stats<'a, P>(
    polls: impl IntoIterator<Item = &'a P>,
    me: Option<&P::UserId>,
) -> PollStats
where
    P: PollFacts + 'a,
{
    let mut stats = PollStats::default();
    for poll in polls {
        stats.total += 1;
        match poll.status() {
            Some(PollStatus::Active) => stats.active += 1,
            Some(PollStatus::Closed) => stats.closed += 1,
            Some(PollStatus::Draft) => stats.draft += 1,
            None => {}
        }
        if let Some(me) = me {
            if poll.creator() == me {
                stats.mine += 1;
            }
            if poll.has_voted(me) {
                stats.voted += 1;
            }
        }
    }
    stats
}

/// Count votes for a poll with `options` options.
///
/// Each user counts once, for their last vote. Votes for options that don't
/// exist are ignored, so `counts` always sums to `total`.
pub fn tally<K>(options: usize, votes: impl IntoIterator<Item = (K, u32)>) -> Tally
where
    K: Eq + Hash,
{
    let mut latest = HashMap::new();
    for (user, option) in votes {
        latest.insert(user, option);
    }

    let mut counts = vec![0_u32; options];
    for option in latest.into_values() {
        if let Some(count) = usize::try_from(option).ok().and_then(|i| counts.get_mut(i)) {
            *count += 1;
        }
    }
    let total = counts.iter().sum();
    let percentages = counts.iter().map(|&count| percentage(count, total)).collect();
    Tally {
        counts,
        percentages,
        total,
    }
}

/// `round(part / total * 100)`, or 0 when `total` is 0.
pub fn percentage(part: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let (part, total) = (u64::from(part), u64::from(total));
    // Integer round-half-up of part * 100 / total.
    ((part * 200 + total) / (2 * total)) as u32
}

/// Count occurrences of each key, most common first, ties by name.
pub fn breakdown<'a>(keys: impl IntoIterator<Item = &'a str>) -> Vec<Bucket> {
    let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_default() += 1;
    }
    let mut buckets: Vec<Bucket> = counts
        .into_iter()
        .map(|(name, count)| Bucket {
            name: name.to_string(),
            count,
        })
        .collect();
    // Stable sort keeps the BTreeMap's name order among equal counts.
    buckets.sort_by(|a, b| b.count.cmp(&a.count));
    buckets
}
