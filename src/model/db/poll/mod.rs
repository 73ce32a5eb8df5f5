use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::dashboard::aggregate::{tally, PollFacts, Tally};
use crate::model::{common::PollStatus, mongodb::Id};

mod closer;
pub use closer::{PollClosers, PollCloserFairing};

/// One user's choice in a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub user: Id,
    /// Index into the poll's options.
    pub option: u32,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub voted_at: DateTime<Utc>,
}

/// Core poll data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollCore {
    pub question: String,
    pub description: String,
    pub options: Vec<String>,
    /// Flat list of votes, at most one per user.
    pub votes: Vec<Vote>,
    pub location: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
    pub status: PollStatus,
    pub creator: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl PollCore {
    /// Can votes be cast right now?
    pub fn accepts_votes(&self, now: DateTime<Utc>) -> bool {
        self.status == PollStatus::Active && now < self.expires_at
    }

    /// The option the given user voted for, if any.
    pub fn vote_of(&self, user: Id) -> Option<u32> {
        self.votes
            .iter()
            .rev()
            .find(|vote| vote.user == user)
            .map(|vote| vote.option)
    }

    /// Count the votes per option.
    pub fn tally(&self) -> Tally {
        tally(
            self.options.len(),
            self.votes.iter().map(|vote| (vote.user, vote.option)),
        )
    }
}

impl PollFacts for Poll {
    type UserId = Id;

    fn status(&self) -> Option<PollStatus> {
        Some(self.status)
    }

    fn creator(&self) -> &Id {
        &self.creator
    }

    fn has_voted(&self, user: &Id) -> bool {
        self.votes.iter().any(|vote| vote.user == *user)
    }
}

/// A poll without an ID.
pub type NewPoll = PollCore;

/// A poll from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub poll: PollCore,
}

impl Deref for Poll {
    type Target = PollCore;

    fn deref(&self) -> &Self::Target {
        &self.poll
    }
}

impl DerefMut for Poll {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.poll
    }
}

/// Example data for tests.
#[cfg(test)]
pub mod examples {
    use chrono::Duration;

    use super::*;

    impl PollCore {
        pub fn example(creator: Id) -> Self {
            let now = Utc::now();
            Self {
                question: "Should the library open on Sundays?".to_string(),
                description: "Trial period of six months.".to_string(),
                options: vec!["Yes".to_string(), "No".to_string()],
                votes: Vec::new(),
                location: "Springfield".to_string(),
                expires_at: now + Duration::days(7),
                status: PollStatus::Active,
                creator,
                created_at: now,
                updated_at: now,
            }
        }

        pub fn expired_example(creator: Id) -> Self {
            let mut poll = Self::example(creator);
            poll.expires_at = Utc::now() - Duration::hours(1);
            poll
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn only_active_unexpired_polls_accept_votes() {
        let now = Utc::now();
        let mut poll = PollCore::example(Id::new());
        assert!(poll.accepts_votes(now));

        poll.status = PollStatus::Draft;
        assert!(!poll.accepts_votes(now));

        poll.status = PollStatus::Active;
        assert!(!poll.accepts_votes(poll.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn latest_vote_of_user_wins() {
        let user = Id::new();
        let mut poll = PollCore::example(Id::new());
        assert_eq!(poll.vote_of(user), None);
        for option in [0, 1] {
            poll.votes.push(Vote {
                user,
                option,
                voted_at: Utc::now(),
            });
        }
        assert_eq!(poll.vote_of(user), Some(1));
        assert_eq!(poll.tally().counts, vec![0, 1]);
    }
}
