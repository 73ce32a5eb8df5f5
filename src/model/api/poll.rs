use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::id::ApiId,
    common::PollStatus,
    db::poll::{Poll, PollCore},
    mongodb::Id,
};

/// A poll as submitted by its creator, for creation or replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSpec {
    pub question: String,
    #[serde(default)]
    pub description: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub location: String,
    pub expires_at: DateTime<Utc>,
    /// Defaults to active; drafts are hidden from everyone but the creator.
    #[serde(default)]
    pub status: Option<PollStatus>,
}

impl PollSpec {
    /// Validate the spec, producing the poll's new core data.
    /// Votes are carried over from `previous` only if the options are unchanged.
    pub fn into_core(self, creator: Id, previous: Option<&PollCore>) -> Result<PollCore> {
        let question = self.question.trim();
        if question.is_empty() {
            return Err(Error::bad_request("Question is required"));
        }
        let options: Vec<String> = self
            .options
            .iter()
            .map(|option| option.trim().to_string())
            .collect();
        if options.len() < 2 || options.iter().any(String::is_empty) {
            return Err(Error::bad_request("A poll needs at least two non-empty options"));
        }
        let now = Utc::now();
        let status = self.status.unwrap_or(PollStatus::Active);
        if status == PollStatus::Active && self.expires_at <= now {
            return Err(Error::bad_request("Expiry must be in the future"));
        }

        let votes = match previous {
            Some(previous) if previous.options == options => previous.votes.clone(),
            _ => Vec::new(),
        };
        Ok(PollCore {
            question: question.to_string(),
            description: self.description.trim().to_string(),
            options,
            votes,
            location: self.location.trim().to_string(),
            expires_at: self.expires_at,
            status,
            creator,
            created_at: previous.map_or(now, |previous| previous.created_at),
            updated_at: now,
        })
    }
}

/// One option of a poll, with its current standing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDesc {
    pub text: String,
    pub votes: u32,
    pub percentage: u32,
}

/// A poll as returned to clients. Individual votes are not disclosed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollDesc {
    pub id: ApiId,
    pub question: String,
    pub description: String,
    pub options: Vec<OptionDesc>,
    pub total_votes: u32,
    /// The caller's current choice, if they have voted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub my_vote: Option<u32>,
    pub location: String,
    pub expires_at: DateTime<Utc>,
    pub status: PollStatus,
    pub creator: ApiId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PollDesc {
    /// Describe a poll from the point of view of `viewer`.
    pub fn for_viewer(poll: Poll, viewer: Option<Id>) -> Self {
        let tally = poll.tally();
        let my_vote = viewer.and_then(|viewer| poll.vote_of(viewer));
        let core = poll.poll;
        let options = core
            .options
            .into_iter()
            .zip(tally.counts.iter().zip(&tally.percentages))
            .map(|(text, (&votes, &percentage))| OptionDesc {
                text,
                votes,
                percentage,
            })
            .collect();
        Self {
            id: poll.id.into(),
            question: core.question,
            description: core.description,
            options,
            total_votes: tally.total,
            my_vote,
            location: core.location,
            expires_at: core.expires_at,
            status: core.status,
            creator: core.creator.into(),
            created_at: core.created_at,
            updated_at: core.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    /// Index into the poll's options.
    pub option: u32,
}

#[cfg(test)]
mod examples {
    use chrono::Duration;

    use super::*;

    impl PollSpec {
        pub fn example() -> Self {
            Self {
                question: "Which park needs a playground first?".to_string(),
                description: String::new(),
                options: vec!["North".to_string(), "South".to_string()],
                location: "Springfield".to_string(),
                expires_at: Utc::now() + Duration::days(3),
                status: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::db::poll::Vote;

    use super::*;

    #[test]
    fn specs_need_two_options() {
        let mut spec = PollSpec::example();
        spec.options = vec!["Only".to_string()];
        assert!(spec.into_core(Id::new(), None).is_err());

        let mut spec = PollSpec::example();
        spec.options.push(" ".to_string());
        assert!(spec.into_core(Id::new(), None).is_err());
    }

    #[test]
    fn active_polls_must_expire_in_the_future() {
        let mut spec = PollSpec::example();
        spec.expires_at = Utc::now() - chrono::Duration::minutes(1);
        assert!(spec.clone().into_core(Id::new(), None).is_err());

        spec.status = Some(PollStatus::Draft);
        assert!(spec.into_core(Id::new(), None).is_ok());
    }

    #[test]
    fn changing_options_discards_votes() {
        let creator = Id::new();
        let mut previous = PollSpec::example().into_core(creator, None).unwrap();
        previous.votes.push(Vote {
            user: Id::new(),
            option: 0,
            voted_at: Utc::now(),
        });

        let same = PollSpec::example().into_core(creator, Some(&previous)).unwrap();
        assert_eq!(same.votes.len(), 1);
        assert_eq!(same.created_at, previous.created_at);

        let mut spec = PollSpec::example();
        spec.options.push("East".to_string());
        let changed = spec.into_core(creator, Some(&previous)).unwrap();
        assert!(changed.votes.is_empty());
    }

    #[test]
    fn descriptions_tally_votes_for_the_viewer() {
        let me = Id::new();
        let mut poll = Poll {
            id: Id::new(),
            poll: PollSpec::example().into_core(Id::new(), None).unwrap(),
        };
        for (user, option) in [(me, 1), (Id::new(), 1), (Id::new(), 0)] {
            poll.votes.push(Vote {
                user,
                option,
                voted_at: Utc::now(),
            });
        }
        let desc = PollDesc::for_viewer(poll.clone(), Some(me));
        assert_eq!(desc.total_votes, 3);
        assert_eq!(desc.my_vote, Some(1));
        assert_eq!(desc.options[1].votes, 2);
        assert_eq!(desc.options[1].percentage, 67);
        assert_eq!(PollDesc::for_viewer(poll, None).my_vote, None);
    }
}
