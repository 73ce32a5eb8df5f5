//! Raw API records and the view records the dashboard works with.
//!
//! Records are normalised exactly once, as they come off the wire: statuses
//! are parsed leniently and relabelled, relative times and progress figures
//! are derived. Raw records are deliberately forgiving (missing counters
//! default to zero, unknown statuses pass through) so that one odd record
//! never breaks a whole snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dashboard::aggregate::{percentage, PetitionFacts, PollFacts, Tally};
use crate::model::common::{FeedbackStatus, Lenient, PetitionStatus, PollStatus};

/// Describe how long ago `then` was, relative to `now`.
///
/// Months are 30 days, capped at 11, and years 365. Timestamps in the future
/// read "just now".
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now - then;
    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        return "just now".to_string();
    }
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();
    let (count, unit) = if minutes < 60 {
        (minutes, "minute")
    } else if hours < 24 {
        (hours, "hour")
    } else if days < 30 {
        (days, "day")
    } else if days < 365 {
        ((days / 30).min(11), "month")
    } else {
        (days / 365, "year")
    };
    let plural = if count == 1 { "" } else { "s" };
    format!("{count} {unit}{plural} ago")
}

/// Percentage of the signature goal reached, capped at 100.
/// A goal of zero counts as reached.
pub fn progress(signatures: u32, goal: u32) -> u32 {
    if goal == 0 {
        return 100;
    }
    percentage(signatures, goal).min(100)
}

pub fn signatures_needed(signatures: u32, goal: u32) -> u32 {
    goal.saturating_sub(signatures)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPetition {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub signature_goal: u32,
    #[serde(default)]
    pub signatures_count: u32,
    pub status: Lenient<PetitionStatus>,
    pub creator: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub priority: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PetitionView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub signature_goal: u32,
    pub signatures_count: u32,
    pub status: Lenient<PetitionStatus>,
    pub status_label: String,
    pub creator: String,
    pub verified: bool,
    pub priority: Option<String>,
    pub progress: u32,
    pub signatures_needed: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_ago: String,
}

impl PetitionView {
    pub fn from_raw(raw: RawPetition, now: DateTime<Utc>) -> Self {
        Self {
            status_label: raw.status.label().into_owned(),
            progress: progress(raw.signatures_count, raw.signature_goal),
            signatures_needed: signatures_needed(raw.signatures_count, raw.signature_goal),
            created_ago: relative_time(raw.created_at, now),
            id: raw.id,
            title: raw.title,
            description: raw.description,
            category: raw.category,
            location: raw.location,
            signature_goal: raw.signature_goal,
            signatures_count: raw.signatures_count,
            status: raw.status,
            creator: raw.creator,
            verified: raw.verified,
            priority: raw.priority,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        }
    }
}

impl PetitionFacts for PetitionView {
    type UserId = String;

    fn status(&self) -> Option<PetitionStatus> {
        self.status.known()
    }

    fn creator(&self) -> &String {
        &self.creator
    }

    fn signatures(&self) -> u32 {
        self.signatures_count
    }

    fn goal(&self) -> u32 {
        self.signature_goal
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn verified(&self) -> bool {
        self.verified
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawOption {
    pub text: String,
    #[serde(default)]
    pub votes: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPoll {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub description: String,
    pub options: Vec<RawOption>,
    #[serde(default)]
    pub my_vote: Option<u32>,
    #[serde(default)]
    pub location: String,
    pub expires_at: DateTime<Utc>,
    pub status: Lenient<PollStatus>,
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub text: String,
    pub votes: u32,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollView {
    pub id: String,
    pub question: String,
    pub description: String,
    pub options: Vec<OptionView>,
    /// Always the sum of the option counts.
    pub total_votes: u32,
    pub my_vote: Option<u32>,
    pub location: String,
    pub expires_at: DateTime<Utc>,
    /// Past its expiry, even if the server has not closed it yet.
    pub expired: bool,
    pub status: Lenient<PollStatus>,
    pub status_label: String,
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_ago: String,
}

impl PollView {
    /// Percentages are recomputed from the option counts, so the view is
    /// consistent even if the server's figures were not.
    pub fn from_raw(raw: RawPoll, now: DateTime<Utc>) -> Self {
        let total_votes = raw.options.iter().map(|option| option.votes).sum();
        let options = raw
            .options
            .into_iter()
            .map(|option| OptionView {
                percentage: percentage(option.votes, total_votes),
                text: option.text,
                votes: option.votes,
            })
            .collect();
        Self {
            status_label: raw.status.label().into_owned(),
            expired: raw.expires_at <= now,
            created_ago: relative_time(raw.created_at, now),
            id: raw.id,
            question: raw.question,
            description: raw.description,
            options,
            total_votes,
            my_vote: raw.my_vote,
            location: raw.location,
            expires_at: raw.expires_at,
            status: raw.status,
            creator: raw.creator,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        }
    }

    pub fn tally(&self) -> Tally {
        Tally {
            counts: self.options.iter().map(|option| option.votes).collect(),
            percentages: self.options.iter().map(|option| option.percentage).collect(),
            total: self.total_votes,
        }
    }

    /// Can the viewer still vote (or change their vote)?
    pub fn is_open(&self) -> bool {
        self.status.is(PollStatus::Active) && !self.expired
    }
}

impl PollFacts for PollView {
    type UserId = String;

    fn status(&self) -> Option<PollStatus> {
        self.status.known()
    }

    fn creator(&self) -> &String {
        &self.creator
    }

    /// The server only discloses the viewer's own vote, so this answers for
    /// whoever fetched the poll.
    fn has_voted(&self, _user: &String) -> bool {
        self.my_vote.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFeedback {
    pub id: String,
    pub subject: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub category: String,
    pub status: Lenient<FeedbackStatus>,
    #[serde(default)]
    pub response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackView {
    pub id: String,
    pub subject: String,
    pub message: String,
    pub category: String,
    pub status: Lenient<FeedbackStatus>,
    pub status_label: String,
    pub response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub updated_ago: String,
}

impl FeedbackView {
    pub fn from_raw(raw: RawFeedback, now: DateTime<Utc>) -> Self {
        Self {
            status_label: raw.status.label().into_owned(),
            updated_ago: relative_time(raw.updated_at, now),
            id: raw.id,
            subject: raw.subject,
            message: raw.message,
            category: raw.category,
            status: raw.status,
            response: raw.response,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNotification {
    pub id: String,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub related_petition: Option<String>,
    #[serde(default)]
    pub related_poll: Option<String>,
    #[serde(default)]
    pub official_name: Option<String>,
    #[serde(default)]
    pub read: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: String,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub time_ago: String,
    pub related_petition: Option<String>,
    pub related_poll: Option<String>,
    pub official_name: Option<String>,
    pub read: bool,
}

impl NotificationView {
    pub fn from_raw(raw: RawNotification, now: DateTime<Utc>) -> Self {
        Self {
            time_ago: relative_time(raw.timestamp, now),
            id: raw.id,
            title: raw.title,
            timestamp: raw.timestamp,
            related_petition: raw.related_petition,
            related_poll: raw.related_poll,
            official_name: raw.official_name,
            read: raw.read,
        }
    }
}

/// Only what the activity feed shows; the action details are not needed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOfficialAction {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub official_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficialActionView {
    pub id: String,
    pub title: String,
    pub official_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub time_ago: String,
}

impl OfficialActionView {
    pub fn from_raw(raw: RawOfficialAction, now: DateTime<Utc>) -> Self {
        Self {
            time_ago: relative_time(raw.created_at, now),
            id: raw.id,
            title: raw.title,
            official_name: raw.official_name,
            created_at: raw.created_at,
        }
    }
}

#[cfg(test)]
pub(crate) mod examples {
    use chrono::Duration;
    use serde_json::json;

    use super::*;

    pub fn raw_petition(id: &str, status: &str, signatures: u32, goal: u32) -> RawPetition {
        let created = Utc::now() - Duration::hours(3);
        serde_json::from_value(json!({
            "id": id,
            "title": format!("Petition {id}"),
            "description": "Make the river swimmable again",
            "category": "environment",
            "location": "Riverside",
            "signatureGoal": goal,
            "signaturesCount": signatures,
            "status": status,
            "creator": "u1",
            "createdAt": created,
            "updatedAt": created,
        }))
        .unwrap()
    }

    pub fn raw_poll(id: &str, votes: &[u32], my_vote: Option<u32>) -> RawPoll {
        let options: Vec<_> = votes
            .iter()
            .enumerate()
            .map(|(i, votes)| json!({ "text": format!("Option {i}"), "votes": votes }))
            .collect();
        serde_json::from_value(json!({
            "id": id,
            "question": format!("Question {id}"),
            "options": options,
            "myVote": my_vote,
            "expiresAt": Utc::now() + Duration::days(1),
            "status": "active",
            "creator": "u2",
            "createdAt": Utc::now(),
            "updatedAt": Utc::now(),
        }))
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::examples::*;
    use super::*;

    #[test]
    fn relative_times() {
        let now = Utc::now();
        let cases = [
            (Duration::seconds(30), "just now"),
            (Duration::minutes(1), "1 minute ago"),
            (Duration::minutes(59), "59 minutes ago"),
            (Duration::hours(3), "3 hours ago"),
            (Duration::days(1), "1 day ago"),
            (Duration::days(65), "2 months ago"),
            (Duration::days(362), "11 months ago"),
            (Duration::days(365), "1 year ago"),
            (Duration::days(800), "2 years ago"),
            (Duration::minutes(-10), "just now"),
        ];
        for (ago, expected) in cases {
            assert_eq!(relative_time(now - ago, now), expected);
        }
    }

    #[test]
    fn goal_met_exactly() {
        assert_eq!(progress(100, 100), 100);
        assert_eq!(signatures_needed(100, 100), 0);
        assert_eq!(progress(250, 100), 100);
        assert_eq!(progress(1, 3), 33);
        assert_eq!(progress(5, 0), 100);
        assert_eq!(signatures_needed(40, 100), 60);
    }

    #[test]
    fn petition_statuses_are_relabelled() {
        let view = PetitionView::from_raw(raw_petition("p1", "under_review", 10, 40), Utc::now());
        assert_eq!(view.status_label, "Under Review");
        assert_eq!(view.status.known(), Some(PetitionStatus::UnderReview));
        assert_eq!(view.progress, 25);
        assert_eq!(view.created_ago, "3 hours ago");
    }

    #[test]
    fn renormalising_is_a_no_op() {
        for raw_status in ["active", "Under Review", "closed", "archived"] {
            let view = PetitionView::from_raw(raw_petition("p", raw_status, 0, 1), Utc::now());
            let again = Lenient::<PetitionStatus>::parse(&view.status_label);
            assert_eq!(again.label(), view.status_label);
            if view.status.known().is_some() {
                assert_eq!(again, view.status);
            }
        }
    }

    #[test]
    fn poll_percentages_follow_counts() {
        let view = PollView::from_raw(raw_poll("q1", &[2, 1], Some(0)), Utc::now());
        assert_eq!(view.total_votes, 3);
        let tally = view.tally();
        assert_eq!(tally.counts, vec![2, 1]);
        assert_eq!(tally.percentages, vec![67, 33]);
        assert!(view.is_open());
        assert!(view.has_voted(&"anyone".to_string()));
    }
}
