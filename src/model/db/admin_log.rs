use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{PetitionStatus, StatusEnum},
    db::{petition::Petition, poll::Poll, user::User},
    mongodb::Id,
};

/// What an official (or the system, for poll expiry) did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OfficialAction {
    StatusChange {
        from: PetitionStatus,
        to: PetitionStatus,
    },
    Verification {
        verified: bool,
    },
    Response,
    PollClosed,
}

/// An audit-log entry, surfaced to citizens as notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminLogCore {
    pub action: OfficialAction,
    /// `None` for actions taken by the system itself.
    #[serde(default)]
    pub official: Option<Id>,
    #[serde(default)]
    pub official_name: Option<String>,
    /// Human-readable summary.
    pub title: String,
    #[serde(default)]
    pub petition: Option<Id>,
    #[serde(default)]
    pub poll: Option<Id>,
    /// Users who have marked this entry as read.
    #[serde(default)]
    pub read_by: Vec<Id>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl AdminLogCore {
    /// Record an official's action on a petition.
    pub fn petition_action(official: &User, petition: &Petition, action: OfficialAction) -> Self {
        let title = match &action {
            OfficialAction::StatusChange { to, .. } => {
                format!("Petition \"{}\" moved to {}", petition.title, to.label())
            }
            OfficialAction::Verification { verified: true } => {
                format!("Petition \"{}\" was verified", petition.title)
            }
            OfficialAction::Verification { verified: false } => {
                format!("Petition \"{}\" was marked unverified", petition.title)
            }
            OfficialAction::Response | OfficialAction::PollClosed => {
                format!("An official responded to \"{}\"", petition.title)
            }
        };
        Self {
            action,
            official: Some(official.id),
            official_name: Some(official.name.clone()),
            title,
            petition: Some(petition.id),
            poll: None,
            read_by: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Record that a poll closed on expiry.
    pub fn poll_closed(poll: &Poll) -> Self {
        Self {
            action: OfficialAction::PollClosed,
            official: None,
            official_name: None,
            title: format!("Poll \"{}\" has closed", poll.question),
            petition: None,
            poll: Some(poll.id),
            read_by: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// A log entry without an ID.
pub type NewAdminLog = AdminLogCore;

/// A log entry from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminLog {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub log: AdminLogCore,
}

impl Deref for AdminLog {
    type Target = AdminLogCore;

    fn deref(&self) -> &Self::Target {
        &self.log
    }
}
