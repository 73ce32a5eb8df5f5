use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::FeedbackStatus, mongodb::Id};

/// Core feedback data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackCore {
    pub subject: String,
    pub message: String,
    pub category: String,
    pub status: FeedbackStatus,
    /// The submitting user.
    pub user: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responded_by: Option<Id>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Feedback without an ID.
pub type NewFeedback = FeedbackCore;

/// Feedback from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub feedback: FeedbackCore,
}

impl Deref for Feedback {
    type Target = FeedbackCore;

    fn deref(&self) -> &Self::Target {
        &self.feedback
    }
}

impl DerefMut for Feedback {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.feedback
    }
}
