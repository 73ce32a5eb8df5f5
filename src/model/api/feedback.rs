use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::id::ApiId,
    common::FeedbackStatus,
    db::feedback::{Feedback, FeedbackCore},
    mongodb::Id,
};

/// Feedback as submitted by a citizen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSpec {
    pub subject: String,
    pub message: String,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    "general".to_string()
}

impl FeedbackSpec {
    pub fn into_feedback(self, user: Id) -> Result<Feedback> {
        if self.subject.trim().is_empty() || self.message.trim().is_empty() {
            return Err(Error::bad_request("Subject and message are required"));
        }
        let now = Utc::now();
        Ok(Feedback {
            id: Id::new(),
            feedback: FeedbackCore {
                subject: self.subject.trim().to_string(),
                message: self.message.trim().to_string(),
                category: self.category.trim().to_string(),
                status: FeedbackStatus::Pending,
                user,
                response: None,
                responded_by: None,
                created_at: now,
                updated_at: now,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackDesc {
    pub id: ApiId,
    pub subject: String,
    pub message: String,
    pub category: String,
    pub status: FeedbackStatus,
    pub user: ApiId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responded_by: Option<ApiId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Feedback> for FeedbackDesc {
    fn from(feedback: Feedback) -> Self {
        let core = feedback.feedback;
        Self {
            id: feedback.id.into(),
            subject: core.subject,
            message: core.message,
            category: core.category,
            status: core.status,
            user: core.user.into(),
            response: core.response,
            responded_by: core.responded_by.map(Into::into),
            created_at: core.created_at,
            updated_at: core.updated_at,
        }
    }
}

/// An official's triage of a feedback item. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackUpdate {
    #[serde(default)]
    pub status: Option<FeedbackStatus>,
    #[serde(default)]
    pub response: Option<String>,
}

impl FeedbackUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.response.is_none()
    }
}
