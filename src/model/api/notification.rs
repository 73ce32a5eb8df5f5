use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    db::admin_log::{AdminLog, OfficialAction},
    mongodb::Id,
};

/// An admin log entry as seen by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDesc {
    pub id: ApiId,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_petition: Option<ApiId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_poll: Option<ApiId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub official_name: Option<String>,
    pub read: bool,
}

impl NotificationDesc {
    pub fn for_reader(log: AdminLog, reader: Id) -> Self {
        let read = log.read_by.contains(&reader);
        let core = log.log;
        Self {
            id: log.id.into(),
            title: core.title,
            timestamp: core.created_at,
            related_petition: core.petition.map(Into::into),
            related_poll: core.poll.map(Into::into),
            official_name: core.official_name,
            read,
        }
    }
}

/// An entry of the public feed of recent official actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficialActionDesc {
    pub id: ApiId,
    pub action: OfficialAction,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub official_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub petition: Option<ApiId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<ApiId>,
    pub created_at: DateTime<Utc>,
}

impl From<AdminLog> for OfficialActionDesc {
    fn from(log: AdminLog) -> Self {
        let core = log.log;
        Self {
            id: log.id.into(),
            action: core.action,
            title: core.title,
            official_name: core.official_name,
            petition: core.petition.map(Into::into),
            poll: core.poll.map(Into::into),
            created_at: core.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::db::{admin_log::AdminLogCore, poll::PollCore};
    use crate::model::db::poll::Poll;

    use super::*;

    #[test]
    fn read_flag_is_per_reader() {
        let poll = Poll {
            id: Id::new(),
            poll: PollCore::example(Id::new()),
        };
        let reader = Id::new();
        let mut core = AdminLogCore::poll_closed(&poll);
        core.read_by.push(reader);
        let log = AdminLog {
            id: Id::new(),
            log: core,
        };

        let mine = NotificationDesc::for_reader(log.clone(), reader);
        assert!(mine.read);
        assert_eq!(mine.related_poll, Some(poll.id.into()));
        assert!(!NotificationDesc::for_reader(log, Id::new()).read);
    }
}
