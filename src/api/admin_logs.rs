use mongodb::{
    bson::{doc, Bson, Document},
    options::FindOptions,
};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        notification::{NotificationDesc, OfficialActionDesc},
    },
    db::{
        admin_log::AdminLog, petition::Petition, poll::Poll, settings::Settings,
        signature::Signature,
    },
    mongodb::{Coll, Id},
};

/// Most notifications returned at once.
const NOTIFICATION_LIMIT: i64 = 50;

pub fn routes() -> Vec<Route> {
    routes![recent_official_actions, notifications, mark_read]
}

fn newest_first(limit: i64) -> FindOptions {
    FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .limit(limit)
        .build()
}

/// Public feed of the latest actions taken by officials.
#[get("/admin-logs/official-actions/recent")]
async fn recent_official_actions(
    logs: Coll<AdminLog>,
    config: &State<Config>,
) -> Result<Json<Vec<OfficialActionDesc>>> {
    let filter = doc! { "official": { "$ne": Bson::Null } };
    let list: Vec<AdminLog> = logs
        .find(filter, newest_first(config.recent_actions_limit()))
        .await?
        .try_collect()
        .await?;
    Ok(Json(list.into_iter().map(Into::into).collect()))
}

/// Build the filter selecting log entries relevant to `user`, honouring
/// their notification preferences. `None` if nothing can match.
async fn relevant_to(
    user: Id,
    settings: &Settings,
    petitions: &Coll<Petition>,
    signatures: &Coll<Signature>,
    polls: &Coll<Poll>,
) -> Result<Option<Document>> {
    let mut clauses = Vec::new();
    if settings.petition_updates {
        let mut petition_ids = petitions
            .distinct("_id", doc! { "creator": user }, None)
            .await?;
        petition_ids.extend(
            signatures
                .distinct("petition", doc! { "user": user }, None)
                .await?,
        );
        if !petition_ids.is_empty() {
            clauses.push(Bson::Document(doc! { "petition": { "$in": petition_ids } }));
        }
    }
    if settings.poll_results {
        let poll_ids = polls.distinct("_id", doc! { "creator": user }, None).await?;
        if !poll_ids.is_empty() {
            clauses.push(Bson::Document(doc! { "poll": { "$in": poll_ids } }));
        }
    }
    Ok((!clauses.is_empty()).then(|| doc! { "$or": clauses }))
}

/// Log entries concerning the caller's petitions, signed petitions, and polls.
#[get("/admin-logs/notifications")]
async fn notifications(
    token: AuthToken,
    logs: Coll<AdminLog>,
    settings: Coll<Settings>,
    petitions: Coll<Petition>,
    signatures: Coll<Signature>,
    polls: Coll<Poll>,
) -> Result<Json<Vec<NotificationDesc>>> {
    let preferences = Settings::load(&settings, token.id).await?;
    let filter = match relevant_to(token.id, &preferences, &petitions, &signatures, &polls).await? {
        Some(filter) => filter,
        None => return Ok(Json(Vec::new())),
    };
    let list: Vec<AdminLog> = logs
        .find(filter, newest_first(NOTIFICATION_LIMIT))
        .await?
        .try_collect()
        .await?;
    Ok(Json(
        list.into_iter()
            .map(|log| NotificationDesc::for_reader(log, token.id))
            .collect(),
    ))
}

#[patch("/admin-logs/notifications/<log_id>/read")]
async fn mark_read(token: AuthToken, log_id: Id, logs: Coll<AdminLog>) -> Result<Status> {
    let result = logs
        .update_one(
            log_id.as_doc(),
            doc! { "$addToSet": { "read_by": token.id } },
            None,
        )
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Notification {log_id}")));
    }
    Ok(Status::NoContent)
}
