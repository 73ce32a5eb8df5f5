use chrono::Utc;
use log::info;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    options::FindOptions,
};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{AuthToken, Citizen, Official},
        feedback::{FeedbackDesc, FeedbackSpec, FeedbackUpdate},
    },
    common::FeedbackStatus,
    db::feedback::Feedback,
    mongodb::{Coll, Id},
};

pub fn routes() -> Vec<Route> {
    routes![
        submit_feedback,
        all_feedback,
        my_feedback,
        get_feedback,
        update_feedback,
        delete_feedback,
    ]
}

fn newest_first() -> FindOptions {
    FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .build()
}

async fn find_feedback(feedback: &Coll<Feedback>, feedback_id: Id) -> Result<Feedback> {
    feedback
        .find_one(feedback_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Feedback {feedback_id}")))
}

#[post("/feedback", data = "<spec>", format = "json")]
async fn submit_feedback(
    token: AuthToken<Citizen>,
    spec: Json<FeedbackSpec>,
    feedback: Coll<Feedback>,
) -> Result<Json<FeedbackDesc>> {
    let item = spec.into_inner().into_feedback(token.id)?;
    feedback.insert_one(&item, None).await?;
    info!("Feedback {} submitted by {}", item.id, token.id);
    Ok(Json(item.into()))
}

#[get("/feedback?<status>")]
async fn all_feedback(
    _token: AuthToken<Official>,
    status: Option<FeedbackStatus>,
    feedback: Coll<Feedback>,
) -> Result<Json<Vec<FeedbackDesc>>> {
    let filter = status.map(|status| doc! { "status": status });
    let list: Vec<Feedback> = feedback
        .find(filter, newest_first())
        .await?
        .try_collect()
        .await?;
    Ok(Json(list.into_iter().map(Into::into).collect()))
}

#[get("/feedback/my-feedback")]
async fn my_feedback(
    token: AuthToken,
    feedback: Coll<Feedback>,
) -> Result<Json<Vec<FeedbackDesc>>> {
    let list: Vec<Feedback> = feedback
        .find(doc! { "user": token.id }, newest_first())
        .await?
        .try_collect()
        .await?;
    Ok(Json(list.into_iter().map(Into::into).collect()))
}

/// Visible to the submitter and to officials.
#[get("/feedback/<feedback_id>")]
async fn get_feedback(
    token: AuthToken,
    feedback_id: Id,
    feedback: Coll<Feedback>,
) -> Result<Json<FeedbackDesc>> {
    let item = find_feedback(&feedback, feedback_id).await?;
    if item.user != token.id && !token.is_official() {
        return Err(Error::forbidden("This feedback belongs to someone else"));
    }
    Ok(Json(item.into()))
}

#[patch("/feedback/<feedback_id>", data = "<update>", format = "json")]
async fn update_feedback(
    token: AuthToken<Official>,
    feedback_id: Id,
    update: Json<FeedbackUpdate>,
    feedback: Coll<Feedback>,
) -> Result<Json<FeedbackDesc>> {
    let update = update.into_inner();
    if update.is_empty() {
        return Err(Error::bad_request("Nothing to update"));
    }
    let mut set = doc! {
        "updated_at": BsonDateTime::from_chrono(Utc::now()),
    };
    if let Some(status) = update.status {
        set.insert("status", status);
    }
    if let Some(response) = update.response {
        set.insert("response", response.trim());
        set.insert("responded_by", token.id);
    }
    let result = feedback
        .update_one(feedback_id.as_doc(), doc! { "$set": set }, None)
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Feedback {feedback_id}")));
    }
    let item = find_feedback(&feedback, feedback_id).await?;
    Ok(Json(item.into()))
}

/// Only the submitter may withdraw their feedback.
#[delete("/feedback/<feedback_id>")]
async fn delete_feedback(
    token: AuthToken,
    feedback_id: Id,
    feedback: Coll<Feedback>,
) -> Result<Status> {
    let item = find_feedback(&feedback, feedback_id).await?;
    if item.user != token.id {
        return Err(Error::forbidden("This feedback belongs to someone else"));
    }
    feedback.delete_one(feedback_id.as_doc(), None).await?;
    Ok(Status::NoContent)
}
