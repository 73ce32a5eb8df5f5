use chrono::Utc;
use log::info;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime, Document},
    options::FindOptions,
};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        poll::{PollDesc, PollSpec, VoteRequest},
    },
    common::PollStatus,
    db::{
        admin_log::NewAdminLog,
        poll::{Poll, PollClosers},
    },
    mongodb::{Coll, Id},
};

pub fn routes() -> Vec<Route> {
    routes![list_polls, create_poll, get_poll, update_poll, delete_poll, vote]
}

/// Drafts are only visible to their creators.
fn visible_to(viewer: Option<Id>) -> Document {
    match viewer {
        Some(viewer) => doc! {
            "$or": [
                { "status": { "$ne": PollStatus::Draft } },
                { "creator": viewer },
            ]
        },
        None => doc! { "status": { "$ne": PollStatus::Draft } },
    }
}

/// Get a poll the viewer may see, or a 404.
async fn find_poll(polls: &Coll<Poll>, poll_id: Id, viewer: Option<Id>) -> Result<Poll> {
    let mut filter = visible_to(viewer);
    filter.insert("_id", poll_id);
    polls
        .find_one(filter, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Poll {poll_id}")))
}

/// Get a poll for modification by its creator.
async fn find_own_poll(polls: &Coll<Poll>, poll_id: Id, user: Id) -> Result<Poll> {
    let poll = find_poll(polls, poll_id, Some(user)).await?;
    if poll.creator != user {
        return Err(Error::forbidden("Only the creator can change this poll"));
    }
    Ok(poll)
}

#[get("/polls?<status>&<mine>")]
async fn list_polls(
    token: Option<AuthToken>,
    status: Option<PollStatus>,
    mine: Option<bool>,
    polls: Coll<Poll>,
) -> Result<Json<Vec<PollDesc>>> {
    let viewer = token.map(|token| token.id);
    let mut filter = visible_to(viewer);
    if let Some(status) = status {
        filter = doc! { "$and": [filter, { "status": status }] };
    }
    if mine.unwrap_or(false) {
        let viewer = viewer.ok_or_else(|| Error::unauthorized("Log in to see your own polls"))?;
        filter.insert("creator", viewer);
    }
    let newest_first = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .build();
    let list: Vec<Poll> = polls.find(filter, newest_first).await?.try_collect().await?;
    Ok(Json(
        list.into_iter()
            .map(|poll| PollDesc::for_viewer(poll, viewer))
            .collect(),
    ))
}

#[post("/polls", data = "<spec>", format = "json")]
async fn create_poll(
    token: AuthToken,
    spec: Json<PollSpec>,
    polls: Coll<Poll>,
    new_logs: Coll<NewAdminLog>,
    closers: &State<PollClosers>,
) -> Result<Json<PollDesc>> {
    let poll = Poll {
        id: Id::new(),
        poll: spec.into_inner().into_core(token.id, None)?,
    };
    polls.insert_one(&poll, None).await?;
    closers.schedule_poll(polls, new_logs, &poll).await;
    info!("Poll {} created by {}", poll.id, token.id);
    Ok(Json(PollDesc::for_viewer(poll, Some(token.id))))
}

#[get("/polls/<poll_id>")]
async fn get_poll(
    token: Option<AuthToken>,
    poll_id: Id,
    polls: Coll<Poll>,
) -> Result<Json<PollDesc>> {
    let viewer = token.map(|token| token.id);
    let poll = find_poll(&polls, poll_id, viewer).await?;
    Ok(Json(PollDesc::for_viewer(poll, viewer)))
}

#[put("/polls/<poll_id>", data = "<spec>", format = "json")]
async fn update_poll(
    token: AuthToken,
    poll_id: Id,
    spec: Json<PollSpec>,
    polls: Coll<Poll>,
    new_logs: Coll<NewAdminLog>,
    closers: &State<PollClosers>,
) -> Result<Json<PollDesc>> {
    let existing = find_own_poll(&polls, poll_id, token.id).await?;
    let poll = Poll {
        id: poll_id,
        poll: spec.into_inner().into_core(token.id, Some(&existing))?,
    };
    polls.replace_one(poll_id.as_doc(), &poll, None).await?;
    closers.schedule_poll(polls, new_logs, &poll).await;
    Ok(Json(PollDesc::for_viewer(poll, Some(token.id))))
}

#[delete("/polls/<poll_id>")]
async fn delete_poll(
    token: AuthToken,
    poll_id: Id,
    polls: Coll<Poll>,
    closers: &State<PollClosers>,
) -> Result<Status> {
    find_own_poll(&polls, poll_id, token.id).await?;
    polls.delete_one(poll_id.as_doc(), None).await?;
    closers.cancel_poll(poll_id).await;
    info!("Poll {poll_id} deleted by {}", token.id);
    Ok(Status::NoContent)
}

/// Cast or change the caller's vote.
#[post("/polls/<poll_id>/vote", data = "<request>", format = "json")]
async fn vote(
    token: AuthToken,
    poll_id: Id,
    request: Json<VoteRequest>,
    polls: Coll<Poll>,
) -> Result<Json<PollDesc>> {
    let poll = find_poll(&polls, poll_id, Some(token.id)).await?;
    let now = Utc::now();
    if !poll.accepts_votes(now) {
        return Err(Error::bad_request("This poll is not accepting votes"));
    }
    if usize::try_from(request.option).map_or(true, |option| option >= poll.options.len()) {
        return Err(Error::bad_request(format!(
            "Option {} does not exist",
            request.option
        )));
    }

    let now = BsonDateTime::from_chrono(now);
    let option = i64::from(request.option);

    // Replace an existing vote in place, or append a new one.
    let replace = polls
        .update_one(
            doc! { "_id": poll_id, "votes.user": token.id },
            doc! {
                "$set": {
                    "votes.$.option": option,
                    "votes.$.voted_at": now,
                    "updated_at": now,
                }
            },
            None,
        )
        .await?;
    if replace.matched_count == 0 {
        let append = polls
            .update_one(
                doc! { "_id": poll_id, "votes.user": { "$ne": token.id } },
                doc! {
                    "$push": {
                        "votes": { "user": token.id, "option": option, "voted_at": now },
                    },
                    "$set": { "updated_at": now },
                },
                None,
            )
            .await?;
        if append.matched_count == 0 {
            return Err(Error::Status(
                Status::Conflict,
                "Your vote changed concurrently; please retry".to_string(),
            ));
        }
    }

    let poll = find_poll(&polls, poll_id, Some(token.id)).await?;
    Ok(Json(PollDesc::for_viewer(poll, Some(token.id))))
}
