use chrono::Utc;
use log::info;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
};
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        analytics::PetitionAnalytics,
        auth::{AuthToken, Citizen, Official},
        petition::{
            PetitionDesc, PetitionFilter, PetitionSpec, ResponseDesc, ResponseSpec, StatusUpdate,
            VerifyRequest,
        },
    },
    common::PetitionStatus,
    db::{
        admin_log::{AdminLogCore, NewAdminLog, OfficialAction},
        petition::Petition,
        response::{PetitionResponse, PetitionResponseCore},
        signature::{Signature, SignatureCore},
        user::User,
    },
    mongodb::{is_duplicate_key_error, Coll, Id},
};

pub fn routes() -> Vec<Route> {
    routes![
        list_petitions,
        create_petition,
        get_petition,
        sign_petition,
        analytics,
        review_list,
        update_status,
        verify_petition,
        respond_to_petition,
        list_responses,
    ]
}

/// Get a petition or a 404.
async fn find_petition(petitions: &Coll<Petition>, petition_id: Id) -> Result<Petition> {
    petitions
        .find_one(petition_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Petition {petition_id}")))
}

/// Apply an update to a petition and return the result.
async fn update_petition(
    petitions: &Coll<Petition>,
    petition_id: Id,
    update: mongodb::bson::Document,
) -> Result<Petition> {
    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    petitions
        .find_one_and_update(petition_id.as_doc(), update, options)
        .await?
        .ok_or_else(|| Error::not_found(format!("Petition {petition_id}")))
}

#[get("/petitions?<filter..>")]
async fn list_petitions(
    token: Option<AuthToken>,
    filter: PetitionFilter,
    petitions: Coll<Petition>,
) -> Result<Json<Vec<PetitionDesc>>> {
    if filter.wants_mine() && token.is_none() {
        return Err(Error::unauthorized("Log in to see your own petitions"));
    }
    let query = filter.to_doc(token.map(|token| token.id));
    let newest_first = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .build();
    let list: Vec<Petition> = petitions
        .find(query, newest_first)
        .await?
        .try_collect()
        .await?;
    Ok(Json(list.into_iter().map(Into::into).collect()))
}

#[post("/petitions", data = "<spec>", format = "json")]
async fn create_petition(
    token: AuthToken<Citizen>,
    spec: Json<PetitionSpec>,
    petitions: Coll<Petition>,
) -> Result<Json<PetitionDesc>> {
    let petition = spec.into_inner().into_petition(token.id)?;
    petitions.insert_one(&petition, None).await?;
    info!("Petition {} created by {}", petition.id, token.id);
    Ok(Json(petition.into()))
}

#[get("/petitions/<petition_id>")]
async fn get_petition(petition_id: Id, petitions: Coll<Petition>) -> Result<Json<PetitionDesc>> {
    let petition = find_petition(&petitions, petition_id).await?;
    Ok(Json(petition.into()))
}

#[post("/petitions/<petition_id>/sign")]
async fn sign_petition(
    token: AuthToken<Citizen>,
    petition_id: Id,
    petitions: Coll<Petition>,
    signatures: Coll<Signature>,
) -> Result<Json<PetitionDesc>> {
    let petition = find_petition(&petitions, petition_id).await?;
    if petition.status != PetitionStatus::Active {
        return Err(Error::bad_request("Only active petitions can be signed"));
    }

    // The unique (petition, user) index makes this the single point of truth.
    let signature = Signature {
        id: Id::new(),
        signature: SignatureCore::new(petition_id, token.id),
    };
    match signatures.insert_one(&signature, None).await {
        Ok(_) => {}
        Err(e) if is_duplicate_key_error(&e) => {
            return Err(Error::bad_request("You have already signed this petition"));
        }
        Err(e) => return Err(e.into()),
    }

    let update = doc! {
        "$inc": { "signatures_count": 1 },
        "$set": { "updated_at": BsonDateTime::from_chrono(Utc::now()) },
    };
    let petition = update_petition(&petitions, petition_id, update).await?;
    Ok(Json(petition.into()))
}

#[get("/petitions/analytics")]
async fn analytics(
    _token: AuthToken<Official>,
    petitions: Coll<Petition>,
) -> Result<Json<PetitionAnalytics>> {
    let all: Vec<Petition> = petitions.find(None, None).await?.try_collect().await?;
    Ok(Json(PetitionAnalytics::from_petitions(&all)))
}

/// Petitions awaiting an official's attention, oldest first.
#[get("/petitions/review/list")]
async fn review_list(
    _token: AuthToken<Official>,
    petitions: Coll<Petition>,
) -> Result<Json<Vec<PetitionDesc>>> {
    let filter = doc! {
        "status": { "$in": [PetitionStatus::Active, PetitionStatus::UnderReview] },
    };
    let oldest_first = FindOptions::builder()
        .sort(doc! { "created_at": 1 })
        .build();
    let list: Vec<Petition> = petitions
        .find(filter, oldest_first)
        .await?
        .try_collect()
        .await?;
    Ok(Json(list.into_iter().map(Into::into).collect()))
}

#[patch("/petitions/<petition_id>/status", data = "<update>", format = "json")]
async fn update_status(
    token: AuthToken<Official>,
    petition_id: Id,
    update: Json<StatusUpdate>,
    petitions: Coll<Petition>,
    users: Coll<User>,
    new_logs: Coll<NewAdminLog>,
) -> Result<Json<PetitionDesc>> {
    let official = token.user(&users).await?;
    let before = find_petition(&petitions, petition_id).await?;

    let mut set = doc! {
        "status": update.status,
        "updated_at": BsonDateTime::from_chrono(Utc::now()),
    };
    if let Some(priority) = update.priority {
        set.insert("priority", priority);
    }
    let after = update_petition(&petitions, petition_id, doc! { "$set": set }).await?;

    if before.status != after.status {
        let action = OfficialAction::StatusChange {
            from: before.status,
            to: after.status,
        };
        new_logs
            .insert_one(AdminLogCore::petition_action(&official, &after, action), None)
            .await?;
        info!(
            "Official {} moved petition {petition_id} from {} to {}",
            official.id, before.status, after.status
        );
    }
    Ok(Json(after.into()))
}

#[patch("/petitions/<petition_id>/verify", data = "<request>", format = "json")]
async fn verify_petition(
    token: AuthToken<Official>,
    petition_id: Id,
    request: Json<VerifyRequest>,
    petitions: Coll<Petition>,
    users: Coll<User>,
    new_logs: Coll<NewAdminLog>,
) -> Result<Json<PetitionDesc>> {
    let official = token.user(&users).await?;
    let update = doc! {
        "$set": {
            "verified": request.verified,
            "updated_at": BsonDateTime::from_chrono(Utc::now()),
        }
    };
    let petition = update_petition(&petitions, petition_id, update).await?;

    let action = OfficialAction::Verification {
        verified: request.verified,
    };
    new_logs
        .insert_one(AdminLogCore::petition_action(&official, &petition, action), None)
        .await?;
    Ok(Json(petition.into()))
}

#[post("/petitions/<petition_id>/response", data = "<spec>", format = "json")]
async fn respond_to_petition(
    token: AuthToken<Official>,
    petition_id: Id,
    spec: Json<ResponseSpec>,
    petitions: Coll<Petition>,
    users: Coll<User>,
    responses: Coll<PetitionResponse>,
    new_logs: Coll<NewAdminLog>,
) -> Result<Json<ResponseDesc>> {
    let message = spec.message.trim();
    if message.is_empty() {
        return Err(Error::bad_request("Response message is required"));
    }
    let official = token.user(&users).await?;
    let petition = find_petition(&petitions, petition_id).await?;

    let response = PetitionResponse {
        id: Id::new(),
        response: PetitionResponseCore {
            petition: petition_id,
            official: official.id,
            official_name: official.name.clone(),
            message: message.to_string(),
            created_at: Utc::now(),
        },
    };
    responses.insert_one(&response, None).await?;
    new_logs
        .insert_one(
            AdminLogCore::petition_action(&official, &petition, OfficialAction::Response),
            None,
        )
        .await?;
    Ok(Json(response.into()))
}

#[get("/petitions/<petition_id>/responses")]
async fn list_responses(
    petition_id: Id,
    petitions: Coll<Petition>,
    responses: Coll<PetitionResponse>,
) -> Result<Json<Vec<ResponseDesc>>> {
    find_petition(&petitions, petition_id).await?;
    let oldest_first = FindOptions::builder()
        .sort(doc! { "created_at": 1 })
        .build();
    let list: Vec<PetitionResponse> = responses
        .find(doc! { "petition": petition_id }, oldest_first)
        .await?
        .try_collect()
        .await?;
    Ok(Json(list.into_iter().map(Into::into).collect()))
}
