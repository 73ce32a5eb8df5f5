use mongodb::{bson::doc, options::FindOptions};
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::{auth::AuthToken, petition::SignatureDesc},
    db::signature::Signature,
    mongodb::{Coll, Id},
};

pub fn routes() -> Vec<Route> {
    routes![user_signatures]
}

/// Every signature a user has made. Officials may look up anyone.
#[get("/signatures/user/<user_id>")]
async fn user_signatures(
    token: AuthToken,
    user_id: Id,
    signatures: Coll<Signature>,
) -> Result<Json<Vec<SignatureDesc>>> {
    if user_id != token.id && !token.is_official() {
        return Err(Error::forbidden("You can only see your own signatures"));
    }
    let newest_first = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .build();
    let list: Vec<Signature> = signatures
        .find(doc! { "user": user_id }, newest_first)
        .await?
        .try_collect()
        .await?;
    Ok(Json(list.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use rocket::{http::Status, local::asynchronous::Client};

    use crate::model::db::{
        signature::{NewSignature, SignatureCore},
        user::User,
    };

    use super::*;

    #[backend_test(citizen)]
    async fn own_signatures_only(
        client: Client,
        users: Coll<User>,
        signatures: Coll<NewSignature>,
    ) {
        let me = users.find_one(None, None).await.unwrap().unwrap();
        signatures
            .insert_one(SignatureCore::new(Id::new(), me.id), None)
            .await
            .unwrap();

        let response = client
            .get(format!("/api/signatures/user/{}", me.id))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let list: Vec<SignatureDesc> = response.into_json().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].user, me.id.into());

        let response = client
            .get(format!("/api/signatures/user/{}", Id::new()))
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());
    }

    #[backend_test(official)]
    async fn officials_see_anyone(client: Client) {
        let response = client
            .get(format!("/api/signatures/user/{}", Id::new()))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
    }
}
