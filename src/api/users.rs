use rocket::{serde::json::Json, Route};

use crate::error::Result;
use crate::model::{
    api::{auth::AuthToken, user::UserProfile},
    db::user::User,
    mongodb::Coll,
};

pub fn routes() -> Vec<Route> {
    routes![profile]
}

#[get("/users/profile")]
async fn profile(token: AuthToken, users: Coll<User>) -> Result<Json<UserProfile>> {
    let user = token.user(&users).await?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use rocket::{http::Status, local::asynchronous::Client};

    use crate::model::common::Role;

    #[backend_test(official)]
    async fn profile_of_logged_in_user(client: Client) {
        let response = client.get("/api/users/profile").dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let profile: super::UserProfile = response.into_json().await.unwrap();
        assert_eq!(profile.role, Role::PublicOfficial);
        assert_eq!(profile.email, "olu@example.gov");
    }

    #[backend_test]
    async fn profile_requires_login(client: Client) {
        let response = client.get("/api/users/profile").dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }
}
