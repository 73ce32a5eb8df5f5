use log::info;
use mongodb::{bson::doc, options::ReplaceOptions};
use reqwest::Url;
use rocket::{serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{non_empty, AuthToken},
        settings::{AvatarUpdate, PasswordChange, ProfileUpdate, SettingsDesc, SettingsUpdate},
        user::UserProfile,
    },
    common::password::hash_password,
    db::{settings::Settings, user::User},
    mongodb::Coll,
};

pub fn routes() -> Vec<Route> {
    routes![
        get_settings,
        update_settings,
        update_profile,
        change_password,
        set_avatar,
        remove_avatar,
    ]
}

/// Apply a `$set`/`$unset` to the caller's user document and return the result.
async fn update_user(
    users: &Coll<User>,
    token: &AuthToken,
    update: mongodb::bson::Document,
) -> Result<User> {
    users.update_one(token.id.as_doc(), update, None).await?;
    token.user(users).await
}

#[get("/settings")]
async fn get_settings(token: AuthToken, settings: Coll<Settings>) -> Result<Json<SettingsDesc>> {
    let current = Settings::load(&settings, token.id).await?;
    Ok(Json(current.into()))
}

#[put("/settings", data = "<update>", format = "json")]
async fn update_settings(
    token: AuthToken,
    update: Json<SettingsUpdate>,
    settings: Coll<Settings>,
) -> Result<Json<SettingsDesc>> {
    let mut current = Settings::load(&settings, token.id).await?;
    update.into_inner().apply(&mut current);
    let upsert = ReplaceOptions::builder().upsert(true).build();
    settings
        .replace_one(doc! { "user": token.id }, &current, upsert)
        .await?;
    Ok(Json(current.into()))
}

#[put("/settings/profile", data = "<update>", format = "json")]
async fn update_profile(
    token: AuthToken,
    update: Json<ProfileUpdate>,
    users: Coll<User>,
) -> Result<Json<UserProfile>> {
    let update = update.into_inner();
    let mut set = doc! {};
    if let Some(name) = update.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::bad_request("Name cannot be empty"));
        }
        set.insert("name", name);
    }
    if let Some(location) = update.location {
        set.insert("location", location.trim());
    }
    if token.is_official() {
        if let Some(department) = update.department {
            let department = non_empty(Some(department))
                .ok_or_else(|| Error::bad_request("Department cannot be empty"))?;
            set.insert("department", department);
        }
        if let Some(position) = update.position {
            let position = non_empty(Some(position))
                .ok_or_else(|| Error::bad_request("Position cannot be empty"))?;
            set.insert("position", position);
        }
    }
    if set.is_empty() {
        return Ok(Json(token.user(&users).await?.into()));
    }
    let user = update_user(&users, &token, doc! { "$set": set }).await?;
    Ok(Json(user.into()))
}

#[put("/settings/password", data = "<change>", format = "json")]
async fn change_password(
    token: AuthToken,
    change: Json<PasswordChange>,
    users: Coll<User>,
) -> Result<Json<UserProfile>> {
    let user = token.user(&users).await?;
    if !user.verify_password(&change.current_password) {
        return Err(Error::bad_request("Current password is incorrect"));
    }
    let password_hash = hash_password(&change.new_password)?;
    let user = update_user(
        &users,
        &token,
        doc! { "$set": { "password_hash": password_hash } },
    )
    .await?;
    info!("User {} changed their password", user.id);
    Ok(Json(user.into()))
}

/// Avatars are stored elsewhere; only an absolute http(s) URL is recorded.
#[put("/settings/avatar", data = "<avatar>", format = "json")]
async fn set_avatar(
    token: AuthToken,
    avatar: Json<AvatarUpdate>,
    users: Coll<User>,
) -> Result<Json<UserProfile>> {
    let url = Url::parse(avatar.url.trim())
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .ok_or_else(|| Error::bad_request("Avatar must be an http(s) URL"))?;
    let user = update_user(
        &users,
        &token,
        doc! { "$set": { "avatar": url.as_str() } },
    )
    .await?;
    Ok(Json(user.into()))
}

#[delete("/settings/avatar")]
async fn remove_avatar(token: AuthToken, users: Coll<User>) -> Result<Json<UserProfile>> {
    let user = update_user(&users, &token, doc! { "$unset": { "avatar": "" } }).await?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json::json,
    };

    use crate::model::{
        api::auth::Credentials,
        common::{Role, Theme},
    };

    use super::*;

    #[backend_test(citizen)]
    async fn defaults_then_update(client: Client, settings: Coll<Settings>) {
        let response = client.get("/api/settings").dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let defaults: SettingsDesc = response.into_json().await.unwrap();
        assert_eq!(defaults.theme, Theme::System);
        assert!(defaults.petition_updates);

        let response = client
            .put("/api/settings")
            .header(ContentType::JSON)
            .body(json!({ "theme": "dark", "petitionUpdates": false }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let stored = settings.find_one(None, None).await.unwrap().unwrap();
        assert_eq!(stored.theme, Theme::Dark);
        assert!(!stored.petition_updates);
        assert!(stored.poll_results);
    }

    #[backend_test(citizen)]
    async fn citizens_cannot_set_department(client: Client) {
        let response = client
            .put("/api/settings/profile")
            .header(ContentType::JSON)
            .body(json!({ "name": "Ada L.", "department": "Treasury" }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let profile: UserProfile = response.into_json().await.unwrap();
        assert_eq!(profile.name, "Ada L.");
        assert_eq!(profile.role, Role::Citizen);
        assert_eq!(profile.department, None);

        let response = client
            .put("/api/settings/profile")
            .header(ContentType::JSON)
            .body(json!({ "name": "  " }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
    }

    #[backend_test(official)]
    async fn officials_keep_department_and_position(client: Client, users: Coll<User>) {
        for body in [json!({ "department": "   " }), json!({ "position": "" })] {
            let response = client
                .put("/api/settings/profile")
                .header(ContentType::JSON)
                .body(body.to_string())
                .dispatch()
                .await;
            assert_eq!(Status::BadRequest, response.status());
        }
        let stored = users.find_one(None, None).await.unwrap().unwrap();
        assert_eq!(stored.department.as_deref(), Some("Public Works"));
        assert_eq!(stored.position.as_deref(), Some("Director"));

        let response = client
            .put("/api/settings/profile")
            .header(ContentType::JSON)
            .body(json!({ "department": " Water Board " }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let profile: UserProfile = response.into_json().await.unwrap();
        assert_eq!(profile.department.as_deref(), Some("Water Board"));
    }

    #[backend_test(citizen)]
    async fn password_change_requires_current(client: Client) {
        let current = Credentials::citizen_example().password;
        let response = client
            .put("/api/settings/password")
            .header(ContentType::JSON)
            .body(
                json!({ "currentPassword": "wrong password", "newPassword": "a new password" })
                    .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        let response = client
            .put("/api/settings/password")
            .header(ContentType::JSON)
            .body(
                json!({ "currentPassword": current, "newPassword": "a new password" })
                    .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let mut credentials = Credentials::citizen_example();
        credentials.password = "a new password".to_string();
        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(json!(credentials).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
    }

    #[backend_test(citizen)]
    async fn avatar_set_and_removed(client: Client) {
        let response = client
            .put("/api/settings/avatar")
            .header(ContentType::JSON)
            .body(json!({ "url": "ftp://example.org/me.png" }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        let response = client
            .put("/api/settings/avatar")
            .header(ContentType::JSON)
            .body(json!({ "url": "https://example.org/me.png" }).to_string())
            .dispatch()
            .await;
        let profile: UserProfile = response.into_json().await.unwrap();
        assert_eq!(profile.avatar.as_deref(), Some("https://example.org/me.png"));

        let response = client.delete("/api/settings/avatar").dispatch().await;
        let profile: UserProfile = response.into_json().await.unwrap();
        assert_eq!(profile.avatar, None);
    }
}
