use log::info;
use mongodb::bson::doc;
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::auth::{
        auth_cookie, normalize_email, AnyUser, AuthToken, Credentials, Registration, Session,
        AUTH_TOKEN_COOKIE,
    },
    db::user::{NewUser, User},
    mongodb::{is_duplicate_key_error, Coll, Id},
};

pub fn routes() -> Vec<Route> {
    routes![register, login, logout]
}

/// Issue a token for the user, both as a cookie and in the response body.
fn start_session(user: User, cookies: &CookieJar<'_>, config: &Config) -> Result<Session> {
    let token = AuthToken::<AnyUser>::for_user(&user).encode(config)?;
    cookies.add(auth_cookie(token.clone(), config));
    Ok(Session {
        user: user.into(),
        token,
    })
}

#[post("/auth/register", data = "<registration>", format = "json")]
async fn register(
    registration: Json<Registration>,
    cookies: &CookieJar<'_>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Json<Session>> {
    let user = User {
        id: Id::new(),
        user: NewUser::try_from(registration.into_inner())?,
    };
    match users.insert_one(&user, None).await {
        Ok(_) => {}
        Err(e) if is_duplicate_key_error(&e) => {
            return Err(Error::bad_request("Email address already registered"));
        }
        Err(e) => return Err(e.into()),
    }
    info!("Registered new {} account {}", user.role, user.id);

    Ok(Json(start_session(user, cookies, config)?))
}

#[post("/auth/login", data = "<credentials>", format = "json")]
async fn login(
    credentials: Json<Credentials>,
    cookies: &CookieJar<'_>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Json<Session>> {
    let with_email = doc! {
        "email": normalize_email(&credentials.email),
    };

    let user = users
        .find_one(with_email, None)
        .await?
        .filter(|user| user.verify_password(&credentials.password))
        .ok_or_else(|| Error::unauthorized("Invalid email or password"))?;

    Ok(Json(start_session(user, cookies, config)?))
}

#[delete("/auth/logout")]
fn logout(cookies: &CookieJar<'_>) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Header},
        local::asynchronous::Client,
        serde::json::serde_json::json,
    };

    use crate::model::db::user::UserCore;

    use super::*;

    #[backend_test]
    async fn register_logs_in(client: Client, users: Coll<User>) {
        let response = client
            .post("/api/auth/register")
            .header(ContentType::JSON)
            .body(json!(Registration::citizen_example()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
        let session: Session = response.into_json().await.unwrap();
        assert_eq!(session.user.email, "ada@example.org");
        assert!(session.user.verified);

        let stored = users
            .find_one(doc! { "email": "ada@example.org" }, None)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(stored.password_hash, Registration::citizen_example().password);
    }

    #[backend_test]
    async fn duplicate_email_is_rejected(client: Client) {
        for expected in [Status::Ok, Status::BadRequest] {
            let response = client
                .post("/api/auth/register")
                .header(ContentType::JSON)
                .body(json!(Registration::citizen_example()).to_string())
                .dispatch()
                .await;
            assert_eq!(expected, response.status());
        }
    }

    #[backend_test]
    async fn login_valid_and_invalid(client: Client, users: Coll<User>) {
        users
            .insert_one(
                User {
                    id: Id::new(),
                    user: UserCore::official_example(),
                },
                None,
            )
            .await
            .unwrap();

        let mut wrong = Credentials::official_example();
        wrong.password = "not the password".to_string();
        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(json!(wrong).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));

        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(json!(Credentials::official_example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let session: Session = response.into_json().await.unwrap();
        assert_eq!(session.user.department.as_deref(), Some("Public Works"));

        // The returned token also works as a bearer token, without cookies.
        client.delete("/api/auth/logout").dispatch().await;
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
        let response = client
            .get("/api/users/profile")
            .header(Header::new("Authorization", format!("Bearer {}", session.token)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
    }

    #[backend_test(citizen)]
    async fn logout_clears_cookie(client: Client) {
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
        let response = client.delete("/api/auth/logout").dispatch().await;

        assert_eq!(Status::Ok, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }
}
