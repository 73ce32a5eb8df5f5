use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use log::debug;
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    time::Duration,
    Request,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    db::user::User,
    mongodb::{Coll, Id},
};

use super::user::{AnyUser, Audience, Rights};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

const BEARER_PREFIX: &str = "Bearer ";

/// An authentication token representing a specific user with specific rights.
/// As a request guard, it only succeeds for users in the audience `U`.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<U = AnyUser> {
    pub id: Id,
    #[serde(rename = "rgt")]
    pub rights: Rights,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    /// Create a new [`AuthToken`] for the given user, with the rights of their role.
    pub fn for_user(user: &User) -> Self {
        Self {
            id: user.id,
            rights: user.role.into(),
            phantom: PhantomData,
        }
    }

    pub fn is_official(&self) -> bool {
        self.rights == Rights::Official
    }

    /// Sign this token as a JWT that expires after the configured TTL.
    pub fn encode(self, config: &Config) -> Result<String> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;
        Ok(token)
    }

    /// Decode and validate a JWT.
    pub fn decode(token: &str, config: &Config) -> Result<Self> {
        let token = jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<U>>| claims.claims.token)?;
        Ok(token)
    }

    /// Look up the user this token belongs to.
    pub async fn user(&self, users: &Coll<User>) -> Result<User> {
        users
            .find_one(self.id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::unauthorized("User no longer exists"))
    }
}

/// Wrap an encoded token in the auth cookie.
pub fn auth_cookie(token: String, config: &Config) -> Cookie<'static> {
    Cookie::build(AUTH_TOKEN_COOKIE, token)
        .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/")
        .finish()
}

/// Token claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<U> {
    #[serde(flatten, bound = "")]
    token: AuthToken<U>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

/// Find the raw token, preferring the cookie over an `Authorization: Bearer` header.
fn raw_token(req: &Request<'_>) -> Option<String> {
    if let Some(cookie) = req.cookies().get(AUTH_TOKEN_COOKIE) {
        return Some(cookie.value().to_string());
    }
    req.headers()
        .get_one("Authorization")
        .and_then(|header| header.strip_prefix(BEARER_PREFIX))
        .map(|token| token.trim().to_string())
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: Audience + Send,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the request and verify that it has the rights
    /// required by `U` and that its user still exists.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(raw) = raw_token(req) else {
            return Outcome::Failure((
                Status::Unauthorized,
                Error::unauthorized("Authentication required"),
            ));
        };

        let (Some(config), Some(db)) = (
            req.rocket().state::<Config>(),
            req.rocket().state::<mongodb::Database>(),
        ) else {
            return Outcome::Failure((
                Status::InternalServerError,
                Error::Status(Status::InternalServerError, "Server not configured".to_string()),
            ));
        };

        let token: Self = match Self::decode(&raw, config) {
            Ok(token) => token,
            Err(e) => {
                debug!("Rejected auth token: {e}");
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::unauthorized("Invalid token"),
                ));
            }
        };

        if !U::admits(token.rights) {
            return Outcome::Failure((
                Status::Forbidden,
                Error::forbidden(format!("Not permitted for {} accounts", token.rights)),
            ));
        }

        match Coll::<User>::from_db(db)
            .find_one(token.id.as_doc(), None)
            .await
        {
            Ok(Some(_)) => Outcome::Success(token),
            Ok(None) => Outcome::Failure((
                Status::Unauthorized,
                Error::unauthorized("User no longer exists"),
            )),
            Err(e) => Outcome::Failure((Status::InternalServerError, e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::db::user::UserCore;

    use super::super::user::{Citizen, Official};
    use super::*;

    fn official() -> User {
        User {
            id: Id::new(),
            user: UserCore::official_example(),
        }
    }

    #[test]
    fn tokens_round_trip_through_jwt() {
        let config = Config::example();
        let user = official();
        let encoded = AuthToken::<AnyUser>::for_user(&user).encode(&config).unwrap();
        let decoded = AuthToken::<Official>::decode(&encoded, &config).unwrap();
        assert_eq!(decoded.id, user.id);
        assert_eq!(decoded.rights, Rights::Official);
        assert!(decoded.is_official());
    }

    #[test]
    fn tokens_signed_with_other_secrets_are_rejected() {
        let user = official();
        let encoded = AuthToken::<Citizen>::for_user(&user)
            .encode(&Config::example())
            .unwrap();
        let other = Config::example_with_secret("another secret entirely");
        assert!(AuthToken::<AnyUser>::decode(&encoded, &other).is_err());
    }
}
