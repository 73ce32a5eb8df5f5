use chrono::Duration;
use log::{error, info};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::mongodb::ensure_indexes_exist;

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    #[serde(default = "default_recent_actions_limit")]
    recent_actions_limit: u32,
    // secrets
    jwt_secret: String,
}

fn default_recent_actions_limit() -> u32 {
    10
}

impl Config {
    /// Valid lifetime of auth tokens in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// How many entries the recent official actions feed returns.
    pub fn recent_actions_limit(&self) -> i64 {
        self.recent_actions_limit.into()
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
pub(crate) struct DbConfig {
    // secrets
    pub(crate) db_uri: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// ensures indexes exist, and places both a `Client` and a `Database`
/// into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(DATABASE_NAME);

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to set up database indexes: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Name of the production database.
pub const DATABASE_NAME: &str = "civix";

#[cfg(test)]
mod examples {
    use super::*;

    impl Config {
        pub fn example() -> Self {
            Self::example_with_secret("a test secret that is long enough")
        }

        pub fn example_with_secret(secret: &str) -> Self {
            Self {
                auth_ttl: 3600,
                recent_actions_limit: default_recent_actions_limit(),
                jwt_secret: secret.to_string(),
            }
        }
    }
}
