#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, DatabaseFairing};
use crate::logging::LoggerFairing;
use crate::model::db::poll::PollCloserFairing;

pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod logging;
pub mod model;
pub mod scheduled_task;

/// Prefix under which every endpoint is mounted.
pub const API_BASE: &str = "/api";

/// Assemble the server. Fairings run in attachment order, and the poll
/// closers need the database to be managed already.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount(API_BASE, api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(PollCloserFairing)
}

/// Connect to the database named by `db_uri` in the Rocket config.
#[cfg(test)]
async fn db_client() -> mongodb::Client {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .unwrap();
    mongodb::Client::with_uri_str(db_uri).await.unwrap()
}

/// A fresh database name, so tests never share state.
#[cfg(test)]
fn database() -> String {
    let random: u32 = rand::random();
    format!("test{random}")
}

/// Is a test database configured? Database-backed tests are skipped otherwise.
#[cfg(test)]
fn db_configured() -> bool {
    rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .is_ok()
}

/// The server as [`build`] assembles it, but on the given test database.
#[cfg(test)]
async fn rocket_for_db(client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    let db = client.database(db_name);
    model::mongodb::ensure_indexes_exist(&db).await.unwrap();
    rocket::build()
        .mount(API_BASE, api::routes())
        .register("/", api::catchers())
        .attach(ConfigFairing)
        .manage(client)
        .manage(db)
        .attach(PollCloserFairing)
}
