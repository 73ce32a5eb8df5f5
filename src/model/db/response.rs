use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// An official's public response to a petition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetitionResponseCore {
    pub petition: Id,
    pub official: Id,
    /// Denormalised so responses render without a user lookup.
    pub official_name: String,
    pub message: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// A petition response without an ID.
pub type NewPetitionResponse = PetitionResponseCore;

/// A petition response from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PetitionResponse {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub response: PetitionResponseCore,
}

impl Deref for PetitionResponse {
    type Target = PetitionResponseCore;

    fn deref(&self) -> &Self::Target {
        &self.response
    }
}
