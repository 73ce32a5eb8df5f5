use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::dashboard::aggregate::PetitionFacts;
use crate::model::{
    common::{PetitionStatus, Priority},
    mongodb::Id,
};

/// Core petition data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetitionCore {
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub signature_goal: u32,
    /// Kept in step with the `signatures` collection by the sign endpoint.
    pub signatures_count: u32,
    pub status: PetitionStatus,
    /// The citizen who started the petition.
    pub creator: Id,
    /// Set by an official once the petition's legitimacy is confirmed.
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl PetitionCore {
    /// Has the signature goal been met? This says nothing about the status.
    pub fn goal_reached(&self) -> bool {
        self.signatures_count >= self.signature_goal
    }
}

impl PetitionFacts for Petition {
    type UserId = Id;

    fn status(&self) -> Option<PetitionStatus> {
        Some(self.status)
    }

    fn creator(&self) -> &Id {
        &self.creator
    }

    fn signatures(&self) -> u32 {
        self.signatures_count
    }

    fn goal(&self) -> u32 {
        self.signature_goal
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn verified(&self) -> bool {
        self.petition.verified
    }
}

/// A petition without an ID.
pub type NewPetition = PetitionCore;

/// A petition from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Petition {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub petition: PetitionCore,
}

impl Deref for Petition {
    type Target = PetitionCore;

    fn deref(&self) -> &Self::Target {
        &self.petition
    }
}

impl DerefMut for Petition {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.petition
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl PetitionCore {
        pub fn example(creator: Id) -> Self {
            let now = Utc::now();
            Self {
                title: "Fix the potholes on Main Street".to_string(),
                description: "The road has become dangerous for cyclists.".to_string(),
                category: "Infrastructure".to_string(),
                location: "Springfield".to_string(),
                signature_goal: 100,
                signatures_count: 0,
                status: PetitionStatus::Active,
                creator,
                verified: false,
                priority: None,
                created_at: now,
                updated_at: now,
            }
        }
    }
}
