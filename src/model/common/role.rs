use std::fmt::{Display, Formatter};

use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

/// The kind of account a user holds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "citizen")]
    Citizen,
    #[serde(rename = "public-official")]
    PublicOfficial,
}

impl Role {
    /// Officials must state their department and position.
    pub fn requires_office(self) -> bool {
        self == Self::PublicOfficial
    }

    /// Citizens are trusted on sign-up; officials await verification.
    pub fn verified_by_default(self) -> bool {
        self == Self::Citizen
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Citizen => "citizen",
            Self::PublicOfficial => "public-official",
        })
    }
}

impl From<Role> for Bson {
    fn from(role: Role) -> Self {
        Bson::String(role.to_string())
    }
}

/// Dashboard colour scheme preference.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}
