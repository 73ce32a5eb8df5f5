use std::fmt::Display;

use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::model::common::Role;

/// A class of users that an endpoint admits.
pub trait Audience {
    /// Does a token with the given rights belong to this audience?
    fn admits(rights: Rights) -> bool;
}

/// Citizens only.
pub struct Citizen;

/// Public officials only.
pub struct Official;

/// Any logged-in user.
pub struct AnyUser;

impl Audience for Citizen {
    fn admits(rights: Rights) -> bool {
        rights == Rights::Citizen
    }
}

impl Audience for Official {
    fn admits(rights: Rights) -> bool {
        rights == Rights::Official
    }
}

impl Audience for AnyUser {
    fn admits(_rights: Rights) -> bool {
        true
    }
}

/// Different privilege levels.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Citizen = 0,
    Official = 1,
}

impl From<Role> for Rights {
    fn from(role: Role) -> Self {
        match role {
            Role::Citizen => Self::Citizen,
            Role::PublicOfficial => Self::Official,
        }
    }
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Citizen => "citizen",
                Self::Official => "official",
            }
        )
    }
}
