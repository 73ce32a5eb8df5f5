//! Closed status enums shared by the server and the dashboard core.
//!
//! Every status has exactly one wire name (snake_case) and one display label
//! (Title Case). Parsing is forgiving about casing and separators so that
//! legacy variants such as `"Active"` or `"under-review"` land on the same
//! value.

use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use mongodb::bson::Bson;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A closed set of status values with canonical wire names and labels.
pub trait StatusEnum: Copy + Eq + Sized + 'static {
    /// Every value, in lifecycle order.
    const ALL: &'static [Self];

    /// Canonical snake_case name used on the wire and in the database.
    fn wire_name(self) -> &'static str;

    /// Title Case label shown to users.
    fn label(self) -> &'static str;

    /// Parse any casing/separator variant of the wire name or label.
    fn parse_any(raw: &str) -> Option<Self> {
        let wanted = canonicalize(raw);
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.wire_name() == wanted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unrecognised status '{0}'")]
pub struct UnknownStatus(pub String);

/// Lower-case, trim, and fold `-` and spaces into `_`.
fn canonicalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

macro_rules! status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $wire:literal, $label:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl StatusEnum for $name {
            const ALL: &'static [Self] = &[$(Self::$variant),+];

            fn wire_name(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }

            fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.wire_name())
            }
        }

        impl FromStr for $name {
            type Err = UnknownStatus;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse_any(s).ok_or_else(|| UnknownStatus(s.to_string()))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.wire_name())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }

        impl From<$name> for Bson {
            fn from(status: $name) -> Self {
                Bson::String(status.wire_name().to_string())
            }
        }

        impl<'v> rocket::form::FromFormField<'v> for $name {
            fn from_value(field: rocket::form::ValueField<'v>) -> rocket::form::Result<'v, Self> {
                field.value.parse().map_err(|err: UnknownStatus| {
                    rocket::form::prelude::ErrorKind::Custom(Box::new(err)).into()
                })
            }
        }
    };
}

status_enum! {
    /// Lifecycle of a petition.
    PetitionStatus {
        /// Collecting signatures.
        Active => "active", "Active";
        /// Picked up by an official.
        UnderReview => "under_review", "Under Review";
        Closed => "closed", "Closed";
    }
}

status_enum! {
    /// Lifecycle of a poll.
    PollStatus {
        /// Only visible to its creator.
        Draft => "draft", "Draft";
        /// Accepting votes until it expires.
        Active => "active", "Active";
        Closed => "closed", "Closed";
    }
}

status_enum! {
    /// Lifecycle of a feedback submission.
    FeedbackStatus {
        Pending => "pending", "Pending";
        Reviewing => "reviewing", "Reviewing";
        Resolved => "resolved", "Resolved";
        Closed => "closed", "Closed";
    }
}

status_enum! {
    /// Official-assigned petition priority.
    Priority {
        Low => "low", "Low";
        Medium => "medium", "Medium";
        High => "high", "High";
    }
}

/// A status as received from elsewhere: either one of the known values, or
/// a string we don't recognise, which is passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Lenient<S> {
    Known(S),
    Unrecognized(String),
}

impl<S: StatusEnum> Lenient<S> {
    /// Parse a raw status, keeping it verbatim if it isn't recognised.
    pub fn parse(raw: &str) -> Self {
        match S::parse_any(raw) {
            Some(status) => Self::Known(status),
            None => Self::Unrecognized(raw.to_string()),
        }
    }

    /// The known value, if any.
    pub fn known(&self) -> Option<S> {
        match self {
            Self::Known(status) => Some(*status),
            Self::Unrecognized(_) => None,
        }
    }

    /// Is this exactly the given status?
    pub fn is(&self, status: S) -> bool {
        self.known() == Some(status)
    }

    /// User-facing label; unrecognised strings are returned as-is.
    pub fn label(&self) -> Cow<'_, str> {
        match self {
            Self::Known(status) => Cow::Borrowed(status.label()),
            Self::Unrecognized(raw) => Cow::Borrowed(raw.as_str()),
        }
    }
}

impl<S: StatusEnum> Serialize for Lenient<S> {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        match self {
            Self::Known(status) => serializer.serialize_str(status.wire_name()),
            Self::Unrecognized(raw) => serializer.serialize_str(raw),
        }
    }
}

impl<'de, S: StatusEnum> Deserialize<'de> for Lenient<S> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Relabel a raw status string for display. Unrecognised values pass through.
pub fn status_label<S: StatusEnum>(raw: &str) -> String {
    Lenient::<S>::parse(raw).label().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_casing_variant() {
        for raw in ["under_review", "Under Review", "UNDER-REVIEW", " under review "] {
            assert_eq!(raw.parse::<PetitionStatus>(), Ok(PetitionStatus::UnderReview));
        }
        assert_eq!("Active".parse::<PollStatus>(), Ok(PollStatus::Active));
    }

    #[test]
    fn labels_are_title_case() {
        assert_eq!(status_label::<PetitionStatus>("under_review"), "Under Review");
        assert_eq!(status_label::<FeedbackStatus>("resolved"), "Resolved");
    }

    #[test]
    fn unknown_statuses_pass_through() {
        assert_eq!(status_label::<PetitionStatus>("archived"), "archived");
        let lenient = Lenient::<PollStatus>::parse("Scheduled");
        assert_eq!(lenient, Lenient::Unrecognized("Scheduled".to_string()));
        assert_eq!(lenient.known(), None);
    }

    #[test]
    fn relabeling_is_idempotent() {
        for status in PetitionStatus::ALL {
            let once = status_label::<PetitionStatus>(status.wire_name());
            let twice = status_label::<PetitionStatus>(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn serialises_canonical_wire_names() {
        let json = serde_json::to_string(&PetitionStatus::UnderReview).unwrap();
        assert_eq!(json, "\"under_review\"");
        let parsed: PetitionStatus = serde_json::from_str("\"Under Review\"").unwrap();
        assert_eq!(parsed, PetitionStatus::UnderReview);
        assert!(serde_json::from_str::<PetitionStatus>("\"bogus\"").is_err());

        let lenient: Lenient<FeedbackStatus> = serde_json::from_str("\"bogus\"").unwrap();
        assert_eq!(serde_json::to_string(&lenient).unwrap(), "\"bogus\"");
    }
}
