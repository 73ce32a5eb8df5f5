//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Datetimes are serialised as RFC 3339 strings.
//! - Field names are camelCase.

pub mod analytics;
pub mod auth;
pub mod feedback;
pub mod id;
pub mod notification;
pub mod petition;
pub mod poll;
pub mod settings;
pub mod user;
