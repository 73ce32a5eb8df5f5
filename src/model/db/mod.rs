//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.
//! - Field names are snake_case.

pub mod admin_log;
pub mod feedback;
pub mod petition;
pub mod poll;
pub mod response;
pub mod settings;
pub mod signature;
pub mod user;
