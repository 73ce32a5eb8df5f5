//! Types shared between the database, API, and dashboard representations.

pub mod password;
pub mod role;
pub mod status;

pub use role::{Role, Theme};
pub use status::{
    status_label, FeedbackStatus, Lenient, PetitionStatus, PollStatus, Priority, StatusEnum,
};
