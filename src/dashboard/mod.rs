//! The dashboard core: everything a Civix front end needs besides drawing.
//!
//! An [`ApiClient`] talks to the REST API and normalises what it gets back.
//! Snapshots live in one [`QueryCache`], kept fresh by a single
//! [`RefreshScheduler`], and the logged-in user lives in a [`SessionStore`].

pub mod aggregate;
pub mod cache;
pub mod client;
pub mod config;
pub mod geocode;
pub mod normalize;
pub mod reconcile;
pub mod refresh;
pub mod search;
pub mod store;

pub use cache::QueryCache;
pub use client::{ApiClient, ClientError, Resource, Snapshot, Source};
pub use config::DashboardConfig;
pub use geocode::Geocoder;
pub use refresh::{RefreshHandle, RefreshScheduler};
pub use store::{SessionEvent, SessionStore};
