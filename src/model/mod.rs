//! Data types, in their database, API, and shared representations.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
