//! Domain models for keyscope.

pub mod api_key;
pub mod group;
pub mod legacy_api_key;
pub mod user;
