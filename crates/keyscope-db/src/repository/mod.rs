//! SurrealDB repository implementations.

mod api_key;
mod group;
mod group_scope;
mod legacy_api_key;
mod user;

pub use api_key::SurrealApiKeyRepository;
pub use group::SurrealGroupRepository;
pub use group_scope::SurrealGroupScopeRepository;
pub use legacy_api_key::SurrealLegacyApiKeyRepository;
pub use user::SurrealUserRepository;
