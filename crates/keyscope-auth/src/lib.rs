//! API key authentication and scope-based authorization.

pub mod authorizer;
pub mod config;
pub mod error;
pub mod header;
pub mod permission;
pub mod service;

pub use authorizer::{ScopeAuthorizer, Subject, resolve_user_scopes};
pub use config::AuthConfig;
pub use error::AuthError;
pub use permission::{
    Decision, Denial, Grant, Principal, RequestContext, UserPrincipal, decide, required_scope,
};
pub use service::ApiKeyAuthenticator;
