//! Scope decision engine.
//!
//! [`decide`] is a pure function of a principal snapshot, an operation
//! descriptor and the request shape. It performs no I/O; the async
//! [`ScopeAuthorizer`](crate::authorizer::ScopeAuthorizer) resolves user
//! scopes before calling it.
//!
//! # Policy
//!
//! - API key: allowed when the operation requires no scope, or when the
//!   key grants the required scope. A key with an empty scope set grants
//!   everything.
//! - User: superusers are always allowed. Otherwise allowed when no
//!   scope is required, or when the union of the user's group scopes
//!   contains the required scope. A user whose groups grant no scopes is
//!   denied. Note the asymmetry with keys.
//! - No principal: denied.

use std::collections::BTreeSet;
use std::fmt;

use keyscope_core::error::{KeyscopeError, KeyscopeResult};
use keyscope_core::models::api_key::ApiKey;
use keyscope_core::models::user::User;
use keyscope_core::operation::{Handler, Method, Operation};
use keyscope_core::scope::format_scope;
use uuid::Uuid;

/// Shape of an incoming request, as far as scope resolution cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub method: Method,
    /// Fine-grained action identifier (`list`, `destroy`, `publish`, ...)
    /// when the routing layer knows it.
    pub action: Option<String>,
}

impl RequestContext {
    /// A request known only by its method.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            action: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// A request dispatched to a standard handler.
    pub fn for_handler(handler: Handler) -> Self {
        let method = match handler {
            Handler::List | Handler::Retrieve => Method::Get,
            Handler::Create => Method::Post,
            Handler::Update => Method::Put,
            Handler::PartialUpdate => Method::Patch,
            Handler::Destroy => Method::Delete,
        };
        Self::new(method).with_action(handler.name())
    }

    /// A request dispatched to a custom route.
    pub fn for_route(method: Method, route: &keyscope_core::CustomRoute) -> Self {
        Self::new(method).with_action(route.request_action())
    }
}

/// Action a request maps to.
///
/// A fine-grained action wins: standard handler names fold into
/// `read`/`write`/`delete`, anything else passes through verbatim.
/// Without one, the method table decides.
pub fn resolve_action(request: &RequestContext) -> String {
    match request.action.as_deref().filter(|a| !a.is_empty()) {
        Some(action) => Handler::from_name(action)
            .map(Handler::action)
            .unwrap_or(action)
            .to_string(),
        None => request.method.action().to_string(),
    }
}

/// Scope required to perform `request` against `operation`, or `None`
/// if the operation declares no requirement.
///
/// An explicit required scope on the operation is returned verbatim.
/// Otherwise the resource name comes from [`Operation::resource_name`],
/// the same resolution the catalog is built with.
pub fn required_scope(operation: &Operation, request: &RequestContext) -> Option<String> {
    if let Some(scope) = &operation.required_scope {
        return (!scope.is_empty()).then(|| scope.clone());
    }

    let resource = operation.resource_name()?;
    Some(format_scope(&resource, &resolve_action(request)))
}

/// A user together with the union of their group scopes.
#[derive(Debug, Clone)]
pub struct UserPrincipal {
    pub user_id: Uuid,
    pub is_superuser: bool,
    pub scopes: BTreeSet<String>,
}

impl UserPrincipal {
    pub fn new(user: &User, scopes: BTreeSet<String>) -> Self {
        Self {
            user_id: user.id,
            is_superuser: user.is_superuser,
            scopes,
        }
    }
}

/// The resolved identity behind a request.
#[derive(Debug, Clone)]
pub enum Principal {
    ApiKey(ApiKey),
    User(UserPrincipal),
}

/// Why a request was allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    NoScopeRequired,
    UnrestrictedKey,
    Superuser,
    Scope(String),
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grant::NoScopeRequired => f.write_str("no scope required"),
            Grant::UnrestrictedKey => f.write_str("unrestricted key"),
            Grant::Superuser => f.write_str("superuser"),
            Grant::Scope(scope) => write!(f, "holds '{scope}'"),
        }
    }
}

/// Why a request was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    Unauthenticated,
    MissingScope(String),
    /// The user's groups grant no scopes at all.
    NoGroupScopes(String),
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::Unauthenticated => f.write_str("no authenticated principal"),
            Denial::MissingScope(scope) => write!(f, "missing required scope '{scope}'"),
            Denial::NoGroupScopes(scope) => {
                write!(f, "no group scopes assigned; '{scope}' required")
            }
        }
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow(Grant),
    Deny(Denial),
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow(grant) => write!(f, "allowed: {grant}"),
            Decision::Deny(denial) => write!(f, "denied: {denial}"),
        }
    }
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }

    /// Turn a denial into [`KeyscopeError::AuthorizationDenied`] for
    /// callers that propagate with `?`.
    pub fn into_result(self) -> KeyscopeResult<Grant> {
        match self {
            Decision::Allow(grant) => Ok(grant),
            Decision::Deny(denial) => Err(KeyscopeError::AuthorizationDenied {
                reason: denial.to_string(),
            }),
        }
    }
}

/// Decide whether `principal` may perform `request` on `operation`.
pub fn decide(
    principal: Option<&Principal>,
    operation: &Operation,
    request: &RequestContext,
) -> Decision {
    match principal {
        None => Decision::Deny(Denial::Unauthenticated),
        Some(Principal::ApiKey(key)) => decide_for_key(key, operation, request),
        Some(Principal::User(user)) => decide_for_user(user, operation, request),
    }
}

fn decide_for_key(key: &ApiKey, operation: &Operation, request: &RequestContext) -> Decision {
    let Some(required) = required_scope(operation, request) else {
        return Decision::Allow(Grant::NoScopeRequired);
    };

    if key.is_unrestricted() {
        Decision::Allow(Grant::UnrestrictedKey)
    } else if key.has_scope(&required) {
        Decision::Allow(Grant::Scope(required))
    } else {
        Decision::Deny(Denial::MissingScope(required))
    }
}

fn decide_for_user(
    user: &UserPrincipal,
    operation: &Operation,
    request: &RequestContext,
) -> Decision {
    if user.is_superuser {
        return Decision::Allow(Grant::Superuser);
    }

    let Some(required) = required_scope(operation, request) else {
        return Decision::Allow(Grant::NoScopeRequired);
    };

    if user.scopes.is_empty() {
        Decision::Deny(Denial::NoGroupScopes(required))
    } else if user.scopes.contains(&required) {
        Decision::Allow(Grant::Scope(required))
    } else {
        Decision::Deny(Denial::MissingScope(required))
    }
}
