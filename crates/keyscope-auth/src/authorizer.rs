//! Async front-end to the decision engine.

use std::collections::BTreeSet;

use keyscope_core::error::KeyscopeResult;
use keyscope_core::models::api_key::ApiKey;
use keyscope_core::models::group::union_scopes;
use keyscope_core::models::user::User;
use keyscope_core::operation::Operation;
use keyscope_core::repository::GroupScopeRepository;
use tracing::debug;
use uuid::Uuid;

use crate::permission::{self, Decision, Grant, Principal, RequestContext, UserPrincipal};

/// Who is making a request, before any scopes are loaded.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    ApiKey(&'a ApiKey),
    User(&'a User),
    Anonymous,
}

/// Answers "may this subject perform this request?".
///
/// Group scopes are fetched only when a decision depends on them:
/// superusers and operations without a required scope never touch the
/// store.
pub struct ScopeAuthorizer<G: GroupScopeRepository> {
    group_scopes: G,
}

impl<G: GroupScopeRepository> ScopeAuthorizer<G> {
    pub fn new(group_scopes: G) -> Self {
        Self { group_scopes }
    }

    pub async fn authorize(
        &self,
        subject: Subject<'_>,
        operation: &Operation,
        request: &RequestContext,
    ) -> KeyscopeResult<Decision> {
        let decision = match subject {
            Subject::Anonymous => permission::decide(None, operation, request),
            Subject::ApiKey(key) => {
                let principal = Principal::ApiKey(key.clone());
                permission::decide(Some(&principal), operation, request)
            }
            Subject::User(user) => self.authorize_user(user, operation, request).await?,
        };

        debug!(
            handler = %operation.handler_type,
            method = %request.method,
            allowed = decision.is_allowed(),
            "Authorization decision"
        );

        Ok(decision)
    }

    async fn authorize_user(
        &self,
        user: &User,
        operation: &Operation,
        request: &RequestContext,
    ) -> KeyscopeResult<Decision> {
        if user.is_superuser {
            return Ok(Decision::Allow(Grant::Superuser));
        }
        if permission::required_scope(operation, request).is_none() {
            return Ok(Decision::Allow(Grant::NoScopeRequired));
        }

        let scopes = resolve_user_scopes(&self.group_scopes, user.id).await?;
        let principal = Principal::User(UserPrincipal::new(user, scopes));
        Ok(permission::decide(Some(&principal), operation, request))
    }
}

/// Union of the scopes of every group `user_id` belongs to.
pub async fn resolve_user_scopes<G: GroupScopeRepository>(
    repo: &G,
    user_id: Uuid,
) -> KeyscopeResult<BTreeSet<String>> {
    let bindings = repo.list_for_user(user_id).await?;
    Ok(union_scopes(&bindings))
}
