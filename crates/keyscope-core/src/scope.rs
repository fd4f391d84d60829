//! Scope strings.
//!
//! A scope is an opaque `"<resource>.<action>"` token. The decision
//! engine compares scopes by exact string equality; there are no
//! wildcards and no hierarchy. The `.` separator is reserved: actions
//! never contain it, so the action is always the text after the last
//! separator.

use crate::error::{KeyscopeError, KeyscopeResult};

/// Separator between the resource name and the action.
pub const SEPARATOR: char = '.';

/// Standard action for list/retrieve handlers and safe methods.
pub const ACTION_READ: &str = "read";
/// Standard action for create/update handlers and mutating methods.
pub const ACTION_WRITE: &str = "write";
/// Standard action for destroy handlers and `DELETE`.
pub const ACTION_DELETE: &str = "delete";

/// Join a resource name and an action into a scope string.
pub fn format_scope(resource: &str, action: &str) -> String {
    format!("{resource}{SEPARATOR}{action}")
}

/// Split a scope into `(resource, action)`.
///
/// Returns `None` if there is no separator.
pub fn split_scope(scope: &str) -> Option<(&str, &str)> {
    scope.rsplit_once(SEPARATOR)
}

/// Whether `action` is a well-formed action identifier: non-empty,
/// lowercase, and free of the separator.
pub fn is_valid_action(action: &str) -> bool {
    !action.is_empty()
        && !action.contains(SEPARATOR)
        && !action.chars().any(|c| c.is_whitespace() || c.is_uppercase())
}

/// Check that `scope` has the `resource.action` shape.
pub fn validate_scope(scope: &str) -> KeyscopeResult<()> {
    let invalid = |why: &str| KeyscopeError::Validation {
        message: format!("invalid scope '{scope}': {why}"),
    };

    let (resource, action) = split_scope(scope).ok_or_else(|| invalid("expected resource.action"))?;
    if resource.trim().is_empty() {
        return Err(invalid("resource name is empty"));
    }
    if !is_valid_action(action) {
        return Err(invalid("action must be a lowercase token"));
    }
    Ok(())
}

/// Validate every scope in `scopes`, failing on the first bad entry.
pub fn validate_scopes<'a, I>(scopes: I) -> KeyscopeResult<()>
where
    I: IntoIterator<Item = &'a String>,
{
    scopes.into_iter().try_for_each(|s| validate_scope(s))
}

/// Human-readable label: underscores become spaces and every word is
/// capitalised (`order_items` -> `Order Items`).
pub fn humanize(name: &str) -> String {
    name.split(['_', ' '])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_and_split_agree() {
        let scope = format_scope("posts", "read");
        assert_eq!(scope, "posts.read");
        assert_eq!(split_scope(&scope), Some(("posts", "read")));
    }

    #[test]
    fn split_uses_last_separator() {
        assert_eq!(split_scope("api.posts.read"), Some(("api.posts", "read")));
        assert_eq!(split_scope("posts"), None);
    }

    #[test]
    fn validate_accepts_custom_actions() {
        assert!(validate_scope("posts.publish").is_ok());
        assert!(validate_scope("order_items.mark_shipped").is_ok());
    }

    #[test]
    fn validate_rejects_malformed() {
        for bad in ["posts", ".read", "posts.", "posts.Read", "posts.re ad"] {
            let err = validate_scope(bad).unwrap_err();
            assert!(
                matches!(err, KeyscopeError::Validation { .. }),
                "expected Validation for {bad}, got {err:?}"
            );
        }
    }

    #[test]
    fn humanize_titles_words() {
        assert_eq!(humanize("posts"), "Posts");
        assert_eq!(humanize("order_items"), "Order Items");
        assert_eq!(humanize("mark_shipped"), "Mark Shipped");
    }
}
