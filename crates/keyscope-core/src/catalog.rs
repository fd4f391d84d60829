//! Scope catalog.
//!
//! The catalog is the complete set of `resource.action` scopes derivable
//! from the registered [`Operation`]s. It is built once, published
//! through a [`SharedCatalog`], and never mutated after publication:
//! a route table change builds a new catalog and swaps it in whole.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;

use crate::operation::Operation;
use crate::scope::format_scope;

/// Immutable mapping from resource name to its scopes, plus the owning
/// module of each resource when one was declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Catalog {
    resources: BTreeMap<String, BTreeSet<String>>,
    modules: BTreeMap<String, String>,
}

impl Catalog {
    /// Build a catalog from operation descriptors.
    ///
    /// Operations sharing a resource name are merged. Resources with no
    /// supported actions, and operations whose resource name cannot be
    /// resolved, are omitted. The result does not depend on the order of
    /// `operations`: when two operations on one resource declare
    /// different modules, the lexicographically smallest label wins.
    pub fn build<'a, I>(operations: I) -> Self
    where
        I: IntoIterator<Item = &'a Operation>,
    {
        let mut catalog = Catalog::default();

        for op in operations {
            let Some(resource) = op.resource_name() else {
                continue;
            };
            let actions = op.actions();
            if actions.is_empty() {
                continue;
            }

            let scopes = catalog.resources.entry(resource.clone()).or_default();
            scopes.extend(actions.iter().map(|a| format_scope(&resource, a)));

            if let Some(module) = op.module.as_deref().filter(|m| !m.trim().is_empty()) {
                let slot = catalog.modules.entry(resource).or_insert_with(|| module.to_string());
                if module < slot.as_str() {
                    *slot = module.to_string();
                }
            }
        }

        catalog
    }

    /// Scopes published for `resource`.
    pub fn scopes_for(&self, resource: &str) -> Option<&BTreeSet<String>> {
        self.resources.get(resource)
    }

    /// Resource names in lexicographic order.
    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    /// `(resource, scopes)` pairs in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.resources.iter().map(|(r, s)| (r.as_str(), s))
    }

    /// Every published scope.
    pub fn all_scopes(&self) -> impl Iterator<Item = &str> {
        self.resources.values().flatten().map(String::as_str)
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.resources.values().any(|s| s.contains(scope))
    }

    /// Declared owning module of `resource`.
    pub fn module_of(&self, resource: &str) -> Option<&str> {
        self.modules.get(resource).map(String::as_str)
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn scope_count(&self) -> usize {
        self.resources.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// A published catalog together with its generation number.
#[derive(Debug)]
pub struct CatalogSnapshot {
    pub version: u64,
    pub catalog: Catalog,
}

/// Shared, atomically swappable reference to the current catalog.
///
/// Readers clone an `Arc` to the current snapshot and keep using it for
/// as long as they like; a rebuild replaces the pointer and never
/// touches a snapshot a reader may hold.
#[derive(Debug, Clone)]
pub struct SharedCatalog {
    current: Arc<RwLock<Arc<CatalogSnapshot>>>,
}

impl SharedCatalog {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(CatalogSnapshot {
                version: 1,
                catalog,
            }))),
        }
    }

    /// Build and publish a catalog from `operations`.
    pub fn from_operations<'a, I>(operations: I) -> Self
    where
        I: IntoIterator<Item = &'a Operation>,
    {
        Self::new(Catalog::build(operations))
    }

    /// The currently published snapshot.
    pub fn load(&self) -> Arc<CatalogSnapshot> {
        self.current.read().clone()
    }

    /// Publish `catalog`, returning its version.
    pub fn replace(&self, catalog: Catalog) -> u64 {
        let mut current = self.current.write();
        let version = current.version + 1;
        *current = Arc::new(CatalogSnapshot { version, catalog });
        version
    }

    /// Rebuild from a changed operation set and publish the result.
    pub fn rebuild<'a, I>(&self, operations: I) -> u64
    where
        I: IntoIterator<Item = &'a Operation>,
    {
        let catalog = Catalog::build(operations);
        let (resources, scopes) = (catalog.resource_count(), catalog.scope_count());
        let version = self.replace(catalog);
        info!(version, resources, scopes, "Scope catalog rebuilt");
        version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{CustomRoute, Handler, Method};

    fn posts() -> Operation {
        Operation::new("PostViewSet")
            .with_resource("posts")
            .with_crud()
            .with_route(CustomRoute::new("publish", [Method::Post]))
    }

    #[test]
    fn builds_scopes_for_crud_and_custom_actions() {
        let catalog = Catalog::build(&[posts()]);
        let scopes: Vec<_> = catalog.scopes_for("posts").unwrap().iter().cloned().collect();
        assert_eq!(
            scopes,
            vec!["posts.delete", "posts.publish", "posts.read", "posts.write"]
        );
    }

    #[test]
    fn conflicting_modules_resolve_independently_of_order() {
        let a = Operation::new("PostViewSet")
            .with_resource("posts")
            .with_module("publishing")
            .with_handlers([Handler::List]);
        let b = Operation::new("PostAdminViewSet")
            .with_resource("posts")
            .with_module("blog")
            .with_handlers([Handler::Destroy]);

        let forward = Catalog::build([&a, &b]);
        let backward = Catalog::build([&b, &a]);
        assert_eq!(forward, backward);
        assert_eq!(forward.module_of("posts"), Some("blog"));
    }

    #[test]
    fn override_keys_the_catalog_not_the_derived_name() {
        let ops = [
            Operation::new("UserProfileViewSet")
                .with_resource("profiles")
                .with_handlers([Handler::List, Handler::Retrieve]),
        ];
        let catalog = Catalog::build(&ops);

        assert!(catalog.scopes_for("profiles").unwrap().contains("profiles.read"));
        assert!(catalog.scopes_for("userprofile").is_none());
        assert!(!catalog.contains("userprofile.read"));
    }

    #[test]
    fn override_colliding_with_derived_name_merges_under_override() {
        // "ArticleViewSet" derives "article"; a second handler claims the
        // same key explicitly.
        let ops = [
            Operation::new("ArticleViewSet").with_handlers([Handler::List]),
            Operation::new("LegacyNewsViewSet")
                .with_resource("article")
                .with_handlers([Handler::Destroy]),
        ];
        let catalog = Catalog::build(&ops);

        let scopes: Vec<_> = catalog.scopes_for("article").unwrap().iter().cloned().collect();
        assert_eq!(scopes, vec!["article.delete", "article.read"]);
        assert!(catalog.scopes_for("legacynews").is_none());
    }

    #[test]
    fn resources_without_actions_are_omitted() {
        let ops = [Operation::new("HealthHandler"), posts()];
        let catalog = Catalog::build(&ops);
        assert_eq!(catalog.resources().collect::<Vec<_>>(), vec!["posts"]);
    }

    #[test]
    fn build_is_order_independent() {
        let a = Operation::new("CommentViewSet").with_handlers([Handler::List]);
        let b = posts();
        assert_eq!(
            Catalog::build([&a, &b]),
            Catalog::build([&b, &a]),
        );
    }

    #[test]
    fn counts() {
        let ops = [posts(), Operation::new("CommentViewSet").with_handlers([Handler::List])];
        let catalog = Catalog::build(&ops);
        assert_eq!(catalog.resource_count(), 2);
        assert_eq!(catalog.scope_count(), 5);
    }

    #[test]
    fn shared_catalog_swaps_whole_snapshots() {
        let shared = SharedCatalog::from_operations(&[posts()]);
        let before = shared.load();
        assert_eq!(before.version, 1);

        let version = shared.rebuild(&[Operation::new("CommentViewSet").with_handlers([Handler::List])]);
        assert_eq!(version, 2);

        // A reader holding the old snapshot still sees it intact.
        assert!(before.catalog.contains("posts.read"));
        let after = shared.load();
        assert!(!after.catalog.contains("posts.read"));
        assert!(after.catalog.contains("comment.read"));
    }

    #[test]
    fn concurrent_readers_see_complete_snapshots() {
        let shared = SharedCatalog::from_operations(&[posts()]);
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let snap = shared.load();
                        let n = snap.catalog.scope_count();
                        assert!(n == 4 || n == 1, "partial catalog observed: {n}");
                    }
                })
            })
            .collect();

        for i in 0..50 {
            if i % 2 == 0 {
                shared.rebuild(&[Operation::new("CommentViewSet").with_handlers([Handler::List])]);
            } else {
                shared.rebuild(&[posts()]);
            }
        }

        for r in readers {
            r.join().unwrap();
        }
    }
}
