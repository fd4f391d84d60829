//! Catalog groupings for human browsing and selection.
//!
//! Display labels are cosmetic; the scope strings carried alongside them
//! are exactly the strings the catalog published.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::Catalog;
use crate::scope::{humanize, split_scope};

/// Module label for resources with no resolvable owning module.
pub const OTHER_MODULE: &str = "Other";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeChoice {
    pub scope: String,
    pub action: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceGroup {
    pub resource: String,
    pub label: String,
    pub scopes: Vec<ScopeChoice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleGroup {
    pub module: String,
    pub resources: Vec<ResourceGroup>,
}

impl ModuleGroup {
    pub fn scope_count(&self) -> usize {
        self.resources.iter().map(|r| r.scopes.len()).sum()
    }
}

/// Display ordering: case-insensitive, underscores read as spaces; ties
/// broken by the raw name so the order stays total.
fn display_order(a: &str, b: &str) -> Ordering {
    let key = |s: &str| s.replace('_', " ").to_lowercase();
    key(a).cmp(&key(b)).then_with(|| a.cmp(b))
}

fn resource_group(resource: &str, scopes: &std::collections::BTreeSet<String>) -> ResourceGroup {
    let mut choices: Vec<ScopeChoice> = scopes
        .iter()
        .map(|scope| {
            let action = split_scope(scope).map(|(_, a)| a).unwrap_or(scope);
            ScopeChoice {
                scope: scope.clone(),
                action: action.to_string(),
                label: humanize(action),
            }
        })
        .collect();
    choices.sort_by(|a, b| a.action.cmp(&b.action));

    ResourceGroup {
        resource: resource.to_string(),
        label: humanize(resource),
        scopes: choices,
    }
}

impl Catalog {
    /// Resources in display order, each with its actions sorted.
    pub fn grouped_by_resource(&self) -> Vec<ResourceGroup> {
        let mut groups: Vec<ResourceGroup> = self
            .iter()
            .map(|(resource, scopes)| resource_group(resource, scopes))
            .collect();
        groups.sort_by(|a, b| display_order(&a.resource, &b.resource));
        groups
    }

    /// Two-level grouping by module label, using `module_of` to resolve
    /// each resource's module. Unresolved resources land under
    /// [`OTHER_MODULE`].
    pub fn grouped_by_module<F>(&self, module_of: F) -> Vec<ModuleGroup>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut modules: BTreeMap<String, Vec<ResourceGroup>> = BTreeMap::new();
        for group in self.grouped_by_resource() {
            let module = module_of(&group.resource)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| OTHER_MODULE.to_string());
            modules.entry(module).or_default().push(group);
        }

        let mut grouped: Vec<ModuleGroup> = modules
            .into_iter()
            .map(|(module, resources)| ModuleGroup { module, resources })
            .collect();
        grouped.sort_by(|a, b| display_order(&a.module, &b.module));
        grouped
    }

    /// Grouping by the modules declared on the operations themselves.
    pub fn grouped_by_declared_module(&self) -> Vec<ModuleGroup> {
        self.grouped_by_module(|resource| self.module_of(resource).map(str::to_string))
    }

    /// Flat `(scope, "Resource - Action")` list in display order.
    pub fn choices(&self) -> Vec<(String, String)> {
        self.grouped_by_resource()
            .into_iter()
            .flat_map(|group| {
                let resource_label = group.label;
                group.scopes.into_iter().map(move |choice| {
                    let label = format!("{resource_label} - {}", choice.label);
                    (choice.scope, label)
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{CustomRoute, Handler, Method, Operation};

    fn catalog() -> Catalog {
        Catalog::build(&[
            Operation::new("PostViewSet")
                .with_resource("posts")
                .with_module("blog")
                .with_crud()
                .with_route(CustomRoute::new("publish", [Method::Post])),
            Operation::new("OrderItemViewSet")
                .with_resource("order_items")
                .with_module("shop")
                .with_handlers([Handler::List]),
            Operation::new("OrdersViewSet")
                .with_module("shop")
                .with_handlers([Handler::List, Handler::Create]),
            Operation::new("AuditViewSet").with_handlers([Handler::List]),
        ])
    }

    #[test]
    fn resources_sorted_case_insensitively_with_underscores_as_spaces() {
        let names: Vec<_> = catalog()
            .grouped_by_resource()
            .into_iter()
            .map(|g| g.resource)
            .collect();
        // "order items" sorts before "orders".
        assert_eq!(names, vec!["audit", "order_items", "orders", "posts"]);
    }

    #[test]
    fn labels_are_humanized_but_scopes_untouched() {
        let groups = catalog().grouped_by_resource();
        let items = groups.iter().find(|g| g.resource == "order_items").unwrap();
        assert_eq!(items.label, "Order Items");
        assert_eq!(items.scopes[0].scope, "order_items.read");
        assert_eq!(items.scopes[0].label, "Read");
    }

    #[test]
    fn actions_sorted_within_resource() {
        let groups = catalog().grouped_by_resource();
        let posts = groups.iter().find(|g| g.resource == "posts").unwrap();
        let actions: Vec<_> = posts.scopes.iter().map(|c| c.action.as_str()).collect();
        assert_eq!(actions, vec!["delete", "publish", "read", "write"]);
    }

    #[test]
    fn module_grouping_uses_other_for_unresolved() {
        let grouped = catalog().grouped_by_declared_module();
        let modules: Vec<_> = grouped.iter().map(|m| m.module.as_str()).collect();
        assert_eq!(modules, vec!["blog", "Other", "shop"]);

        let shop = grouped.iter().find(|m| m.module == "shop").unwrap();
        let resources: Vec<_> = shop.resources.iter().map(|r| r.resource.as_str()).collect();
        assert_eq!(resources, vec!["order_items", "orders"]);
        assert_eq!(shop.scope_count(), 3);
    }

    #[test]
    fn module_grouping_with_external_lookup() {
        let grouped = catalog().grouped_by_module(|_| None);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].module, OTHER_MODULE);
        assert_eq!(grouped[0].resources.len(), 4);
    }

    #[test]
    fn choices_are_flat_and_labelled() {
        let choices = catalog().choices();
        assert_eq!(choices[0], ("audit.read".to_string(), "Audit - Read".to_string()));
        assert!(choices.contains(&("posts.publish".to_string(), "Posts - Publish".to_string())));
        assert_eq!(choices.len(), catalog().scope_count());
    }
}
