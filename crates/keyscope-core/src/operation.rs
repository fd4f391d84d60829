//! Operation descriptors.
//!
//! An [`Operation`] is the static description of one addressable unit of
//! service functionality, registered once alongside its routes. It lists
//! the CRUD-style handlers it exposes and any custom sub-routes, so both
//! the scope catalog and the decision engine can work from declared
//! capabilities instead of inspecting handlers at runtime.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scope::{self, ACTION_DELETE, ACTION_READ, ACTION_WRITE};

/// Conventional handler type suffixes stripped when deriving a resource
/// name from a type name.
pub const HANDLER_SUFFIXES: &[&str] = &["ViewSet", "Handler"];

/// CRUD-style handlers an operation can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handler {
    List,
    Retrieve,
    Create,
    Update,
    PartialUpdate,
    Destroy,
}

impl Handler {
    pub const ALL: [Handler; 6] = [
        Handler::List,
        Handler::Retrieve,
        Handler::Create,
        Handler::Update,
        Handler::PartialUpdate,
        Handler::Destroy,
    ];

    /// Fine-grained action identifier for this handler.
    pub fn name(self) -> &'static str {
        match self {
            Handler::List => "list",
            Handler::Retrieve => "retrieve",
            Handler::Create => "create",
            Handler::Update => "update",
            Handler::PartialUpdate => "partial_update",
            Handler::Destroy => "destroy",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|h| h.name() == name)
    }

    /// The standard action this handler folds into.
    pub fn action(self) -> &'static str {
        match self {
            Handler::List | Handler::Retrieve => ACTION_READ,
            Handler::Create | Handler::Update | Handler::PartialUpdate => ACTION_WRITE,
            Handler::Destroy => ACTION_DELETE,
        }
    }
}

/// Transport (HTTP) method of a request.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Method {
    Get,
    Head,
    Options,
    Post,
    Put,
    Patch,
    Delete,
    /// Any method without a known mapping.
    Other(String),
}

impl Method {
    /// Parse a method token, case-insensitively.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "PATCH" => Method::Patch,
            "DELETE" => Method::Delete,
            other => Method::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Other(m) => m,
        }
    }

    /// Fallback action used when a request carries no fine-grained
    /// action identifier.
    ///
    /// Unrecognised methods map to `read`. This is permissive: a method
    /// the table does not know is checked against the read scope rather
    /// than denied.
    pub fn action(&self) -> &'static str {
        match self {
            Method::Get | Method::Head | Method::Options => ACTION_READ,
            Method::Post | Method::Put | Method::Patch => ACTION_WRITE,
            Method::Delete => ACTION_DELETE,
            Method::Other(_) => ACTION_READ,
        }
    }
}

impl From<String> for Method {
    fn from(raw: String) -> Self {
        Method::parse(&raw)
    }
}

impl From<Method> for String {
    fn from(method: Method) -> Self {
        method.as_str().to_string()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A custom sub-route registered on an operation (e.g. `POST
/// /posts/{id}/publish`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRoute {
    pub name: String,
    #[serde(default)]
    pub methods: Vec<Method>,
    /// Set when the route is served by a standard handler; the route
    /// then folds into that handler's action instead of contributing
    /// its own name.
    #[serde(default)]
    pub maps_to: Option<Handler>,
}

impl CustomRoute {
    pub fn new(name: impl Into<String>, methods: impl IntoIterator<Item = Method>) -> Self {
        Self {
            name: name.into(),
            methods: methods.into_iter().collect(),
            maps_to: None,
        }
    }

    pub fn mapped_to(mut self, handler: Handler) -> Self {
        self.maps_to = Some(handler);
        self
    }

    /// Whether the route serves `method`. A route declaring no methods
    /// serves any.
    pub fn accepts(&self, method: &Method) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }

    /// False when the route folds into a standard handler whose action
    /// none of its declared methods would map to, e.g. a `GET` route
    /// mapped to `destroy`.
    pub fn folds_consistently(&self) -> bool {
        match self.maps_to {
            Some(handler) => {
                self.methods.is_empty()
                    || self.methods.iter().any(|m| m.action() == handler.action())
            }
            None => true,
        }
    }

    /// Fine-grained action identifier a request to this route carries.
    pub fn request_action(&self) -> &str {
        match self.maps_to {
            Some(handler) => handler.name(),
            None => &self.name,
        }
    }

    /// Action this route contributes to the catalog.
    pub fn action(&self) -> &str {
        match self.maps_to {
            Some(handler) => handler.action(),
            None => &self.name,
        }
    }
}

/// Descriptor of an addressable unit of functionality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Handler type identity (e.g. `PostViewSet`, `blog::PostHandler`).
    #[serde(rename = "handler")]
    pub handler_type: String,
    /// Explicit resource name override.
    #[serde(default)]
    pub resource: Option<String>,
    /// Explicit required scope; short-circuits scope computation.
    #[serde(default)]
    pub required_scope: Option<String>,
    /// Owning module label, used for presentation grouping only.
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub handlers: BTreeSet<Handler>,
    #[serde(default)]
    pub routes: Vec<CustomRoute>,
}

impl Operation {
    pub fn new(handler_type: impl Into<String>) -> Self {
        Self {
            handler_type: handler_type.into(),
            resource: None,
            required_scope: None,
            module: None,
            handlers: BTreeSet::new(),
            routes: Vec::new(),
        }
    }

    /// Descriptor named after the Rust type `T`. For a generic type the
    /// outer type names the resource.
    pub fn for_type<T: ?Sized>() -> Self {
        Self::new(std::any::type_name::<T>())
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_required_scope(mut self, scope: impl Into<String>) -> Self {
        self.required_scope = Some(scope.into());
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_handlers(mut self, handlers: impl IntoIterator<Item = Handler>) -> Self {
        self.handlers.extend(handlers);
        self
    }

    /// All six CRUD handlers.
    pub fn with_crud(self) -> Self {
        self.with_handlers(Handler::ALL)
    }

    pub fn with_route(mut self, route: CustomRoute) -> Self {
        self.routes.push(route);
        self
    }

    /// Resolve the resource name: the explicit override if set, else
    /// the name derived from the handler type.
    ///
    /// Both catalog build and required-scope computation go through this
    /// function, so the scope a check looks for is byte-identical to the
    /// scope the catalog published.
    pub fn resource_name(&self) -> Option<String> {
        self.resource
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .or_else(|| derive_resource_name(&self.handler_type))
    }

    /// Custom route registered under `name`.
    pub fn route(&self, name: &str) -> Option<&CustomRoute> {
        self.routes.iter().find(|r| r.name == name)
    }

    /// Actions this operation supports: standard actions from its
    /// handlers plus custom route actions.
    pub fn actions(&self) -> BTreeSet<String> {
        let mut actions: BTreeSet<String> = self
            .handlers
            .iter()
            .map(|h| h.action().to_string())
            .collect();

        for route in &self.routes {
            if !route.folds_consistently() {
                tracing::warn!(
                    handler = %self.handler_type,
                    route = %route.name,
                    "Custom route methods do not match the handler it maps to"
                );
            }
            let action = route.action();
            if scope::is_valid_action(action) {
                actions.insert(action.to_string());
            } else {
                tracing::warn!(
                    handler = %self.handler_type,
                    route = %route.name,
                    "Skipping custom route with malformed action name"
                );
            }
        }

        actions
    }
}

/// Derive a resource name from a handler type name: drop generic
/// arguments and any module path, strip a conventional suffix, lowercase.
///
/// `OrderItemViewSet` -> `orderitem`, `blog::PostHandler` -> `post`,
/// `api::Wrapper<api::PostHandler>` -> `wrapper`.
pub fn derive_resource_name(handler_type: &str) -> Option<String> {
    let path = handler_type
        .split('<')
        .next()
        .unwrap_or(handler_type);
    let base = path
        .rsplit("::")
        .next()
        .unwrap_or(handler_type)
        .trim();

    let stripped = HANDLER_SUFFIXES
        .iter()
        .find_map(|suffix| base.strip_suffix(suffix))
        .unwrap_or(base);

    let name = stripped.to_lowercase();
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_name_from_type() {
        assert_eq!(derive_resource_name("OrderItemViewSet").as_deref(), Some("orderitem"));
        assert_eq!(derive_resource_name("blog::api::PostHandler").as_deref(), Some("post"));
        assert_eq!(derive_resource_name("Reports").as_deref(), Some("reports"));
        assert_eq!(derive_resource_name("ViewSet"), None);
    }

    #[test]
    fn explicit_resource_wins() {
        let op = Operation::new("UserProfileViewSet").with_resource("profiles");
        assert_eq!(op.resource_name().as_deref(), Some("profiles"));
    }

    #[test]
    fn blank_override_falls_back_to_derived() {
        let op = Operation::new("UserProfileViewSet").with_resource("  ");
        assert_eq!(op.resource_name().as_deref(), Some("userprofile"));
    }

    #[test]
    fn for_type_uses_type_name() {
        struct InvoiceHandler;
        let op = Operation::for_type::<InvoiceHandler>();
        assert_eq!(op.resource_name().as_deref(), Some("invoice"));
    }

    #[test]
    fn generic_arguments_do_not_leak_into_derived_name() {
        assert_eq!(
            derive_resource_name("api::Wrapper<api::PostHandler>").as_deref(),
            Some("wrapper")
        );
        assert_eq!(
            derive_resource_name("blog::OrderViewSet<alloc::string::String>").as_deref(),
            Some("order")
        );

        struct Wrapper<T>(T);
        struct PostHandler;
        let op = Operation::for_type::<Wrapper<PostHandler>>();
        assert_eq!(op.resource_name().as_deref(), Some("wrapper"));
    }

    #[test]
    fn route_accepts_declared_methods() {
        let publish = CustomRoute::new("publish", [Method::Post]);
        assert!(publish.accepts(&Method::Post));
        assert!(!publish.accepts(&Method::Get));
        assert!(CustomRoute::new("any", Vec::<Method>::new()).accepts(&Method::Delete));
    }

    #[test]
    fn mapped_route_methods_must_match_handler() {
        let recent = CustomRoute::new("recent", [Method::Get]).mapped_to(Handler::List);
        assert!(recent.folds_consistently());

        let purge = CustomRoute::new("purge", [Method::Get]).mapped_to(Handler::Destroy);
        assert!(!purge.folds_consistently());

        // Inconsistent routes still fold; the mismatch is only reported.
        let op = Operation::new("PostViewSet").with_route(purge);
        let actions: Vec<_> = op.actions().into_iter().collect();
        assert_eq!(actions, vec!["delete"]);
        assert_eq!(op.route("purge").map(|r| r.name.as_str()), Some("purge"));
        assert!(op.route("missing").is_none());
    }

    #[test]
    fn handlers_fold_into_standard_actions() {
        let op = Operation::new("PostViewSet").with_handlers([Handler::List, Handler::PartialUpdate]);
        let actions: Vec<_> = op.actions().into_iter().collect();
        assert_eq!(actions, vec!["read", "write"]);
    }

    #[test]
    fn custom_route_contributes_name_unless_mapped() {
        let op = Operation::new("PostViewSet")
            .with_route(CustomRoute::new("publish", [Method::Post]))
            .with_route(CustomRoute::new("recent", [Method::Get]).mapped_to(Handler::List));
        let actions: Vec<_> = op.actions().into_iter().collect();
        assert_eq!(actions, vec!["publish", "read"]);
    }

    #[test]
    fn malformed_route_name_is_skipped() {
        let op = Operation::new("PostViewSet").with_route(CustomRoute::new("bad.name", [Method::Post]));
        assert!(op.actions().is_empty());
    }

    #[test]
    fn method_parse_is_case_insensitive() {
        assert_eq!(Method::parse("get"), Method::Get);
        assert_eq!(Method::parse("Delete"), Method::Delete);
        assert_eq!(Method::parse("propfind"), Method::Other("PROPFIND".into()));
    }

    #[test]
    fn unknown_method_falls_back_to_read() {
        assert_eq!(Method::parse("PROPFIND").action(), "read");
        assert_eq!(Method::Patch.action(), "write");
        assert_eq!(Method::Delete.action(), "delete");
    }
}
