//! Operations manifest: the service's operation descriptors in TOML.
//!
//! ```toml
//! [[operation]]
//! handler = "PostViewSet"
//! resource = "posts"
//! module = "blog"
//! handlers = ["list", "retrieve", "create", "destroy"]
//!
//! [[operation.routes]]
//! name = "publish"
//! methods = ["POST"]
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use keyscope_core::{Catalog, Operation};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct Manifest {
    #[serde(default, rename = "operation")]
    pub operations: Vec<Operation>,
}

impl Manifest {
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("invalid operations manifest")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("in {}", path.display()))
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::build(&self.operations)
    }

    /// Find an operation by handler type or resolved resource name.
    pub fn find(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| {
            op.handler_type == name || op.resource_name().as_deref() == Some(name)
        })
    }
}

/// Scopes in `requested` that `catalog` does not publish.
pub fn unknown_scopes<'a>(catalog: &Catalog, requested: &'a [String]) -> Vec<&'a str> {
    requested
        .iter()
        .filter(|s| !catalog.contains(s))
        .map(String::as_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
        [[operation]]
        handler = "PostViewSet"
        resource = "posts"
        handlers = ["list", "destroy"]

        [[operation.routes]]
        name = "publish"
        methods = ["POST"]
    "#;

    #[test]
    fn builds_catalog() {
        let catalog = Manifest::from_toml(MANIFEST).unwrap().catalog();
        let scopes: Vec<_> = catalog.all_scopes().collect();
        assert_eq!(scopes, vec!["posts.delete", "posts.publish", "posts.read"]);
    }

    #[test]
    fn find_by_handler_or_resource() {
        let manifest = Manifest::from_toml(MANIFEST).unwrap();
        assert!(manifest.find("PostViewSet").is_some());
        assert!(manifest.find("posts").is_some());
        assert!(manifest.find("comments").is_none());
    }

    #[test]
    fn empty_manifest() {
        assert!(Manifest::from_toml("").unwrap().catalog().is_empty());
    }

    #[test]
    fn flags_unknown_scopes() {
        let catalog = Manifest::from_toml(MANIFEST).unwrap().catalog();
        let requested = vec!["posts.read".to_string(), "posts.write".to_string()];
        assert_eq!(unknown_scopes(&catalog, &requested), vec!["posts.write"]);
    }
}
