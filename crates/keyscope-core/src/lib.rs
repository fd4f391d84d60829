//! Domain models, operation descriptors, the scope
//! catalog, and repository traits shared by every keyscope crate.

pub mod catalog;
pub mod error;
pub mod key;
pub mod models;
pub mod operation;
pub mod presentation;
pub mod repository;
pub mod scope;

pub use catalog::{Catalog, CatalogSnapshot, SharedCatalog};
pub use error::{KeyscopeError, KeyscopeResult};
pub use operation::{CustomRoute, Handler, Method, Operation};
