//! Client for the Copernicus Data Space Ecosystem: identity, OData catalog and zipper endpoints.
mod auth;
mod catalog;
mod provider;

pub use auth::{request_token, AccessToken};
pub use catalog::{search, CatalogEntry, CatalogQuery, MatchPolicy};
pub use provider::Provider;
