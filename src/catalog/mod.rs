//! Binary release catalogs
//!
//! Upstream publishes prebuilt Go archives in one of two shapes, depending on
//! the deployment:
//!
//! - [`json`]: the `go.dev/dl/?mode=json` release list, one entry per release
//!   with its files
//! - [`listing`]: a bucket-style XML object listing, paginated with a marker
//!
//! Both implement [`CatalogClient`], so callers never branch on the shape.
//! [`release`] holds the shared release/artifact model and artifact matching.

pub mod client;
pub mod error;
pub mod json;
pub mod listing;
pub mod release;

pub use client::{CatalogClient, from_config};
pub use error::CatalogError;
pub use json::JsonCatalog;
pub use listing::ListingCatalog;
pub use release::{Artifact, ArtifactKind, Release};
