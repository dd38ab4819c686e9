//! Version model
//!
//! - [`go_version`]: parsing, ordering and display of Go versions, including
//!   the `tip` sentinel
//! - [`available`]: a version annotated with the catalogs that can provide it

pub mod available;
pub mod go_version;

pub use available::AvailableVersion;
pub use go_version::{GoVersion, VersionParseError};

