//! Installing Go from source
//!
//! - [`vcs`]: the version-control client (`git`)
//! - [`cache`]: the local mirror of the upstream repository and its freshness
//! - [`build`]: checking out a revision and running the toolchain's build script

pub mod build;
pub mod cache;
pub mod error;
pub mod vcs;

pub use build::{MakeBuilder, SourceBuilder};
pub use cache::{Clock, DEFAULT_BRANCH, SourceCache, SystemClock};
pub use error::{BuildError, SourceError};
pub use vcs::{Git, SourceControl};
