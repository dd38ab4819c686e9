//! gvm: installs and manages Go toolchains
//!
//! Releases come from the upstream binary catalog when an archive exists for
//! the platform, and are otherwise built from a local mirror of the Go
//! repository. See [`manager::Manager`] for the entry point.

pub mod archive;
pub mod catalog;
pub mod config;
pub mod download;
pub mod manager;
pub mod process;
pub mod source;
pub mod version;
