use std::fmt;

use crate::version::GoVersion;

/// A version that can be installed, and from where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableVersion {
    pub version: GoVersion,
    /// Tagged in the local source mirror.
    pub has_source: bool,
    /// Published as a prebuilt archive for the configured os/arch.
    pub has_binary: bool,
}

impl AvailableVersion {
    pub fn source(version: GoVersion) -> Self {
        Self {
            version,
            has_source: true,
            has_binary: false,
        }
    }

    pub fn binary(version: GoVersion) -> Self {
        Self {
            version,
            has_source: false,
            has_binary: true,
        }
    }
}

impl fmt::Display for AvailableVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.has_source, self.has_binary) {
            (true, true) => write!(f, "{}\t(source, binary)", self.version),
            (true, false) => write!(f, "{}\t(source)", self.version),
            (false, true) => write!(f, "{}\t(binary)", self.version),
            (false, false) => write!(f, "{}", self.version),
        }
    }
}
