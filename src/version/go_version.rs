//! Go version identifiers
//!
//! Go releases are named `1.4`, `1.21.0`, `1.21rc2`, `1.9beta1`. Besides
//! concrete releases there is the `tip` sentinel, the head of the source
//! history, which orders above every concrete version.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use semver::{Prerelease, Version};

const TIP: &str = "tip";

/// Minor version (of Go 1) that introduced the vendor directory experiment.
const VENDOR_MINOR: u64 = 5;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^v?(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:-([0-9A-Za-z][0-9A-Za-z.\-]*)|([A-Za-z][0-9A-Za-z.\-]*))?$",
    )
    .expect("version regex is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionParseError {
    #[error("empty version string")]
    Empty,

    #[error("malformed version: {0:?}")]
    Malformed(String),
}

/// A parsed Go version, or the `tip` sentinel.
///
/// Equality and ordering use the normalized numeric components and the
/// prerelease tag, so `1.21` and `1.21.0` are the same version. The text the
/// version was parsed from is kept as [`GoVersion::literal`] because upstream
/// tags and archive names use it verbatim.
#[derive(Debug, Clone)]
pub struct GoVersion {
    literal: String,
    kind: Kind,
}

#[derive(Debug, Clone)]
enum Kind {
    Tip,
    Release(Version),
}

impl GoVersion {
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(VersionParseError::Empty);
        }
        if input == TIP {
            return Ok(Self::tip());
        }

        let malformed = || VersionParseError::Malformed(input.to_string());
        let caps = VERSION_RE.captures(input).ok_or_else(malformed)?;

        let number = |idx: usize| -> Result<u64, VersionParseError> {
            caps.get(idx)
                .map(|m| m.as_str().parse::<u64>().map_err(|_| malformed()))
                .unwrap_or(Ok(0))
        };

        let mut version = Version::new(number(1)?, number(2)?, number(3)?);
        if let Some(pre) = caps.get(4).or_else(|| caps.get(5)) {
            version.pre = Prerelease::new(pre.as_str()).map_err(|_| malformed())?;
        }

        Ok(Self {
            literal: input.strip_prefix('v').unwrap_or(input).to_string(),
            kind: Kind::Release(version),
        })
    }

    pub fn tip() -> Self {
        Self {
            literal: TIP.to_string(),
            kind: Kind::Tip,
        }
    }

    pub fn is_tip(&self) -> bool {
        matches!(self.kind, Kind::Tip)
    }

    /// A concrete release without a prerelease tag.
    pub fn is_stable(&self) -> bool {
        match &self.kind {
            Kind::Tip => false,
            Kind::Release(v) => v.pre.is_empty(),
        }
    }

    /// The version text as it was parsed, without a leading `v`.
    pub fn literal(&self) -> &str {
        &self.literal
    }

    /// One spelling shared by every equal version: releases always carry
    /// the patch number (`1.21` and `1.21.0` are both `1.21.0`), prereleases
    /// keep Go's `1.21rc2` form.
    pub fn canonical(&self) -> String {
        match &self.kind {
            Kind::Tip => TIP.to_string(),
            Kind::Release(v) if v.pre.is_empty() => {
                format!("{}.{}.{}", v.major, v.minor, v.patch)
            }
            Kind::Release(v) if v.patch == 0 => format!("{}.{}{}", v.major, v.minor, v.pre),
            Kind::Release(v) => format!("{}.{}.{}{}", v.major, v.minor, v.patch, v.pre),
        }
    }

    /// The normalized semantic version, `None` for tip.
    pub fn semver(&self) -> Option<&Version> {
        match &self.kind {
            Kind::Tip => None,
            Kind::Release(v) => Some(v),
        }
    }

    /// Whether the vendor directory is supported, and whether it still sits
    /// behind the `GO15VENDOREXPERIMENT` toggle.
    ///
    /// Returns `(supported, experimental)`.
    pub fn vendor_support(&self) -> (bool, bool) {
        match &self.kind {
            Kind::Tip => (true, false),
            Kind::Release(v) if v.major > 1 => (true, false),
            Kind::Release(v) if v.major == 1 => {
                (v.minor >= VENDOR_MINOR, v.minor == VENDOR_MINOR)
            }
            Kind::Release(_) => (false, false),
        }
    }
}

impl FromStr for GoVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for GoVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Tip => f.write_str(TIP),
            Kind::Release(v) if !v.pre.is_empty() => write!(f, "{}.{}{}", v.major, v.minor, v.pre),
            Kind::Release(v) if v.patch == 0 => write!(f, "{}.{}", v.major, v.minor),
            Kind::Release(v) => write!(f, "{}.{}.{}", v.major, v.minor, v.patch),
        }
    }
}

impl PartialEq for GoVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GoVersion {}

impl PartialOrd for GoVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GoVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.kind, &other.kind) {
            (Kind::Tip, Kind::Tip) => Ordering::Equal,
            (Kind::Tip, Kind::Release(_)) => Ordering::Greater,
            (Kind::Release(_), Kind::Tip) => Ordering::Less,
            // build metadata is never set, so semver ordering is exactly
            // numeric components then prerelease
            (Kind::Release(a), Kind::Release(b)) => a.cmp(b),
        }
    }
}

impl std::hash::Hash for GoVersion {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match &self.kind {
            Kind::Tip => TIP.hash(state),
            Kind::Release(v) => v.hash(state),
        }
    }
}
