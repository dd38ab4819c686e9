//! Release and artifact model shared by all catalog shapes

use serde::Deserialize;

use crate::version::GoVersion;

/// The only 32-bit ARM variant upstream publishes binaries for.
const ARM_BINARY_ARCH: &str = "armv6l";

/// What a downloadable file contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// `.tar.gz` or `.zip` holding a ready-to-use `go/` tree
    Archive,
    /// `.msi` / `.pkg` platform installer
    Installer,
    /// Source-only bundle
    Source,
    #[serde(other)]
    Other,
}

/// One downloadable file of a release
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Artifact {
    pub filename: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub sha256: String,
    #[serde(default)]
    pub size: u64,
    pub kind: ArtifactKind,
}

/// A published release and its files
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    /// Upstream version string, e.g. `go1.21.0`
    pub version: String,
    #[serde(default)]
    pub stable: bool,
    #[serde(default)]
    pub files: Vec<Artifact>,
}

impl Release {
    /// Parses the release version, accepting the upstream `go` prefix
    pub fn go_version(&self) -> Option<GoVersion> {
        let raw = self.version.strip_prefix("go").unwrap_or(&self.version);
        GoVersion::parse(raw).ok()
    }

    /// Finds the installable archive for `os`/`arch`
    ///
    /// Installers and source bundles never match. Windows only accepts `.zip`,
    /// every other OS only `.tar.gz`. A request for `arm` is served by the
    /// `armv6l` build and nothing else.
    pub fn find_artifact(&self, os: &str, arch: &str) -> Option<&Artifact> {
        let arch = binary_arch(arch);
        let extension = archive_extension(os);

        self.files.iter().find(|file| {
            file.kind == ArtifactKind::Archive
                && file.os == os
                && file.arch == arch
                && file.filename.len() > extension.len()
                && file.filename.ends_with(extension)
        })
    }
}

/// Maps a requested architecture to the one binaries are published under
pub fn binary_arch(arch: &str) -> &str {
    if arch == "arm" { ARM_BINARY_ARCH } else { arch }
}

/// Archive extension binaries for `os` are published with
pub fn archive_extension(os: &str) -> &'static str {
    if os == "windows" { ".zip" } else { ".tar.gz" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn artifact(filename: &str, os: &str, arch: &str, kind: ArtifactKind) -> Artifact {
        Artifact {
            filename: filename.to_string(),
            os: os.to_string(),
            arch: arch.to_string(),
            version: "go1.21.0".to_string(),
            sha256: String::new(),
            size: 0,
            kind,
        }
    }

    fn release() -> Release {
        Release {
            version: "go1.21.0".to_string(),
            stable: true,
            files: vec![
                artifact("go1.21.0.src.tar.gz", "", "", ArtifactKind::Source),
                artifact("go1.21.0.darwin-amd64.pkg", "darwin", "amd64", ArtifactKind::Installer),
                artifact("go1.21.0.darwin-amd64.tar.gz", "darwin", "amd64", ArtifactKind::Archive),
                artifact("go1.21.0.linux-amd64.tar.gz", "linux", "amd64", ArtifactKind::Archive),
                artifact("go1.21.0.linux-armv6l.tar.gz", "linux", "armv6l", ArtifactKind::Archive),
                artifact("go1.21.0.windows-amd64.msi", "windows", "amd64", ArtifactKind::Installer),
                artifact("go1.21.0.windows-amd64.zip", "windows", "amd64", ArtifactKind::Archive),
                artifact("go1.21.0.windows-386.tar.gz", "windows", "386", ArtifactKind::Archive),
            ],
        }
    }

    #[rstest]
    #[case("linux", "amd64", Some("go1.21.0.linux-amd64.tar.gz"))]
    #[case("darwin", "amd64", Some("go1.21.0.darwin-amd64.tar.gz"))]
    #[case("windows", "amd64", Some("go1.21.0.windows-amd64.zip"))]
    #[case("linux", "arm", Some("go1.21.0.linux-armv6l.tar.gz"))]
    #[case("linux", "armv6l", Some("go1.21.0.linux-armv6l.tar.gz"))]
    #[case("windows", "386", None)] // windows only accepts zip
    #[case("linux", "arm64", None)]
    #[case("freebsd", "amd64", None)]
    fn find_artifact_matches_os_arch_kind_and_extension(
        #[case] os: &str,
        #[case] arch: &str,
        #[case] expected: Option<&str>,
    ) {
        let release = release();
        let found = release.find_artifact(os, arch).map(|a| a.filename.as_str());
        assert_eq!(found, expected);
    }

    #[test]
    fn find_artifact_is_deterministic() {
        let release = release();
        let first = release.find_artifact("linux", "amd64");
        for _ in 0..5 {
            assert_eq!(release.find_artifact("linux", "amd64"), first);
        }
    }

    #[test]
    fn find_artifact_rejects_other_arm_variants() {
        let release = Release {
            version: "go1.21.0".to_string(),
            stable: true,
            files: vec![artifact(
                "go1.21.0.linux-armv7l.tar.gz",
                "linux",
                "armv7l",
                ArtifactKind::Archive,
            )],
        };
        assert_eq!(release.find_artifact("linux", "arm"), None);
    }

    #[rstest]
    #[case("go1.21.0", Some("1.21.0"))]
    #[case("go1.21rc2", Some("1.21rc2"))]
    #[case("1.20", Some("1.20"))]
    #[case("gofoo", None)]
    fn go_version_strips_prefix(#[case] raw: &str, #[case] expected: Option<&str>) {
        let release = Release {
            version: raw.to_string(),
            stable: true,
            files: vec![],
        };
        assert_eq!(
            release.go_version().map(|v| v.literal().to_string()),
            expected.map(str::to_string)
        );
    }

    #[test]
    fn deserializes_go_dev_release_json() {
        let json = r#"{
            "version": "go1.21.0",
            "stable": true,
            "files": [
                {"filename": "go1.21.0.linux-amd64.tar.gz", "os": "linux", "arch": "amd64",
                 "version": "go1.21.0", "sha256": "abc", "size": 66, "kind": "archive"},
                {"filename": "go1.21.0.src.tar.gz", "os": "", "arch": "", "version": "go1.21.0",
                 "sha256": "def", "size": 26, "kind": "source"},
                {"filename": "go1.21.0.weird", "os": "", "arch": "", "kind": "checksum"}
            ]
        }"#;

        let release: Release = serde_json::from_str(json).unwrap();

        assert_eq!(release.files.len(), 3);
        assert_eq!(release.files[0].kind, ArtifactKind::Archive);
        assert_eq!(release.files[0].size, 66);
        assert_eq!(release.files[1].kind, ArtifactKind::Source);
        assert_eq!(release.files[2].kind, ArtifactKind::Other);
    }
}
