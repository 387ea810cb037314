//! Normalized data model shared by the extractors, matchers and renderers.

pub mod ecosystem;
pub mod reachability;
pub mod results;

pub use ecosystem::{DepGroup, Ecosystem, PackageManager};

use serde::{Deserialize, Serialize};

use crate::position::FilePosition;

/// Where a package record originated (the scanned lockfile path, rewritten
/// relative to the scan root before aggregation).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub path: String,
}

impl std::fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)
    }
}

/// One discovered dependency, normalized across all lockfile formats.
///
/// `name` is non-empty unless the record is a commit-only VCS reference.
/// Positions are backfilled by a matcher when a companion manifest exists;
/// absent positions stay `None` rather than zero-valued.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageDetails {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub commit: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub purl: String,
    pub ecosystem: Ecosystem,
    pub package_manager: PackageManager,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dep_groups: Vec<DepGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_location: Option<FilePosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_location: Option<FilePosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_location: Option<FilePosition>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_direct: bool,
    /// Parent→child edges; only a few formats provide them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<PackageDetails>,
    #[serde(default)]
    pub source: SourceInfo,
}

impl PackageDetails {
    pub fn is_version_empty(&self) -> bool {
        self.version.is_empty()
    }
}

/// A build artifact discovered next to a lockfile (a Gradle module, for
/// example), with an optional edge to the artifact it depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedArtifact {
    #[serde(flatten)]
    pub detail: ArtifactDetail,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<ArtifactDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDetail {
    pub name: String,
    pub version: String,
    pub filename: String,
    pub ecosystem: Ecosystem,
}
