//! Final result tree handed to the output renderers.

use serde::{Deserialize, Serialize};

use super::reachability::ReachabilityAnalysisResults;
use super::{ScannedArtifact, SourceInfo};

/// Everything a scan produced: packages grouped by originating source file,
/// plus the artifacts discovered along the way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityResults {
    pub results: Vec<PackageSource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ScannedArtifact>,
}

/// Packages grouped by the lockfile they came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageSource {
    pub source: SourceInfo,
    pub packages: Vec<PackageVulns>,
}

/// One package in the final output, denormalized for rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageVulns {
    pub package: PackageInfo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependency_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<PackageLocations>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reachability: Option<ReachabilityAnalysisResults>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    pub ecosystem: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub commit: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub purl: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_direct: bool,
}

/// Declaration spans for one package: the whole declaration block plus the
/// narrower name/version spans when a matcher recovered them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageLocations {
    pub block: PackageLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<PackageLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<PackageLocation>,
}

/// A flattened file span (1-indexed, inclusive).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageLocation {
    pub filename: String,
    pub line_start: usize,
    pub line_end: usize,
    pub column_start: usize,
    pub column_end: usize,
}

impl PackageLocation {
    pub fn from_file_position(position: &crate::position::FilePosition) -> Self {
        PackageLocation {
            filename: position.filename.clone(),
            line_start: position.line.start,
            line_end: position.line.end,
            column_start: position.column.start,
            column_end: position.column.end,
        }
    }
}
