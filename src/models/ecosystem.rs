use std::fmt;

use serde::{Deserialize, Serialize};

/// Package ecosystem tag. Open-ended: most values come from the fixed set
/// below, but input formats such as CSV may carry arbitrary ecosystem names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ecosystem(String);

pub const ECOSYSTEM_NPM: &str = "npm";
pub const ECOSYSTEM_PYPI: &str = "PyPI";
pub const ECOSYSTEM_RUBYGEMS: &str = "RubyGems";
pub const ECOSYSTEM_CRATES_IO: &str = "crates.io";
pub const ECOSYSTEM_PACKAGIST: &str = "Packagist";
pub const ECOSYSTEM_MAVEN: &str = "Maven";
pub const ECOSYSTEM_NUGET: &str = "NuGet";
pub const ECOSYSTEM_PUB: &str = "Pub";
pub const ECOSYSTEM_CONAN_CENTER: &str = "ConanCenter";
pub const ECOSYSTEM_CRAN: &str = "CRAN";
pub const ECOSYSTEM_GO: &str = "Go";

impl Ecosystem {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `groups` indicates a development-only dependency for this
    /// ecosystem. Each ecosystem has its own notion of "dev":
    ///
    /// - npm: every group is `dev` or `optional`, and `dev` is present
    /// - Packagist / PyPI / Pub / NuGet: every group is exactly `dev`
    /// - ConanCenter: every group is exactly `build-requires`
    /// - Maven (and Gradle): every group has a `test` prefix
    /// - RubyGems: every group is a known Bundler development group
    /// - anything else: never
    pub fn is_dev_group(&self, groups: &[DepGroup]) -> bool {
        match self.as_str() {
            ECOSYSTEM_NPM => is_npm_dev_group(groups),
            ECOSYSTEM_PACKAGIST | ECOSYSTEM_PYPI | ECOSYSTEM_PUB | ECOSYSTEM_NUGET => {
                all_groups_equal(groups, DEP_GROUP_DEV)
            }
            ECOSYSTEM_CONAN_CENTER => all_groups_equal(groups, DEP_GROUP_BUILD_REQUIRES),
            ECOSYSTEM_MAVEN => is_maven_dev_group(groups),
            ECOSYSTEM_RUBYGEMS => is_bundler_dev_group(groups),
            _ => false,
        }
    }
}

impl From<&str> for Ecosystem {
    fn from(value: &str) -> Self {
        Ecosystem(value.to_string())
    }
}

impl From<String> for Ecosystem {
    fn from(value: String) -> Self {
        Ecosystem(value)
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn is_npm_dev_group(groups: &[DepGroup]) -> bool {
    if groups.is_empty() {
        return false;
    }

    let mut contains_dev = false;
    for group in groups {
        if group.as_str() != DEP_GROUP_DEV && group.as_str() != DEP_GROUP_OPTIONAL {
            return false;
        }
        if group.as_str() == DEP_GROUP_DEV {
            contains_dev = true;
        }
    }

    contains_dev
}

/// Maven and Gradle mark test-only dependencies with `test`-prefixed scopes
/// (`testRuntimeClasspath`, `testCompileClasspath`, ...).
fn is_maven_dev_group(groups: &[DepGroup]) -> bool {
    !groups.is_empty()
        && groups
            .iter()
            .all(|g| g.as_str().to_lowercase().starts_with("test"))
}

fn is_bundler_dev_group(groups: &[DepGroup]) -> bool {
    !groups.is_empty()
        && groups
            .iter()
            .all(|g| KNOWN_BUNDLER_DEVELOPMENT_GROUPS.contains(&g.as_str()))
}

fn all_groups_equal(groups: &[DepGroup], dev_group_name: &str) -> bool {
    !groups.is_empty() && groups.iter().all(|g| g.as_str() == dev_group_name)
}

/// The package manager a dependency record was discovered through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    #[default]
    Unknown,
    Bundler,
    Crates,
    Gradle,
    Npm,
    NuGet,
    Pdm,
    Pipenv,
    Renv,
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PackageManager::Unknown => "unknown",
            PackageManager::Bundler => "bundler",
            PackageManager::Crates => "crates",
            PackageManager::Gradle => "gradle",
            PackageManager::Npm => "npm",
            PackageManager::NuGet => "nuget",
            PackageManager::Pdm => "pdm",
            PackageManager::Pipenv => "pipenv",
            PackageManager::Renv => "renv",
        };
        write!(f, "{name}")
    }
}

/// A dependency-group tag such as `dev`, `optional` or a Gradle classpath
/// scope. Free-form, ordered within a package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepGroup(String);

pub const DEP_GROUP_DEV: &str = "dev";
pub const DEP_GROUP_PROD: &str = "prod";
pub const DEP_GROUP_OPTIONAL: &str = "optional";
pub const DEP_GROUP_TEST: &str = "test";
pub const DEP_GROUP_BUILD_REQUIRES: &str = "build-requires";

/// Source: https://www.bundler.cn/guides/groups.html
const KNOWN_BUNDLER_DEVELOPMENT_GROUPS: &[&str] =
    &["dev", "development", "test", "ci", "cucumber", "linting", "rubocop"];

/// The scope names that may appear after `=` in a Gradle lockfile line.
/// Scope lists are resolved against this table with exact string lookup.
const KNOWN_DEP_GROUPS: &[&str] = &[
    DEP_GROUP_DEV,
    DEP_GROUP_PROD,
    DEP_GROUP_OPTIONAL,
    DEP_GROUP_TEST,
    "requires",
    DEP_GROUP_BUILD_REQUIRES,
    "python-requires",
    "developmentOnly",
    "runtimeClasspath",
    "compileClasspath",
    "testCompileClasspath",
    "testRuntimeClasspath",
    "annotationProcessor",
    "productionRuntimeClasspath",
];

impl DepGroup {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Look up a dependency group by its exact name, returning `None` for
    /// names outside the known table.
    pub fn from_known_name(name: &str) -> Option<DepGroup> {
        KNOWN_DEP_GROUPS
            .iter()
            .find(|known| **known == name)
            .map(|known| DepGroup::from(*known))
    }
}

impl From<&str> for DepGroup {
    fn from(value: &str) -> Self {
        DepGroup(value.to_string())
    }
}

impl From<String> for DepGroup {
    fn from(value: String) -> Self {
        DepGroup(value)
    }
}

impl fmt::Display for DepGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Union of two group lists, deduplicated, shortest tag first (ties broken
/// lexicographically so the result is deterministic).
pub fn merge_dep_groups(first: &[DepGroup], second: &[DepGroup]) -> Vec<DepGroup> {
    let mut merged: Vec<DepGroup> = first
        .iter()
        .chain(second.iter())
        .cloned()
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();
    merged.sort_by_key(|g| g.as_str().len());

    merged
}
