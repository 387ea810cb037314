//! NuGet `packages.lock.json`: dependencies nested per target framework.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use super::{has_file_name, DepFile, Extractor};
use crate::models::ecosystem::ECOSYSTEM_NUGET;
use crate::models::{Ecosystem, PackageDetails, PackageManager};

#[derive(Debug, Deserialize)]
struct NuGetLockfile {
    version: i64,
    #[serde(default)]
    dependencies: BTreeMap<String, BTreeMap<String, NuGetLockPackage>>,
}

#[derive(Debug, Deserialize)]
struct NuGetLockPackage {
    #[serde(default)]
    resolved: String,
    #[serde(default, rename = "type")]
    dependency_type: String,
}

const PROJECT_DEPENDENCY_TYPE: &str = "Project";

pub struct NuGetLockExtractor;

impl Extractor for NuGetLockExtractor {
    fn should_extract(&self, path: &Path) -> bool {
        has_file_name(path, "packages.lock.json")
    }

    fn extract(&self, file: &DepFile) -> Result<Vec<PackageDetails>> {
        let parsed: NuGetLockfile = serde_json::from_str(&file.content)
            .with_context(|| format!("could not extract from {}", file.path.display()))?;

        if parsed.version != 1 && parsed.version != 2 {
            bail!(
                "could not extract from {}: unsupported lock file version {}",
                file.path.display(),
                parsed.version
            );
        }

        // Frameworks may declare the same dependency; de-duplicate by
        // name@version, first framework (alphabetically) wins.
        let mut details: BTreeMap<String, PackageDetails> = BTreeMap::new();

        for dependencies in parsed.dependencies.values() {
            for (name, dependency) in dependencies {
                // Project-type entries are local workspace references, not
                // external packages.
                if dependency.dependency_type.eq_ignore_ascii_case(PROJECT_DEPENDENCY_TYPE) {
                    continue;
                }

                let key = format!("{name}@{}", dependency.resolved);
                details.entry(key).or_insert_with(|| PackageDetails {
                    name: name.clone(),
                    version: dependency.resolved.clone(),
                    ecosystem: Ecosystem::from(ECOSYSTEM_NUGET),
                    package_manager: PackageManager::NuGet,
                    is_direct: dependency.dependency_type == "Direct",
                    ..Default::default()
                });
            }
        }

        Ok(details.into_values().collect())
    }
}
