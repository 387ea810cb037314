use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{has_file_name, DepFile, Extractor};
use crate::models::ecosystem::ECOSYSTEM_PYPI;
use crate::models::{DepGroup, Ecosystem, PackageDetails, PackageManager};

/// `Pipfile.lock`: pinned versions split across a `default` and a `develop`
/// section. Versions are recorded as `==x.y.z` specifiers.
#[derive(Debug, Deserialize)]
struct PipenvLock {
    #[serde(default)]
    default: BTreeMap<String, PipenvPackage>,
    #[serde(default)]
    develop: BTreeMap<String, PipenvPackage>,
}

#[derive(Debug, Deserialize)]
struct PipenvPackage {
    #[serde(default)]
    version: String,
}

pub struct PipenvLockExtractor;

impl Extractor for PipenvLockExtractor {
    fn should_extract(&self, path: &Path) -> bool {
        has_file_name(path, "Pipfile.lock")
    }

    fn extract(&self, file: &DepFile) -> Result<Vec<PackageDetails>> {
        let parsed: PipenvLock = serde_json::from_str(&file.content)
            .with_context(|| format!("could not extract from {}", file.path.display()))?;

        let mut details: BTreeMap<String, PackageDetails> = BTreeMap::new();

        // `default` first: a package in both sections keeps its non-dev
        // grouping (first-seen wins on the name@version key).
        add_packages(&mut details, &parsed.default, None);
        add_packages(&mut details, &parsed.develop, Some(DepGroup::from("dev")));

        Ok(details.into_values().collect())
    }
}

fn add_packages(
    details: &mut BTreeMap<String, PackageDetails>,
    packages: &BTreeMap<String, PipenvPackage>,
    group: Option<DepGroup>,
) {
    for (name, package) in packages {
        let Some(version) = package.version.strip_prefix("==") else {
            // Entries without a pinned `==` version (path/VCS installs)
            // carry nothing we can report.
            continue;
        };
        if version.is_empty() {
            continue;
        }

        let key = format!("{name}@{version}");
        details.entry(key).or_insert_with(|| PackageDetails {
            name: name.clone(),
            version: version.to_string(),
            ecosystem: Ecosystem::from(ECOSYSTEM_PYPI),
            package_manager: PackageManager::Pipenv,
            dep_groups: group.clone().into_iter().collect(),
            ..Default::default()
        });
    }
}
