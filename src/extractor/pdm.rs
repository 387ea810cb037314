use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{has_file_name, DepFile, Extractor};
use crate::matcher::{pyproject::PyprojectTomlMatcher, Matcher};
use crate::models::ecosystem::ECOSYSTEM_PYPI;
use crate::models::{DepGroup, Ecosystem, PackageDetails, PackageManager};

#[derive(Debug, Deserialize)]
struct PdmLockFile {
    #[serde(default)]
    package: Vec<PdmLockPackage>,
}

#[derive(Debug, Deserialize)]
struct PdmLockPackage {
    name: String,
    version: String,
    #[serde(default)]
    groups: Vec<String>,
    #[serde(default)]
    revision: String,
}

pub struct PdmLockExtractor;

impl Extractor for PdmLockExtractor {
    fn should_extract(&self, path: &Path) -> bool {
        has_file_name(path, "pdm.lock")
    }

    fn extract(&self, file: &DepFile) -> Result<Vec<PackageDetails>> {
        let parsed: PdmLockFile = toml::from_str(&file.content)
            .with_context(|| format!("could not extract from {}", file.path.display()))?;

        let mut packages = Vec::with_capacity(parsed.package.len());

        for package in parsed.package {
            let mut groups = Vec::new();

            // A package belonging to neither the default group nor the dev
            // group is an optional extra.
            let mut optional = true;
            for group in &package.groups {
                match group.as_str() {
                    "dev" => {
                        groups.push(DepGroup::from("dev"));
                        optional = false;
                    }
                    "default" => optional = false,
                    _ => {}
                }
            }
            if optional {
                groups.push(DepGroup::from("optional"));
            }

            packages.push(PackageDetails {
                name: package.name,
                version: package.version,
                commit: package.revision,
                ecosystem: Ecosystem::from(ECOSYSTEM_PYPI),
                package_manager: PackageManager::Pdm,
                dep_groups: groups,
                ..Default::default()
            });
        }

        Ok(packages)
    }

    fn matchers(&self) -> Vec<Box<dyn Matcher>> {
        vec![Box::new(PyprojectTomlMatcher)]
    }
}
