use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{has_file_name, DepFile, Extractor};
use crate::models::ecosystem::ECOSYSTEM_CRAN;
use crate::models::{Ecosystem, PackageDetails, PackageManager};

/// R `renv.lock`: a JSON map of packages with their originating repository.
#[derive(Debug, Deserialize)]
struct RenvLockfile {
    #[serde(default, rename = "Packages")]
    packages: BTreeMap<String, RenvPackage>,
}

#[derive(Debug, Deserialize)]
struct RenvPackage {
    #[serde(rename = "Package")]
    package: String,
    #[serde(rename = "Version")]
    version: String,
    #[serde(default, rename = "Repository")]
    repository: String,
}

pub struct RenvLockExtractor;

impl Extractor for RenvLockExtractor {
    fn should_extract(&self, path: &Path) -> bool {
        has_file_name(path, "renv.lock")
    }

    fn extract(&self, file: &DepFile) -> Result<Vec<PackageDetails>> {
        let parsed: RenvLockfile = serde_json::from_str(&file.content)
            .with_context(|| format!("could not extract from {}", file.path.display()))?;

        Ok(parsed
            .packages
            .into_values()
            // Only CRAN is supported; Bioconductor and VCS installs are not.
            .filter(|package| package.repository == ECOSYSTEM_CRAN)
            .map(|package| PackageDetails {
                name: package.package,
                version: package.version,
                ecosystem: Ecosystem::from(ECOSYSTEM_CRAN),
                package_manager: PackageManager::Renv,
                ..Default::default()
            })
            .collect())
    }
}
