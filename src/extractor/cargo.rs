use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{has_file_name, DepFile, Extractor};
use crate::models::ecosystem::ECOSYSTEM_CRATES_IO;
use crate::models::{Ecosystem, PackageDetails, PackageManager};

#[derive(Debug, Deserialize)]
struct CargoLockFile {
    #[serde(default)]
    package: Vec<CargoLockPackage>,
}

#[derive(Debug, Deserialize)]
struct CargoLockPackage {
    name: String,
    version: String,
}

pub struct CargoLockExtractor;

impl Extractor for CargoLockExtractor {
    fn should_extract(&self, path: &Path) -> bool {
        has_file_name(path, "Cargo.lock")
    }

    fn extract(&self, file: &DepFile) -> Result<Vec<PackageDetails>> {
        let parsed: CargoLockFile = toml::from_str(&file.content)
            .with_context(|| format!("could not extract from {}", file.path.display()))?;

        Ok(parsed
            .package
            .into_iter()
            .map(|package| PackageDetails {
                name: package.name,
                version: package.version,
                ecosystem: Ecosystem::from(ECOSYSTEM_CRATES_IO),
                package_manager: PackageManager::Crates,
                ..Default::default()
            })
            .collect())
    }
}
