//! Feed a previous scan's JSON output back in as a package source. Only used
//! when requested explicitly as `scan-results:<path>`.

use std::path::Path;

use anyhow::{Context, Result};

use super::{DepFile, Extractor};
use crate::models::results::VulnerabilityResults;
use crate::models::{Ecosystem, PackageDetails, PackageManager};

pub struct ScanResultsExtractor;

impl Extractor for ScanResultsExtractor {
    fn should_extract(&self, _path: &Path) -> bool {
        // Results are plain .json files; never claim them implicitly.
        false
    }

    fn extract(&self, file: &DepFile) -> Result<Vec<PackageDetails>> {
        let parsed: VulnerabilityResults = serde_json::from_str(&file.content)
            .with_context(|| format!("could not extract from {}", file.path.display()))?;

        let mut packages = Vec::new();

        for source in parsed.results {
            for pkg in source.packages {
                let info = pkg.package;
                if !info.commit.is_empty() {
                    // A commit pin is the strongest identity we have.
                    packages.push(PackageDetails {
                        name: info.name,
                        commit: info.commit,
                        package_manager: PackageManager::Unknown,
                        ..Default::default()
                    });
                } else {
                    packages.push(PackageDetails {
                        name: info.name,
                        version: info.version,
                        ecosystem: Ecosystem::from(info.ecosystem),
                        package_manager: PackageManager::Unknown,
                        ..Default::default()
                    });
                }
            }
        }

        Ok(packages)
    }
}
