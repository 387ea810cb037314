use std::path::Path;

use anyhow::Result;

use super::npm::NpmLockExtractor;
use super::{has_dir_and_file_name, DepFile, Extractor};
use crate::models::PackageDetails;

/// `node_modules/.package-lock.json` — the hidden lockfile npm maintains
/// inside an installed tree. Same shape as `package-lock.json`, so the npm
/// extractor does the actual work.
pub struct NodeModulesExtractor;

impl Extractor for NodeModulesExtractor {
    fn should_extract(&self, path: &Path) -> bool {
        has_dir_and_file_name(path, "node_modules", ".package-lock.json")
    }

    fn extract(&self, file: &DepFile) -> Result<Vec<PackageDetails>> {
        NpmLockExtractor.extract(file)
    }
}
