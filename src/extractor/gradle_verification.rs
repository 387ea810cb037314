use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{has_dir_and_file_name, DepFile, Extractor};
use crate::models::ecosystem::ECOSYSTEM_MAVEN;
use crate::models::{Ecosystem, PackageDetails, PackageManager};

/// `gradle/verification-metadata.xml`: the dependency-verification manifest
/// Gradle writes under the project's `gradle/` directory.
#[derive(Debug, Deserialize)]
struct VerificationMetadataFile {
    #[serde(default)]
    components: Components,
}

#[derive(Debug, Default, Deserialize)]
struct Components {
    #[serde(default, rename = "component")]
    components: Vec<Component>,
}

#[derive(Debug, Deserialize)]
struct Component {
    #[serde(rename = "@group")]
    group: String,
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@version")]
    version: String,
}

pub struct GradleVerificationMetadataExtractor;

impl Extractor for GradleVerificationMetadataExtractor {
    fn should_extract(&self, path: &Path) -> bool {
        has_dir_and_file_name(path, "gradle", "verification-metadata.xml")
    }

    fn extract(&self, file: &DepFile) -> Result<Vec<PackageDetails>> {
        let parsed: VerificationMetadataFile = quick_xml::de::from_str(&file.content)
            .with_context(|| format!("could not extract from {}", file.path.display()))?;

        Ok(parsed
            .components
            .components
            .into_iter()
            .map(|component| PackageDetails {
                name: format!("{}:{}", component.group, component.name),
                version: component.version,
                ecosystem: Ecosystem::from(ECOSYSTEM_MAVEN),
                package_manager: PackageManager::Gradle,
                ..Default::default()
            })
            .collect())
    }
}
