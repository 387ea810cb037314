//! Lockfile extraction: one [`Extractor`] per supported format, resolved
//! through an explicitly constructed [`ExtractorRegistry`].
//!
//! Registration is a plain ordered table built in [`ExtractorRegistry::new`];
//! there is no global mutable state, and the active extractor set is a
//! first-class value that tests can construct and trim.

pub mod cargo;
pub mod csv;
pub mod gemfile_lock;
pub mod gradle;
pub mod gradle_verification;
pub mod node_modules;
pub mod npm;
pub mod nuget;
pub mod pdm;
pub mod pipenv;
pub mod renv;
pub mod scan_results;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;

use crate::error::ScanError;
use crate::matcher::{match_with_file, Matcher};
use crate::models::{PackageDetails, ScannedArtifact};

/// A dependency file loaded into memory, with the path it came from.
#[derive(Debug, Clone)]
pub struct DepFile {
    pub path: PathBuf,
    pub content: String,
}

impl DepFile {
    pub fn open(path: &Path) -> Result<DepFile> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?;

        Ok(DepFile {
            path: path.to_path_buf(),
            content,
        })
    }

    pub fn path_string(&self) -> String {
        self.path.display().to_string()
    }
}

/// A parser for one lockfile format.
pub trait Extractor {
    /// Whether this extractor recognizes `path` (typically base-filename
    /// equality). Formats that must be requested explicitly return `false`
    /// unconditionally.
    fn should_extract(&self, path: &Path) -> bool;

    /// Parse the file into normalized package records.
    fn extract(&self, file: &DepFile) -> Result<Vec<PackageDetails>>;

    /// Matchers to run after extraction, if the format has a companion
    /// manifest.
    fn matchers(&self) -> Vec<Box<dyn Matcher>> {
        Vec::new()
    }

    /// The build artifact this lockfile belongs to, for multi-module builds.
    fn artifact(&self, _file: &DepFile) -> Option<ScannedArtifact> {
        None
    }
}

/// The outcome of parsing one dependency file.
#[derive(Debug)]
pub struct Lockfile {
    pub file_path: String,
    pub parsed_as: String,
    pub packages: Vec<PackageDetails>,
    pub artifact: Option<ScannedArtifact>,
}

/// Ordered format-name → extractor table. Exactly one extractor matches any
/// concrete path under the default table; overlap would be a configuration
/// bug, not a runtime condition.
pub struct ExtractorRegistry {
    entries: Vec<(&'static str, Box<dyn Extractor>)>,
}

impl ExtractorRegistry {
    pub fn new() -> ExtractorRegistry {
        ExtractorRegistry {
            entries: vec![
                ("Cargo.lock", Box::new(cargo::CargoLockExtractor)),
                ("Gemfile.lock", Box::new(gemfile_lock::GemfileLockExtractor)),
                ("gradle.lockfile", Box::new(gradle::GradleLockExtractor)),
                (
                    "gradle/verification-metadata.xml",
                    Box::new(gradle_verification::GradleVerificationMetadataExtractor),
                ),
                ("package-lock.json", Box::new(npm::NpmLockExtractor)),
                (
                    "node_modules/.package-lock.json",
                    Box::new(node_modules::NodeModulesExtractor),
                ),
                ("packages.lock.json", Box::new(nuget::NuGetLockExtractor)),
                ("pdm.lock", Box::new(pdm::PdmLockExtractor)),
                ("Pipfile.lock", Box::new(pipenv::PipenvLockExtractor)),
                ("renv.lock", Box::new(renv::RenvLockExtractor)),
                // Explicit-only formats: never matched by path.
                ("csv", Box::new(csv::CsvExtractor)),
                ("scan-results", Box::new(scan_results::ScanResultsExtractor)),
            ],
        }
    }

    /// Auto-detect the extractor for a path: the first registered entry
    /// whose predicate matches, skipping entries outside the allow-list when
    /// one is given.
    pub fn find_extractor(
        &self,
        path: &Path,
        enabled: &HashSet<String>,
    ) -> Option<(&dyn Extractor, &'static str)> {
        self.entries
            .iter()
            .filter(|(name, _)| enabled.is_empty() || enabled.contains(*name))
            .find(|(_, extractor)| extractor.should_extract(path))
            .map(|(name, extractor)| (extractor.as_ref(), *name))
    }

    /// Look an extractor up by its registered format name.
    pub fn find_by_name(&self, name: &str) -> Result<&dyn Extractor, ScanError> {
        self.entries
            .iter()
            .find(|(registered, _)| *registered == name)
            .map(|(_, extractor)| extractor.as_ref())
            .ok_or_else(|| ScanError::UnknownParser(name.to_string()))
    }

    pub fn extractor_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(name, _)| *name).collect()
    }

    /// Parse a dependency file end to end: auto-detect the format, extract,
    /// then run the format's matchers. Matcher failures are logged and
    /// swallowed; enrichment is never required for a scan to succeed.
    pub fn extract_deps(&self, file: &DepFile, enabled: &HashSet<String>) -> Result<Lockfile> {
        let (extractor, parsed_as) = self
            .find_extractor(&file.path, enabled)
            .ok_or_else(|| ScanError::NoParserForFile(file.path_string()))?;

        extract_with(extractor, parsed_as, file)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        ExtractorRegistry::new()
    }
}

/// Run one known extractor against a file and apply its matchers.
pub fn extract_with(extractor: &dyn Extractor, parsed_as: &str, file: &DepFile) -> Result<Lockfile> {
    let mut packages = extractor.extract(file)?;

    for matcher in extractor.matchers() {
        if let Err(err) = match_with_file(file, &mut packages, matcher.as_ref()) {
            eprintln!(
                "  {} could not enrich {} from its manifest: {err:#}",
                "⚠".yellow(),
                file.path.display()
            );
        }
    }

    Ok(Lockfile {
        file_path: file.path_string(),
        parsed_as: parsed_as.to_string(),
        packages,
        artifact: extractor.artifact(file),
    })
}

/// Base-filename equality, the predicate most formats use.
pub(crate) fn has_file_name(path: &Path, expected: &str) -> bool {
    path.file_name().and_then(|name| name.to_str()) == Some(expected)
}

/// Matches `<dir>/<expected_dir>/<expected_name>`, for formats addressed by
/// their enclosing directory as well as their filename.
pub(crate) fn has_dir_and_file_name(path: &Path, expected_dir: &str, expected_name: &str) -> bool {
    has_file_name(path, expected_name)
        && path
            .parent()
            .and_then(|parent| parent.file_name())
            .and_then(|name| name.to_str())
            == Some(expected_dir)
}
