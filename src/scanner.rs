//! Directory scanning: walk the tree, resolve an extractor per file, and
//! aggregate everything into the flat package/artifact lists the rest of the
//! pipeline consumes.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use ignore::gitignore::GitignoreBuilder;
use ignore::WalkBuilder;

use crate::error::ScanError;
use crate::extractor::{extract_with, DepFile, ExtractorRegistry, Lockfile};
use crate::models::{PackageDetails, ScannedArtifact, SourceInfo};
use crate::position::to_relative_path;
use crate::purl;

/// Everything the CLI hands to the scan pipeline.
#[derive(Debug, Default)]
pub struct ScannerActions {
    pub directory_paths: Vec<PathBuf>,
    /// Explicit lockfiles, optionally prefixed `format:`.
    pub lockfile_paths: Vec<String>,
    pub recursive: bool,
    pub no_ignore: bool,
    pub enable_parsers: Vec<String>,
    pub quiet: bool,
}

/// Scan every requested directory and explicit lockfile.
///
/// Returns the flat package list (sources rewritten relative to their scan
/// root), the scanned artifacts, and the reasons for any packages dropped
/// during sanitization.
pub fn scan(
    registry: &ExtractorRegistry,
    actions: &ScannerActions,
) -> Result<(Vec<PackageDetails>, Vec<ScannedArtifact>, Vec<String>)> {
    let enabled: HashSet<String> = actions.enable_parsers.iter().cloned().collect();

    let mut scanned_packages = Vec::new();
    let mut scanned_artifacts = Vec::new();

    for lockfile_arg in &actions.lockfile_paths {
        let lockfile = scan_explicit_lockfile(registry, lockfile_arg, &enabled, actions.quiet)?;
        collect_lockfile(lockfile, &mut scanned_packages, &mut scanned_artifacts);
    }

    for dir in &actions.directory_paths {
        if !actions.quiet {
            eprintln!("Scanning dir {}", dir.display());
        }

        let dir = dir
            .canonicalize()
            .with_context(|| format!("could not resolve {}", dir.display()))?;

        let (mut packages, mut artifacts) = scan_dir(
            registry,
            &dir,
            actions.recursive,
            !actions.no_ignore,
            &enabled,
            actions.quiet,
        )?;

        // Paths in the output are relative to the directory that was scanned.
        for package in &mut packages {
            package.source.path = to_relative_path(&dir, &package.source.path);
            for location in [
                &mut package.block_location,
                &mut package.name_location,
                &mut package.version_location,
            ]
            .into_iter()
            .flatten()
            {
                location.filename = to_relative_path(&dir, &location.filename);
            }
        }
        for artifact in &mut artifacts {
            artifact.detail.filename = to_relative_path(&dir, &artifact.detail.filename);
            if let Some(depends_on) = &mut artifact.depends_on {
                depends_on.filename = to_relative_path(&dir, &depends_on.filename);
            }
        }

        scanned_packages.append(&mut packages);
        scanned_artifacts.append(&mut artifacts);
    }

    if scanned_packages.is_empty() {
        return Err(ScanError::NoPackagesFound.into());
    }

    let (scanned_packages, dropped_reasons) = sanitize_scanned_packages(scanned_packages);

    Ok((scanned_packages, scanned_artifacts, dropped_reasons))
}

/// Parse one `[format:]path` argument. A format prefix selects the parser by
/// registered name (unknown names are a hard error); without one the path
/// goes through auto-detection.
fn scan_explicit_lockfile(
    registry: &ExtractorRegistry,
    lockfile_arg: &str,
    enabled: &HashSet<String>,
    quiet: bool,
) -> Result<Lockfile> {
    let (format, path) = parse_lockfile_arg(lockfile_arg);
    let file = DepFile::open(Path::new(path))?;

    let lockfile = match format {
        Some(name) => {
            let extractor = registry.find_by_name(name)?;
            extract_with(extractor, name, &file)?
        }
        None => registry.extract_deps(&file, enabled)?,
    };

    if !quiet {
        eprintln!(
            "Scanned {} file as a {} lockfile and found {} {}",
            lockfile.file_path,
            lockfile.parsed_as,
            lockfile.packages.len(),
            if lockfile.packages.len() == 1 { "package" } else { "packages" },
        );
    }

    Ok(lockfile)
}

/// Split `format:path`, leaving plain paths untouched. Windows drive letters
/// (`C:\...`) are not format prefixes.
fn parse_lockfile_arg(arg: &str) -> (Option<&str>, &str) {
    match arg.split_once(':') {
        Some((format, path)) if format.len() > 1 => (Some(format), path),
        _ => (None, arg),
    }
}

fn collect_lockfile(
    lockfile: Lockfile,
    packages: &mut Vec<PackageDetails>,
    artifacts: &mut Vec<ScannedArtifact>,
) {
    let source_path = lockfile.file_path;
    packages.extend(lockfile.packages.into_iter().map(|mut package| {
        package.source = SourceInfo {
            path: source_path.clone(),
        };
        package
    }));
    if let Some(artifact) = lockfile.artifact {
        artifacts.push(artifact);
    }
}

/// Walk `dir` depth-first, extracting every file an extractor claims.
///
/// `.git` directories are always pruned. A failed extraction logs a warning
/// and the walk continues; one bad lockfile must not abort the scan.
fn scan_dir(
    registry: &ExtractorRegistry,
    dir: &Path,
    recursive: bool,
    use_git_ignore: bool,
    enabled: &HashSet<String>,
    quiet: bool,
) -> Result<(Vec<PackageDetails>, Vec<ScannedArtifact>)> {
    if use_git_ignore {
        warn_if_root_ignored(dir);
    }

    let mut packages = Vec::new();
    let mut artifacts = Vec::new();

    let walker = WalkBuilder::new(dir)
        .hidden(false)
        .git_ignore(use_git_ignore)
        .git_exclude(use_git_ignore)
        .parents(use_git_ignore)
        .git_global(false)
        .require_git(false)
        .follow_links(false)
        .max_depth(if recursive { None } else { Some(1) })
        .filter_entry(|entry| {
            !(entry.file_type().is_some_and(|t| t.is_dir()) && entry.file_name() == ".git")
        })
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                eprintln!("  {} failed to walk: {err}", "⚠".yellow());
                continue;
            }
        };
        if entry.file_type().is_some_and(|t| t.is_dir()) {
            continue;
        }

        let path = entry.path();
        if registry.find_extractor(path, enabled).is_none() {
            continue;
        }

        match scan_lockfile(registry, path, enabled, quiet) {
            Ok(lockfile) => collect_lockfile(lockfile, &mut packages, &mut artifacts),
            Err(err) => {
                eprintln!(
                    "  {} attempted to scan lockfile but failed: {} ({err:#})",
                    "⚠".yellow(),
                    path.display()
                );
            }
        }
    }

    Ok((packages, artifacts))
}

fn scan_lockfile(
    registry: &ExtractorRegistry,
    path: &Path,
    enabled: &HashSet<String>,
    quiet: bool,
) -> Result<Lockfile> {
    let file = DepFile::open(path)?;
    let lockfile = registry.extract_deps(&file, enabled)?;

    if !quiet {
        eprintln!(
            "  {} {} {} {}",
            "→".cyan(),
            path.display(),
            lockfile.packages.len(),
            if lockfile.packages.len() == 1 { "package" } else { "packages" },
        );
    }

    Ok(lockfile)
}

/// The root argument being gitignored would silently produce an empty scan;
/// surface that loudly instead.
fn warn_if_root_ignored(dir: &Path) {
    let Some(repo_root) = dir.ancestors().find(|a| a.join(".git").exists()) else {
        return;
    };
    if repo_root == dir {
        return;
    }

    let mut builder = GitignoreBuilder::new(repo_root);
    let mut ancestors: Vec<&Path> = dir
        .ancestors()
        .take_while(|a| a.starts_with(repo_root))
        .collect();
    ancestors.reverse();
    for ancestor in ancestors {
        let gitignore = ancestor.join(".gitignore");
        if gitignore.exists() {
            builder.add(gitignore);
        }
    }

    if let Ok(matcher) = builder.build() {
        if matcher.matched_path_or_any_parents(dir, true).is_ignore() {
            eprintln!(
                "{} {} was not scanned because it is excluded by a .gitignore file. Use --no-ignore to scan it.",
                "✗".red(),
                dir.display()
            );
        }
    }
}

/// Drop packages the downstream pipeline cannot represent:
///
/// 1. ranged versions (`<`, `>`, `,`) — unsupported for now
/// 2. packages for which no PURL can be built
///
/// Each drop contributes one human-readable reason; the scan itself never
/// fails over them.
pub fn sanitize_scanned_packages(
    scanned_packages: Vec<PackageDetails>,
) -> (Vec<PackageDetails>, Vec<String>) {
    let mut final_packages = Vec::with_capacity(scanned_packages.len());
    let mut dropped_reasons = Vec::new();

    for mut package in scanned_packages {
        if package_has_ranged_version(&package) {
            dropped_reasons.push(format!(
                "package {} has a ranged version {}",
                package.name, package.version
            ));
            continue;
        }

        match purl::from_name_version_ecosystem(
            &package.name,
            &package.version,
            package.ecosystem.as_str(),
        ) {
            Ok(package_url) => package.purl = package_url.to_purl_string(),
            Err(err) => {
                dropped_reasons.push(format!("failed to create PURL for {}: {err}", package.name));
                continue;
            }
        }

        final_packages.push(package);
    }

    (final_packages, dropped_reasons)
}

fn package_has_ranged_version(package: &PackageDetails) -> bool {
    package.version.contains(['<', '>', ','])
}

/// Unique, sorted PURLs of the directly-declared packages; these are the
/// candidates for reachability analysis.
pub fn get_direct_package_purls(scanned_packages: &[PackageDetails]) -> Vec<String> {
    scanned_packages
        .iter()
        .filter(|package| package.is_direct)
        .map(|package| package.purl.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Ecosystem, PackageManager};

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    const CARGO_LOCK: &str = "version = 3\n\n[[package]]\nname = \"foo\"\nversion = \"1.0.0\"\n\n[[package]]\nname = \"bar\"\nversion = \"2.0.0\"\n";

    fn actions_for(dir: &Path) -> ScannerActions {
        ScannerActions {
            directory_paths: vec![dir.to_path_buf()],
            quiet: true,
            recursive: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_scan_dir_with_cargo_lock() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Cargo.lock", CARGO_LOCK);

        let registry = ExtractorRegistry::new();
        let (packages, artifacts, dropped) = scan(&registry, &actions_for(dir.path())).unwrap();

        assert_eq!(packages.len(), 2);
        assert!(artifacts.is_empty());
        assert!(dropped.is_empty());

        let names: Vec<&str> = packages.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"foo"));
        assert!(names.contains(&"bar"));
        for package in &packages {
            assert_eq!(package.ecosystem.as_str(), "crates.io");
            assert_eq!(package.source.path, "Cargo.lock");
            assert!(package.purl.starts_with("pkg:cargo/"));
        }
    }

    #[test]
    fn test_scan_results_grouped_by_source() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Cargo.lock", CARGO_LOCK);

        let registry = ExtractorRegistry::new();
        let (packages, artifacts, _) = scan(&registry, &actions_for(dir.path())).unwrap();
        let results = crate::aggregate::group_by_source(
            packages,
            artifacts,
            &crate::models::reachability::ReachabilityAnalysis::default(),
        );

        assert_eq!(results.results.len(), 1);
        let source = &results.results[0];
        assert_eq!(source.source.path, "Cargo.lock");
        assert_eq!(source.packages.len(), 2);
        assert_eq!(source.packages[0].package.name, "bar");
        assert_eq!(source.packages[0].package.version, "2.0.0");
        assert_eq!(source.packages[0].package.ecosystem, "crates.io");
        assert_eq!(source.packages[1].package.name, "foo");
        assert_eq!(source.packages[1].package.version, "1.0.0");
    }

    #[test]
    fn test_scan_empty_dir_returns_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("just-a-directory")).unwrap();

        let registry = ExtractorRegistry::new();
        let err = scan(&registry, &actions_for(dir.path())).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ScanError>(),
            Some(ScanError::NoPackagesFound)
        ));
    }

    #[test]
    fn test_non_recursive_scan_stops_at_first_level() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Cargo.lock", CARGO_LOCK);
        write(dir.path(), "nested/deeper/Cargo.lock", CARGO_LOCK);

        let registry = ExtractorRegistry::new();
        let mut actions = actions_for(dir.path());
        actions.recursive = false;

        let (packages, _, _) = scan(&registry, &actions).unwrap();
        assert_eq!(packages.len(), 2);
        assert!(packages.iter().all(|p| p.source.path == "Cargo.lock"));
    }

    #[test]
    fn test_bad_lockfile_does_not_abort_scan() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Cargo.lock", "not { valid toml");
        write(dir.path(), "sub/Cargo.lock", CARGO_LOCK);

        let registry = ExtractorRegistry::new();
        let (packages, _, _) = scan(&registry, &actions_for(dir.path())).unwrap();

        assert_eq!(packages.len(), 2);
        assert!(packages.iter().all(|p| p.source.path == "sub/Cargo.lock"));
    }

    #[test]
    fn test_gitignored_lockfiles_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        write(dir.path(), ".gitignore", "vendored/\n");
        write(dir.path(), "Cargo.lock", CARGO_LOCK);
        write(dir.path(), "vendored/Cargo.lock", CARGO_LOCK);

        let registry = ExtractorRegistry::new();
        let (packages, _, _) = scan(&registry, &actions_for(dir.path())).unwrap();
        assert_eq!(packages.len(), 2);
        assert!(packages.iter().all(|p| p.source.path == "Cargo.lock"));

        // With --no-ignore the vendored copy is scanned too.
        let mut actions = actions_for(dir.path());
        actions.no_ignore = true;
        let (packages, _, _) = scan(&registry, &actions).unwrap();
        assert_eq!(packages.len(), 4);
    }

    #[test]
    fn test_explicit_lockfile_with_format_prefix() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "deps.csv", "npm,npm,express,4.18.2\n");

        let registry = ExtractorRegistry::new();
        let actions = ScannerActions {
            lockfile_paths: vec![format!("csv:{}", dir.path().join("deps.csv").display())],
            quiet: true,
            ..Default::default()
        };

        let (packages, _, _) = scan(&registry, &actions).unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "express");
    }

    #[test]
    fn test_explicit_lockfile_with_unknown_format() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "deps.csv", "npm,npm,express,4.18.2\n");

        let registry = ExtractorRegistry::new();
        let actions = ScannerActions {
            lockfile_paths: vec![format!("not-a-format:{}", dir.path().join("deps.csv").display())],
            quiet: true,
            ..Default::default()
        };

        let err = scan(&registry, &actions).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScanError>(),
            Some(ScanError::UnknownParser(name)) if name == "not-a-format"
        ));
    }

    #[test]
    fn test_parse_lockfile_arg() {
        assert_eq!(parse_lockfile_arg("Cargo.lock"), (None, "Cargo.lock"));
        assert_eq!(
            parse_lockfile_arg("csv:some/file.csv"),
            (Some("csv"), "some/file.csv")
        );
        assert_eq!(parse_lockfile_arg(r"C:\lockfiles\Cargo.lock"), (None, r"C:\lockfiles\Cargo.lock"));
    }

    fn package(name: &str, version: &str, ecosystem: &str) -> PackageDetails {
        PackageDetails {
            name: name.to_string(),
            version: version.to_string(),
            ecosystem: Ecosystem::from(ecosystem),
            package_manager: PackageManager::Unknown,
            ..Default::default()
        }
    }

    #[test]
    fn test_sanitize_filters_ranged_versions() {
        let packages = vec![
            package("a", "<0.27.6", "npm"),
            package("b", ">=0.27.6", "npm"),
            package("c", ">=0.15.0,<0.16.0", "npm"),
            package("d", "1.0.0", "npm"),
        ];

        let (sanitized, reasons) = sanitize_scanned_packages(packages);
        assert_eq!(sanitized.len(), 1);
        assert_eq!(sanitized[0].name, "d");
        assert_eq!(sanitized[0].purl, "pkg:npm/d@1.0.0");
        assert_eq!(reasons.len(), 3);
        assert!(reasons[0].contains("ranged version"));
    }

    #[test]
    fn test_sanitize_drops_unbuildable_purls() {
        let packages = vec![package("a", "1.0.0", "UnknownEcosystem")];
        let (sanitized, reasons) = sanitize_scanned_packages(packages);
        assert!(sanitized.is_empty());
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("failed to create PURL"));
    }

    #[test]
    fn test_get_direct_package_purls_unique() {
        let mut a = package("a", "1.0.0", "npm");
        a.purl = "pkg:npm/a@1.0.0".to_string();
        a.is_direct = true;
        let mut b = a.clone();
        b.purl = "pkg:npm/b@2.0.0".to_string();
        let duplicate = a.clone();
        let mut transitive = package("c", "3.0.0", "npm");
        transitive.purl = "pkg:npm/c@3.0.0".to_string();

        let purls = get_direct_package_purls(&[a, b, duplicate, transitive]);
        assert_eq!(purls, vec!["pkg:npm/a@1.0.0", "pkg:npm/b@2.0.0"]);
    }
}
