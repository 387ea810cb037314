//! Final denormalization: merge the flat package list, the scanned
//! artifacts and the reachability analysis into the per-source result tree
//! the renderers consume.

use std::collections::BTreeMap;

use crate::models::reachability::ReachabilityAnalysis;
use crate::models::results::{
    PackageInfo, PackageLocation, PackageLocations, PackageSource, PackageVulns,
    VulnerabilityResults,
};
use crate::models::{ecosystem, PackageDetails, ScannedArtifact, SourceInfo};

/// Group scanned packages by their originating source file. Duplicate
/// (name, version, ecosystem) entries within one source are merged with a
/// dependency-group union; output ordering is deterministic (sources by
/// path, packages by name then version).
pub fn group_by_source(
    packages: Vec<PackageDetails>,
    artifacts: Vec<ScannedArtifact>,
    reachability: &ReachabilityAnalysis,
) -> VulnerabilityResults {
    let mut by_source: BTreeMap<String, Vec<PackageVulns>> = BTreeMap::new();

    for package in packages {
        let entries = by_source.entry(package.source.path.clone()).or_default();

        let locations = package_locations(&package);

        if let Some(existing) = entries.iter_mut().find(|entry| {
            entry.package.name == package.name
                && entry.package.version == package.version
                && entry.package.ecosystem == package.ecosystem.as_str()
        }) {
            let incoming: Vec<_> = package.dep_groups.to_vec();
            let merged = ecosystem::merge_dep_groups(
                &existing
                    .dependency_groups
                    .iter()
                    .map(|g| crate::models::DepGroup::from(g.as_str()))
                    .collect::<Vec<_>>(),
                &incoming,
            );
            existing.dependency_groups = merged.iter().map(|g| g.to_string()).collect();
            if let Some(locations) = locations {
                existing.locations.push(locations);
            }
            existing.package.is_direct = existing.package.is_direct || package.is_direct;
            continue;
        }

        entries.push(PackageVulns {
            package: PackageInfo {
                name: package.name.clone(),
                version: package.version.clone(),
                ecosystem: package.ecosystem.to_string(),
                commit: package.commit.clone(),
                purl: package.purl.clone(),
                is_direct: package.is_direct,
            },
            dependency_groups: package.dep_groups.iter().map(|g| g.to_string()).collect(),
            locations: locations.into_iter().collect(),
            reachability: reachability.purl_to_results.get(&package.purl).cloned(),
        });
    }

    let mut results = Vec::with_capacity(by_source.len());
    for (path, mut entries) in by_source {
        entries.sort_by(|a, b| {
            a.package
                .name
                .cmp(&b.package.name)
                .then(a.package.version.cmp(&b.package.version))
        });
        results.push(PackageSource {
            source: SourceInfo { path },
            packages: entries,
        });
    }

    VulnerabilityResults { results, artifacts }
}

/// Only positions that were successfully extracted make it into the output;
/// a partially-filled span is treated as absent.
fn package_locations(package: &PackageDetails) -> Option<PackageLocations> {
    let block = package.block_location.as_ref()?;
    if !block.is_extracted_successfully() {
        return None;
    }

    let narrow = |position: &Option<crate::position::FilePosition>| {
        position
            .as_ref()
            .filter(|p| p.is_extracted_successfully())
            .map(PackageLocation::from_file_position)
    };

    Some(PackageLocations {
        block: PackageLocation::from_file_position(block),
        name: narrow(&package.name_location),
        version: narrow(&package.version_location),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::reachability::ReachabilityAnalysisResults;
    use crate::models::{DepGroup, Ecosystem, PackageManager};
    use crate::position::{FilePosition, Position};

    fn package(name: &str, version: &str, source: &str) -> PackageDetails {
        PackageDetails {
            name: name.to_string(),
            version: version.to_string(),
            ecosystem: Ecosystem::from("npm"),
            package_manager: PackageManager::Npm,
            purl: format!("pkg:npm/{name}@{version}"),
            source: SourceInfo {
                path: source.to_string(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_groups_by_source_path() {
        let packages = vec![
            package("a", "1.0.0", "web/package-lock.json"),
            package("b", "2.0.0", "api/package-lock.json"),
            package("c", "3.0.0", "web/package-lock.json"),
        ];

        let results = group_by_source(packages, Vec::new(), &ReachabilityAnalysis::default());

        assert_eq!(results.results.len(), 2);
        assert_eq!(results.results[0].source.path, "api/package-lock.json");
        assert_eq!(results.results[0].packages.len(), 1);
        assert_eq!(results.results[1].source.path, "web/package-lock.json");
        assert_eq!(results.results[1].packages.len(), 2);
        assert_eq!(results.results[1].packages[0].package.name, "a");
        assert_eq!(results.results[1].packages[1].package.name, "c");
    }

    #[test]
    fn test_duplicates_merge_dep_groups() {
        let mut first = package("a", "1.0.0", "package-lock.json");
        first.dep_groups = vec![DepGroup::from("dev")];
        let mut second = package("a", "1.0.0", "package-lock.json");
        second.dep_groups = vec![DepGroup::from("optional")];
        second.is_direct = true;

        let results =
            group_by_source(vec![first, second], Vec::new(), &ReachabilityAnalysis::default());

        assert_eq!(results.results.len(), 1);
        let merged = &results.results[0].packages[0];
        assert_eq!(merged.dependency_groups, vec!["dev", "optional"]);
        assert!(merged.package.is_direct);
    }

    #[test]
    fn test_locations_require_successful_extraction() {
        let mut located = package("a", "1.0.0", "Gemfile.lock");
        located.block_location = Some(FilePosition {
            line: Position { start: 3, end: 3 },
            column: Position { start: 1, end: 10 },
            filename: "Gemfile".to_string(),
        });
        let mut broken = package("b", "2.0.0", "Gemfile.lock");
        broken.block_location = Some(FilePosition::default());

        let results =
            group_by_source(vec![located, broken], Vec::new(), &ReachabilityAnalysis::default());

        let packages = &results.results[0].packages;
        assert_eq!(packages[0].locations.len(), 1);
        assert_eq!(packages[0].locations[0].block.filename, "Gemfile");
        assert!(packages[1].locations.is_empty());
    }

    #[test]
    fn test_reachability_attached_by_purl() {
        let pkg = package("a", "1.0.0", "package-lock.json");
        let mut analysis = ReachabilityAnalysis::default();
        analysis.purl_to_results.insert(
            "pkg:npm/a@1.0.0".to_string(),
            ReachabilityAnalysisResults {
                reachable_vulnerabilities: Vec::new(),
                advisory_ids_checked: vec!["CVE-2025-1234".to_string()],
            },
        );

        let results = group_by_source(vec![pkg], Vec::new(), &analysis);

        let reachability = results.results[0].packages[0].reachability.as_ref().unwrap();
        assert_eq!(reachability.advisory_ids_checked, vec!["CVE-2025-1234"]);
    }
}
