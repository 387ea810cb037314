//! Gradle dependency-locking lockfiles (`gradle.lockfile` and
//! `buildscript-gradle.lockfile`): one `group:artifact:version=scope,scope`
//! line per dependency.

use std::path::Path;

use anyhow::Result;

use super::{has_file_name, DepFile, Extractor};
use crate::models::ecosystem::ECOSYSTEM_MAVEN;
use crate::models::{ArtifactDetail, DepGroup, Ecosystem, PackageDetails, PackageManager, ScannedArtifact};

const COMMENT_PREFIX: &str = "#";
const EMPTY_PREFIX: &str = "empty=";

pub struct GradleLockExtractor;

impl Extractor for GradleLockExtractor {
    fn should_extract(&self, path: &Path) -> bool {
        has_file_name(path, "gradle.lockfile") || has_file_name(path, "buildscript-gradle.lockfile")
    }

    fn extract(&self, file: &DepFile) -> Result<Vec<PackageDetails>> {
        let mut packages = Vec::new();

        for line in file.content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(COMMENT_PREFIX) || line.starts_with(EMPTY_PREFIX)
            {
                continue;
            }

            // Lines that are not group:artifact:version are skipped, not fatal.
            if let Some(package) = parse_lock_line(line) {
                packages.push(package);
            }
        }

        Ok(packages)
    }

    fn artifact(&self, file: &DepFile) -> Option<ScannedArtifact> {
        let module_dir = file.path.parent()?;
        let module_name = module_dir.file_name()?.to_str()?.to_string();

        let detail = ArtifactDetail {
            name: module_name.clone(),
            version: String::new(),
            filename: file.path.display().to_string(),
            ecosystem: Ecosystem::from(ECOSYSTEM_MAVEN),
        };

        // A module lockfile next to a buildscript lockfile depends on that
        // buildscript (the multi-module layout Gradle produces).
        let depends_on = if has_file_name(&file.path, "gradle.lockfile") {
            let buildscript = module_dir.join("buildscript-gradle.lockfile");
            buildscript.exists().then(|| ArtifactDetail {
                name: module_name,
                version: String::new(),
                filename: buildscript.display().to_string(),
                ecosystem: Ecosystem::from(ECOSYSTEM_MAVEN),
            })
        } else {
            None
        };

        Some(ScannedArtifact { detail, depends_on })
    }
}

fn parse_lock_line(line: &str) -> Option<PackageDetails> {
    let mut parts = line.splitn(3, ':');
    let group = parts.next()?;
    let artifact = parts.next()?;
    let rest = parts.next()?;

    let (version, scopes) = match rest.split_once('=') {
        Some((version, scopes_str)) => {
            // Unrecognized scope names are dropped silently.
            let scopes = scopes_str
                .split(',')
                .filter_map(DepGroup::from_known_name)
                .collect();
            (version, scopes)
        }
        None => (rest, Vec::new()),
    };

    Some(PackageDetails {
        name: format!("{group}:{artifact}"),
        version: version.to_string(),
        ecosystem: Ecosystem::from(ECOSYSTEM_MAVEN),
        package_manager: PackageManager::Gradle,
        dep_groups: scopes,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(content: &str) -> Vec<PackageDetails> {
        GradleLockExtractor
            .extract(&DepFile {
                path: "gradle.lockfile".into(),
                content: content.to_string(),
            })
            .unwrap()
    }

    #[test]
    fn test_should_extract() {
        let extractor = GradleLockExtractor;
        assert!(extractor.should_extract(Path::new("gradle.lockfile")));
        assert!(extractor.should_extract(Path::new("subproject/gradle.lockfile")));
        assert!(extractor.should_extract(Path::new("buildscript-gradle.lockfile")));
        assert!(!extractor.should_extract(Path::new("gradle.lockfile.bak")));
        assert!(!extractor.should_extract(Path::new("my-gradle.lockfile")));
    }

    #[test]
    fn test_extract_with_scopes() {
        let packages = extract(
            "# This is a Gradle generated file for dependency locking.\norg.springframework:spring-core:5.3.26=compileClasspath,runtimeClasspath\ncom.google.guava:guava:31.1-jre=testCompileClasspath\nempty=annotationProcessor\n",
        );

        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].name, "org.springframework:spring-core");
        assert_eq!(packages[0].version, "5.3.26");
        assert_eq!(
            packages[0].dep_groups,
            vec![DepGroup::from("compileClasspath"), DepGroup::from("runtimeClasspath")]
        );
        assert_eq!(packages[1].dep_groups, vec![DepGroup::from("testCompileClasspath")]);
        assert_eq!(packages[1].package_manager, PackageManager::Gradle);
        assert_eq!(packages[1].ecosystem.as_str(), "Maven");
    }

    #[test]
    fn test_unknown_scopes_are_dropped() {
        let packages = extract("org.example:lib:1.0.0=myCustomScope,runtimeClasspath\n");
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].dep_groups, vec![DepGroup::from("runtimeClasspath")]);
    }

    #[test]
    fn test_invalid_lines_are_skipped() {
        let packages = extract("not a lock line\norg.example:lib:1.0.0\n");
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "org.example:lib");
        assert!(packages[0].dep_groups.is_empty());
    }

    #[test]
    fn test_module_artifact() {
        let file = DepFile {
            path: "app/core/gradle.lockfile".into(),
            content: String::new(),
        };

        let artifact = GradleLockExtractor.artifact(&file).unwrap();
        assert_eq!(artifact.detail.name, "core");
        assert_eq!(artifact.detail.filename, "app/core/gradle.lockfile");
        assert!(artifact.depends_on.is_none());
    }
}
