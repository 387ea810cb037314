//! npm `package-lock.json` v2/v3: the `packages` map, keyed by install path.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use super::{has_file_name, DepFile, Extractor};
use crate::models::ecosystem::ECOSYSTEM_NPM;
use crate::models::{DepGroup, Ecosystem, PackageDetails, PackageManager};

pub struct NpmLockExtractor;

impl Extractor for NpmLockExtractor {
    fn should_extract(&self, path: &Path) -> bool {
        has_file_name(path, "package-lock.json")
    }

    fn extract(&self, file: &DepFile) -> Result<Vec<PackageDetails>> {
        let json: Value = serde_json::from_str(&file.content)
            .with_context(|| format!("could not extract from {}", file.path.display()))?;

        let mut packages = Vec::new();

        let Some(entries) = json.get("packages").and_then(|v| v.as_object()) else {
            return Ok(packages);
        };

        // The root entry's declared dependencies tell direct from transitive.
        let direct_names = direct_dependency_names(entries.get(""));

        for (install_path, info) in entries {
            // The root project is the empty key; workspace members and link
            // entries are local packages, not external dependencies.
            if install_path.is_empty()
                || !install_path.contains("node_modules/")
                || info.get("link").and_then(Value::as_bool).unwrap_or(false)
            {
                continue;
            }

            let name = install_path
                .rsplit_once("node_modules/")
                .map(|(_, name)| name)
                .unwrap_or(install_path);

            let version = info
                .get("version")
                .and_then(Value::as_str)
                .unwrap_or_default();

            let is_top_level = *install_path == format!("node_modules/{name}");

            packages.push(PackageDetails {
                name: name.to_string(),
                version: version.to_string(),
                ecosystem: Ecosystem::from(ECOSYSTEM_NPM),
                package_manager: PackageManager::Npm,
                dep_groups: dep_groups_for_entry(info),
                is_direct: is_top_level && direct_names.contains(name),
                ..Default::default()
            });
        }

        Ok(packages)
    }
}

fn direct_dependency_names(root: Option<&Value>) -> std::collections::HashSet<String> {
    let mut names = std::collections::HashSet::new();

    let Some(root) = root else {
        return names;
    };

    for section in ["dependencies", "devDependencies", "optionalDependencies"] {
        if let Some(declared) = root.get(section).and_then(Value::as_object) {
            names.extend(declared.keys().cloned());
        }
    }

    names
}

fn dep_groups_for_entry(info: &Value) -> Vec<DepGroup> {
    let flag = |name: &str| info.get(name).and_then(Value::as_bool).unwrap_or(false);

    if flag("devOptional") {
        return vec![DepGroup::from("dev"), DepGroup::from("optional")];
    }

    let mut groups = Vec::new();
    if flag("dev") {
        groups.push(DepGroup::from("dev"));
    }
    if flag("optional") {
        groups.push(DepGroup::from("optional"));
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(content: &str) -> Vec<PackageDetails> {
        NpmLockExtractor
            .extract(&DepFile {
                path: "package-lock.json".into(),
                content: content.to_string(),
            })
            .unwrap()
    }

    #[test]
    fn test_should_extract() {
        let extractor = NpmLockExtractor;
        assert!(extractor.should_extract(Path::new("package-lock.json")));
        assert!(extractor.should_extract(Path::new("path/to/package-lock.json")));
        assert!(!extractor.should_extract(Path::new("package-lock.json.bak")));
        assert!(!extractor.should_extract(Path::new("path/package-lock.json/file")));
    }

    #[test]
    fn test_extract_packages_map() {
        let packages = extract(
            r#"{
  "name": "my-app",
  "lockfileVersion": 3,
  "packages": {
    "": {
      "name": "my-app",
      "version": "1.0.0",
      "dependencies": { "express": "^4.18.2" },
      "devDependencies": { "@babel/core": "^7.21.0" }
    },
    "node_modules/express": { "version": "4.18.2" },
    "node_modules/@babel/core": { "version": "7.21.0", "dev": true },
    "node_modules/fsevents": { "version": "2.3.2", "optional": true },
    "node_modules/ms": { "version": "2.1.3", "devOptional": true }
  }
}"#,
        );

        assert_eq!(packages.len(), 4);

        let express = packages.iter().find(|p| p.name == "express").unwrap();
        assert!(express.dep_groups.is_empty());
        assert_eq!(express.version, "4.18.2");
        assert_eq!(express.package_manager, PackageManager::Npm);
        assert!(express.is_direct);

        let babel = packages.iter().find(|p| p.name == "@babel/core").unwrap();
        assert_eq!(babel.dep_groups, vec![DepGroup::from("dev")]);
        assert!(babel.is_direct);

        let fsevents = packages.iter().find(|p| p.name == "fsevents").unwrap();
        assert_eq!(fsevents.dep_groups, vec![DepGroup::from("optional")]);
        assert!(!fsevents.is_direct);

        let ms = packages.iter().find(|p| p.name == "ms").unwrap();
        assert_eq!(ms.dep_groups, vec![DepGroup::from("dev"), DepGroup::from("optional")]);
        assert!(ms.ecosystem.is_dev_group(&ms.dep_groups));
    }

    #[test]
    fn test_nested_node_modules_use_innermost_name() {
        let packages = extract(
            r#"{
  "packages": {
    "node_modules/foo/node_modules/bar": { "version": "1.0.0" }
  }
}"#,
        );

        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "bar");
    }

    #[test]
    fn test_workspace_and_link_entries_are_skipped() {
        let packages = extract(
            r#"{
  "packages": {
    "packages/app": { "version": "0.0.1" },
    "node_modules/app": { "link": true, "resolved": "packages/app" }
  }
}"#,
        );

        assert!(packages.is_empty());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let result = NpmLockExtractor.extract(&DepFile {
            path: "package-lock.json".into(),
            content: "{ not json".to_string(),
        });
        assert!(result.is_err());
    }
}
