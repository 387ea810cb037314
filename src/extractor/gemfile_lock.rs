//! Bundler `Gemfile.lock` parsing.
//!
//! The file is section-oriented: `GEM`/`GIT`/`PATH` sections carry resolved
//! specs (4-space indent, deeper indents are transitive requirement lines),
//! `DEPENDENCIES` lists the names declared directly in the Gemfile, and GIT
//! sections pin a `revision:` that becomes the package commit.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use regex::Regex;

use super::{has_file_name, DepFile, Extractor};
use crate::matcher::{gemfile::GemfileMatcher, gemspec::GemspecFileMatcher, Matcher};
use crate::models::ecosystem::ECOSYSTEM_RUBYGEMS;
use crate::models::{Ecosystem, PackageDetails, PackageManager};

pub struct GemfileLockExtractor;

impl Extractor for GemfileLockExtractor {
    fn should_extract(&self, path: &Path) -> bool {
        has_file_name(path, "Gemfile.lock")
    }

    fn extract(&self, file: &DepFile) -> Result<Vec<PackageDetails>> {
        let spec_re = Regex::new(r"^ {4}([^\s(]+)(?: \(([^)]*)\))?$").expect("valid spec regex");
        let requirement_re = Regex::new(r"^ {6}([^\s(]+)").expect("valid requirement regex");
        let direct_re = Regex::new(r"^ {2}([^\s(!]+)").expect("valid dependency regex");

        let mut packages: Vec<PackageDetails> = Vec::new();
        let mut direct_names: HashSet<String> = HashSet::new();
        let mut section = "";
        let mut revision = String::new();

        for line in file.content.lines() {
            if !line.starts_with(' ') && !line.is_empty() {
                section = line.trim_end();
                revision.clear();
                continue;
            }

            match section {
                "GEM" | "GIT" | "PATH" => {
                    if let Some(rev) = line.strip_prefix("  revision: ") {
                        revision = rev.trim().to_string();
                        continue;
                    }
                    if let Some(captures) = spec_re.captures(line) {
                        packages.push(PackageDetails {
                            name: captures[1].to_string(),
                            version: captures
                                .get(2)
                                .map(|m| m.as_str().to_string())
                                .unwrap_or_default(),
                            commit: if section == "GIT" {
                                revision.clone()
                            } else {
                                String::new()
                            },
                            ecosystem: Ecosystem::from(ECOSYSTEM_RUBYGEMS),
                            package_manager: PackageManager::Bundler,
                            ..Default::default()
                        });
                    } else if let Some(captures) = requirement_re.captures(line) {
                        // Deeper-indented lines are the preceding spec's own
                        // requirements: parent → child edges.
                        if let Some(parent) = packages.last_mut() {
                            parent.dependencies.push(PackageDetails {
                                name: captures[1].to_string(),
                                ecosystem: Ecosystem::from(ECOSYSTEM_RUBYGEMS),
                                package_manager: PackageManager::Bundler,
                                ..Default::default()
                            });
                        }
                    }
                }
                "DEPENDENCIES" => {
                    if let Some(captures) = direct_re.captures(line) {
                        direct_names.insert(captures[1].to_string());
                    }
                }
                _ => {}
            }
        }

        for package in &mut packages {
            if direct_names.contains(&package.name) {
                package.is_direct = true;
            }
        }

        Ok(packages)
    }

    fn matchers(&self) -> Vec<Box<dyn Matcher>> {
        vec![Box::new(GemfileMatcher), Box::new(GemspecFileMatcher)]
    }
}
