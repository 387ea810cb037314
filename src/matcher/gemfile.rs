//! Enrich `Gemfile.lock` packages from the `Gemfile` next to it.
//!
//! Two structural queries drive the matching: one for top-level `gem` calls
//! (with optional requirement argument and `group:` keyword pairs), one for
//! `group :a, :b do ... end` blocks whose tags apply to every `gem` call in
//! the block body.

use std::path::Path;

use anyhow::Result;
use tree_sitter::Node;

use super::{
    extract_text_value, extract_text_values, index_packages, node_positions, parse_ruby,
    CompiledQuery, Matcher,
};
use crate::extractor::DepFile;
use crate::models::{DepGroup, PackageDetails};
use crate::position::{FilePosition, Position};

const GEMFILE_FILENAME: &str = "Gemfile";

/// A `gem` declaration found in the Gemfile, with the spans needed to
/// backfill package locations.
pub(crate) struct GemDeclaration {
    pub(crate) name: String,
    pub(crate) groups: Vec<String>,
    pub(crate) block_line: Position,
    pub(crate) block_column: Position,
    pub(crate) name_line: Position,
    pub(crate) name_column: Position,
    pub(crate) version_line: Option<Position>,
    pub(crate) version_column: Option<Position>,
}

pub struct GemfileMatcher;

impl Matcher for GemfileMatcher {
    fn get_source_file(&self, lockfile: &DepFile) -> Result<Option<DepFile>> {
        let dir = lockfile.path.parent().unwrap_or_else(|| Path::new("."));
        let source_path = dir.join(GEMFILE_FILENAME);
        if !source_path.exists() {
            return Ok(None);
        }

        DepFile::open(&source_path).map(Some)
    }

    fn match_packages(&self, source_file: &DepFile, packages: &mut [PackageDetails]) -> Result<()> {
        let packages_by_name = index_packages(packages);
        let tree = parse_ruby(&source_file.content)?;
        let source = source_file.content.as_bytes();

        let root_gems = find_gems(tree.root_node(), source)?;
        enrich_packages_with_location(source_file, &root_gems, &packages_by_name, packages);

        let grouped_gems = find_grouped_gems(tree.root_node(), source)?;
        enrich_packages_with_location(source_file, &grouped_gems, &packages_by_name, packages);

        Ok(())
    }
}

/// Matches method calls to `gem`, capturing the call itself, the dependency
/// name string and the optional requirement string.
const GEM_QUERY: &str = r#"(
    (call
        method: (identifier) @method_name
        (#match? @method_name "gem")
        arguments: (argument_list
            .
            (comment)*
            .
            (string) @gem_name
            .
            (comment)*
            .
            (string)? @gem_requirement
            .
            (_)*
            .
        )
    ) @gem_call
)"#;

/// Matches `group ... do ... end` blocks, capturing the group tag list and
/// the block body.
const GROUP_QUERY: &str = r#"(
    (call
        method: (identifier) @method_name
        (#match? @method_name "group")
        arguments: (argument_list
            .
            [
                (simple_symbol)
                (string)
                (comment)
                ","
            ]*
            .
        ) @group_keys
        block: (_) @block
    )
)"#;

/// Matches `group:`/`:group =>` keyword pairs inside a single `gem` call.
const GROUP_PAIR_QUERY: &str = r#"(
    (pair
        key: [(hash_key_symbol) (simple_symbol)] @pair_key
        (#match? @pair_key "group")
        value: [(array) (simple_symbol) (string)] @pair_value
    )
)"#;

pub(crate) fn find_gems(node: Node<'_>, source: &[u8]) -> Result<Vec<GemDeclaration>> {
    let query = CompiledQuery::ruby(GEM_QUERY)?;
    let mut gems = Vec::new();

    query.for_each_match(node, source, |m| {
        let Some(call_node) = m.first("gem_call") else {
            return Ok(());
        };
        let Some(name_node) = m.first("gem_name") else {
            return Ok(());
        };

        let name = extract_text_value(name_node, source)?;
        let requirement_node = m.first("gem_requirement");
        let groups = find_groups_in_pairs(call_node, source)?;

        gems.push(build_declaration(name, groups, call_node, name_node, requirement_node));

        Ok(())
    })?;

    Ok(gems)
}

fn find_grouped_gems(node: Node<'_>, source: &[u8]) -> Result<Vec<GemDeclaration>> {
    let query = CompiledQuery::ruby(GROUP_QUERY)?;
    let mut gems = Vec::new();

    query.for_each_match(node, source, |m| {
        let Some(group_keys_node) = m.first("group_keys") else {
            return Ok(());
        };
        let Some(block_node) = m.first("block") else {
            return Ok(());
        };

        let groups = extract_text_values(group_keys_node, source)?;
        let mut block_gems = find_gems(block_node, source)?;

        // The enclosing group applies to every gem declared in the block.
        for gem in &mut block_gems {
            gem.groups = groups.clone();
        }
        gems.append(&mut block_gems);

        Ok(())
    })?;

    Ok(gems)
}

fn find_groups_in_pairs(call_node: Node<'_>, source: &[u8]) -> Result<Vec<String>> {
    let query = CompiledQuery::ruby(GROUP_PAIR_QUERY)?;
    let mut groups = Vec::new();

    query.for_each_match(call_node, source, |m| {
        if let Some(value_node) = m.first("pair_value") {
            groups.extend(extract_text_values(value_node, source)?);
        }

        Ok(())
    })?;

    Ok(groups)
}

fn build_declaration(
    name: String,
    groups: Vec<String>,
    call_node: Node<'_>,
    name_node: Node<'_>,
    requirement_node: Option<Node<'_>>,
) -> GemDeclaration {
    let (block_line, block_column) = node_positions(call_node);
    let (name_line, name_column) = node_positions(name_node);
    let (version_line, version_column) = match requirement_node {
        Some(node) => {
            let (line, column) = node_positions(node);
            (Some(line), Some(column))
        }
        None => (None, None),
    };

    GemDeclaration {
        name,
        groups,
        block_line,
        block_column,
        name_line,
        name_column,
        version_line,
        version_column,
    }
}

pub(crate) fn enrich_packages_with_location(
    source_file: &DepFile,
    gems: &[GemDeclaration],
    packages_by_name: &std::collections::HashMap<String, usize>,
    packages: &mut [PackageDetails],
) {
    let filename = source_file.path_string();

    for gem in gems {
        // Gems in the Gemfile but not in the lockfile are skipped: the
        // lockfile is the source of truth for what exists.
        let Some(&index) = packages_by_name.get(&gem.name) else {
            continue;
        };
        let package = &mut packages[index];

        package.block_location = Some(FilePosition {
            line: gem.block_line,
            column: gem.block_column,
            filename: filename.clone(),
        });
        package.name_location = Some(FilePosition {
            line: gem.name_line,
            column: gem.name_column,
            filename: filename.clone(),
        });
        if let (Some(line), Some(column)) = (gem.version_line, gem.version_column) {
            package.version_location = Some(FilePosition {
                line,
                column,
                filename: filename.clone(),
            });
        }
        if !gem.groups.is_empty() {
            package.dep_groups = gem.groups.iter().map(|g| DepGroup::from(g.as_str())).collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Ecosystem, PackageManager};

    fn gemfile(content: &str) -> DepFile {
        DepFile {
            path: "project/Gemfile".into(),
            content: content.to_string(),
        }
    }

    fn lock_package(name: &str, version: &str) -> PackageDetails {
        PackageDetails {
            name: name.to_string(),
            version: version.to_string(),
            ecosystem: Ecosystem::from("RubyGems"),
            package_manager: PackageManager::Bundler,
            ..Default::default()
        }
    }

    #[test]
    fn test_match_backfills_positions() {
        let source = gemfile("source \"https://rubygems.org\"\n\ngem \"rake\", \"~> 13.0\"\n");
        let mut packages = vec![lock_package("rake", "13.0.6")];

        GemfileMatcher.match_packages(&source, &mut packages).unwrap();

        let block = packages[0].block_location.as_ref().unwrap();
        assert!(block.is_extracted_successfully());
        assert_eq!(block.line, Position { start: 3, end: 3 });
        assert_eq!(block.column, Position { start: 1, end: 22 });
        assert_eq!(block.filename, "project/Gemfile");

        let name = packages[0].name_location.as_ref().unwrap();
        assert_eq!(name.line, Position { start: 3, end: 3 });
        assert_eq!(name.column, Position { start: 5, end: 11 });

        let version = packages[0].version_location.as_ref().unwrap();
        assert_eq!(version.line, Position { start: 3, end: 3 });
        assert_eq!(version.column, Position { start: 13, end: 22 });
    }

    #[test]
    fn test_group_block_tags_nested_gems() {
        let source = gemfile(
            "gem \"rake\"\n\ngroup :development, :test do\n  gem \"rspec\", \"~> 3.12\"\nend\n",
        );
        let mut packages = vec![lock_package("rake", "13.0.6"), lock_package("rspec", "3.12.0")];

        GemfileMatcher.match_packages(&source, &mut packages).unwrap();

        assert!(packages[0].dep_groups.is_empty());
        assert_eq!(
            packages[1].dep_groups,
            vec![DepGroup::from("development"), DepGroup::from("test")]
        );
        assert!(packages[1]
            .ecosystem
            .is_dev_group(&packages[1].dep_groups));
        assert!(packages[1]
            .block_location
            .as_ref()
            .unwrap()
            .is_extracted_successfully());
    }

    #[test]
    fn test_group_keyword_pair() {
        let source = gemfile("gem \"puma\", group: :production\n");
        let mut packages = vec![lock_package("puma", "6.0.0")];

        GemfileMatcher.match_packages(&source, &mut packages).unwrap();

        assert_eq!(packages[0].dep_groups, vec![DepGroup::from("production")]);
    }

    #[test]
    fn test_gem_absent_from_lockfile_is_skipped() {
        let source = gemfile("gem \"not-locked\"\n");
        let mut packages = vec![lock_package("rake", "13.0.6")];

        GemfileMatcher.match_packages(&source, &mut packages).unwrap();

        assert!(packages[0].block_location.is_none());
        assert!(packages[0].name_location.is_none());
    }

    #[test]
    fn test_lock_package_absent_from_gemfile_keeps_empty_metadata() {
        let source = gemfile("gem \"rake\"\n");
        let mut packages = vec![lock_package("rake", "13.0.6"), lock_package("ast", "2.4.2")];

        GemfileMatcher.match_packages(&source, &mut packages).unwrap();

        assert!(packages[1].block_location.is_none());
        assert!(packages[1].dep_groups.is_empty());
    }

    #[test]
    fn test_get_source_file_missing_gemfile() {
        let dir = tempfile::tempdir().unwrap();
        let lockfile = DepFile {
            path: dir.path().join("Gemfile.lock"),
            content: String::new(),
        };

        assert!(GemfileMatcher.get_source_file(&lockfile).unwrap().is_none());
    }
}
