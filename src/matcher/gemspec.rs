//! Enrich `Gemfile.lock` packages from a `*.gemspec` in the same directory.
//!
//! Gemspecs declare dependencies through `add_dependency`,
//! `add_runtime_dependency` and `add_development_dependency` calls on the
//! spec receiver; the development variant classifies the package as `dev`.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use tree_sitter::Node;

use super::{extract_text_value, index_packages, node_positions, parse_ruby, CompiledQuery, Matcher};
use crate::extractor::DepFile;
use crate::models::{DepGroup, PackageDetails};
use crate::position::{to_one_based, FilePosition, Position};

const GEMSPEC_FILE_SUFFIX: &str = ".gemspec";

pub struct GemspecFileMatcher;

impl Matcher for GemspecFileMatcher {
    fn get_source_file(&self, lockfile: &DepFile) -> Result<Option<DepFile>> {
        let dir = lockfile.path.parent().unwrap_or_else(|| Path::new("."));

        let mut names: Vec<String> = std::fs::read_dir(dir)
            .with_context(|| format!("could not list {}", dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| name.ends_with(GEMSPEC_FILE_SUFFIX))
            .collect();
        names.sort();

        match names.first() {
            Some(name) => DepFile::open(&dir.join(name)).map(Some),
            // Gemspecs are optional; plenty of Gemfile.locks have none.
            None => Ok(None),
        }
    }

    fn match_packages(&self, source_file: &DepFile, packages: &mut [PackageDetails]) -> Result<()> {
        let packages_by_name = index_packages(packages);
        let tree = parse_ruby(&source_file.content)?;
        let source = source_file.content.as_bytes();

        let declarations = find_gemspec_dependencies(tree.root_node(), source)?;
        enrich(source_file, &declarations, &packages_by_name, packages);

        Ok(())
    }
}

struct GemspecDeclaration {
    name: String,
    is_dev: bool,
    block_line: Position,
    block_column: Position,
    name_line: Position,
    name_column: Position,
    version_line: Option<Position>,
    version_column: Option<Position>,
}

/// Matches `add_dependency` / `add_runtime_dependency` /
/// `add_development_dependency` calls with a receiver, capturing the gem
/// name and the (possibly multi-argument) requirement list.
const DEPENDENCY_QUERY: &str = r#"(
    (call
        receiver: (_)
        method: (identifier) @method_name
        (#any-of? @method_name
            "add_dependency"
            "add_runtime_dependency"
            "add_development_dependency")
        arguments: (argument_list
            .
            (comment)*
            .
            (string) @gem_name
            .
            [
                (string)
                (array (string))
                (comment)
                ","
            ]* @gem_requirements
            .
            (comment)*
            .
        )
    ) @dependency_call
)"#;

fn find_gemspec_dependencies(node: Node<'_>, source: &[u8]) -> Result<Vec<GemspecDeclaration>> {
    let query = CompiledQuery::ruby(DEPENDENCY_QUERY)?;
    let mut declarations = Vec::new();

    query.for_each_match(node, source, |m| {
        let Some(call_node) = m.first("dependency_call") else {
            return Ok(());
        };
        let Some(method_node) = m.first("method_name") else {
            return Ok(());
        };
        let Some(name_node) = m.first("gem_name") else {
            return Ok(());
        };

        let method_name = extract_text_value(method_node, source)?;
        let name = extract_text_value(name_node, source)?;
        let requirement_nodes = m.all("gem_requirements");

        let (block_line, block_column) = node_positions(call_node);
        let (name_line, name_column) = node_positions(name_node);

        let (version_line, version_column) = match (requirement_nodes.first(), requirement_nodes.last()) {
            (Some(first), Some(last)) => {
                let line = Position {
                    start: to_one_based(first.start_position().row),
                    end: to_one_based(last.end_position().row),
                };
                // The requirement list starts after the name argument's
                // separator; its start column is shifted by 3, not 1.
                let column = Position {
                    start: first.start_position().column.saturating_add(3),
                    end: to_one_based(last.end_position().column),
                };
                (Some(line), Some(column))
            }
            _ => (None, None),
        };

        declarations.push(GemspecDeclaration {
            name,
            is_dev: method_name == "add_development_dependency",
            block_line,
            block_column,
            name_line,
            name_column,
            version_line,
            version_column,
        });

        Ok(())
    })?;

    Ok(declarations)
}

fn enrich(
    source_file: &DepFile,
    declarations: &[GemspecDeclaration],
    packages_by_name: &std::collections::HashMap<String, usize>,
    packages: &mut [PackageDetails],
) {
    let filename = source_file.path_string();

    for declaration in declarations {
        let Some(&index) = packages_by_name.get(&declaration.name) else {
            eprintln!(
                "  {} skipping package {:?} from gemspec as it does not exist in the Gemfile.lock",
                "⚠".yellow(),
                declaration.name
            );
            continue;
        };
        let package = &mut packages[index];

        package.block_location = Some(FilePosition {
            line: declaration.block_line,
            column: declaration.block_column,
            filename: filename.clone(),
        });
        package.name_location = Some(FilePosition {
            line: declaration.name_line,
            column: declaration.name_column,
            filename: filename.clone(),
        });
        if let (Some(line), Some(column)) = (declaration.version_line, declaration.version_column) {
            package.version_location = Some(FilePosition {
                line,
                column,
                filename: filename.clone(),
            });
        }
        if declaration.is_dev {
            package.dep_groups = vec![DepGroup::from("dev")];
        }
    }
}
