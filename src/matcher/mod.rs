//! Matchers enrich already-extracted lockfile packages with declaration
//! positions and dependency groups recovered from a companion manifest
//! (Gemfile, *.gemspec, pyproject.toml).
//!
//! The lockfile stays the source of truth: a matcher never adds or removes
//! packages, it only backfills metadata on the ones the extractor found.

pub mod gemfile;
pub mod gemspec;
pub mod pyproject;

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Query, QueryCapture, QueryCursor, Tree};

use crate::extractor::DepFile;
use crate::models::PackageDetails;
use crate::position::{to_one_based, Position};

pub trait Matcher {
    /// Locate the companion manifest for a lockfile. `Ok(None)` means the
    /// manifest legitimately does not exist; matching is optional
    /// enrichment, never a requirement.
    fn get_source_file(&self, lockfile: &DepFile) -> Result<Option<DepFile>>;

    /// Backfill positions and dependency groups onto `packages` in place,
    /// by name lookup.
    fn match_packages(&self, source_file: &DepFile, packages: &mut [PackageDetails]) -> Result<()>;
}

/// Generic driver: resolve the companion file and run the matcher against
/// it, doing nothing when the file is absent.
pub fn match_with_file(
    lockfile: &DepFile,
    packages: &mut [PackageDetails],
    matcher: &dyn Matcher,
) -> Result<()> {
    match matcher.get_source_file(lockfile)? {
        Some(source_file) => matcher.match_packages(&source_file, packages),
        None => Ok(()),
    }
}

/// Name → index lookup into the extracted package list.
pub(crate) fn index_packages(packages: &[PackageDetails]) -> HashMap<String, usize> {
    packages
        .iter()
        .enumerate()
        .map(|(index, pkg)| (pkg.name.clone(), index))
        .collect()
}

// ---------------------------------------------------------------------------
// Ruby syntax-tree helpers shared by the Gemfile and gemspec matchers
// ---------------------------------------------------------------------------

pub(crate) fn parse_ruby(content: &str) -> Result<Tree> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_ruby::LANGUAGE.into())
        .context("failed to load the Ruby grammar")?;

    parser
        .parse(content, None)
        .ok_or_else(|| anyhow!("failed to parse Ruby source"))
}

/// A compiled structural query plus a match-iteration helper. Queries are
/// compiled once per `Match` call and reused across every match in the file.
pub(crate) struct CompiledQuery {
    query: Query,
}

impl CompiledQuery {
    pub(crate) fn ruby(source: &str) -> Result<CompiledQuery> {
        let query = Query::new(&tree_sitter_ruby::LANGUAGE.into(), source)
            .map_err(|err| anyhow!("failed to compile Ruby query: {err}"))?;

        Ok(CompiledQuery { query })
    }

    pub(crate) fn for_each_match<F>(&self, node: Node<'_>, source: &[u8], mut f: F) -> Result<()>
    where
        F: FnMut(&MatchView<'_, '_>) -> Result<()>,
    {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.query, node, source);
        while let Some(m) = matches.next() {
            f(&MatchView {
                query: &self.query,
                captures: m.captures,
            })?;
        }

        Ok(())
    }
}

/// One query match, with capture lookup by name.
pub(crate) struct MatchView<'a, 'tree> {
    query: &'a Query,
    captures: &'a [QueryCapture<'tree>],
}

impl<'a, 'tree> MatchView<'a, 'tree> {
    pub(crate) fn first(&self, capture_name: &str) -> Option<Node<'tree>> {
        let index = self.query.capture_index_for_name(capture_name)?;
        self.captures
            .iter()
            .find(|capture| capture.index == index)
            .map(|capture| capture.node)
    }

    pub(crate) fn all(&self, capture_name: &str) -> Vec<Node<'tree>> {
        let Some(index) = self.query.capture_index_for_name(capture_name) else {
            return Vec::new();
        };
        self.captures
            .iter()
            .filter(|capture| capture.index == index)
            .map(|capture| capture.node)
            .collect()
    }
}

/// The literal value of a string or symbol node: `"rake"` → `rake`,
/// `:test` → `test`. Other node kinds yield their raw text.
pub(crate) fn extract_text_value(node: Node<'_>, source: &[u8]) -> Result<String> {
    match node.kind() {
        "string" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if child.kind() == "string_content" {
                    return Ok(child.utf8_text(source)?.to_string());
                }
            }

            Ok(String::new())
        }
        "simple_symbol" => Ok(node.utf8_text(source)?.trim_start_matches(':').to_string()),
        _ => Ok(node.utf8_text(source)?.to_string()),
    }
}

/// All string/symbol values inside a node's subtree, in source order. Used
/// for argument lists and arrays of group tags.
pub(crate) fn extract_text_values(node: Node<'_>, source: &[u8]) -> Result<Vec<String>> {
    let mut values = Vec::new();
    collect_text_values(node, source, &mut values)?;

    Ok(values)
}

fn collect_text_values(node: Node<'_>, source: &[u8], values: &mut Vec<String>) -> Result<()> {
    match node.kind() {
        "string" | "simple_symbol" | "hash_key_symbol" => {
            values.push(extract_text_value(node, source)?);
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                collect_text_values(child, source, values)?;
            }
        }
    }

    Ok(())
}

/// 0-indexed tree-sitter node span → 1-indexed line/column position pair.
pub(crate) fn node_positions(node: Node<'_>) -> (Position, Position) {
    let start = node.start_position();
    let end = node.end_position();

    (
        Position {
            start: to_one_based(start.row),
            end: to_one_based(end.row),
        },
        Position {
            start: to_one_based(start.column),
            end: to_one_based(end.column),
        },
    )
}
