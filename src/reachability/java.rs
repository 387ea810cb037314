//! Java symbol-usage detection over tree-sitter syntax trees.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Parser, Query, QueryCursor};

use crate::models::reachability::{AdvisoryToCheck, DetectionResults, ReachableSymbolLocation};
use crate::position::{to_one_based, to_relative_path};

/// Captures the type of every object instantiation (`new Foo(...)`,
/// `new com.example.Foo(...)`).
const CLASS_CREATION_QUERY: &str = "(object_creation_expression type: (_) @class)";

/// Detects usages of flagged Java symbols.
///
/// One parser and one precompiled query per symbol type, constructed once
/// and reused for every file; building these per file would pay the grammar
/// and query compilation cost on each parse.
pub struct JavaReachableDetector {
    parser: RefCell<Parser>,
    queries_per_symbol_type: HashMap<&'static str, Query>,
}

impl JavaReachableDetector {
    /// Failing to load the grammar or compile a query means the binary
    /// itself is broken; callers treat this as fatal.
    pub fn new() -> Result<JavaReachableDetector> {
        let language: tree_sitter::Language = tree_sitter_java::LANGUAGE.into();

        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .context("failed to set the Java language on the parser")?;

        let mut queries_per_symbol_type = HashMap::new();
        for (symbol_type, query_source) in [("class", CLASS_CREATION_QUERY)] {
            let query = Query::new(&language, query_source)
                .map_err(|err| anyhow!("failed to compile the {symbol_type} query: {err}"))?;
            queries_per_symbol_type.insert(symbol_type, query);
        }

        Ok(JavaReachableDetector {
            parser: RefCell::new(parser),
            queries_per_symbol_type,
        })
    }

    /// Scan one `.java` file for every advisory's symbols, recording matches
    /// into `results`. Per-file read or parse failures are logged and
    /// skipped; a single unreadable file never aborts the analysis.
    pub fn detect(
        &self,
        root: &Path,
        path: &Path,
        results: &mut DetectionResults,
        advisories_to_check: &[AdvisoryToCheck],
    ) {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                eprintln!("  {} could not read {}: {err}", "⚠".yellow(), path.display());
                return;
            }
        };

        let Some(tree) = self.parser.borrow_mut().parse(&content, None) else {
            eprintln!("  {} could not parse {}", "⚠".yellow(), path.display());
            return;
        };
        let source = content.as_bytes();

        let mut cursor = QueryCursor::new();

        for advisory in advisories_to_check {
            for symbol in &advisory.symbols {
                let Some(query) = self.queries_per_symbol_type.get(symbol.symbol_type.as_str())
                else {
                    eprintln!(
                        "  {} no query for symbol type {:?}",
                        "⚠".yellow(),
                        symbol.symbol_type
                    );
                    continue;
                };

                let mut captures = cursor.captures(query, tree.root_node(), source);
                while let Some((m, capture_index)) = captures.next() {
                    let node = m.captures[*capture_index].node;
                    let Ok(matched_text) = node.utf8_text(source) else {
                        continue;
                    };

                    // Class instantiations come in two shapes: the bare name
                    // (imported, wildcard or otherwise) and the fully
                    // qualified package.name form. Anything else named like
                    // the flagged symbol is an accepted false positive.
                    let qualified = format!("{}.{}", symbol.value, symbol.name);
                    if matched_text != symbol.name && matched_text != qualified {
                        continue;
                    }

                    let start = node.start_position();
                    let end = node.end_position();

                    results
                        .entry(advisory.purl.clone())
                        .or_default()
                        .entry(advisory.advisory_id.clone())
                        .or_default()
                        .push(ReachableSymbolLocation {
                            symbol: matched_text.to_string(),
                            filename: to_relative_path(root, &path.display().to_string()),
                            line_start: to_one_based(start.row),
                            line_end: to_one_based(end.row),
                            column_start: to_one_based(start.column),
                            column_end: to_one_based(end.column),
                        });
                }
            }
        }
    }
}
