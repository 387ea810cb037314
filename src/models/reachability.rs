//! Models for the vulnerable-symbol reachability analysis.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A symbol descriptor returned by the vulnerability resolver.
/// `symbol_type` is currently only ever `"class"`, `value` the declaring
/// package and `name` the bare symbol name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    #[serde(rename = "type")]
    pub symbol_type: String,
    pub value: String,
    pub name: String,
}

/// One advisory whose symbols must be searched for in source code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryToCheck {
    pub purl: String,
    pub advisory_id: String,
    pub symbols: Vec<Symbol>,
}

/// Advisories grouped by source language (currently always `"java"`).
pub type AdvisoriesToCheckPerLanguage = HashMap<String, Vec<AdvisoryToCheck>>;

/// purl → advisory id → locations where a symbol was found. Sparse: only
/// populated where matches exist.
pub type DetectionResults = HashMap<String, HashMap<String, Vec<ReachableSymbolLocation>>>;

/// A spot in scanned source code where a flagged symbol is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachableSymbolLocation {
    pub symbol: String,
    pub filename: String,
    pub line_start: usize,
    pub line_end: usize,
    pub column_start: usize,
    pub column_end: usize,
}

/// A vulnerability deemed reachable, with every usage site found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachableVulnerability {
    pub advisory_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reachable_symbol_locations: Vec<ReachableSymbolLocation>,
}

/// Per-purl outcome: which advisories were checked at all, and which of
/// those turned out reachable. `advisory_ids_checked` lets consumers
/// distinguish "checked, not reachable" from "never checked".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachabilityAnalysisResults {
    pub reachable_vulnerabilities: Vec<ReachableVulnerability>,
    pub advisory_ids_checked: Vec<String>,
}

/// The full analysis output, keyed by package URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReachabilityAnalysis {
    pub purl_to_results: HashMap<String, ReachabilityAnalysisResults>,
}
