//! Reachability analysis: are the vulnerable symbols of directly-imported
//! packages actually used in the scanned source code?
//!
//! The pipeline is fail-open around the resolver: no symbols, no analysis,
//! but never a failed scan. A broken syntax-tree grammar, by contrast, is a
//! deployment defect and aborts the run.

pub mod java;

use std::path::{Path, PathBuf};

use anyhow::Result;
use colored::Colorize;
use ignore::WalkBuilder;

use crate::models::reachability::{
    AdvisoriesToCheckPerLanguage, AdvisoryToCheck, DetectionResults, ReachabilityAnalysis,
    ReachabilityAnalysisResults, ReachableVulnerability,
};
use crate::resolver::{self, ResolveVulnerableSymbolsResponse};
use java::JavaReachableDetector;

/// Run the full reachability analysis for the given direct-package PURLs
/// over the scanned directory roots.
pub async fn perform_reachability_analysis(
    purls: &[String],
    directory_paths: &[PathBuf],
    enabled: bool,
    base_url_override: Option<&str>,
    jwt_override: Option<&str>,
    quiet: bool,
) -> Result<ReachabilityAnalysis> {
    if !enabled {
        if !quiet {
            eprintln!("Reachability analysis is disabled");
        }
        return Ok(ReachabilityAnalysis::default());
    }

    if !quiet {
        eprintln!("Fetching symbols to perform a reachability analysis");
    }

    let response =
        match resolver::post_resolve_vulnerable_symbols(purls, base_url_override, jwt_override)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                // Absence of reachability data must never block SBOM
                // generation.
                eprintln!(
                    "  {} failed to fetch symbols for reachability analysis: {err:#}",
                    "⚠".yellow()
                );
                eprintln!("  {} continuing without reachability information", "⚠".yellow());
                return Ok(ReachabilityAnalysis::default());
            }
        };

    let advisories_per_language = get_advisories_to_check_per_language(&response);

    let detector = JavaReachableDetector::new()?;
    let mut detection_results = DetectionResults::new();

    let no_advisories = Vec::new();
    let java_advisories = advisories_per_language.get("java").unwrap_or(&no_advisories);

    for dir in directory_paths {
        walk_source_files(dir, |path| {
            if path.extension().is_some_and(|ext| ext == "java") {
                detector.detect(dir, path, &mut detection_results, java_advisories);
            }
        });
    }

    Ok(ReachabilityAnalysis {
        purl_to_results: get_purls_to_reachability_analysis_results(
            &advisories_per_language,
            &detection_results,
        ),
    })
}

/// Walk every file under `dir`. Walk errors are logged and skipped; a
/// reachability hiccup on one file never aborts the scan.
fn walk_source_files(dir: &Path, mut visit: impl FnMut(&Path)) {
    let walker = WalkBuilder::new(dir)
        .hidden(false)
        .git_ignore(false)
        .git_exclude(false)
        .git_global(false)
        .parents(false)
        .follow_links(false)
        .build();

    for entry in walker {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_some_and(|t| t.is_file()) {
                    visit(entry.path());
                }
            }
            Err(err) => {
                eprintln!("  {} error walking the path: {err}", "⚠".yellow());
            }
        }
    }
}

/// Group the resolver's per-purl symbols by source language. Symbol
/// resolution currently only covers Java, so everything lands there.
fn get_advisories_to_check_per_language(
    response: &ResolveVulnerableSymbolsResponse,
) -> AdvisoriesToCheckPerLanguage {
    let mut output = AdvisoriesToCheckPerLanguage::new();

    for result in &response.results {
        let advisories = output.entry("java".to_string()).or_default();

        for symbol_details in &result.vulnerable_symbols {
            advisories.push(AdvisoryToCheck {
                purl: result.purl.clone(),
                advisory_id: symbol_details.advisory_id.clone(),
                symbols: symbol_details.symbols.clone(),
            });
        }
    }

    output
}

/// Flatten detection results per purl. Every advisory that was queried shows
/// up in `advisory_ids_checked`, whether or not anything matched; only
/// advisories with recorded detections also produce a
/// [`ReachableVulnerability`].
fn get_purls_to_reachability_analysis_results(
    advisories_per_language: &AdvisoriesToCheckPerLanguage,
    detection_results: &DetectionResults,
) -> std::collections::HashMap<String, ReachabilityAnalysisResults> {
    let mut purl_to_results: std::collections::HashMap<String, ReachabilityAnalysisResults> =
        std::collections::HashMap::new();

    for advisories_to_check in advisories_per_language.values() {
        for advisory in advisories_to_check {
            let results = purl_to_results.entry(advisory.purl.clone()).or_default();
            results.advisory_ids_checked.push(advisory.advisory_id.clone());

            if let Some(locations) = detection_results
                .get(&advisory.purl)
                .and_then(|by_advisory| by_advisory.get(&advisory.advisory_id))
            {
                results.reachable_vulnerabilities.push(ReachableVulnerability {
                    advisory_id: advisory.advisory_id.clone(),
                    reachable_symbol_locations: locations.clone(),
                });
            }
        }
    }

    purl_to_results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::reachability::{ReachableSymbolLocation, Symbol};
    use crate::resolver::{SymbolDetails, SymbolsForPurl};

    fn symbol(name: &str) -> Symbol {
        Symbol {
            symbol_type: "class".to_string(),
            value: "org.example".to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_advisories_grouped_under_java() {
        let response = ResolveVulnerableSymbolsResponse {
            id: "testing-123".to_string(),
            results: vec![
                SymbolsForPurl {
                    purl: "pkg:maven/org.example/foo@1.2.3".to_string(),
                    vulnerable_symbols: vec![SymbolDetails {
                        advisory_id: "CVE-2025-1234".to_string(),
                        symbols: vec![symbol("Foo"), symbol("foo")],
                    }],
                },
                SymbolsForPurl {
                    purl: "pkg:maven/org.example/bar@9.8.7".to_string(),
                    vulnerable_symbols: vec![
                        SymbolDetails {
                            advisory_id: "CVE-2025-9876".to_string(),
                            symbols: vec![symbol("Bar")],
                        },
                        SymbolDetails {
                            advisory_id: "CVE-2025-0000".to_string(),
                            symbols: vec![symbol("Bar")],
                        },
                    ],
                },
            ],
        };

        let per_language = get_advisories_to_check_per_language(&response);

        assert_eq!(per_language.len(), 1);
        let java = &per_language["java"];
        assert_eq!(java.len(), 3);
        assert_eq!(java[0].purl, "pkg:maven/org.example/foo@1.2.3");
        assert_eq!(java[0].symbols.len(), 2);
        assert_eq!(java[1].advisory_id, "CVE-2025-9876");
        assert_eq!(java[2].advisory_id, "CVE-2025-0000");
    }

    #[test]
    fn test_empty_response_produces_no_advisories() {
        let response = ResolveVulnerableSymbolsResponse::default();
        assert!(get_advisories_to_check_per_language(&response).is_empty());
    }

    #[test]
    fn test_flatten_reports_checked_and_reachable() {
        let mut per_language = AdvisoriesToCheckPerLanguage::new();
        per_language.insert(
            "java".to_string(),
            vec![
                AdvisoryToCheck {
                    purl: "pkg:maven/org.example/foo@1.2.3".to_string(),
                    advisory_id: "CVE-2025-1234".to_string(),
                    symbols: vec![symbol("Foo")],
                },
                AdvisoryToCheck {
                    purl: "pkg:maven/org.example/foo@1.2.3".to_string(),
                    advisory_id: "CVE-2025-5678".to_string(),
                    symbols: vec![symbol("Foo")],
                },
            ],
        );

        let mut detections = DetectionResults::new();
        detections
            .entry("pkg:maven/org.example/foo@1.2.3".to_string())
            .or_default()
            .insert(
                "CVE-2025-1234".to_string(),
                vec![ReachableSymbolLocation {
                    symbol: "Foo".to_string(),
                    filename: "App.java".to_string(),
                    line_start: 3,
                    line_end: 3,
                    column_start: 10,
                    column_end: 13,
                }],
            );

        let flattened = get_purls_to_reachability_analysis_results(&per_language, &detections);

        let results = &flattened["pkg:maven/org.example/foo@1.2.3"];
        // Both advisories were checked, only one was reachable.
        assert_eq!(results.advisory_ids_checked, vec!["CVE-2025-1234", "CVE-2025-5678"]);
        assert_eq!(results.reachable_vulnerabilities.len(), 1);
        assert_eq!(results.reachable_vulnerabilities[0].advisory_id, "CVE-2025-1234");
        assert_eq!(
            results.reachable_vulnerabilities[0].reachable_symbol_locations[0].filename,
            "App.java"
        );
    }

    #[tokio::test]
    async fn test_disabled_analysis_is_empty() {
        let analysis = perform_reachability_analysis(&[], &[], false, None, None, true)
            .await
            .unwrap();
        assert!(analysis.purl_to_results.is_empty());
    }
}
