//! `sbom-checkr` — scan dependency manifests, build an SBOM, and check
//! vulnerable-symbol reachability.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Walk the requested directories and explicit lockfiles, extracting and
//!    matching packages ([`scanner`], [`extractor`], [`matcher`]).
//! 3. Report sanitization drops as one diagnostic block.
//! 4. Resolve vulnerable symbols for direct packages and run the
//!    reachability analysis ([`resolver`], [`reachability`]).
//! 5. Aggregate into the per-source result tree ([`aggregate`]).
//! 6. Render the requested report ([`report`]).

mod aggregate;
mod cli;
mod error;
mod extractor;
mod matcher;
mod models;
mod position;
mod purl;
mod reachability;
mod report;
mod resolver;
mod scanner;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use cli::{Cli, ReportFormat};
use error::ScanError;
use extractor::ExtractorRegistry;
use scanner::ScannerActions;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Default to the current directory when nothing was requested.
    let directory_paths: Vec<PathBuf> = if cli.paths.is_empty() && cli.lockfile.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        cli.paths.clone()
    };

    let registry = ExtractorRegistry::new();

    let known_parsers = registry.extractor_names();
    for parser in &cli.enable_parsers {
        if !known_parsers.contains(&parser.as_str()) {
            anyhow::bail!(
                "unknown parser {parser:?}; known parsers: {}",
                known_parsers.join(", ")
            );
        }
    }

    let actions = ScannerActions {
        directory_paths: directory_paths.clone(),
        lockfile_paths: cli.lockfile.clone(),
        recursive: cli.recursive,
        no_ignore: cli.no_ignore,
        enable_parsers: cli.enable_parsers.clone(),
        quiet: cli.quiet,
    };

    let (packages, artifacts, dropped_reasons) = match scanner::scan(&registry, &actions) {
        Ok(scanned) => scanned,
        Err(err) if matches!(err.downcast_ref::<ScanError>(), Some(ScanError::NoPackagesFound)) => {
            eprintln!("No packages found in scan");
            std::process::exit(1);
        }
        Err(err) => return Err(err),
    };

    if !dropped_reasons.is_empty() && !cli.quiet {
        eprintln!("{}", "Note that some scanned packages were dropped:".yellow());
        for reason in &dropped_reasons {
            eprintln!(" - {reason}");
        }
    }

    let direct_purls = scanner::get_direct_package_purls(&packages);
    let reachability_analysis = reachability::perform_reachability_analysis(
        &direct_purls,
        &directory_paths,
        !cli.no_reachability,
        cli.base_url.as_deref(),
        cli.jwt_token.as_deref(),
        cli.quiet,
    )
    .await?;

    let results = aggregate::group_by_source(packages, artifacts, &reachability_analysis);

    match cli.report {
        ReportFormat::Table => report::table::render(&results, cli.verbose, cli.quiet)?,
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        ReportFormat::CycloneDx15 => println!("{}", report::cyclonedx::render_json(&results)?),
    }

    Ok(())
}
