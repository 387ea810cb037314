use anyhow::Result;
use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::models::results::{PackageVulns, VulnerabilityResults};

/// Render a colored terminal report, one table per scanned source.
pub fn render(results: &VulnerabilityResults, verbose: bool, quiet: bool) -> Result<()> {
    let total: usize = results.results.iter().map(|s| s.packages.len()).sum();
    let reachable: usize = results
        .results
        .iter()
        .flat_map(|s| &s.packages)
        .filter(|p| has_reachable_vulnerability(p))
        .count();

    if quiet {
        println!(
            "Total: {}  Sources: {}  Reachable: {}",
            total,
            results.results.len(),
            if reachable > 0 {
                reachable.to_string().red().to_string()
            } else {
                reachable.to_string().green().to_string()
            },
        );
        return Ok(());
    }

    println!("\n {} v{}", "sbom-checkr".bold(), env!("CARGO_PKG_VERSION"));
    println!(
        " {} packages across {} sources\n",
        total,
        results.results.len()
    );

    for source in &results.results {
        println!(
            " {} {} ({} packages)\n",
            "→".cyan(),
            source.source.path.bold(),
            source.packages.len()
        );
        render_table(&source.packages, verbose);
        println!();
    }

    if !results.artifacts.is_empty() {
        println!(" Artifacts:");
        for artifact in &results.artifacts {
            match &artifact.depends_on {
                Some(depends_on) => println!(
                    "   {} ({}) -> {}",
                    artifact.detail.name, artifact.detail.filename, depends_on.filename
                ),
                None => println!("   {} ({})", artifact.detail.name, artifact.detail.filename),
            }
        }
        println!();
    }

    Ok(())
}

fn render_table(packages: &[PackageVulns], verbose: bool) {
    let mut table = Table::new();
    let mut header = vec![
        Cell::new("Name").add_attribute(Attribute::Bold),
        Cell::new("Version").add_attribute(Attribute::Bold),
        Cell::new("Ecosystem").add_attribute(Attribute::Bold),
        Cell::new("Groups").add_attribute(Attribute::Bold),
        Cell::new("Direct").add_attribute(Attribute::Bold),
        Cell::new("Reachability").add_attribute(Attribute::Bold),
    ];
    if verbose {
        header.push(Cell::new("Declared at").add_attribute(Attribute::Bold));
    }

    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);

    for package in packages {
        let (reachability, reachability_color) = reachability_cell(package);

        let mut row = vec![
            Cell::new(&package.package.name),
            Cell::new(if package.package.version.is_empty() {
                &package.package.commit
            } else {
                &package.package.version
            }),
            Cell::new(&package.package.ecosystem),
            Cell::new(package.dependency_groups.join(", ")),
            Cell::new(if package.package.is_direct { "yes" } else { "" })
                .set_alignment(CellAlignment::Center),
            Cell::new(reachability).fg(reachability_color),
        ];

        if verbose {
            let declared_at = package
                .locations
                .first()
                .map(|loc| format!("{}:{}", loc.block.filename, loc.block.line_start))
                .unwrap_or_default();
            row.push(Cell::new(declared_at));
        }

        table.add_row(row);
    }

    println!("{table}");
}

fn has_reachable_vulnerability(package: &PackageVulns) -> bool {
    package
        .reachability
        .as_ref()
        .is_some_and(|r| !r.reachable_vulnerabilities.is_empty())
}

fn reachability_cell(package: &PackageVulns) -> (String, Color) {
    match &package.reachability {
        Some(results) if !results.reachable_vulnerabilities.is_empty() => {
            let ids: Vec<&str> = results
                .reachable_vulnerabilities
                .iter()
                .map(|v| v.advisory_id.as_str())
                .collect();
            (format!("✗ reachable: {}", ids.join(", ")), Color::Red)
        }
        Some(results) if !results.advisory_ids_checked.is_empty() => {
            ("✓ not reachable".to_string(), Color::Green)
        }
        _ => (String::new(), Color::DarkGrey),
    }
}
