use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "sbom-checkr",
    about = "Scan dependency manifests, build an SBOM, and check vulnerable-symbol reachability",
    version
)]
pub struct Cli {
    /// Directories to scan for dependency manifests
    #[arg(value_name = "DIR")]
    pub paths: Vec<PathBuf>,

    /// Explicit lockfile to parse, optionally with a format prefix (repeatable)
    #[arg(short = 'L', long = "lockfile", value_name = "[FORMAT:]PATH")]
    pub lockfile: Vec<String>,

    /// Recurse into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Also scan paths excluded by .gitignore files
    #[arg(long)]
    pub no_ignore: bool,

    /// Report format
    #[arg(long, default_value = "table", value_name = "FORMAT")]
    pub report: ReportFormat,

    /// Only run the named parsers (repeatable) [default: all]
    #[arg(long = "enable-parsers", value_name = "NAME")]
    pub enable_parsers: Vec<String>,

    /// Skip the vulnerable-symbol reachability analysis
    #[arg(long)]
    pub no_reachability: bool,

    /// Override the vulnerability-resolver base URL
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Override the resolver auth token (otherwise taken from the environment)
    #[arg(long, value_name = "TOKEN", hide = true)]
    pub jwt_token: Option<String>,

    /// Show per-package locations in the table report
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print the summary line
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Table,
    Json,
    #[value(name = "cyclonedx-1-5")]
    CycloneDx15,
}
