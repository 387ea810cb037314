//! CSV input: `ecosystem,package_manager,name,version` rows, used to feed
//! externally-assembled package lists into the pipeline. Never auto-detected;
//! it must be requested explicitly as `csv:<path>`.

use std::path::Path;

use anyhow::{bail, Context, Result};

use super::{DepFile, Extractor};
use crate::models::{Ecosystem, PackageDetails, PackageManager};

pub struct CsvExtractor;

impl Extractor for CsvExtractor {
    fn should_extract(&self, _path: &Path) -> bool {
        // CSV input is only ever parsed when asked for by name.
        false
    }

    fn extract(&self, file: &DepFile) -> Result<Vec<PackageDetails>> {
        let mut packages = Vec::new();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file.content.as_bytes());

        for (index, record) in reader.records().enumerate() {
            let row = index + 1;
            let record = record.with_context(|| format!("row {row}"))?;
            let details = from_csv_record(&record).with_context(|| format!("row {row}"))?;
            packages.push(details);
        }

        packages.sort_by(|a, b| a.name.cmp(&b.name).then(a.version.cmp(&b.version)));

        Ok(packages)
    }
}

fn from_csv_record(record: &csv::StringRecord) -> Result<PackageDetails> {
    if record.len() < 4 {
        bail!("not enough fields (expected at least four)");
    }

    let ecosystem = record[0].to_string();
    let name = record[2].to_string();
    let mut version = record[3].to_string();
    let mut commit = String::new();

    // A row with no ecosystem is a commit-only VCS reference: the fourth
    // field holds the commit instead of a version.
    if ecosystem.is_empty() {
        if version.is_empty() {
            bail!("field 4 is empty (must be a commit)");
        }
        commit = std::mem::take(&mut version);
    }

    if name.is_empty() {
        bail!("field 3 is empty (must be the name of a package)");
    }

    Ok(PackageDetails {
        name,
        version,
        commit,
        ecosystem: Ecosystem::from(ecosystem),
        package_manager: PackageManager::Unknown,
        ..Default::default()
    })
}
