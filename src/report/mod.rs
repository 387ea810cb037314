//! Report renderers for scan results.
//!
//! - [`table`] — human-readable terminal output; respects `--verbose` / `--quiet`.
//! - [`cyclonedx`] — CycloneDX 1.5 JSON BOM.
//!
//! The flat JSON dump is plain `serde_json` over the result model and lives
//! at the call site.

pub mod cyclonedx;
pub mod table;
