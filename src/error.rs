use thiserror::Error;

/// Errors that callers are expected to match on. Everything else flows
/// through `anyhow` with file-path context attached at the failure site.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Sentinel: the scan completed but nothing parseable was found. Callers
    /// short-circuit to a clean "no packages" exit instead of reporting a
    /// failure.
    #[error("no packages found in scan")]
    NoPackagesFound,

    /// An explicit `format:path` argument named a format that is not
    /// registered.
    #[error("no parser registered under the name {0:?}")]
    UnknownParser(String),

    /// A path passed to the registry that no extractor recognizes.
    #[error("no parser found for {0:?}")]
    NoParserForFile(String),
}
