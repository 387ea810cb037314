//! Package URL construction.
//!
//! Builds `pkg:` identifiers from the (name, version, ecosystem) triple of a
//! scanned package. Only the subset of the PURL spec this scanner emits is
//! implemented: type, namespace, name and version.

use anyhow::{anyhow, bail, Result};

use crate::models::ecosystem::{
    ECOSYSTEM_CONAN_CENTER, ECOSYSTEM_CRAN, ECOSYSTEM_CRATES_IO, ECOSYSTEM_GO, ECOSYSTEM_MAVEN,
    ECOSYSTEM_NPM, ECOSYSTEM_NUGET, ECOSYSTEM_PACKAGIST, ECOSYSTEM_PUB, ECOSYSTEM_PYPI,
    ECOSYSTEM_RUBYGEMS,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageUrl {
    pub pkg_type: String,
    pub namespace: Option<String>,
    pub name: String,
    pub version: Option<String>,
}

impl PackageUrl {
    /// Render as a `pkg:type/namespace/name@version` string. Namespace and
    /// name segments are percent-encoded; the version is appended only when
    /// present.
    pub fn to_purl_string(&self) -> String {
        let mut out = format!("pkg:{}/", self.pkg_type);

        if let Some(namespace) = &self.namespace {
            for segment in namespace.split('/') {
                out.push_str(&encode_segment(segment));
                out.push('/');
            }
        }

        out.push_str(&encode_segment(&self.name));

        if let Some(version) = &self.version {
            out.push('@');
            out.push_str(&encode_segment(version));
        }

        out
    }
}

/// Build a PURL for a scanned package. Fails for empty names, ecosystems
/// with no registered PURL type, and Maven names that are not in
/// `group:artifact` form.
pub fn from_name_version_ecosystem(name: &str, version: &str, ecosystem: &str) -> Result<PackageUrl> {
    if name.is_empty() {
        bail!("package has no name");
    }

    let pkg_type = purl_type_for_ecosystem(ecosystem)
        .ok_or_else(|| anyhow!("no purl type registered for ecosystem {ecosystem:?}"))?;

    let (namespace, name) = split_namespace(pkg_type, name)?;

    Ok(PackageUrl {
        pkg_type: pkg_type.to_string(),
        namespace,
        name,
        version: if version.is_empty() {
            None
        } else {
            Some(version.to_string())
        },
    })
}

fn purl_type_for_ecosystem(ecosystem: &str) -> Option<&'static str> {
    match ecosystem {
        ECOSYSTEM_CRATES_IO => Some("cargo"),
        ECOSYSTEM_NPM => Some("npm"),
        ECOSYSTEM_RUBYGEMS => Some("gem"),
        ECOSYSTEM_PYPI => Some("pypi"),
        ECOSYSTEM_MAVEN => Some("maven"),
        ECOSYSTEM_NUGET => Some("nuget"),
        ECOSYSTEM_CRAN => Some("cran"),
        ECOSYSTEM_PACKAGIST => Some("composer"),
        ECOSYSTEM_GO => Some("golang"),
        ECOSYSTEM_PUB => Some("pub"),
        ECOSYSTEM_CONAN_CENTER => Some("conan"),
        _ => None,
    }
}

/// Pull the namespace out of names that embed one: Maven `group:artifact`,
/// npm `@scope/name`, Composer `vendor/name` and Go module paths.
fn split_namespace(pkg_type: &str, name: &str) -> Result<(Option<String>, String)> {
    match pkg_type {
        "maven" => {
            let parts: Vec<&str> = name.split(':').collect();
            if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
                bail!("invalid maven package name {name:?}, expected group:artifact");
            }

            Ok((Some(parts[0].to_string()), parts[1].to_string()))
        }
        "npm" | "composer" | "golang" => match name.rsplit_once('/') {
            Some((namespace, bare)) if !namespace.is_empty() && !bare.is_empty() => {
                Ok((Some(namespace.to_string()), bare.to_string()))
            }
            Some(_) => bail!("invalid package name {name:?}"),
            None => Ok((None, name.to_string())),
        },
        _ => Ok((None, name.to_string())),
    }
}

fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'+' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }

    out
}
