//! CycloneDX 1.5 JSON BOM rendering.
//!
//! Output ordering is deterministic: components sorted by bom-ref,
//! vulnerabilities by id, dependency edges by ref.

use anyhow::Result;
use serde::Serialize;

use crate::models::results::VulnerabilityResults;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CycloneDxBom {
    bom_format: &'static str,
    spec_version: &'static str,
    version: u32,
    metadata: CycloneDxMetadata,
    components: Vec<CycloneDxComponent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dependencies: Vec<CycloneDxDependency>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    vulnerabilities: Vec<CycloneDxVulnerability>,
}

#[derive(Serialize)]
struct CycloneDxMetadata {
    tools: Vec<CycloneDxTool>,
}

#[derive(Serialize)]
struct CycloneDxTool {
    name: String,
    version: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CycloneDxComponent {
    #[serde(rename = "bom-ref")]
    bom_ref: String,
    #[serde(rename = "type")]
    component_type: &'static str,
    name: String,
    version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    purl: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    properties: Vec<CycloneDxProperty>,
}

#[derive(Serialize)]
struct CycloneDxProperty {
    name: String,
    value: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CycloneDxDependency {
    #[serde(rename = "ref")]
    dependency_ref: String,
    depends_on: Vec<String>,
}

#[derive(Serialize)]
struct CycloneDxVulnerability {
    id: String,
    affects: Vec<CycloneDxAffects>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    properties: Vec<CycloneDxProperty>,
}

#[derive(Serialize)]
struct CycloneDxAffects {
    #[serde(rename = "ref")]
    affects_ref: String,
}

/// Serialize the scan results as a CycloneDX 1.5 BOM document.
pub fn render_json(results: &VulnerabilityResults) -> Result<String> {
    let mut components = Vec::new();
    let mut vulnerabilities: Vec<CycloneDxVulnerability> = Vec::new();

    for source in &results.results {
        for package in &source.packages {
            let bom_ref = if package.package.purl.is_empty() {
                format!("{}@{}", package.package.name, package.package.version)
            } else {
                package.package.purl.clone()
            };

            let mut properties = vec![CycloneDxProperty {
                name: "sbom-checkr:source:path".to_string(),
                value: source.source.path.clone(),
            }];
            for group in &package.dependency_groups {
                properties.push(CycloneDxProperty {
                    name: "sbom-checkr:dependency:group".to_string(),
                    value: group.clone(),
                });
            }
            if package.package.is_direct {
                properties.push(CycloneDxProperty {
                    name: "sbom-checkr:dependency:is_direct".to_string(),
                    value: "true".to_string(),
                });
            }

            components.push(CycloneDxComponent {
                bom_ref: bom_ref.clone(),
                component_type: "library",
                name: package.package.name.clone(),
                version: package.package.version.clone(),
                purl: package.package.purl.clone(),
                properties,
            });

            if let Some(reachability) = &package.reachability {
                for vulnerability in &reachability.reachable_vulnerabilities {
                    // The symbol locations go into a string property; the
                    // BOM field they feed expects serialized JSON.
                    let locations =
                        serde_json::to_string(&vulnerability.reachable_symbol_locations)?;
                    vulnerabilities.push(CycloneDxVulnerability {
                        id: vulnerability.advisory_id.clone(),
                        affects: vec![CycloneDxAffects {
                            affects_ref: bom_ref.clone(),
                        }],
                        properties: vec![CycloneDxProperty {
                            name: "sbom-checkr:reachability:symbol_locations".to_string(),
                            value: locations,
                        }],
                    });
                }
            }
        }
    }

    let mut dependencies: Vec<CycloneDxDependency> = results
        .artifacts
        .iter()
        .filter_map(|artifact| {
            artifact.depends_on.as_ref().map(|depends_on| CycloneDxDependency {
                dependency_ref: artifact.detail.filename.clone(),
                depends_on: vec![depends_on.filename.clone()],
            })
        })
        .collect();

    components.sort_by(|a, b| a.bom_ref.cmp(&b.bom_ref));
    vulnerabilities.sort_by(|a, b| a.id.cmp(&b.id));
    dependencies.sort_by(|a, b| a.dependency_ref.cmp(&b.dependency_ref));

    let bom = CycloneDxBom {
        bom_format: "CycloneDX",
        spec_version: "1.5",
        version: 1,
        metadata: CycloneDxMetadata {
            tools: vec![CycloneDxTool {
                name: "sbom-checkr".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            }],
        },
        components,
        dependencies,
        vulnerabilities,
    };

    Ok(serde_json::to_string_pretty(&bom)?)
}
