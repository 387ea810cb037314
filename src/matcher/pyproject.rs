//! Enrich `pdm.lock` packages from the `pyproject.toml` next to it.
//!
//! The TOML structure decides which group a declaration belongs to
//! (`[project] dependencies`, `[project.optional-dependencies]`,
//! `[tool.pdm.dev-dependencies]`, `[dependency-groups]`); positions are
//! recovered by locating each requirement string in the raw file text, since
//! the supported grammar set has no TOML syntax tree.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use toml::Value;

use super::Matcher;
use crate::extractor::DepFile;
use crate::models::{DepGroup, PackageDetails};
use crate::position::{FilePosition, Position};

const PYPROJECT_FILENAME: &str = "pyproject.toml";

pub struct PyprojectTomlMatcher;

impl Matcher for PyprojectTomlMatcher {
    fn get_source_file(&self, lockfile: &DepFile) -> Result<Option<DepFile>> {
        let dir = lockfile.path.parent().unwrap_or_else(|| Path::new("."));
        let source_path = dir.join(PYPROJECT_FILENAME);
        if !source_path.exists() {
            return Ok(None);
        }

        DepFile::open(&source_path).map(Some)
    }

    fn match_packages(&self, source_file: &DepFile, packages: &mut [PackageDetails]) -> Result<()> {
        let doc: Value = toml::from_str(&source_file.content)
            .with_context(|| format!("could not parse {}", source_file.path.display()))?;

        let declarations = collect_declarations(&doc);

        let packages_by_name: HashMap<String, usize> = packages
            .iter()
            .enumerate()
            .map(|(index, pkg)| (normalize_name(&pkg.name), index))
            .collect();

        for declaration in declarations {
            let Some(parsed) = parse_requirement(&declaration.requirement) else {
                continue;
            };
            // Declared but not locked: the lockfile is the source of truth.
            let Some(&index) = packages_by_name.get(&normalize_name(&parsed.name)) else {
                continue;
            };

            enrich_package(
                &mut packages[index],
                source_file,
                &declaration,
                &parsed,
            );
        }

        Ok(())
    }
}

struct Declaration {
    requirement: String,
    group: Option<DepGroup>,
}

/// Walk the known dependency tables in declaration order.
fn collect_declarations(doc: &Value) -> Vec<Declaration> {
    let mut declarations = Vec::new();

    let project = doc.get("project");

    if let Some(list) = project
        .and_then(|p| p.get("dependencies"))
        .and_then(Value::as_array)
    {
        push_requirements(&mut declarations, list, None);
    }

    if let Some(extras) = project
        .and_then(|p| p.get("optional-dependencies"))
        .and_then(Value::as_table)
    {
        for list in extras.values().filter_map(Value::as_array) {
            push_requirements(&mut declarations, list, Some(DepGroup::from("optional")));
        }
    }

    let dev_tables = [
        doc.get("tool")
            .and_then(|t| t.get("pdm"))
            .and_then(|p| p.get("dev-dependencies")),
        doc.get("dependency-groups"),
    ];
    for table in dev_tables.into_iter().flatten() {
        if let Some(groups) = table.as_table() {
            for list in groups.values().filter_map(Value::as_array) {
                push_requirements(&mut declarations, list, Some(DepGroup::from("dev")));
            }
        }
    }

    declarations
}

fn push_requirements(declarations: &mut Vec<Declaration>, list: &[Value], group: Option<DepGroup>) {
    for requirement in list.iter().filter_map(Value::as_str) {
        declarations.push(Declaration {
            requirement: requirement.to_string(),
            group: group.clone(),
        });
    }
}

struct ParsedRequirement {
    name: String,
    /// Byte offset of the version constraint inside the requirement string.
    constraint: Option<(usize, String)>,
}

/// Split a PEP 508 requirement into its distribution name and version
/// constraint (`flask[async]>=2.0; python_version > "3.8"` → `flask`,
/// `>=2.0`).
fn parse_requirement(requirement: &str) -> Option<ParsedRequirement> {
    let re = Regex::new(r"^\s*([A-Za-z0-9][A-Za-z0-9._-]*)").expect("valid requirement regex");
    let name_match = re.captures(requirement)?.get(1)?;

    let rest = &requirement[name_match.end()..];
    let before_marker = rest.split(';').next().unwrap_or("");
    let constraint = before_marker
        .find(['<', '>', '=', '!', '~', '^'])
        .map(|offset| {
            let constraint = before_marker[offset..].trim().to_string();
            (name_match.end() + offset, constraint)
        });

    Some(ParsedRequirement {
        name: name_match.as_str().to_string(),
        constraint,
    })
}

/// PEP 503 name normalization: case-insensitive, runs of `-`, `_` and `.`
/// are equivalent.
fn normalize_name(name: &str) -> String {
    let re = Regex::new(r"[-_.]+").expect("valid normalization regex");
    re.replace_all(&name.to_lowercase(), "-").into_owned()
}

fn enrich_package(
    package: &mut PackageDetails,
    source_file: &DepFile,
    declaration: &Declaration,
    parsed: &ParsedRequirement,
) {
    let Some(span) = find_quoted(&source_file.content, &declaration.requirement) else {
        return;
    };
    let filename = source_file.path_string();
    let line = Position {
        start: span.line,
        end: span.line,
    };

    // Block: the whole quoted requirement, quotes included.
    package.block_location = Some(FilePosition {
        line,
        column: Position {
            start: span.column,
            end: span.column + declaration.requirement.len() + 2,
        },
        filename: filename.clone(),
    });

    // Name: right after the opening quote.
    let name_start = span.column + 1;
    package.name_location = Some(FilePosition {
        line,
        column: Position {
            start: name_start,
            end: name_start + parsed.name.len(),
        },
        filename: filename.clone(),
    });

    if let Some((offset, constraint)) = &parsed.constraint {
        let version_start = span.column + 1 + offset;
        package.version_location = Some(FilePosition {
            line,
            column: Position {
                start: version_start,
                end: version_start + constraint.len(),
            },
            filename,
        });
    }

    if let Some(group) = &declaration.group {
        if !package.dep_groups.contains(group) {
            package.dep_groups.push(group.clone());
        }
    }
}

struct QuotedSpan {
    /// 1-indexed line of the quoted string.
    line: usize,
    /// 1-indexed column of the opening quote.
    column: usize,
}

fn find_quoted(content: &str, needle: &str) -> Option<QuotedSpan> {
    let quoted = format!("\"{needle}\"");
    let offset = content.find(&quoted)?;

    let line = content[..offset].matches('\n').count() + 1;
    let line_start = content[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);

    Some(QuotedSpan {
        line,
        column: offset - line_start + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Ecosystem, PackageManager};

    fn pyproject(content: &str) -> DepFile {
        DepFile {
            path: "project/pyproject.toml".into(),
            content: content.to_string(),
        }
    }

    fn lock_package(name: &str, version: &str) -> PackageDetails {
        PackageDetails {
            name: name.to_string(),
            version: version.to_string(),
            ecosystem: Ecosystem::from("PyPI"),
            package_manager: PackageManager::Pdm,
            ..Default::default()
        }
    }

    const PYPROJECT: &str = r#"[project]
name = "example"
dependencies = [
    "requests>=2.28",
    "Flask>=2.0",
]

[project.optional-dependencies]
cli = ["rich>=13.0"]

[tool.pdm.dev-dependencies]
test = ["pytest>=7.0"]
"#;

    #[test]
    fn test_positions_and_groups() {
        let source = pyproject(PYPROJECT);
        let mut packages = vec![
            lock_package("requests", "2.31.0"),
            lock_package("flask", "2.3.0"),
            lock_package("rich", "13.0.0"),
            lock_package("pytest", "7.4.0"),
        ];

        PyprojectTomlMatcher.match_packages(&source, &mut packages).unwrap();

        let requests = &packages[0];
        let block = requests.block_location.as_ref().unwrap();
        assert!(block.is_extracted_successfully());
        assert_eq!(block.line, Position { start: 4, end: 4 });
        assert_eq!(block.column, Position { start: 5, end: 21 });
        assert_eq!(block.filename, "project/pyproject.toml");

        let name = requests.name_location.as_ref().unwrap();
        assert_eq!(name.column, Position { start: 6, end: 14 });

        let version = requests.version_location.as_ref().unwrap();
        assert_eq!(version.column, Position { start: 14, end: 20 });
        assert!(requests.dep_groups.is_empty());

        // Name matching is PEP 503 normalized: "Flask" matches "flask".
        assert!(packages[1].block_location.is_some());

        assert_eq!(packages[2].dep_groups, vec![DepGroup::from("optional")]);
        assert_eq!(packages[3].dep_groups, vec![DepGroup::from("dev")]);
        assert!(packages[3].block_location.as_ref().unwrap().is_extracted_successfully());
    }

    #[test]
    fn test_locked_package_missing_from_pyproject() {
        let source = pyproject(PYPROJECT);
        let mut packages = vec![lock_package("urllib3", "2.0.0")];

        PyprojectTomlMatcher.match_packages(&source, &mut packages).unwrap();

        assert!(packages[0].block_location.is_none());
        assert!(packages[0].dep_groups.is_empty());
    }

    #[test]
    fn test_declared_but_not_locked_is_skipped() {
        let source = pyproject(PYPROJECT);
        let mut packages = vec![lock_package("pytest", "7.4.0")];

        PyprojectTomlMatcher.match_packages(&source, &mut packages).unwrap();

        // Only pytest gets enriched; nothing crashes on the other entries.
        assert!(packages[0].block_location.is_some());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let source = pyproject("[project\n");
        let mut packages = vec![lock_package("requests", "2.31.0")];

        assert!(PyprojectTomlMatcher.match_packages(&source, &mut packages).is_err());
    }

    #[test]
    fn test_parse_requirement() {
        let parsed = parse_requirement("flask[async]>=2.0; python_version > \"3.8\"").unwrap();
        assert_eq!(parsed.name, "flask");
        let (offset, constraint) = parsed.constraint.unwrap();
        assert_eq!(constraint, ">=2.0");
        assert_eq!(offset, 12);

        let bare = parse_requirement("requests").unwrap();
        assert_eq!(bare.name, "requests");
        assert!(bare.constraint.is_none());
    }

    #[test]
    fn test_get_source_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let lockfile = DepFile {
            path: dir.path().join("pdm.lock"),
            content: String::new(),
        };

        assert!(PyprojectTomlMatcher.get_source_file(&lockfile).unwrap().is_none());
    }
}
