//! Parser for pip `requirements*.txt` files.
//!
//! Supports the PEP 508 subset that appears in practice: a name, optional
//! extras, optional version specifiers (bare or parenthesized), a direct
//! URL after `@`, and environment markers after `;` (ignored). Option lines
//! (`-r`, `-e`, `--index-url`, ...) and bare paths or URLs are skipped.

use std::path::Path;

use super::types::{Declaration, DependencyKind, Ecosystem, PackageId, ParsedManifest};
use super::{directory_name, ManifestKind, ManifestParser, ParseResult};
use crate::diagnostics::Warning;

/// Parser for `requirements.txt` and its variants (`requirements-dev.txt`, ...).
pub struct RequirementsParser;

/// A requirement line split into its parts.
#[derive(Debug, PartialEq)]
struct RequirementLine<'a> {
    name: &'a str,
    specifier: &'a str,
}

/// Joins `\` continuations and strips comments.
fn logical_lines(content: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut start = 0;

    for (number, raw) in content.lines().enumerate() {
        if current.is_empty() {
            start = number + 1;
        }
        let line = match raw.find(" #").or_else(|| raw.starts_with('#').then_some(0)) {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        match line.trim_end().strip_suffix('\\') {
            Some(head) => {
                current.push_str(head);
                current.push(' ');
            }
            None => {
                current.push_str(line);
                let text = current.trim().to_string();
                if !text.is_empty() {
                    lines.push((start, text));
                }
                current.clear();
            }
        }
    }
    let text = current.trim().to_string();
    if !text.is_empty() {
        lines.push((start, text));
    }
    lines
}

/// Splits a PEP 508 requirement into name and version specifier.
fn split_requirement(line: &str) -> Result<RequirementLine<'_>, String> {
    let line = line.split(';').next().unwrap_or_default().trim();
    let name_len = line
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(line.len());
    let name = &line[..name_len];
    if name.is_empty() || !name.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return Err(format!("not a requirement: '{}'", line));
    }

    let mut rest = line[name_len..].trim_start();
    if let Some(after) = rest.strip_prefix('[') {
        let close = after.find(']').ok_or_else(|| format!("unterminated extras in '{}'", line))?;
        rest = after[close + 1..].trim_start();
    }
    if let Some(inner) = rest.strip_prefix('(') {
        rest = inner
            .strip_suffix(')')
            .ok_or_else(|| format!("unterminated parenthesis in '{}'", line))?
            .trim();
    }
    Ok(RequirementLine { name, specifier: rest })
}

/// `requirements-dev.txt`, `requirements-test.txt` and the like hold tooling.
fn kind_for(path: &Path) -> DependencyKind {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if ["dev", "test", "lint", "doc"].iter().any(|w| stem.contains(w)) {
        DependencyKind::Dev
    } else {
        DependencyKind::Normal
    }
}

impl ManifestParser for RequirementsParser {
    fn parse(&self, path: &Path, content: &str) -> ParseResult<ParsedManifest> {
        let project = PackageId::new(Ecosystem::PyPI, directory_name(path));
        let mut manifest = ParsedManifest::new(path, ManifestKind::Requirements, project);
        let kind = kind_for(path);

        for (number, line) in logical_lines(content) {
            if line.starts_with(['-', '.', '/']) || (line.contains("://") && !line.contains('@')) {
                tracing::trace!(line = number, "skipping option or path line");
                continue;
            }
            match split_requirement(&line) {
                Ok(parsed) => {
                    let id = PackageId::new(Ecosystem::PyPI, parsed.name);
                    let requirement = manifest.requirement(&id, parsed.specifier);
                    manifest
                        .declarations
                        .push(Declaration::direct(id, requirement, kind, path));
                }
                Err(message) => manifest.warnings.push(Warning::Parse {
                    path: path.to_path_buf(),
                    message: format!("line {}: {}", number, message),
                }),
            }
        }
        Ok(manifest)
    }
}
