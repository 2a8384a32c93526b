// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics.
//!
//! Figment errors are turned into miette reports that point at the offending
//! line of `switchboard.toml`, including keys inside `[[tenants]]` and
//! `[[fallback.providers]]` entries, with "did you mean?" hints for typos.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use std::collections::HashMap;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a known key needs before it is offered as a hint.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration problem, rendered by [`render_errors`].
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown key `{key}` in {section}")]
    #[diagnostic(
        code(switchboard::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Dotted table path, or `top level`.
        section: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("not a {section} key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: found {found}")]
    #[diagnostic(code(switchboard::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
        #[label("expected {expected}")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(switchboard::config::missing_key),
        help("add `{key} = ...` to {section}")
    )]
    MissingKey { key: String, section: String },

    /// A semantic check on a global section failed.
    #[error("validation error: {message}")]
    #[diagnostic(code(switchboard::config::validation))]
    Validation { message: String },

    /// A problem scoped to one `[[tenants]]` entry.
    #[error("tenant `{tenant}`: {message}")]
    #[diagnostic(
        code(switchboard::config::tenant),
        help("check the [[tenants]] entry with id = \"{tenant}\"")
    )]
    Tenant {
        /// Tenant id, or its position when the id is blank.
        tenant: String,
        message: String,
    },

    #[error("configuration error: {0}")]
    #[diagnostic(code(switchboard::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

fn section_name(path: &[String]) -> String {
    if path.is_empty() {
        "top level".to_string()
    } else {
        format!("[{}]", path.join("."))
    }
}

/// Converts every error carried by a figment error into a [`ConfigError`].
///
/// `sources` holds `(name, content)` pairs for the TOML files that were
/// merged, used to attach spans.
pub fn figment_to_config_errors(err: figment::Error, sources: &[(String, String)]) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let path: Vec<String> = error.path.clone();
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let (span, src) = locate(&error, sources, &path, field);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        section: section_name(&path),
                        suggestion: suggest_key(field, expected),
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: field.to_string(),
                    section: section_name(&path),
                },
                Kind::InvalidType(found, expected) => {
                    let (span, src) = match path.split_last() {
                        Some((field, parent)) => locate(&error, sources, parent, field),
                        None => (None, None),
                    };
                    ConfigError::InvalidType {
                        key: path.join("."),
                        found: found.to_string(),
                        expected: expected.clone(),
                        span,
                        src,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Picks the source the error came from and finds `field` under `table`.
///
/// When figment did not record a file (inline strings) and exactly one
/// source was supplied, that source is used.
fn locate(
    error: &figment::Error,
    sources: &[(String, String)],
    table: &[String],
    field: &str,
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let file = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });
    let source = match (&file, sources) {
        (Some(file), _) => sources.iter().find(|(name, _)| name == file),
        (None, [only]) => Some(only),
        (None, _) => None,
    };
    let Some((name, content)) = source else {
        return (None, None);
    };
    match find_key_offset(content, table, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(name, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `field` inside the TOML table addressed by `table`.
///
/// `table` is a figment path such as `["tenants", "1", "line"]`. Array
/// tables are counted per header, so the second `[[tenants]]` entry is
/// `tenants.1` and a following `[tenants.line]` is `tenants.1.line`. When
/// the path carries no indices, every entry of the array is searched in
/// order.
pub fn find_key_offset(content: &str, table: &[String], field: &str) -> Option<usize> {
    let want_indexed = table.join(".");
    let want_plain = strip_indices(&want_indexed);
    let indexed = table.iter().any(|seg| seg.parse::<usize>().is_ok());

    let mut array_index: HashMap<String, usize> = HashMap::new();
    let mut in_target = table.is_empty();
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim();
        if let Some(header) = trimmed.strip_prefix("[[").and_then(|h| h.strip_suffix("]]")) {
            let name = header.trim().to_string();
            array_index
                .entry(name.clone())
                .and_modify(|i| *i += 1)
                .or_insert(0);
            in_target = matches_table(&name, &array_index, indexed, &want_indexed, &want_plain);
        } else if let Some(header) = trimmed.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
            let name = header.trim().to_string();
            in_target = matches_table(&name, &array_index, indexed, &want_indexed, &want_plain);
        } else if in_target {
            let key_start = line.len() - line.trim_start().len();
            let rest = &line[key_start..];
            if let Some(after) = rest.strip_prefix(field)
                && after.trim_start().starts_with('=')
            {
                return Some(offset + key_start);
            }
        }
        offset += line.len();
    }
    None
}

fn matches_table(
    header: &str,
    array_index: &HashMap<String, usize>,
    indexed: bool,
    want_indexed: &str,
    want_plain: &str,
) -> bool {
    if indexed {
        resolve_header(header, array_index) == want_indexed
    } else {
        header == want_plain
    }
}

/// `tenants.line` under the latest `[[tenants]]` becomes `tenants.<n>.line`.
fn resolve_header(header: &str, array_index: &HashMap<String, usize>) -> String {
    let mut prefix = String::new();
    let mut resolved = Vec::new();
    for seg in header.split('.') {
        if !prefix.is_empty() {
            prefix.push('.');
        }
        prefix.push_str(seg.trim());
        resolved.push(seg.trim().to_string());
        if let Some(i) = array_index.get(&prefix) {
            resolved.push(i.to_string());
        }
    }
    resolved.join(".")
}

fn strip_indices(path: &str) -> String {
    path.split('.')
        .filter(|seg| !seg.is_empty() && seg.parse::<usize>().is_err())
        .collect::<Vec<_>>()
        .join(".")
}

/// Closest known key to `unknown`, if any scores above the threshold.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Writes each error to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        match handler.render_report(&mut buf, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{buf}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}
