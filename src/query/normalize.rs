//! Turning an annotated query into text the schema engine accepts.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::LazyLock;

use indexmap::IndexSet;
use regex::Regex;

use crate::error::{Result, XprssoError};
use crate::query::escape::encode;

static COMMENT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^.*#.*$").expect("comment pattern"));
static DESCRIPTOR_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@.*").expect("descriptor pattern"));
static PATH_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_[A-Za-z][A-Za-z0-9_]+").expect("path identifier pattern"));

/// Remove every line containing `#`. The whole line goes, not only the
/// text after the marker.
pub fn strip_comments(query: &str) -> String {
    COMMENT_LINE.replace_all(query, "").into_owned()
}

/// Remove every `@...` descriptor up to the end of its line.
pub fn strip_descriptors(query: &str) -> String {
    DESCRIPTOR_LINE.replace_all(query, "").into_owned()
}

/// Reject queries that are empty or only whitespace.
pub fn validate_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(XprssoError::EmptyQuery);
    }
    Ok(())
}

/// Strip comments and descriptors, then escape what is left.
pub fn normalize(raw: &str) -> Result<String> {
    validate_query(raw)?;
    let query = strip_comments(raw);
    let query = strip_descriptors(&query);
    Ok(encode(&query))
}

/// Path identifiers referenced by an escaped query, in source order and
/// without repeats.
pub fn extract_path_identifiers(safe: &str) -> Result<Vec<String>> {
    validate_query(safe)?;
    let paths: IndexSet<&str> = PATH_IDENTIFIER
        .find_iter(safe)
        .map(|m| m.as_str())
        .collect();
    if paths.is_empty() {
        return Err(XprssoError::NoPaths);
    }
    Ok(paths.into_iter().map(str::to_string).collect())
}

/// Read a query file.
pub fn read_query_file(path: impl AsRef<Path>) -> Result<String> {
    Ok(fs::read_to_string(path)?)
}

/// Resolve a `set` argument: text containing a selection block is the query
/// itself, anything else is tried as a file path relative to the working
/// directory and used literally when no such file exists.
pub fn load_source(source: &str) -> Result<String> {
    if source.contains('{') {
        return Ok(source.to_string());
    }
    match fs::read_to_string(source) {
        Ok(contents) => {
            tracing::debug!(path = %source, "Loaded query file");
            Ok(contents)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(source.to_string()),
        Err(e) => Err(e.into()),
    }
}
