//! Express-style path compilation.
//!
//! # Responsibilities
//! - Compile a decoded literal path (`/user/:id?`, `/files/*`, `/ab(cd)?`)
//!   into a case-insensitive regex plus the ordered parameter names
//! - Compile a regex route source as-is, naming its groups by position
//! - Report where a match ended so mounts can strip their prefix
//!
//! # Design Decisions
//! - Routes match the whole path with an optional trailing slash
//! - Mounts match a prefix that ends on a segment boundary
//! - Regex routes are not anchored, the same as the express router

use regex::Regex;

use crate::error::{Result, XprssoError};
use crate::query::escape::RoutePath;

/// How much of the request path a matcher must cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// The whole path, optionally followed by a trailing slash.
    Route,
    /// A leading run of whole segments.
    Mount,
}

/// A successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    /// Captured parameters in pattern order; unmatched optional ones are
    /// left out.
    pub params: Vec<(String, String)>,
    /// Byte offset in the request path where the match ended.
    pub end: usize,
}

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    source: RoutePath,
    regex: Regex,
    keys: Vec<String>,
    mode: MatchMode,
}

impl PathMatcher {
    pub fn compile(path: &RoutePath, mode: MatchMode) -> Result<Self> {
        let invalid = |reason: String| XprssoError::InvalidRoutePath {
            path: path.to_string(),
            reason,
        };
        let (pattern, keys) = match path {
            RoutePath::Literal(literal) => literal_pattern(literal, mode).map_err(invalid)?,
            RoutePath::Regex(source) => (source.clone(), Vec::new()),
        };
        let regex = Regex::new(&pattern).map_err(|e| invalid(e.to_string()))?;
        let keys = match path {
            RoutePath::Literal(_) => keys,
            RoutePath::Regex(_) => regex
                .capture_names()
                .skip(1)
                .enumerate()
                .map(|(i, name)| name.map_or_else(|| i.to_string(), str::to_string))
                .collect(),
        };
        Ok(Self {
            source: path.clone(),
            regex,
            keys,
            mode,
        })
    }

    pub fn source(&self) -> &RoutePath {
        &self.source
    }

    /// Parameter names in capture order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn matches(&self, path: &str) -> Option<PathMatch> {
        let captures = self.regex.captures(path)?;
        let whole = captures.get(0)?;
        let end = whole.end();
        if self.mode == MatchMode::Mount
            && matches!(self.source, RoutePath::Literal(_))
            && end < path.len()
            && !path[..end].ends_with('/')
            && !path[end..].starts_with('/')
        {
            return None;
        }
        let params = self
            .keys
            .iter()
            .enumerate()
            .filter_map(|(i, key)| {
                captures
                    .get(i + 1)
                    .map(|m| (key.clone(), m.as_str().to_string()))
            })
            .collect();
        Some(PathMatch { params, end })
    }
}

fn literal_pattern(path: &str, mode: MatchMode) -> std::result::Result<(String, Vec<String>), String> {
    let body = match mode {
        MatchMode::Mount => path.trim_end_matches('/'),
        MatchMode::Route => path,
    };
    let chars: Vec<char> = body.chars().collect();
    let mut pattern = String::from("(?i)^");
    let mut keys = Vec::new();
    let mut wildcards = 0usize;
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            ':' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && (chars[end] == '_' || chars[end].is_ascii_alphanumeric()) {
                    end += 1;
                }
                if end == start {
                    return Err(format!("parameter at position {} has no name", i));
                }
                keys.push(chars[start..end].iter().collect());
                if chars.get(end) == Some(&'?') {
                    if pattern.ends_with('/') {
                        pattern.pop();
                        pattern.push_str("(?:/([^/]+?))?");
                    } else {
                        pattern.push_str("([^/]+?)?");
                    }
                    i = end + 1;
                } else {
                    pattern.push_str("([^/]+?)");
                    i = end;
                }
            }
            '*' => {
                pattern.push_str("(.*)");
                keys.push(wildcards.to_string());
                wildcards += 1;
                i += 1;
            }
            '(' => {
                pattern.push_str("(?:");
                i += 1;
            }
            c @ (')' | '+' | '?') => {
                pattern.push(c);
                i += 1;
            }
            c => {
                let mut buf = [0u8; 4];
                pattern.push_str(&regex::escape(c.encode_utf8(&mut buf)));
                i += 1;
            }
        }
    }

    match mode {
        MatchMode::Route if body.ends_with('/') => pattern.push_str("?$"),
        MatchMode::Route => pattern.push_str("/?$"),
        MatchMode::Mount => {}
    }
    Ok((pattern, keys))
}
