//! `@descriptor` extraction.
//!
//! A descriptor runs from `@` to the end of its line:
//!
//! ```text
//! @param id: load_user -> check_owner
//! @static assets: /public -> ./public
//! @json jsonOpts;
//! @all /api/*: not_found
//! ```
//!
//! The identifier after `@` is the name, the word before the first `:` or
//! `;` is the value and everything after that delimiter is split into
//! arguments, with `->` arrows dropped. Extraction works on the raw query;
//! stripping the lines out of the query is a separate pass.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{Result, XprssoError};

static DESCRIPTOR_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@.*").expect("descriptor line pattern"));
static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@([A-Za-z0-9_]+)").expect("descriptor name pattern"));
static VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z0-9_]+)[:;]").expect("descriptor value pattern"));
static ARGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[:;](.*)").expect("descriptor args pattern"));

/// Name of the catch-all descriptor, whose value is a route path.
pub const ALL: &str = "all";

/// Arrow separating descriptor arguments.
pub const ARROW: &str = "->";

/// One parsed `@name value: args` annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Descriptor {
    pub name: String,
    pub value: String,
    pub args: Vec<String>,
}

/// Extract every descriptor from a raw query, in source order.
///
/// Returns an empty list when the query has no `@` lines.
pub fn parse_descriptors(query: &str) -> Result<Vec<Descriptor>> {
    DESCRIPTOR_LINE
        .find_iter(query)
        .map(|m| parse_line(m.as_str()))
        .collect()
}

/// Parse a single descriptor line starting at `@`.
pub fn parse_line(line: &str) -> Result<Descriptor> {
    let name = NAME
        .captures(line)
        .map(|c| c[1].to_string())
        .ok_or_else(|| XprssoError::DescriptorNameMissing {
            line: line.trim().to_string(),
        })?;

    let (value, rest) = if name == ALL {
        split_path_value(line, &name)?
    } else {
        let tail = &line[1 + name.len()..];
        let value = VALUE
            .captures(tail)
            .map(|c| c[1].to_string())
            .ok_or_else(|| XprssoError::DescriptorValueMissing { name: name.clone() })?;
        let rest = ARGS
            .captures(tail)
            .map(|c| c.get(1).map_or("", |m| m.as_str()))
            .unwrap_or("");
        (value, rest)
    };

    Ok(Descriptor {
        name,
        value,
        args: split_args(rest),
    })
}

/// `@all` carries a route path as its value: everything between the name
/// and the delimiter, kept whole. Its delimiter is the first `:` or `;`
/// followed by whitespace or the end of the line, which keeps `:param`
/// segments inside the path.
fn split_path_value<'a>(line: &'a str, name: &str) -> Result<(String, &'a str)> {
    let missing = || XprssoError::DescriptorValueMissing {
        name: name.to_string(),
    };
    let head_start = 1 + name.len();
    let bytes = line.as_bytes();
    let delimiter = line
        .char_indices()
        .skip_while(|(i, _)| *i < head_start)
        .find(|(i, c)| {
            (*c == ':' || *c == ';')
                && bytes
                    .get(i + 1)
                    .map_or(true, |next| next.is_ascii_whitespace())
        })
        .map(|(i, _)| i)
        .ok_or_else(missing)?;

    let value = line[head_start..delimiter].trim();
    if value.is_empty() {
        return Err(missing());
    }
    Ok((value.to_string(), &line[delimiter + 1..]))
}

fn split_args(rest: &str) -> Vec<String> {
    rest.split_whitespace()
        .filter(|arg| *arg != ARROW)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUERY: &str = r#"
    {
        / {
            @param id: foo -> bar -> baz
            GET {
                baz
            }
        }
        /api {
            POST {
                bar
            }
        }
    }
    "#;

    #[test]
    fn test_param_descriptor() {
        let descriptors = parse_descriptors(QUERY).unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].name, "param");
        assert_eq!(descriptors[0].value, "id");
        assert_eq!(descriptors[0].args, vec!["foo", "bar", "baz"]);
    }

    #[test]
    fn test_no_descriptors() {
        assert!(parse_descriptors("{ / { GET { foo } } }").unwrap().is_empty());
    }

    #[test]
    fn test_semicolon_delimiter() {
        let d = parse_line("@json jsonOpts;").unwrap();
        assert_eq!(d.name, "json");
        assert_eq!(d.value, "jsonOpts");
        assert!(d.args.is_empty());
    }

    #[test]
    fn test_static_args_are_raw() {
        let d = parse_line("@static assets: /public -> ./public").unwrap();
        assert_eq!(d.value, "assets");
        assert_eq!(d.args, vec!["/public", "./public"]);
    }

    #[test]
    fn test_all_value_is_a_path() {
        let d = parse_line("@all /api/*: not_found").unwrap();
        assert_eq!(d.name, "all");
        assert_eq!(d.value, "/api/*");
        assert_eq!(d.args, vec!["not_found"]);

        let d = parse_line("@all /user/:id; log -> show").unwrap();
        assert_eq!(d.value, "/user/:id");
        assert_eq!(d.args, vec!["log", "show"]);
    }

    #[test]
    fn test_missing_name() {
        let err = parse_line("@ id: foo").unwrap_err();
        assert!(matches!(err, XprssoError::DescriptorNameMissing { .. }));
    }

    #[test]
    fn test_missing_delimiter() {
        let err = parse_line("@param id foo").unwrap_err();
        match err {
            XprssoError::DescriptorValueMissing { name } => assert_eq!(name, "param"),
            other => panic!("unexpected error: {other}"),
        }

        let err = parse_line("@all /api foo").unwrap_err();
        assert!(matches!(err, XprssoError::DescriptorValueMissing { .. }));
    }

    #[test]
    fn test_empty_value() {
        for line in ["@param: foo", "@json;", "@param : foo", "@all : foo", "@all;"] {
            match parse_line(line).unwrap_err() {
                XprssoError::DescriptorValueMissing { name } => {
                    assert_eq!(name, &line[1..name.len() + 1]);
                }
                other => panic!("unexpected error for `{line}`: {other}"),
            }
        }
    }

    #[test]
    fn test_all_path_keeps_every_character() {
        let d = parse_line("@all /api-v1/*: foo").unwrap();
        assert_eq!(d.value, "/api-v1/*");
        assert_eq!(d.args, vec!["foo"]);

        let d = parse_line("@all /files/~me/(a|b): foo").unwrap();
        assert_eq!(d.value, "/files/~me/(a|b)");
    }

    #[test]
    fn test_empty_args_are_dropped() {
        let d = parse_line("@param id:   foo   ->    bar  ").unwrap();
        assert_eq!(d.args, vec!["foo", "bar"]);
    }
}
