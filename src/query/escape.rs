//! Lexical escaping between route-pattern characters and schema-safe tokens.
//!
//! # Responsibilities
//! - Encode reserved characters into `_name_` tokens so a route pattern can
//!   be used as a schema identifier
//! - Decode tokens back into their literal characters
//! - Classify a decoded identifier as a literal or a regex route
//!
//! # Design Decisions
//! - Tokens consist of letters and underscores only, so no token contains a
//!   reserved character and encoding order cannot produce overlaps
//! - Decoding scans left to right and consumes whole tokens; a token-shaped
//!   run that straddles two real tokens (`_dot_slash_slash_`) is never
//!   misread
//! - Round trips are exact for text without underscores; an underscore in
//!   the literal text can collide with a token and is not guaranteed to
//!   survive

use std::fmt;

/// Reserved characters and the tokens that stand in for them.
pub const ESCAPE_TABLE: [(char, &str); 13] = [
    ('\\', "_backslash_"),
    ('/', "_slash_"),
    (':', "_colon_"),
    ('^', "_carrot_"),
    ('$', "_dollar_"),
    ('.', "_dot_"),
    ('*', "_asterisk_"),
    ('(', "_leftperen_"),
    (')', "_rightperen_"),
    ('[', "_leftbracket_"),
    (']', "_rightbracket_"),
    ('?', "_questionmark_"),
    ('+', "_addition_"),
];

/// Token for the path separator.
pub const SLASH_TOKEN: &str = "_slash_";

/// Token for the parameter marker.
pub const COLON_TOKEN: &str = "_colon_";

/// Token standing in for `c`, if `c` is reserved.
pub fn token_for(c: char) -> Option<&'static str> {
    ESCAPE_TABLE
        .iter()
        .find(|(literal, _)| *literal == c)
        .map(|(_, token)| *token)
}

/// Replace every reserved character with its token.
pub fn encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match token_for(c) {
            Some(token) => out.push_str(token),
            None => out.push(c),
        }
    }
    out
}

/// Replace every token with the character it stands for.
pub fn decode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    'scan: while let Some(c) = rest.chars().next() {
        if c == '_' {
            for (literal, token) in ESCAPE_TABLE.iter() {
                if let Some(after) = rest.strip_prefix(token) {
                    out.push(*literal);
                    rest = after;
                    continue 'scan;
                }
            }
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

/// True when an escaped identifier both starts and ends with the slash
/// token, which marks it as a regular-expression route.
pub fn is_regex_identifier(identifier: &str) -> bool {
    identifier.len() >= SLASH_TOKEN.len() * 2
        && identifier.starts_with(SLASH_TOKEN)
        && identifier.ends_with(SLASH_TOKEN)
}

/// A decoded route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePath {
    /// An express-style path such as `/user/:id`.
    Literal(String),
    /// A regular-expression source with the outer slashes removed.
    Regex(String),
}

impl RoutePath {
    /// Decode an escaped path identifier.
    pub fn from_identifier(identifier: &str) -> Self {
        if is_regex_identifier(identifier) {
            let inner = &identifier[SLASH_TOKEN.len()..identifier.len() - SLASH_TOKEN.len()];
            RoutePath::Regex(decode(inner))
        } else {
            RoutePath::Literal(decode(identifier))
        }
    }

    /// The path as written in the query.
    pub fn as_str(&self) -> &str {
        match self {
            RoutePath::Literal(path) | RoutePath::Regex(path) => path,
        }
    }
}

impl fmt::Display for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutePath::Literal(path) => f.write_str(path),
            RoutePath::Regex(source) => write!(f, "/{}/", source),
        }
    }
}
