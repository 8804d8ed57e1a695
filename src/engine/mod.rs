//! In-process schema engine.
//!
//! Implements just enough of the GraphQL type system and query language to
//! validate a route query against the synthesized schema.
//!
//! # Data Flow
//! ```text
//! schema text ──► sdl.rs (parse + compile) ──► CompiledSchema
//!                                                   │
//! query text ───► document.rs (parse) ──► Document ─┤
//!                                                   ▼
//!                         execute.rs (validate, then resolve over a Resolver graph)
//!                                                   │
//!                                                   ▼
//!                         adapter.rs (decode + log errors, hand data to materializer)
//! ```
//!
//! # Design Decisions
//! - Object types, non-null markers and the five built-in scalars only; no
//!   arguments, aliases, fragments, variables or directives
//! - Empty object types are accepted so a registry with no tasks or paths
//!   still yields a compilable schema
//! - Validation runs to completion and reports every problem before any
//!   field is resolved; a document with errors produces no data
//! - Resolution is structural: a field resolves when the resolver graph has
//!   a key of that name

pub mod adapter;
pub mod document;
pub mod execute;
pub mod sdl;

use std::fmt;

pub use adapter::execute_validated;
pub use execute::{execute, ExecutionResult, Resolved, Resolver};
pub use sdl::{compile_schema, CompiledSchema};

/// Stage an engine error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    Syntax,
    Schema,
    Validation,
    Execution,
}

/// A single error reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for EngineError {}

pub(crate) mod lex {
    //! Token-level parsers shared by the schema and query grammars.

    use nom::{
        branch::alt,
        bytes::complete::tag,
        character::complete::{alpha1, alphanumeric1, char, multispace1, not_line_ending},
        combinator::{recognize, value, verify},
        multi::many0_count,
        sequence::{pair, preceded},
        IResult,
    };

    use super::{EngineError, EngineErrorKind};

    /// Whitespace, commas and `#` comments.
    pub fn ignored(input: &str) -> IResult<&str, ()> {
        value(
            (),
            many0_count(alt((
                value((), multispace1),
                value((), char(',')),
                value((), pair(char('#'), not_line_ending)),
            ))),
        )(input)
    }

    /// Run `inner` after skipping ignored input.
    pub fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
    where
        F: FnMut(&'a str) -> IResult<&'a str, O>,
    {
        preceded(ignored, inner)
    }

    /// `[_A-Za-z][_0-9A-Za-z]*`
    pub fn name(input: &str) -> IResult<&str, &str> {
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0_count(alt((alphanumeric1, tag("_")))),
        ))(input)
    }

    pub fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
        verify(ws(name), move |n: &str| n == kw)
    }

    /// Turn a nom failure into a syntax error carrying a line and column.
    pub fn syntax_error(source: &str, err: nom::Err<nom::error::Error<&str>>) -> EngineError {
        let remaining = match err {
            nom::Err::Error(e) | nom::Err::Failure(e) => e.input,
            nom::Err::Incomplete(_) => "",
        };
        let offset = source.len() - remaining.len();
        let consumed = &source[..offset];
        let line = consumed.matches('\n').count() + 1;
        let column = consumed.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
        let found = match remaining.trim_start().chars().next() {
            Some(c) => format!("\"{}\"", c),
            None => "<EOF>".to_string(),
        };
        EngineError::new(
            EngineErrorKind::Syntax,
            format!("Syntax Error: Unexpected {} at line {}, column {}.", found, line, column),
        )
    }
}
