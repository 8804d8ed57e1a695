//! Query document parsing.
//!
//! Grammar:
//! ```text
//! document      := ("query" Name?)? selection_set
//! selection_set := "{" selection+ "}"
//! selection     := Name selection_set?
//! ```

use nom::{
    branch::alt,
    character::complete::char,
    combinator::{all_consuming, map, opt},
    multi::many1,
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};

use super::lex::{ignored, keyword, name, syntax_error, ws};
use super::EngineError;

/// A field selected in a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub name: String,
    pub selection_set: Option<Vec<Selection>>,
}

/// A parsed query operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub operation_name: Option<String>,
    pub selection_set: Vec<Selection>,
}

fn selection(input: &str) -> IResult<&str, Selection> {
    map(pair(ws(name), opt(selection_set)), |(name, set)| Selection {
        name: name.to_string(),
        selection_set: set,
    })(input)
}

fn selection_set(input: &str) -> IResult<&str, Vec<Selection>> {
    delimited(ws(char('{')), many1(selection), ws(char('}')))(input)
}

fn operation(input: &str) -> IResult<&str, Document> {
    alt((
        map(selection_set, |set| Document {
            operation_name: None,
            selection_set: set,
        }),
        map(
            preceded(keyword("query"), pair(opt(ws(name)), selection_set)),
            |(op, set)| Document {
                operation_name: op.map(str::to_string),
                selection_set: set,
            },
        ),
    ))(input)
}

/// Parse a query document.
pub fn parse_document(text: &str) -> Result<Document, EngineError> {
    all_consuming(terminated(operation, ignored))(text)
        .map(|(_, doc)| doc)
        .map_err(|e| syntax_error(text, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineErrorKind;

    #[test]
    fn test_parse_shorthand() {
        let doc = parse_document("{ _slash_ { GET { foo bar } } }").unwrap();
        assert_eq!(doc.operation_name, None);
        let path = &doc.selection_set[0];
        assert_eq!(path.name, "_slash_");
        let verbs = path.selection_set.as_ref().unwrap();
        let tasks = verbs[0].selection_set.as_ref().unwrap();
        assert_eq!(
            tasks.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec!["foo", "bar"]
        );
        assert!(tasks[0].selection_set.is_none());
    }

    #[test]
    fn test_parse_named_operation_with_commas_and_comments() {
        let doc = parse_document("query Routes {\n  # root\n  a { b, c }\n}").unwrap();
        assert_eq!(doc.operation_name.as_deref(), Some("Routes"));
        assert_eq!(doc.selection_set.len(), 1);
    }

    #[test]
    fn test_empty_selection_is_an_error() {
        let err = parse_document("{ a { } }").unwrap_err();
        assert_eq!(err.kind, EngineErrorKind::Syntax);
    }

    #[test]
    fn test_trailing_input_is_an_error() {
        let err = parse_document("{ a }\n}").unwrap_err();
        assert!(err.message.contains("line 2"), "{}", err.message);
    }

    #[test]
    fn test_unbalanced_braces() {
        assert!(parse_document("{ a { b }").is_err());
        assert!(parse_document("").is_err());
    }
}
