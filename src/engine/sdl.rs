//! Schema definition parsing and compilation.
//!
//! Accepts a sequence of `type Name { field: Type }` blocks. Field types
//! name another object type or a built-in scalar, optionally followed by
//! `!` to mark them non-null.

use indexmap::IndexMap;
use nom::{
    character::complete::char,
    combinator::{all_consuming, map, opt},
    multi::{many0, many1},
    sequence::{delimited, pair, preceded, separated_pair, terminated},
    IResult,
};

use super::lex::{ignored, keyword, name, syntax_error, ws};
use super::{EngineError, EngineErrorKind};

/// Scalars every schema knows without declaring them.
pub const BUILTIN_SCALARS: [&str; 5] = ["String", "Int", "Float", "Boolean", "ID"];

/// Name of the root operation type.
pub const QUERY_TYPE: &str = "Query";

/// Reference to a type from a field definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub name: String,
    pub non_null: bool,
}

/// An object type and its fields in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectType {
    pub name: String,
    pub fields: IndexMap<String, TypeRef>,
}

impl ObjectType {
    pub fn field(&self, name: &str) -> Option<&TypeRef> {
        self.fields.get(name)
    }
}

/// A schema whose type references have all been checked.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    types: IndexMap<String, ObjectType>,
}

impl CompiledSchema {
    /// The root `Query` type. Compilation guarantees it exists.
    pub fn query_type(&self) -> &ObjectType {
        &self.types[QUERY_TYPE]
    }

    pub fn object(&self, name: &str) -> Option<&ObjectType> {
        self.types.get(name)
    }

    pub fn is_scalar(name: &str) -> bool {
        BUILTIN_SCALARS.contains(&name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}

type RawType<'a> = (&'a str, Vec<(&'a str, TypeRef)>);

fn type_ref(input: &str) -> IResult<&str, TypeRef> {
    map(pair(ws(name), opt(ws(char('!')))), |(name, bang)| TypeRef {
        name: name.to_string(),
        non_null: bang.is_some(),
    })(input)
}

fn field_def(input: &str) -> IResult<&str, (&str, TypeRef)> {
    separated_pair(ws(name), ws(char(':')), type_ref)(input)
}

fn type_def(input: &str) -> IResult<&str, RawType<'_>> {
    preceded(
        keyword("type"),
        pair(
            ws(name),
            delimited(ws(char('{')), many0(field_def), ws(char('}'))),
        ),
    )(input)
}

fn document(input: &str) -> IResult<&str, Vec<RawType<'_>>> {
    all_consuming(terminated(many1(type_def), ignored))(input)
}

fn schema_error(message: String) -> EngineError {
    EngineError::new(EngineErrorKind::Schema, message)
}

/// Parse schema text and check it is self-consistent.
pub fn compile_schema(text: &str) -> Result<CompiledSchema, EngineError> {
    let (_, raw) = document(text).map_err(|e| syntax_error(text, e))?;

    let mut types = IndexMap::new();
    for (type_name, raw_fields) in raw {
        if CompiledSchema::is_scalar(type_name) {
            return Err(schema_error(format!(
                "Type \"{}\" conflicts with a built-in scalar.",
                type_name
            )));
        }
        let mut fields = IndexMap::new();
        for (field, ty) in raw_fields {
            if fields.insert(field.to_string(), ty).is_some() {
                return Err(schema_error(format!(
                    "Field \"{}.{}\" can only be defined once.",
                    type_name, field
                )));
            }
        }
        let object = ObjectType {
            name: type_name.to_string(),
            fields,
        };
        if types.insert(type_name.to_string(), object).is_some() {
            return Err(schema_error(format!(
                "There can be only one type named \"{}\".",
                type_name
            )));
        }
    }

    for object in types.values() {
        for (field, ty) in &object.fields {
            if !CompiledSchema::is_scalar(&ty.name) && !types.contains_key(&ty.name) {
                return Err(schema_error(format!(
                    "Unknown type \"{}\" referenced by field \"{}.{}\".",
                    ty.name, object.name, field
                )));
            }
        }
    }

    if !types.contains_key(QUERY_TYPE) {
        return Err(schema_error("Query root type must be provided.".to_string()));
    }

    Ok(CompiledSchema { types })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_nested_types() {
        let schema = compile_schema(
            "type Query { _slash_: path } type path { GET: task, POST: task } type task { foo: String! }",
        )
        .unwrap();
        let query = schema.query_type();
        assert_eq!(query.field("_slash_").unwrap().name, "path");
        let task = schema.object("task").unwrap();
        assert!(task.field("foo").unwrap().non_null);
        assert_eq!(schema.type_names().collect::<Vec<_>>(), vec!["Query", "path", "task"]);
    }

    #[test]
    fn test_empty_types_compile() {
        let schema = compile_schema("type Query {\n}\ntype path {}\ntype task {\n  # nothing yet\n}").unwrap();
        assert!(schema.query_type().fields.is_empty());
    }

    #[test]
    fn test_rejects_unknown_type() {
        let err = compile_schema("type Query { a: nope }").unwrap_err();
        assert_eq!(err.kind, EngineErrorKind::Schema);
        assert!(err.message.contains("\"nope\""));
    }

    #[test]
    fn test_rejects_duplicates() {
        assert!(compile_schema("type Query { a: String a: Int }").is_err());
        assert!(compile_schema("type Query { a: String } type Query { b: String }").is_err());
        assert!(compile_schema("type Query { a: String } type String { b: Int }").is_err());
    }

    #[test]
    fn test_requires_query_root() {
        let err = compile_schema("type path { GET: String }").unwrap_err();
        assert!(err.message.contains("Query root type"));
    }

    #[test]
    fn test_syntax_error_location() {
        let err = compile_schema("type Query {\n  a String\n}").unwrap_err();
        assert_eq!(err.kind, EngineErrorKind::Syntax);
        assert!(err.message.contains("line 2"), "{}", err.message);
    }
}
