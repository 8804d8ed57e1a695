//! Validation and structural execution of a query document.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::document::{parse_document, Selection};
use super::sdl::{CompiledSchema, ObjectType, TypeRef};
use super::{EngineError, EngineErrorKind};

/// What a resolver yields for one field.
pub enum Resolved<'a> {
    /// No value under that key.
    Null,
    /// A leaf value.
    Scalar(Value),
    /// A nested object resolved further by its own resolver.
    Object(&'a dyn Resolver),
}

/// A node of the object graph a query is executed against.
pub trait Resolver {
    fn resolve(&self, field: &str) -> Resolved<'_>;
}

impl Resolver for Value {
    fn resolve(&self, field: &str) -> Resolved<'_> {
        match self.get(field) {
            None | Some(Value::Null) => Resolved::Null,
            Some(obj @ Value::Object(_)) => Resolved::Object(obj),
            Some(other) => Resolved::Scalar(other.clone()),
        }
    }
}

/// Outcome of running a query. `data` is absent when validation failed.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    pub data: Option<Map<String, Value>>,
    pub errors: Vec<EngineError>,
}

impl ExecutionResult {
    fn failed(errors: Vec<EngineError>) -> Self {
        Self { data: None, errors }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse, validate and execute `query` against `root`.
pub fn execute(schema: &CompiledSchema, query: &str, root: &dyn Resolver) -> ExecutionResult {
    let document = match parse_document(query) {
        Ok(doc) => doc,
        Err(e) => return ExecutionResult::failed(vec![e]),
    };

    let mut errors = Vec::new();
    validate(schema, schema.query_type(), &document.selection_set, &mut errors);
    if !errors.is_empty() {
        return ExecutionResult::failed(errors);
    }

    let mut errors = Vec::new();
    let data = resolve_object(
        schema,
        schema.query_type(),
        &collect_fields(&document.selection_set),
        root,
        &mut errors,
    );
    ExecutionResult {
        data: Some(data),
        errors,
    }
}

/// Group selections by response name, keeping first-seen order.
fn collect_fields(selections: &[Selection]) -> IndexMap<&str, Vec<&Selection>> {
    let mut fields: IndexMap<&str, Vec<&Selection>> = IndexMap::new();
    for selection in selections {
        fields.entry(selection.name.as_str()).or_default().push(selection);
    }
    fields
}

/// Sub-selections of every merged occurrence of a field, flattened.
fn merged_subselections(occurrences: &[&Selection]) -> Vec<Selection> {
    occurrences
        .iter()
        .filter_map(|s| s.selection_set.as_ref())
        .flatten()
        .cloned()
        .collect()
}

fn validate(
    schema: &CompiledSchema,
    parent: &ObjectType,
    selections: &[Selection],
    errors: &mut Vec<EngineError>,
) {
    for selection in selections {
        let Some(ty) = parent.field(&selection.name) else {
            errors.push(EngineError::new(
                EngineErrorKind::Validation,
                format!(
                    "Cannot query field \"{}\" on type \"{}\".",
                    selection.name, parent.name
                ),
            ));
            continue;
        };
        match (schema.object(&ty.name), &selection.selection_set) {
            (Some(object), Some(sub)) => validate(schema, object, sub, errors),
            (Some(_), None) => errors.push(EngineError::new(
                EngineErrorKind::Validation,
                format!(
                    "Field \"{}\" of type \"{}\" must have a selection of subfields.",
                    selection.name,
                    display_type(ty)
                ),
            )),
            (None, Some(_)) => errors.push(EngineError::new(
                EngineErrorKind::Validation,
                format!(
                    "Field \"{}\" must not have a selection since type \"{}\" has no subfields.",
                    selection.name,
                    display_type(ty)
                ),
            )),
            (None, None) => {}
        }
    }
}

fn display_type(ty: &TypeRef) -> String {
    if ty.non_null {
        format!("{}!", ty.name)
    } else {
        ty.name.clone()
    }
}

fn resolve_object(
    schema: &CompiledSchema,
    object: &ObjectType,
    fields: &IndexMap<&str, Vec<&Selection>>,
    resolver: &dyn Resolver,
    errors: &mut Vec<EngineError>,
) -> Map<String, Value> {
    let mut out = Map::new();
    for (name, occurrences) in fields {
        // Validation already guaranteed the field exists.
        let Some(ty) = object.field(name) else {
            continue;
        };
        let value = match (resolver.resolve(name), schema.object(&ty.name)) {
            (Resolved::Null, _) => Value::Null,
            (Resolved::Object(inner), Some(child)) => {
                let sub = merged_subselections(occurrences);
                Value::Object(resolve_object(schema, child, &collect_fields(&sub), inner, errors))
            }
            (Resolved::Scalar(v), None) => v,
            (Resolved::Object(_), None) | (Resolved::Scalar(_), Some(_)) => {
                errors.push(EngineError::new(
                    EngineErrorKind::Execution,
                    format!(
                        "Field \"{}.{}\" resolved to a value that does not match type \"{}\".",
                        object.name,
                        name,
                        display_type(ty)
                    ),
                ));
                Value::Null
            }
        };
        if value.is_null() && ty.non_null {
            errors.push(EngineError::new(
                EngineErrorKind::Execution,
                format!(
                    "Cannot return null for non-nullable field {}.{}.",
                    object.name, name
                ),
            ));
        }
        out.insert(name.to_string(), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::sdl::compile_schema;
    use serde_json::json;

    fn schema() -> CompiledSchema {
        compile_schema(
            "type Query { _slash_: path _slash_api: path }
             type path { GET: task POST: task }
             type task { foo: String bar: String }",
        )
        .unwrap()
    }

    fn graph() -> Value {
        let tasks = json!({ "foo": "foo", "bar": "bar" });
        let verbs = json!({ "GET": tasks, "POST": tasks });
        json!({ "_slash_": verbs, "_slash_api": verbs })
    }

    #[test]
    fn test_execute_structural() {
        let result = execute(&schema(), "{ _slash_ { GET { foo bar } } }", &graph());
        assert!(result.is_ok(), "{:?}", result.errors);
        assert_eq!(
            Value::Object(result.data.unwrap()),
            json!({ "_slash_": { "GET": { "foo": "foo", "bar": "bar" } } })
        );
    }

    #[test]
    fn test_keeps_source_order_and_merges() {
        let result = execute(
            &schema(),
            "{ _slash_api { POST { bar } } _slash_ { GET { foo } } _slash_api { POST { foo } GET { foo } } }",
            &graph(),
        );
        let data = result.data.unwrap();
        assert_eq!(data.keys().collect::<Vec<_>>(), vec!["_slash_api", "_slash_"]);
        let api = &data["_slash_api"];
        assert_eq!(api["POST"], json!({ "bar": "bar", "foo": "foo" }));
        assert_eq!(api["GET"], json!({ "foo": "foo" }));
    }

    #[test]
    fn test_unknown_field_is_reported() {
        let result = execute(&schema(), "{ _slash_ { GET { baz } PUT { foo } } }", &graph());
        assert!(result.data.is_none());
        let messages: Vec<_> = result.errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Cannot query field \"baz\" on type \"task\".",
                "Cannot query field \"PUT\" on type \"path\".",
            ]
        );
    }

    #[test]
    fn test_subselection_rules() {
        let result = execute(&schema(), "{ _slash_ { GET } }", &graph());
        assert!(result.errors[0].message.contains("must have a selection of subfields"));

        let result = execute(&schema(), "{ _slash_ { GET { foo { x } } } }", &graph());
        assert!(result.errors[0].message.contains("must not have a selection"));
    }

    #[test]
    fn test_missing_value_resolves_null() {
        let result = execute(&schema(), "{ _slash_ { GET { foo } } }", &json!({}));
        assert!(result.is_ok());
        assert_eq!(result.data.unwrap()["_slash_"], Value::Null);
    }

    #[test]
    fn test_non_null_violation() {
        let schema = compile_schema("type Query { a: String! }").unwrap();
        let result = execute(&schema, "{ a }", &json!({}));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, EngineErrorKind::Execution);
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let result = execute(&schema(), "{ _slash_ { GET { foo } }", &graph());
        assert_eq!(result.errors[0].kind, EngineErrorKind::Syntax);
    }
}
