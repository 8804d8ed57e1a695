//! Query Executor Adapter: schema + query + resolver graph in, validated
//! data out.

use serde_json::{Map, Value};

use super::execute::{execute, Resolver};
use super::sdl::compile_schema;
use super::EngineErrorKind;
use crate::error::{Result, XprssoError};
use crate::query::escape::decode;
use crate::schema::Schema;

/// Compile `schema`, run `query` against `graph` and return the data.
///
/// Every engine error is logged in decoded form before the call fails, so
/// `_slash_api` shows up as `/api` in the log.
pub fn execute_validated(
    schema: &Schema,
    query: &str,
    graph: &dyn Resolver,
) -> Result<Map<String, Value>> {
    let text = schema.render();
    let compiled = compile_schema(&text).map_err(|e| {
        tracing::error!(error = %decode(&e.message), "Synthesized schema failed to compile");
        XprssoError::Schema(decode(&e.message))
    })?;

    let result = execute(&compiled, query, graph);
    if !result.errors.is_empty() {
        for error in &result.errors {
            tracing::error!(kind = ?error.kind, error = %decode(&error.message), "Query error");
        }
        if let Some(syntax) = result
            .errors
            .iter()
            .find(|e| e.kind == EngineErrorKind::Syntax)
        {
            return Err(XprssoError::QuerySyntax(decode(&syntax.message)));
        }
        tracing::error!("Could not query internal graph");
        return Err(XprssoError::Execution {
            errors: result.errors.len(),
        });
    }

    result.data.ok_or(XprssoError::Execution { errors: 0 })
}
