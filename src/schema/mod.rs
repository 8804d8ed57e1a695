//! Schema synthesis.
//!
//! The schema is a projection of the registry: the known path identifiers,
//! the fixed verb set and the known task names. It is held as plain name
//! lists and only rendered to schema text when the engine needs it.
//!
//! Rendered shape:
//! ```text
//! type Query { <path>: path ... }
//! type path  { GET: task POST: task DELETE: task PUT: task PATCH: task }
//! type task  { <task>: String ... }
//! ```

use std::fmt::{self, Write};

use crate::registry::{Registry, Verb};

pub const PATH_TYPE: &str = "path";
pub const TASK_TYPE: &str = "task";
pub const TASK_SCALAR: &str = "String";

/// Name sets the schema is rendered from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    paths: Vec<String>,
    tasks: Vec<String>,
}

impl Schema {
    /// Snapshot the registry's current paths and tasks.
    pub fn synthesize(registry: &Registry) -> Self {
        Self {
            paths: registry.path_identifiers().map(str::to_string).collect(),
            tasks: registry.task_names().map(str::to_string).collect(),
        }
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn tasks(&self) -> &[String] {
        &self.tasks
    }

    /// Render schema text for the engine.
    pub fn render(&self) -> String {
        let mut out = String::new();
        write_type(&mut out, "Query", self.paths.iter().map(|p| (p.as_str(), PATH_TYPE)));
        write_type(
            &mut out,
            PATH_TYPE,
            Verb::ALL.iter().map(|v| (v.as_str(), TASK_TYPE)),
        );
        write_type(&mut out, TASK_TYPE, self.tasks.iter().map(|t| (t.as_str(), TASK_SCALAR)));
        out
    }
}

fn write_type<'a>(out: &mut String, name: &str, fields: impl Iterator<Item = (&'a str, &'a str)>) {
    let _ = writeln!(out, "type {} {{", name);
    for (field, ty) in fields {
        let _ = writeln!(out, "  {}: {}", field, ty);
    }
    out.push_str("}\n");
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
