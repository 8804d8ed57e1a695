//! Error types shared by every stage of the query-to-route pipeline.

use thiserror::Error;

/// Broad class of a failure, used by callers that only care whether a
/// problem came from the query text, a bad registration, the schema engine
/// or a missing name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed query or descriptor text.
    Syntax,
    /// A registration or argument was rejected.
    Validation,
    /// The schema failed to compile or the query failed to execute.
    Execution,
    /// A name could not be resolved to a registered item.
    Lookup,
    /// Reading a query file failed.
    Io,
}

/// Errors produced while registering tasks or applying a query.
#[derive(Debug, Error)]
pub enum XprssoError {
    #[error("descriptor @name is missing in `{line}`")]
    DescriptorNameMissing { line: String },

    #[error("descriptor @{name} value is missing, did you forget a `:` or `;`?")]
    DescriptorValueMissing { name: String },

    #[error("query syntax error: {0}")]
    QuerySyntax(String),

    #[error("query is empty")]
    EmptyQuery,

    #[error("no express paths were specified, check your query")]
    NoPaths,

    #[error("task function cannot be anonymous (found `{type_name}`)")]
    AnonymousTask { type_name: String },

    #[error("invalid {what} name `{name}`")]
    InvalidName { what: &'static str, name: String },

    #[error("task with the name {0} already exists")]
    DuplicateTask(String),

    #[error("descriptor {0} already exists")]
    DuplicateDescriptor(String),

    #[error("options `{0}` are missing")]
    MissingOptions(String),

    #[error("options `{name}` are invalid: {source}")]
    InvalidOptions {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("@{descriptor} {argument} is undefined")]
    MissingDescriptorArgument {
        descriptor: String,
        argument: &'static str,
    },

    #[error("invalid route path `{path}`: {reason}")]
    InvalidRoutePath { path: String, reason: String },

    #[error("descriptor @{descriptor} cannot be applied to {target}")]
    HookTarget {
        descriptor: String,
        target: &'static str,
    },

    #[error("schema failed to compile: {0}")]
    Schema(String),

    #[error("could not query internal graph ({errors} error(s))")]
    Execution { errors: usize },

    #[error("could not find {0} in tasks")]
    TaskNotFound(String),

    #[error("there are no hooks provided for {0}")]
    UnknownDescriptor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl XprssoError {
    /// The taxonomy class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DescriptorNameMissing { .. }
            | Self::DescriptorValueMissing { .. }
            | Self::QuerySyntax(_) => ErrorKind::Syntax,
            Self::EmptyQuery
            | Self::NoPaths
            | Self::AnonymousTask { .. }
            | Self::InvalidName { .. }
            | Self::DuplicateTask(_)
            | Self::DuplicateDescriptor(_)
            | Self::MissingOptions(_)
            | Self::InvalidOptions { .. }
            | Self::MissingDescriptorArgument { .. }
            | Self::InvalidRoutePath { .. }
            | Self::HookTarget { .. } => ErrorKind::Validation,
            Self::Schema(_) | Self::Execution { .. } => ErrorKind::Execution,
            Self::TaskNotFound(_) | Self::UnknownDescriptor(_) => ErrorKind::Lookup,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Result type for xprsso operations.
pub type Result<T> = std::result::Result<T, XprssoError>;
