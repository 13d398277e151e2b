use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for generator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure is terminal for the whole generation run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("type `{type_name}`: no copy strategy for `{path}`: {reason}")]
    UnsupportedShape { type_name: String, path: String, reason: String },

    #[error("type `{name}` has {count} methods matching the `{method}` self-copy signature (reached from `{type_name}` at `{path}`)")]
    AmbiguousDelegate { type_name: String, name: String, path: String, method: String, count: usize },

    #[error("unknown type `{name}` (reached from `{type_name}` at `{path}`)")]
    UnknownType { type_name: String, name: String, path: String },

    #[error("type `{type_name}` is cyclic through {cycle} (at `{path}`); give one of these types its own copy method or request it in the same run")]
    CyclicType { type_name: String, path: String, cycle: String },

    #[error("invalid type expression `{text}` at offset {offset}: {message}")]
    TypeSyntax { text: String, offset: usize, message: String },

    #[error("invalid skip path `{text}`: {message}")]
    SkipSyntax { text: String, message: String },

    #[error("no type names requested")]
    EmptyRequest,

    #[error("{sets} skip sets supplied for only {types} requested types")]
    TooManySkipSets { sets: usize, types: usize },

    #[error("{file}: {message}")]
    Decl { file: String, message: String },

    #[error("failed to read `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn decl(file: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Decl { file: file.into(), message: message.into() }
    }
}
