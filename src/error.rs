//! Errors produced by the compile pipeline.
//!
//! Every pass returns `Result<_, Error>`; nothing in the library aborts the
//! process. A failed compile yields no output at all.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse {path}: {message}")]
    Parse { path: String, message: String },
    #[error("import cycle through module '{name}'")]
    ImportCycle { name: String },
    #[error("module '{name}' is defined twice")]
    DuplicateModule { name: String },
    #[error("could not find type '{name}' (referenced from module '{module}')")]
    UnknownType { name: String, module: String },
    #[error("unknown namespace '{namespace}' in '{name}' (referenced from module '{module}')")]
    UnknownNamespace {
        namespace: String,
        name: String,
        module: String,
    },
    #[error("typedef '{name}' refers back to itself")]
    AliasCycle { name: String },
    #[error("'{name}' must refer to {expected}")]
    TypeMismatch { name: String, expected: &'static str },
    #[error("unsupported {construct}: '{name}'")]
    Unsupported {
        construct: &'static str,
        name: String,
    },
    #[error("expression is not constant: {expr}")]
    NotConcrete { expr: String },
    #[error("division by zero in {expr}")]
    DivideByZero { expr: String },
    #[error("enum item '{item}' would follow the largest possible value")]
    EnumOverflow { item: String },
    #[error("invalid operator '{op}'")]
    InvalidOperator { op: String },
    #[error("a bit literal must be in the range [0, 31], but is {bit}")]
    InvalidBit { bit: i64 },
}

impl Error {
    pub(crate) fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(construct: &'static str, name: impl Into<String>) -> Self {
        Error::Unsupported {
            construct,
            name: name.into(),
        }
    }
}
