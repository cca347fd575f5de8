//! Compile-time failure kinds. All of these abort the class being processed;
//! nothing here is retried internally.

use std::io;
use std::path::PathBuf;

use crate::shape::ClassName;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Bad per-class or per-property configuration (unknown identifier
    /// property, invalid context-factory signature, missing shape metadata).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A type descriptor with no mapping onto the runtime DSL.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// The compile target cannot be constructed, so no mapper can exist.
    #[error("cannot compile mapper for {kind} `{class}`")]
    NonInstantiable { class: ClassName, kind: ClassKindName },

    #[error("unable to acquire lock `{path}`")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("i/o failure on `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A defect in the compiler itself, never expected in normal operation.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

/// Instantiability verdicts, one per rejection reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKindName {
    Interface,
    Trait,
    Enum,
    AnonymousClass,
    AbstractClass,
}

impl std::fmt::Display for ClassKindName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ClassKindName::Interface => "interface",
            ClassKindName::Trait => "trait",
            ClassKindName::Enum => "enum",
            ClassKindName::AnonymousClass => "anonymous class",
            ClassKindName::AbstractClass => "abstract class",
        };
        f.write_str(name)
    }
}
