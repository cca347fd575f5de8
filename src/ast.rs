//! Schema AST: the intermediate call tree the printer turns into source
//! text. Keeping this a typed tree (instead of string templating) centralizes
//! literal formatting, multi-line layout and import short-naming in one
//! place.

use serde::{Deserialize, Serialize};

use crate::shape::ClassName;

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaAst {
    /// `$ts->name(args...)` — args may carry a name (PHP named arguments).
    MethodCall { name: String, args: Vec<CallArg> },
    /// A literal array expression; keyed items render as `'k' => v`.
    ArrayLiteral {
        items: Vec<(Option<String>, SchemaAst)>,
        multiline: bool,
    },
    /// Pre-formatted source fragment, used verbatim.
    Literal(String),
    /// A value rendered through the literal-value renderer.
    Dump(DumpValue),
    /// `Short::class` for the referenced class.
    ClassNameRef(ClassName),
    /// `new Short()` for the referenced (generated) class.
    NewInstance(ClassName),
    /// A bound (`Short::method(...)`) or unbound (`method(...)`) callable.
    CallbackRef {
        class: Option<ClassName>,
        method: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallArg {
    pub name: Option<String>,
    pub value: SchemaAst,
}

impl SchemaAst {
    /// Zero-or-more positional arguments.
    pub fn call<I>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = SchemaAst>,
    {
        SchemaAst::MethodCall {
            name: name.into(),
            args: args
                .into_iter()
                .map(|value| CallArg { name: None, value })
                .collect(),
        }
    }

    pub fn named_arg(name: impl Into<String>, value: SchemaAst) -> CallArg {
        CallArg {
            name: Some(name.into()),
            value,
        }
    }

    pub fn dump(value: DumpValue) -> Self {
        SchemaAst::Dump(value)
    }

    pub fn items(nodes: Vec<SchemaAst>) -> Self {
        SchemaAst::ArrayLiteral {
            items: nodes.into_iter().map(|n| (None, n)).collect(),
            multiline: false,
        }
    }

    pub fn keyed_items(items: Vec<(String, SchemaAst)>) -> Self {
        SchemaAst::ArrayLiteral {
            items: items.into_iter().map(|(k, n)| (Some(k), n)).collect(),
            multiline: true,
        }
    }
}

/// Everything the literal-value renderer can print.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DumpValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<DumpValue>),
}

impl DumpValue {
    pub fn opt_int(value: Option<i64>) -> Self {
        match value {
            Some(v) => DumpValue::Int(v),
            None => DumpValue::Null,
        }
    }
}
