//! Declared-type descriptors and their canonicalization.
//!
//! A `TypeDescriptor` is the read-only tree an external metadata extractor
//! hands us for each property. Before mapping it onto the runtime DSL we
//! reduce the alias/shorthand vocabulary (`double`, `positive-int`,
//! `scalar`, ...) to a small canonical core; `normalize` is pure and
//! idempotent so callers may re-run it at every recursion level.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TypeDescriptor {
    /// A built-in keyword (`int`, `non-empty-string`, ...) or a class name.
    Identifier { name: String },
    /// `?T`
    Nullable { inner: Box<TypeDescriptor> },
    /// `T[]` shorthand: value type only, untyped key.
    ArrayOf { value: Box<TypeDescriptor> },
    /// `name<args...>`
    Generic {
        name: String,
        args: Vec<TypeDescriptor>,
    },
    /// `A|B|...` — member order is meaningful and preserved.
    Union { members: Vec<TypeDescriptor> },
    /// An integer boundary inside `int<lo,hi>`.
    IntLiteral { value: i64 },
}

impl TypeDescriptor {
    pub fn ident(name: impl Into<String>) -> Self {
        TypeDescriptor::Identifier { name: name.into() }
    }

    pub fn nullable(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Nullable {
            inner: Box::new(inner),
        }
    }

    pub fn array_of(value: TypeDescriptor) -> Self {
        TypeDescriptor::ArrayOf {
            value: Box::new(value),
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeDescriptor>) -> Self {
        TypeDescriptor::Generic {
            name: name.into(),
            args,
        }
    }

    pub fn union(members: Vec<TypeDescriptor>) -> Self {
        TypeDescriptor::Union { members }
    }

    pub fn int_literal(value: i64) -> Self {
        TypeDescriptor::IntLiteral { value }
    }

    /// Compact display form for error messages.
    pub fn describe(&self) -> String {
        match self {
            TypeDescriptor::Identifier { name } => name.clone(),
            TypeDescriptor::Nullable { inner } => format!("?{}", inner.describe()),
            TypeDescriptor::ArrayOf { value } => format!("{}[]", value.describe()),
            TypeDescriptor::Generic { name, args } => {
                let args = args.iter().map(Self::describe).collect::<Vec<_>>();
                format!("{name}<{}>", args.join(", "))
            }
            TypeDescriptor::Union { members } => {
                let members = members.iter().map(Self::describe).collect::<Vec<_>>();
                members.join("|")
            }
            TypeDescriptor::IntLiteral { value } => value.to_string(),
        }
    }
}

/// Lexical test: keyword candidates are bare lowercase words (optionally
/// hyphenated). Anything with an uppercase letter or a namespace separator
/// names a class or interface.
pub fn is_keyword_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    !name.contains('\\')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Canonicalize alias/shorthand descriptors. Pure; `normalize(normalize(t))
/// == normalize(t)` for all `t`.
pub fn normalize(ty: &TypeDescriptor) -> TypeDescriptor {
    match ty {
        TypeDescriptor::Identifier { name } => normalize_identifier(name),
        TypeDescriptor::Union { members } => {
            if let Some(other) = null_union_partner(members) {
                TypeDescriptor::nullable(normalize(other))
            } else {
                ty.clone()
            }
        }
        other => other.clone(),
    }
}

fn normalize_identifier(name: &str) -> TypeDescriptor {
    let lower = name.to_ascii_lowercase();
    match lower.as_str() {
        "double" => TypeDescriptor::ident("float"),
        "integer" => TypeDescriptor::ident("int"),
        "negative-int" => int_range(Bound::Min, Bound::Lit(-1)),
        "non-negative-int" => int_range(Bound::Lit(0), Bound::Max),
        "non-positive-int" => int_range(Bound::Min, Bound::Lit(0)),
        "noreturn" => TypeDescriptor::ident("never"),
        "number" => TypeDescriptor::union(vec![
            TypeDescriptor::ident("int"),
            TypeDescriptor::ident("float"),
        ]),
        "positive-int" => int_range(Bound::Lit(1), Bound::Max),
        "scalar" => TypeDescriptor::union(vec![
            TypeDescriptor::ident("int"),
            TypeDescriptor::ident("float"),
            TypeDescriptor::ident("string"),
            TypeDescriptor::ident("bool"),
        ]),
        _ if is_keyword_name(&lower) => TypeDescriptor::ident(lower),
        _ => TypeDescriptor::ident(name),
    }
}

enum Bound {
    Min,
    Max,
    Lit(i64),
}

fn int_range(lo: Bound, hi: Bound) -> TypeDescriptor {
    let arg = |b: Bound| match b {
        Bound::Min => TypeDescriptor::ident("min"),
        Bound::Max => TypeDescriptor::ident("max"),
        Bound::Lit(v) => TypeDescriptor::int_literal(v),
    };
    TypeDescriptor::generic("int", vec![arg(lo), arg(hi)])
}

/// For a two-member union `{X, null}`, return `X`; anything else is not
/// reducible here.
fn null_union_partner(members: &[TypeDescriptor]) -> Option<&TypeDescriptor> {
    if members.len() != 2 {
        return None;
    }
    let is_null = |m: &TypeDescriptor| {
        matches!(m, TypeDescriptor::Identifier { name } if name.eq_ignore_ascii_case("null"))
    };
    match (is_null(&members[0]), is_null(&members[1])) {
        (true, false) => Some(&members[1]),
        (false, true) => Some(&members[0]),
        _ => None,
    }
}

// ------------------------------- Tests ------------------------------------ //
