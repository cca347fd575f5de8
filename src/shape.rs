//! Class-shape metadata: the compiler's input model.
//!
//! Shapes are produced by an external extractor (reflection, doc parsing and
//! visibility rules all live over there) and consumed here as a read-only
//! tree, usually via the JSON manifest the extractor serializes.

use std::fmt;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ast::DumpValue;
use crate::descriptor::TypeDescriptor;
use crate::error::{ClassKindName, CompileError};

/// Fully-qualified class name, backslash-separated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassName(pub String);

impl ClassName {
    pub fn new(name: impl Into<String>) -> Self {
        ClassName(name.into())
    }

    /// Last segment, e.g. `App\Domain\Person` → `Person`.
    pub fn short(&self) -> &str {
        self.0.rsplit('\\').next().unwrap_or(&self.0)
    }

    /// Everything before the last segment, empty for global classes.
    pub fn namespace(&self) -> &str {
        match self.0.rfind('\\') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ClassKind {
    #[default]
    Class,
    AbstractClass,
    Interface,
    Trait,
    Enum,
    AnonymousClass,
}

impl ClassKind {
    /// `None` means the class is concretely constructible.
    pub fn rejection(self) -> Option<ClassKindName> {
        match self {
            ClassKind::Class => None,
            ClassKind::AbstractClass => Some(ClassKindName::AbstractClass),
            ClassKind::Interface => Some(ClassKindName::Interface),
            ClassKind::Trait => Some(ClassKindName::Trait),
            ClassKind::Enum => Some(ClassKindName::Enum),
            ClassKind::AnonymousClass => Some(ClassKindName::AnonymousClass),
        }
    }
}

/// One constructor parameter or writable field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyShape {
    pub name: String,
    /// Declared type; absent means `mixed`.
    #[serde(default)]
    pub ty: Option<TypeDescriptor>,
    /// The declaration carries a default value.
    #[serde(default)]
    pub has_default: bool,
    #[serde(default)]
    pub options: PropertyOptions,
}

impl PropertyShape {
    pub fn descriptor(&self) -> TypeDescriptor {
        self.ty
            .clone()
            .unwrap_or_else(|| TypeDescriptor::ident("mixed"))
    }
}

/// Per-property compile options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PropertyOptions {
    /// Overrides inferred requiredness when set.
    #[serde(default)]
    pub optional: Option<bool>,
    /// Sentinel values mapped to null adjacent to validation.
    #[serde(default)]
    pub null_values: Vec<DumpValue>,
    /// Compile a class-typed property as an inline object shape instead of
    /// delegating to a mapper.
    #[serde(default)]
    pub compile_as_object_type: bool,
    /// Two-argument `(rawValue, context)` transform invoked before
    /// validation.
    #[serde(default)]
    pub before: Option<CallbackTarget>,
}

/// A bound or unbound callable reference. Existence is the metadata
/// extractor's problem, not the printer's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackTarget {
    #[serde(default)]
    pub class: Option<ClassName>,
    pub method: String,
}

/// Per-class compile options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ClassOptions {
    /// Property name used as a shape discriminator.
    #[serde(default)]
    pub identifier: Option<String>,
    /// Construct from a superset of parsed fields instead of an exact match.
    #[serde(default)]
    pub discard_extra_items: bool,
    /// Static factory on the source class returning a derived context.
    #[serde(default)]
    pub context_factory: Option<ContextFactory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFactory {
    pub method: String,
    /// The factory takes the current context as its single argument.
    #[serde(default)]
    pub takes_context: bool,
}

/// Structural description of one source class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassShape {
    pub name: ClassName,
    #[serde(default)]
    pub kind: ClassKind,
    /// Constructor parameters, declaration order.
    #[serde(default)]
    pub constructor: Vec<PropertyShape>,
    /// Externally writable fields, declaration order.
    #[serde(default)]
    pub fields: Vec<PropertyShape>,
    #[serde(default)]
    pub options: ClassOptions,
}

/// The metadata collaborator seam.
pub trait ShapeRegistry {
    fn shape_of(&self, class: &ClassName) -> Result<ClassShape, CompileError>;
}

/// Extractor output serialized to disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ShapeManifest {
    #[serde(default)]
    pub classes: Vec<ClassShape>,
    /// Classes a hand-written mapper already covers; these are never
    /// recursed into.
    #[serde(default)]
    pub external_mappers: Vec<ClassName>,
}

/// Registry over an in-memory manifest.
#[derive(Debug, Default)]
pub struct ManifestRegistry {
    shapes: IndexMap<ClassName, ClassShape>,
    external_mappers: Vec<ClassName>,
}

impl ManifestRegistry {
    pub fn new(manifest: ShapeManifest) -> Self {
        let shapes = manifest
            .classes
            .into_iter()
            .map(|shape| (shape.name.clone(), shape))
            .collect();
        ManifestRegistry {
            shapes,
            external_mappers: manifest.external_mappers,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, CompileError> {
        let raw = fs::read_to_string(path).map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest: ShapeManifest = serde_json::from_str(&raw).map_err(|e| {
            CompileError::Configuration(format!("invalid shape manifest {}: {e}", path.display()))
        })?;
        Ok(Self::new(manifest))
    }

    pub fn class_names(&self) -> impl Iterator<Item = &ClassName> {
        self.shapes.keys()
    }

    pub fn has_external_mapper(&self, class: &ClassName) -> bool {
        self.external_mappers.contains(class)
    }
}

impl ShapeRegistry for ManifestRegistry {
    fn shape_of(&self, class: &ClassName) -> Result<ClassShape, CompileError> {
        self.shapes.get(class).cloned().ok_or_else(|| {
            CompileError::UnsupportedType(format!("class or interface `{class}` is not known"))
        })
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_name_splits_namespace_and_short() {
        let c = ClassName::new("App\\Domain\\Person");
        assert_eq!(c.short(), "Person");
        assert_eq!(c.namespace(), "App\\Domain");

        let g = ClassName::new("Person");
        assert_eq!(g.short(), "Person");
        assert_eq!(g.namespace(), "");
    }

    #[test]
    fn manifest_round_trips_through_json() {
        let raw = r#"{
            "classes": [
                {
                    "name": "App\\Person",
                    "constructor": [
                        {"name": "id", "ty": {"kind": "identifier", "name": "int"}}
                    ],
                    "fields": [
                        {"name": "note", "has_default": true,
                         "options": {"optional": true, "null_values": ["", "n/a"]}}
                    ],
                    "options": {"discard_extra_items": true}
                }
            ],
            "external_mappers": ["App\\Money"]
        }"#;
        let manifest: ShapeManifest = serde_json::from_str(raw).unwrap();
        let registry = ManifestRegistry::new(manifest);

        let shape = registry.shape_of(&ClassName::new("App\\Person")).unwrap();
        assert_eq!(shape.constructor.len(), 1);
        assert_eq!(shape.fields[0].options.optional, Some(true));
        assert_eq!(
            shape.fields[0].options.null_values,
            vec![
                DumpValue::Str(String::new()),
                DumpValue::Str("n/a".to_string())
            ]
        );
        assert!(shape.options.discard_extra_items);
        assert!(registry.has_external_mapper(&ClassName::new("App\\Money")));

        assert!(registry.shape_of(&ClassName::new("App\\Missing")).is_err());
    }
}
