//! Property classification: ordered list of properties with
//! constructor/settable and required/optional verdicts.

use indexmap::IndexMap;

use crate::descriptor::TypeDescriptor;
use crate::shape::{ClassShape, PropertyOptions, PropertyShape};

/// A property with its classification, before type compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedProperty {
    pub name: String,
    pub is_in_constructor: bool,
    pub is_required: bool,
    pub ty: TypeDescriptor,
    pub options: PropertyOptions,
}

/// Constructor parameters first (declaration order), then writable fields not
/// shadowed by a same-named parameter (declaration order). A property is
/// optional when its override says so, or — absent an override — when the
/// declaration carries a default.
pub fn classify(shape: &ClassShape) -> IndexMap<String, ClassifiedProperty> {
    let mut properties = IndexMap::new();

    for parameter in &shape.constructor {
        properties.insert(
            parameter.name.clone(),
            classified(parameter, true),
        );
    }

    for field in &shape.fields {
        if properties.contains_key(&field.name) {
            continue;
        }
        properties.insert(field.name.clone(), classified(field, false));
    }

    properties
}

fn classified(property: &PropertyShape, is_in_constructor: bool) -> ClassifiedProperty {
    let is_optional = property
        .options
        .optional
        .unwrap_or(property.has_default);
    ClassifiedProperty {
        name: property.name.clone(),
        is_in_constructor,
        is_required: !is_optional,
        ty: property.descriptor(),
        options: property.options.clone(),
    }
}

// ------------------------------- Tests ------------------------------------ //
