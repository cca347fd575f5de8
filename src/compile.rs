//! Type-to-AST compiler: maps a normalized type descriptor onto the runtime
//! DSL vocabulary. Class-typed occurrences go through the `ClassResolver`
//! seam, which is where the orchestrator plugs in nested-unit compilation.

use crate::ast::{DumpValue, SchemaAst};
use crate::classify::ClassifiedProperty;
use crate::descriptor::{TypeDescriptor, is_keyword_name, normalize};
use crate::error::CompileError;
use crate::shape::{ClassName, PropertyOptions};

/// Decides what a class-typed field compiles to (external mapper, nested
/// generated unit, or inline object shape).
pub trait ClassResolver {
    fn resolve_class(
        &mut self,
        class: &ClassName,
        options: &PropertyOptions,
    ) -> Result<SchemaAst, CompileError>;
}

/// Compile one classified property, applying the `before` transform and the
/// `optional` wrapper around the declared type.
pub fn compile_property(
    property: &ClassifiedProperty,
    resolver: &mut dyn ClassResolver,
) -> Result<SchemaAst, CompileError> {
    let mut node = compile_type(&property.ty, &property.options, resolver)?;
    if let Some(before) = &property.options.before {
        node = SchemaAst::call(
            "before",
            [
                node,
                SchemaAst::CallbackRef {
                    class: before.class.clone(),
                    method: before.method.clone(),
                },
            ],
        );
    }
    if !property.is_required {
        node = SchemaAst::call("optional", [node]);
    }
    Ok(node)
}

pub fn compile_type(
    ty: &TypeDescriptor,
    options: &PropertyOptions,
    resolver: &mut dyn ClassResolver,
) -> Result<SchemaAst, CompileError> {
    let ty = normalize(ty);
    match &ty {
        TypeDescriptor::Identifier { name } => {
            if !is_keyword_name(name) {
                return resolver.resolve_class(&ClassName::new(name.clone()), options);
            }
            let method = match name.as_str() {
                "mixed" => "mixed",
                "null" => "null",
                "bool" => "bool",
                "int" => "int",
                "float" => "float",
                "string" => "string",
                "array" => "array",
                "object" => "object",
                "non-empty-string" => "nonEmptyString",
                _ => return Err(unsupported(&ty)),
            };
            Ok(SchemaAst::call(method, []))
        }

        TypeDescriptor::ArrayOf { value } => Ok(SchemaAst::call(
            "array",
            [
                SchemaAst::call("arrayKey", []),
                compile_type(value, options, resolver)?,
            ],
        )),

        TypeDescriptor::Nullable { inner } => {
            let mut args = vec![compile_type(inner, options, resolver)?];
            if !options.null_values.is_empty() {
                args.push(SchemaAst::Dump(DumpValue::List(options.null_values.clone())));
            }
            Ok(SchemaAst::call("nullable", args))
        }

        TypeDescriptor::Generic { name, args } => {
            match name.to_ascii_lowercase().as_str() {
                "array" => match args.as_slice() {
                    [value] => Ok(SchemaAst::call(
                        "array",
                        [
                            SchemaAst::call("arrayKey", []),
                            compile_type(value, options, resolver)?,
                        ],
                    )),
                    [key, value] => Ok(SchemaAst::call(
                        "array",
                        [
                            compile_type(key, options, resolver)?,
                            compile_type(value, options, resolver)?,
                        ],
                    )),
                    _ => Err(unsupported(&ty)),
                },
                "int" => match args.as_slice() {
                    [lo, hi] => Ok(SchemaAst::call(
                        "intRange",
                        [
                            SchemaAst::Dump(DumpValue::opt_int(int_boundary(&ty, lo, "min")?)),
                            SchemaAst::Dump(DumpValue::opt_int(int_boundary(&ty, hi, "max")?)),
                        ],
                    )),
                    _ => Err(unsupported(&ty)),
                },
                "list" => match args.as_slice() {
                    [item] => Ok(SchemaAst::call(
                        "list",
                        [compile_type(item, options, resolver)?],
                    )),
                    _ => Err(unsupported(&ty)),
                },
                "non-empty-list" => match args.as_slice() {
                    [item] => Ok(SchemaAst::call(
                        "nonEmptyList",
                        [compile_type(item, options, resolver)?],
                    )),
                    _ => Err(unsupported(&ty)),
                },
                _ => Err(unsupported(&ty)),
            }
        }

        // Members compile independently; order and duplicates are preserved.
        TypeDescriptor::Union { members } => {
            let members = members
                .iter()
                .map(|member| compile_type(member, options, resolver))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(SchemaAst::call("union", [SchemaAst::items(members)]))
        }

        TypeDescriptor::IntLiteral { .. } => Err(unsupported(&ty)),
    }
}

/// An `int<lo,hi>` bound is either a literal integer or the matching
/// `min`/`max` keyword meaning "unbounded on this side".
fn int_boundary(
    whole: &TypeDescriptor,
    bound: &TypeDescriptor,
    extreme: &str,
) -> Result<Option<i64>, CompileError> {
    match bound {
        TypeDescriptor::IntLiteral { value } => Ok(Some(*value)),
        TypeDescriptor::Identifier { name } if name == extreme => Ok(None),
        _ => Err(CompileError::UnsupportedType(format!(
            "cannot resolve `{}`: integer boundary `{}` is not supported",
            whole.describe(),
            bound.describe(),
        ))),
    }
}

fn unsupported(ty: &TypeDescriptor) -> CompileError {
    CompileError::UnsupportedType(format!("no mapping for type `{}`", ty.describe()))
}

// ------------------------------- Tests ------------------------------------ //
