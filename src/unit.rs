//! Unit builder: assembles one complete generated mapper source file from a
//! class shape and its compiled properties.

use indexmap::IndexMap;

use crate::ast::{CallArg, DumpValue, SchemaAst};
use crate::error::CompileError;
use crate::printer::AstPrinter;
use crate::resolve::NamespaceResolver;
use crate::shape::{ClassName, ClassShape, ContextFactory};

/// A property with its compiled schema AST.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledProperty {
    pub name: String,
    pub is_in_constructor: bool,
    pub is_required: bool,
    pub ast: SchemaAst,
}

// Opaque schema-evaluation runtime the generated code calls into.
const RT_TYPE_SCHEMA: &str = "Schema\\Runtime\\TypeSchema";
const RT_TYPE_CONTEXT: &str = "Schema\\Runtime\\TypeContext";
const RT_ERROR_ELEMENT: &str = "Schema\\Runtime\\ErrorElement";
const RT_COMPILED_MAPPER: &str = "Schema\\Runtime\\CompiledMapper";
const RT_TYPE_NODE: &str = "Schema\\Runtime\\TypeNode";
const RT_IDENTIFIER_TYPE_NODE: &str = "Schema\\Runtime\\IdentifierTypeNode";

/// Build the full generated unit for `shape`, compiled under the name
/// `mapper_class`.
pub fn build_unit(
    shape: &ClassShape,
    properties: &IndexMap<String, CompiledProperty>,
    mapper_class: &ClassName,
) -> Result<String, CompileError> {
    validate_identifier(shape, properties)?;
    if let Some(factory) = &shape.options.context_factory {
        validate_context_factory(shape, factory)?;
    }

    let mut resolver = NamespaceResolver::new(mapper_class);
    let source_short = resolver.short_name(&shape.name);
    let context_short = resolver.short_name(&ClassName::new(RT_TYPE_CONTEXT));
    let error_short = resolver.short_name(&ClassName::new(RT_ERROR_ELEMENT));
    let base_short = resolver.short_name(&ClassName::new(RT_COMPILED_MAPPER));

    let mut body: Vec<String> = Vec::new();
    build_context_factory(&mut body, shape, &source_short);
    build_schema(&mut body, shape, properties, &mut resolver)?;
    build_map_values(&mut body);
    let has_settables = build_new_instance(&mut body, shape, properties, &source_short);
    if has_settables {
        build_set_properties(&mut body, properties);
    }

    let type_node_body = build_type_node(&mut resolver, &source_short);

    // The use block is only complete once the body has been printed.
    let mut out = String::new();
    out.push_str("<?php\n\ndeclare(strict_types=1);\n\n");
    out.push_str(&format!("namespace {};\n\n", mapper_class.namespace()));
    for line in resolver.use_lines() {
        out.push_str(&line);
        out.push('\n');
    }
    out.push('\n');
    out.push_str("/**\n");
    out.push_str(&format!(" * @extends {base_short}<{source_short}>\n"));
    out.push_str(" */\n");
    out.push_str(&format!(
        "final class {} extends {base_short}\n{{\n",
        mapper_class.short()
    ));
    out.push_str(&format!(
        "\tpublic function parse(mixed $valueToParse, {context_short} $context): {error_short}|{source_short}\n\t{{\n"
    ));
    for line in &body {
        push_indented(&mut out, line);
    }
    out.push_str("\t}\n\n");
    out.push_str(&format!(
        "\tprotected function getTypeNode({context_short} $context): {}\n\t{{\n",
        type_node_body.return_type
    ));
    push_indented(&mut out, &type_node_body.statement);
    out.push_str("\t}\n}\n");
    Ok(out)
}

fn validate_identifier(
    shape: &ClassShape,
    properties: &IndexMap<String, CompiledProperty>,
) -> Result<(), CompileError> {
    if let Some(identifier) = &shape.options.identifier {
        if !properties.contains_key(identifier) {
            return Err(CompileError::Configuration(format!(
                "identifier property `{identifier}` not found in class `{}`",
                shape.name
            )));
        }
    }
    Ok(())
}

fn validate_context_factory(
    shape: &ClassShape,
    factory: &ContextFactory,
) -> Result<(), CompileError> {
    let valid = !factory.method.is_empty()
        && factory
            .method
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && factory
            .method
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(CompileError::Configuration(format!(
            "context factory `{}::{}` is not a valid static method name",
            shape.name, factory.method
        )));
    }
    Ok(())
}

/// 1. Optionally rebind the working context through the configured factory.
fn build_context_factory(body: &mut Vec<String>, shape: &ClassShape, source_short: &str) {
    let Some(factory) = &shape.options.context_factory else {
        return;
    };
    let arg = if factory.takes_context { "$context" } else { "" };
    body.push(format!(
        "$context = {source_short}::{}({arg});",
        factory.method
    ));
    body.push(String::new());
}

/// 2.–3. Materialize the runtime root and the shape schema.
fn build_schema(
    body: &mut Vec<String>,
    shape: &ClassShape,
    properties: &IndexMap<String, CompiledProperty>,
    resolver: &mut NamespaceResolver,
) -> Result<(), CompileError> {
    let schema_short = resolver.short_name(&ClassName::new(RT_TYPE_SCHEMA));
    body.push("// 0. Initialize TypeSchema".to_string());
    body.push(format!("$ts = {schema_short}::get();"));
    body.push(String::new());

    let items = properties
        .values()
        .map(|p| (p.name.clone(), p.ast.clone()))
        .collect();
    let mut args = vec![CallArg {
        name: None,
        value: SchemaAst::keyed_items(items),
    }];
    if let Some(identifier) = &shape.options.identifier {
        args.push(SchemaAst::named_arg(
            "identifier",
            SchemaAst::Dump(DumpValue::Str(identifier.clone())),
        ));
    }
    let node = SchemaAst::MethodCall {
        name: "shape".to_string(),
        args,
    };
    let rendered = AstPrinter::new(resolver).print(&node)?;
    body.push("// 1. Define schema".to_string());
    body.push(format!("$schema = {rendered};"));
    Ok(())
}

/// 4.–5. Run the runtime parse entry point, short-circuit on error.
fn build_map_values(body: &mut Vec<String>) {
    body.push(String::new());
    body.push("// 2. Map values".to_string());
    body.push("$values = $schema->parse($valueToParse, $context);".to_string());
    body.push("if ($this->isError($values)) {".to_string());
    body.push("\treturn $values;".to_string());
    body.push("}".to_string());
}

/// 6. Construct the target instance. Returns whether settable properties
/// remain for step 7.
fn build_new_instance(
    body: &mut Vec<String>,
    shape: &ClassShape,
    properties: &IndexMap<String, CompiledProperty>,
    source_short: &str,
) -> bool {
    let constructor_names: Vec<&str> = properties
        .values()
        .filter(|p| p.is_in_constructor)
        .map(|p| p.name.as_str())
        .collect();
    let has_settables = properties.values().any(|p| !p.is_in_constructor);

    let expression = if constructor_names.is_empty() {
        format!("new {source_short}()")
    } else if !has_settables && !shape.options.discard_extra_items {
        // exact match: spread everything the schema parsed
        format!("new {source_short}(...$values)")
    } else {
        // filtered intersection: only declared constructor parameters
        let keys = constructor_names
            .iter()
            .map(|name| format!("'{name}' => true"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("new {source_short}(...array_intersect_key($values, [{keys}]))")
    };

    body.push(String::new());
    body.push("// 3. Create a new instance".to_string());
    if has_settables {
        body.push(format!("$obj = {expression};"));
    } else {
        body.push(format!("return {expression};"));
    }
    has_settables
}

/// 7. Assign settable properties: required unconditionally, optional only
/// when the parsed map contains the key.
fn build_set_properties(body: &mut Vec<String>, properties: &IndexMap<String, CompiledProperty>) {
    let settables: Vec<&CompiledProperty> = properties
        .values()
        .filter(|p| !p.is_in_constructor)
        .collect();

    body.push(String::new());
    body.push("// 4. Set properties".to_string());
    for property in settables.iter().filter(|p| p.is_required) {
        body.push(format!(
            "$obj->{} = $values['{}'];",
            property.name, property.name
        ));
    }

    let optionals: Vec<&&CompiledProperty> =
        settables.iter().filter(|p| !p.is_required).collect();
    if !optionals.is_empty() {
        body.push(String::new());
        for property in optionals {
            body.push(format!(
                "if (array_key_exists('{}', $values)) {{",
                property.name
            ));
            body.push(format!(
                "\t$obj->{} = $values['{}'];",
                property.name, property.name
            ));
            body.push("}".to_string());
        }
    }

    body.push(String::new());
    body.push("return $obj;".to_string());
}

struct TypeNodeBody {
    return_type: String,
    statement: String,
}

/// 8. Secondary routine: fixed type identity of the mapped class.
fn build_type_node(resolver: &mut NamespaceResolver, source_short: &str) -> TypeNodeBody {
    let type_node_short = resolver.short_name(&ClassName::new(RT_TYPE_NODE));
    let identifier_short = resolver.short_name(&ClassName::new(RT_IDENTIFIER_TYPE_NODE));
    TypeNodeBody {
        return_type: type_node_short,
        statement: format!("return new {identifier_short}({source_short}::class);"),
    }
}

/// Append one logical body line at method depth; multi-line statements keep
/// their relative tabs.
fn push_indented(out: &mut String, line: &str) {
    if line.is_empty() {
        out.push('\n');
        return;
    }
    for part in line.split('\n') {
        out.push_str("\t\t");
        out.push_str(part);
        out.push('\n');
    }
}

// ------------------------------- Tests ------------------------------------ //
