//! Renders a schema AST to PHP expression text.
//!
//! All literal formatting and layout rules live here; class references go
//! through the namespace resolver so the emitted unit stays
//! import-deduplicated.

use crate::ast::{CallArg, DumpValue, SchemaAst};
use crate::error::CompileError;
use crate::resolve::NamespaceResolver;

pub struct AstPrinter<'r> {
    resolver: &'r mut NamespaceResolver,
    schema_var: &'static str,
}

impl<'r> AstPrinter<'r> {
    pub fn new(resolver: &'r mut NamespaceResolver) -> Self {
        AstPrinter {
            resolver,
            schema_var: "ts",
        }
    }

    pub fn print(&mut self, node: &SchemaAst) -> Result<String, CompileError> {
        match node {
            SchemaAst::MethodCall { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.print_arg(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("${}->{}({})", self.schema_var, name, args.join(", ")))
            }
            SchemaAst::ArrayLiteral { items, multiline } => {
                if *multiline {
                    self.print_multiline_array(items)
                } else {
                    let items = items
                        .iter()
                        .map(|(key, item)| self.print_item(key.as_deref(), item))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(format!("[{}]", items.join(", ")))
                }
            }
            SchemaAst::Literal(raw) => Ok(raw.clone()),
            SchemaAst::Dump(value) => dump_value(value),
            SchemaAst::ClassNameRef(class) => {
                Ok(format!("{}::class", self.resolver.short_name(class)))
            }
            SchemaAst::NewInstance(class) => {
                Ok(format!("new {}()", self.resolver.short_name(class)))
            }
            SchemaAst::CallbackRef { class, method } => match class {
                Some(class) => Ok(format!("{}::{}(...)", self.resolver.short_name(class), method)),
                None => Ok(format!("{method}(...)")),
            },
        }
    }

    fn print_arg(&mut self, arg: &CallArg) -> Result<String, CompileError> {
        let rendered = self.print(&arg.value)?;
        Ok(match &arg.name {
            Some(name) => format!("{name}: {rendered}"),
            None => rendered,
        })
    }

    fn print_item(&mut self, key: Option<&str>, item: &SchemaAst) -> Result<String, CompileError> {
        let rendered = self.print(item)?;
        Ok(match key {
            Some(key) => format!("{} => {rendered}", quote_str(key)),
            None => rendered,
        })
    }

    fn print_multiline_array(
        &mut self,
        items: &[(Option<String>, SchemaAst)],
    ) -> Result<String, CompileError> {
        if items.is_empty() {
            return Ok("[]".to_string());
        }
        let mut out = String::from("[\n");
        for (key, item) in items {
            let rendered = indent_tail(&self.print_item(key.as_deref(), item)?);
            out.push('\t');
            out.push_str(&rendered);
            out.push_str(",\n");
        }
        out.push(']');
        Ok(out)
    }
}

/// Render a `DumpValue` as a PHP literal.
pub fn dump_value(value: &DumpValue) -> Result<String, CompileError> {
    match value {
        DumpValue::Null => Ok("null".to_string()),
        DumpValue::Bool(true) => Ok("true".to_string()),
        DumpValue::Bool(false) => Ok("false".to_string()),
        DumpValue::Int(v) => Ok(v.to_string()),
        DumpValue::Float(v) => {
            if !v.is_finite() {
                return Err(CompileError::Internal(format!(
                    "cannot dump non-finite float {v}"
                )));
            }
            // `{:?}` keeps a trailing `.0` for integral floats.
            Ok(format!("{v:?}"))
        }
        DumpValue::Str(s) => Ok(quote_str(s)),
        DumpValue::List(items) => {
            let items = items.iter().map(dump_value).collect::<Result<Vec<_>, _>>()?;
            Ok(format!("[{}]", items.join(", ")))
        }
    }
}

fn quote_str(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

/// Indent every line but the first by one tab, so nested multi-line
/// fragments stay aligned inside their parent.
fn indent_tail(s: &str) -> String {
    if !s.contains('\n') {
        return s.to_string();
    }
    let mut lines = s.lines();
    let mut out = lines.next().unwrap_or_default().to_string();
    for line in lines {
        out.push_str("\n\t");
        out.push_str(line);
    }
    out
}

// ------------------------------- Tests ------------------------------------ //
