//! Bulk entry point: find every source file carrying the compile marker and
//! extract its fully-qualified class name textually. No PHP parser is
//! involved; a cheap needle check gates the regex work.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::CompileError;
use crate::shape::ClassName;

const MARKER_NEEDLE: &str = "#[CompileMapper";

static NAMESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^namespace\s+([^;\s]+)\s*;").unwrap());
static CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:final\s+|readonly\s+|abstract\s+)*class\s+([A-Za-z_][A-Za-z0-9_]*)")
        .unwrap()
});

/// Extract the marked class from one file. `Ok(None)` when the marker is
/// absent; extraction failure on a marked file is fatal and names the file.
pub fn scan_file(path: &Path) -> Result<Option<ClassName>, CompileError> {
    let content = std::fs::read_to_string(path).map_err(|source| CompileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if !content.contains(MARKER_NEEDLE) {
        return Ok(None);
    }

    let class = CLASS_RE
        .captures(&content)
        .map(|c| c[1].to_string())
        .ok_or_else(|| {
            CompileError::Configuration(format!(
                "`{}` carries the compile marker but no class declaration was found",
                path.display()
            ))
        })?;

    let fqcn = match NAMESPACE_RE.captures(&content) {
        Some(c) => format!("{}\\{class}", &c[1]),
        None => class,
    };
    Ok(Some(ClassName::new(fqcn)))
}

/// Walk `directory` for `.php` files and collect every marked class, in
/// path order.
pub fn scan_directory(directory: &Path) -> Result<Vec<ClassName>, CompileError> {
    let pattern = format!("{}/**/*.php", directory.display());
    let entries = glob::glob(&pattern)
        .map_err(|e| CompileError::Configuration(format!("invalid scan pattern: {e}")))?;

    let mut classes = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| CompileError::Io {
            path: e.path().to_path_buf(),
            source: e.into_error(),
        })?;
        if let Some(class) = scan_file(&path)? {
            tracing::debug!(class = %class, file = %path.display(), "marker hit");
            classes.push(class);
        }
    }
    Ok(classes)
}

// ------------------------------- Tests ------------------------------------ //
