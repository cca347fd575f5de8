//! Per-unit namespace/import resolution.
//!
//! Contract: within one generated unit the same symbol always gets the same
//! short name, distinct symbols always get distinct display names, and every
//! foreign symbol is imported exactly once.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::shape::ClassName;

pub struct NamespaceResolver {
    namespace: String,
    /// fqcn → display name, first-reference wins.
    cache: IndexMap<ClassName, String>,
    taken: HashSet<String>,
    /// imports in registration order: (fqcn, alias when it differs).
    imports: Vec<(ClassName, Option<String>)>,
}

impl NamespaceResolver {
    /// `unit_class` is the generated unit's own class; its short name is
    /// pre-reserved so self-references render without an import.
    pub fn new(unit_class: &ClassName) -> Self {
        let short = unit_class.short().to_string();
        let mut cache = IndexMap::new();
        cache.insert(unit_class.clone(), short.clone());
        let mut taken = HashSet::new();
        taken.insert(short);
        NamespaceResolver {
            namespace: unit_class.namespace().to_string(),
            cache,
            taken,
            imports: Vec::new(),
        }
    }

    /// Display name for `class` inside this unit, registering an import on
    /// first reference.
    pub fn short_name(&mut self, class: &ClassName) -> String {
        if let Some(existing) = self.cache.get(class) {
            return existing.clone();
        }

        let base = class.short().to_string();
        let display = if self.taken.contains(&base) {
            let mut n = 2usize;
            loop {
                let candidate = format!("{base}{n}");
                if !self.taken.contains(&candidate) {
                    break candidate;
                }
                n += 1;
            }
        } else {
            base.clone()
        };

        let same_namespace = class.namespace() == self.namespace;
        if !same_namespace || display != base {
            let alias = (display != base).then(|| display.clone());
            self.imports.push((class.clone(), alias));
        }

        self.taken.insert(display.clone());
        self.cache.insert(class.clone(), display.clone());
        display
    }

    /// Rendered `use` lines, sorted for deterministic output.
    pub fn use_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .imports
            .iter()
            .map(|(class, alias)| match alias {
                Some(alias) => format!("use {class} as {alias};"),
                None => format!("use {class};"),
            })
            .collect();
        lines.sort();
        lines
    }
}

// ------------------------------- Tests ------------------------------------ //
