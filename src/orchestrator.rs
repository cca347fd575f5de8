//! Compilation orchestrator: decides what to build, in what order, exactly
//! once per class, and writes each generated unit atomically under a
//! cross-process lock.
//!
//! Per-class state runs `Unseen → Compiling → Done`; a class is marked
//! `Compiling` *before* its body is generated, so self- and mutually-
//! referential class graphs terminate: the re-entrant call returns
//! immediately and the cyclic edge still resolves to a valid `NewInstance`
//! of the in-flight unit.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use tempfile::NamedTempFile;

use crate::ast::SchemaAst;
use crate::classify::classify;
use crate::compile::{ClassResolver, compile_property};
use crate::error::CompileError;
use crate::lock::FileLock;
use crate::shape::{ClassName, ClassShape, PropertyOptions, ShapeRegistry};
use crate::target::TargetProvider;
use crate::unit::{CompiledProperty, build_unit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompileState {
    Compiling,
    Done,
}

pub type ExternalMapperPredicate = Box<dyn Fn(&ClassName) -> bool>;

pub struct MapperCompiler {
    registry: Arc<dyn ShapeRegistry>,
    targets: Arc<dyn TargetProvider>,
    has_external_mapper: ExternalMapperPredicate,
    /// Instance-scoped; grows monotonically, never persisted.
    states: HashMap<ClassName, CompileState>,
    /// Inline object-type compilations currently on the call stack. Inline
    /// shapes are expanded in place, so a cycle through them can never
    /// resolve and must be rejected instead.
    inline_stack: HashSet<ClassName>,
    multi_process_safety: bool,
    validation_mode: bool,
    auto_refresh: bool,
}

impl MapperCompiler {
    pub fn new(registry: Arc<dyn ShapeRegistry>, targets: Arc<dyn TargetProvider>) -> Self {
        MapperCompiler {
            registry,
            targets,
            has_external_mapper: Box::new(|_| false),
            states: HashMap::new(),
            inline_stack: HashSet::new(),
            multi_process_safety: true,
            validation_mode: false,
            auto_refresh: false,
        }
    }

    /// Classes the predicate accepts compile to `mapper(Class::class)`
    /// instead of a nested generated unit.
    pub fn with_external_mapper_predicate(mut self, predicate: ExternalMapperPredicate) -> Self {
        self.has_external_mapper = predicate;
        self
    }

    pub fn with_multi_process_safety(mut self, enabled: bool) -> Self {
        self.multi_process_safety = enabled;
        self
    }

    pub fn with_auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh = enabled;
        self
    }

    /// Run every compile step except the final write.
    pub fn with_validation_mode(mut self) -> Self {
        self.validation_mode = true;
        self.multi_process_safety = false;
        self.auto_refresh = true;
        self
    }

    /// Stale-target policy flag; a hashed target provider makes this moot.
    pub fn needs_recompile(&self, _class: &ClassName) -> bool {
        self.auto_refresh
    }

    /// Compile `class` and, transitively, every nested class no external
    /// mapper covers. Idempotent within this instance.
    pub fn compile(&mut self, class: &ClassName) -> Result<(), CompileError> {
        if self.states.contains_key(class) {
            return Ok(());
        }

        let shape = self.registry.shape_of(class)?;
        if let Some(kind) = shape.kind.rejection() {
            return Err(CompileError::NonInstantiable {
                class: class.clone(),
                kind,
            });
        }

        // Mark before generating: the recursion guard for cyclic graphs.
        self.states.insert(class.clone(), CompileState::Compiling);

        let target = self.targets.provide(class)?;
        tracing::debug!(class = %class, target = %target.path.display(), "compiling mapper");

        let _lock = if self.multi_process_safety && !self.validation_mode {
            Some(FileLock::acquire(&target.path)?)
        } else {
            None
        };

        let properties = self.compile_properties(&shape)?;
        let code = build_unit(&shape, &properties, &target.mapper_class)?;

        if !self.validation_mode {
            write_atomic(&target.path, &code)?;
            tracing::info!(class = %class, target = %target.path.display(), "mapper written");
        }

        self.states.insert(class.clone(), CompileState::Done);
        Ok(())
    }

    fn compile_properties(
        &mut self,
        shape: &ClassShape,
    ) -> Result<IndexMap<String, CompiledProperty>, CompileError> {
        let mut properties = IndexMap::new();
        for (name, classified) in classify(shape) {
            let ast = compile_property(&classified, self)?;
            properties.insert(
                name,
                CompiledProperty {
                    name: classified.name,
                    is_in_constructor: classified.is_in_constructor,
                    is_required: classified.is_required,
                    ast,
                },
            );
        }
        Ok(properties)
    }
}

impl ClassResolver for MapperCompiler {
    fn resolve_class(
        &mut self,
        class: &ClassName,
        options: &PropertyOptions,
    ) -> Result<SchemaAst, CompileError> {
        if options.compile_as_object_type {
            // Inline property-shape strategy: no nested unit is generated.
            if !self.inline_stack.insert(class.clone()) {
                return Err(CompileError::Configuration(format!(
                    "inline object type for `{class}` references itself; use a delegated mapper to break the cycle"
                )));
            }
            let result = match self.registry.shape_of(class) {
                Ok(shape) => self.compile_properties(&shape),
                Err(e) => Err(e),
            };
            self.inline_stack.remove(class);
            let properties = result?;
            let items = properties
                .values()
                .map(|p| (p.name.clone(), p.ast.clone()))
                .collect();
            return Ok(SchemaAst::call(
                "object",
                [
                    SchemaAst::ClassNameRef(class.clone()),
                    SchemaAst::keyed_items(items),
                ],
            ));
        }

        if (self.has_external_mapper)(class) {
            return Ok(SchemaAst::call(
                "mapper",
                [SchemaAst::ClassNameRef(class.clone())],
            ));
        }

        let target = self.targets.provide(class)?;
        self.compile(class)?;
        Ok(SchemaAst::NewInstance(target.mapper_class))
    }
}

/// Write through a temporary sibling and rename onto the target, so a
/// partially written file is never observable under the target name. The
/// temporary file is cleaned up best-effort when anything fails.
fn write_atomic(path: &Path, code: &str) -> Result<(), CompileError> {
    let parent = path.parent().ok_or_else(|| {
        CompileError::Internal(format!("target path `{}` has no parent", path.display()))
    })?;
    fs::create_dir_all(parent).map_err(|source| CompileError::Io {
        path: parent.to_path_buf(),
        source,
    })?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|source| CompileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tmp.write_all(code.as_bytes())
        .map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    tmp.persist(path).map_err(|e| CompileError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::TypeDescriptor;
    use crate::shape::{
        ClassKind, ClassOptions, ManifestRegistry, PropertyShape, ShapeManifest,
    };
    use crate::target::StaticTargetProvider;
    use std::path::PathBuf;

    fn field(name: &str, ty: TypeDescriptor) -> PropertyShape {
        PropertyShape {
            name: name.to_string(),
            ty: Some(ty),
            has_default: false,
            options: Default::default(),
        }
    }

    fn class(name: &str, fields: Vec<PropertyShape>) -> ClassShape {
        ClassShape {
            name: ClassName::new(name),
            kind: ClassKind::Class,
            constructor: vec![],
            fields,
            options: ClassOptions::default(),
        }
    }

    fn compiler_for(
        shapes: Vec<ClassShape>,
        out_dir: PathBuf,
    ) -> (MapperCompiler, Arc<ManifestRegistry>) {
        let registry = Arc::new(ManifestRegistry::new(ShapeManifest {
            classes: shapes,
            external_mappers: vec![],
        }));
        let targets = Arc::new(StaticTargetProvider::new(out_dir, "Gen\\{class}Mapper"));
        (MapperCompiler::new(registry.clone(), targets), registry)
    }

    fn person_and_address() -> Vec<ClassShape> {
        vec![
            class(
                "App\\Person",
                vec![
                    field("id", TypeDescriptor::ident("int")),
                    field("name", TypeDescriptor::ident("string")),
                    field("address", TypeDescriptor::ident("App\\Address")),
                ],
            ),
            class(
                "App\\Address",
                vec![
                    field("street", TypeDescriptor::ident("string")),
                    field("city", TypeDescriptor::ident("string")),
                ],
            ),
        ]
    }

    fn generated_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".php"))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn nested_class_produces_two_units_referencing_the_inner_mapper() {
        let dir = tempfile::tempdir().unwrap();
        let (mut compiler, _) = compiler_for(person_and_address(), dir.path().to_path_buf());

        compiler.compile(&ClassName::new("App\\Person")).unwrap();

        assert_eq!(
            generated_files(dir.path()),
            vec!["AddressMapper.php".to_string(), "PersonMapper.php".to_string()]
        );
        let person = fs::read_to_string(dir.path().join("PersonMapper.php")).unwrap();
        assert!(person.contains("'address' => new AddressMapper(),"));
        // same target namespace, so no import is required
        assert!(!person.contains("use Gen\\AddressMapper;"));
    }

    #[test]
    fn compile_is_idempotent_within_one_instance() {
        let dir = tempfile::tempdir().unwrap();
        let (mut compiler, _) = compiler_for(person_and_address(), dir.path().to_path_buf());
        let person = ClassName::new("App\\Person");

        compiler.compile(&person).unwrap();
        // remove the output; a second call must be a no-op, not a rebuild
        fs::remove_file(dir.path().join("PersonMapper.php")).unwrap();
        compiler.compile(&person).unwrap();
        assert!(!dir.path().join("PersonMapper.php").exists());
    }

    #[test]
    fn mutually_referential_classes_terminate_with_two_units() {
        let dir = tempfile::tempdir().unwrap();
        let shapes = vec![
            class("App\\A", vec![field("b", TypeDescriptor::ident("App\\B"))]),
            class("App\\B", vec![field("a", TypeDescriptor::ident("App\\A"))]),
        ];
        let (mut compiler, _) = compiler_for(shapes, dir.path().to_path_buf());

        compiler.compile(&ClassName::new("App\\A")).unwrap();

        assert_eq!(
            generated_files(dir.path()),
            vec!["AMapper.php".to_string(), "BMapper.php".to_string()]
        );
        let a = fs::read_to_string(dir.path().join("AMapper.php")).unwrap();
        let b = fs::read_to_string(dir.path().join("BMapper.php")).unwrap();
        assert!(a.contains("'b' => new BMapper(),"));
        assert!(b.contains("'a' => new AMapper(),"));
    }

    #[test]
    fn self_referential_class_terminates_with_one_unit() {
        let dir = tempfile::tempdir().unwrap();
        let shapes = vec![class(
            "App\\Node",
            vec![field("parent", TypeDescriptor::ident("App\\Node"))],
        )];
        let (mut compiler, _) = compiler_for(shapes, dir.path().to_path_buf());

        compiler.compile(&ClassName::new("App\\Node")).unwrap();

        assert_eq!(generated_files(dir.path()), vec!["NodeMapper.php".to_string()]);
        let node = fs::read_to_string(dir.path().join("NodeMapper.php")).unwrap();
        assert!(node.contains("'parent' => new NodeMapper(),"));
    }

    #[test]
    fn external_mapper_predicate_short_circuits_recursion() {
        let dir = tempfile::tempdir().unwrap();
        let (compiler, _) = compiler_for(person_and_address(), dir.path().to_path_buf());
        let mut compiler = compiler.with_external_mapper_predicate(Box::new(|class| {
            class.as_str() == "App\\Address"
        }));

        compiler.compile(&ClassName::new("App\\Person")).unwrap();

        assert_eq!(generated_files(dir.path()), vec!["PersonMapper.php".to_string()]);
        let person = fs::read_to_string(dir.path().join("PersonMapper.php")).unwrap();
        assert!(person.contains("'address' => $ts->mapper(Address::class),"));
        assert!(person.contains("use App\\Address;"));
    }

    #[test]
    fn inline_object_type_compiles_the_shape_without_a_nested_unit() {
        let dir = tempfile::tempdir().unwrap();
        let mut shapes = person_and_address();
        shapes[0].fields[2].options.compile_as_object_type = true;
        let (mut compiler, _) = compiler_for(shapes, dir.path().to_path_buf());

        compiler.compile(&ClassName::new("App\\Person")).unwrap();

        assert_eq!(generated_files(dir.path()), vec!["PersonMapper.php".to_string()]);
        let person = fs::read_to_string(dir.path().join("PersonMapper.php")).unwrap();
        assert!(person.contains("$ts->object(Address::class, ["));
        assert!(person.contains("'street' => $ts->string(),"));
    }

    #[test]
    fn self_referential_inline_object_type_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut shapes = vec![class(
            "App\\Node",
            vec![field("parent", TypeDescriptor::ident("App\\Node"))],
        )];
        shapes[0].fields[0].options.compile_as_object_type = true;
        let (mut compiler, _) = compiler_for(shapes, dir.path().to_path_buf());

        let err = compiler.compile(&ClassName::new("App\\Node")).unwrap_err();
        assert!(matches!(err, CompileError::Configuration(_)));
        assert!(err.to_string().contains("App\\Node"));
        assert!(generated_files(dir.path()).is_empty());
    }

    #[test]
    fn mutually_referential_inline_object_types_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut shapes = vec![
            class("App\\A", vec![field("b", TypeDescriptor::ident("App\\B"))]),
            class("App\\B", vec![field("a", TypeDescriptor::ident("App\\A"))]),
        ];
        shapes[0].fields[0].options.compile_as_object_type = true;
        shapes[1].fields[0].options.compile_as_object_type = true;
        let (mut compiler, _) = compiler_for(shapes, dir.path().to_path_buf());

        let err = compiler.compile(&ClassName::new("App\\A")).unwrap_err();
        assert!(matches!(err, CompileError::Configuration(_)));
        assert!(generated_files(dir.path()).is_empty());
    }

    #[test]
    fn repeated_inline_object_type_off_the_cycle_path_still_compiles() {
        // the same inline class twice in one unit is fine; only a cycle
        // through the inline expansion is rejected
        let dir = tempfile::tempdir().unwrap();
        let mut shapes = vec![
            class(
                "App\\Person",
                vec![
                    field("home", TypeDescriptor::ident("App\\Address")),
                    field("work", TypeDescriptor::ident("App\\Address")),
                ],
            ),
            class(
                "App\\Address",
                vec![field("street", TypeDescriptor::ident("string"))],
            ),
        ];
        shapes[0].fields[0].options.compile_as_object_type = true;
        shapes[0].fields[1].options.compile_as_object_type = true;
        let (mut compiler, _) = compiler_for(shapes, dir.path().to_path_buf());

        compiler.compile(&ClassName::new("App\\Person")).unwrap();
        let person = fs::read_to_string(dir.path().join("PersonMapper.php")).unwrap();
        assert_eq!(person.matches("$ts->object(Address::class, [").count(), 2);
    }

    #[test]
    fn non_instantiable_targets_are_rejected_before_generation() {
        let dir = tempfile::tempdir().unwrap();
        let kinds = [
            (ClassKind::Interface, "interface"),
            (ClassKind::Trait, "trait"),
            (ClassKind::Enum, "enum"),
            (ClassKind::AnonymousClass, "anonymous class"),
            (ClassKind::AbstractClass, "abstract class"),
        ];
        for (kind, label) in kinds {
            let mut shape = class("App\\Bad", vec![]);
            shape.kind = kind;
            let (mut compiler, _) = compiler_for(vec![shape], dir.path().to_path_buf());
            let err = compiler.compile(&ClassName::new("App\\Bad")).unwrap_err();
            assert!(matches!(err, CompileError::NonInstantiable { .. }));
            assert!(err.to_string().contains(label), "wrong kind for {label}");
        }
        assert!(generated_files(dir.path()).is_empty());
    }

    #[test]
    fn validation_mode_runs_everything_except_the_write() {
        let dir = tempfile::tempdir().unwrap();
        let (compiler, _) = compiler_for(person_and_address(), dir.path().to_path_buf());
        let mut compiler = compiler.with_validation_mode();

        compiler.compile(&ClassName::new("App\\Person")).unwrap();
        assert!(generated_files(dir.path()).is_empty());
        assert!(compiler.needs_recompile(&ClassName::new("App\\Person")));

        // errors still surface
        let shapes = vec![class(
            "App\\Broken",
            vec![field("x", TypeDescriptor::ident("iterable"))],
        )];
        let (compiler, _) = compiler_for(shapes, dir.path().to_path_buf());
        let mut compiler = compiler.with_validation_mode();
        let err = compiler.compile(&ClassName::new("App\\Broken")).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedType(_)));
    }

    #[test]
    fn unknown_nested_class_fails_the_outer_compilation() {
        let dir = tempfile::tempdir().unwrap();
        let shapes = vec![class(
            "App\\Person",
            vec![field("address", TypeDescriptor::ident("App\\Missing"))],
        )];
        let (mut compiler, _) = compiler_for(shapes, dir.path().to_path_buf());
        let err = compiler.compile(&ClassName::new("App\\Person")).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedType(_)));
        assert!(generated_files(dir.path()).is_empty());
    }

    #[test]
    fn output_is_complete_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let (mut compiler, _) = compiler_for(person_and_address(), dir.path().to_path_buf());
        compiler.compile(&ClassName::new("App\\Address")).unwrap();

        let files = generated_files(dir.path());
        assert_eq!(files, vec!["AddressMapper.php".to_string()]);
        for entry in fs::read_dir(dir.path()).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().into_owned();
            assert!(
                name.ends_with(".php") || name.ends_with(".lock"),
                "unexpected leftover `{name}`"
            );
        }
        let content = fs::read_to_string(dir.path().join("AddressMapper.php")).unwrap();
        assert!(content.starts_with("<?php\n"));
        assert!(content.ends_with("}\n"), "file rename only happens after the full write");
    }
}
