//! Minimal CLI: compile mapper units from a shape manifest, or check that
//! every class compiles without writing anything.
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use crate::orchestrator::MapperCompiler;
use crate::scan::scan_directory;
use crate::shape::{ClassName, ManifestRegistry};
use crate::target::{HashedTargetProvider, StaticTargetProvider, TargetProvider};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile class shapes into generated mapper source files
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// compile every selected class and write the generated units
    Compile(CompileSettings),
    /// run the full pipeline without writing anything
    Check(CheckSettings),
}

#[derive(Args, Debug, Clone)]
struct ManifestSettings {
    /// JSON shape manifest produced by the class extractor
    #[arg(long, short)]
    shapes: PathBuf,

    /// explicit classes to compile (defaults to every class in the manifest)
    #[arg(long, short)]
    class: Vec<String>,

    /// also compile every class under this directory carrying the
    /// #[CompileMapper] marker
    #[arg(long)]
    scan: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct TargetSettings {
    /// directory the generated units are written into
    #[arg(long, short)]
    out_dir: PathBuf,

    /// mapper naming pattern; {class} is replaced by the source short name
    #[arg(long, default_value = "Generated\\Mapper\\{class}Mapper")]
    pattern: String,

    /// fold a structural fingerprint of each shape into the mapper name
    #[arg(long, default_value_t = false)]
    hashed: bool,
}

#[derive(Args, Debug)]
struct CompileSettings {
    #[command(flatten)]
    manifest: ManifestSettings,

    #[command(flatten)]
    target: TargetSettings,

    /// skip the cross-process file lock around each write
    #[arg(long, default_value_t = false)]
    no_lock: bool,
}

#[derive(Args, Debug)]
struct CheckSettings {
    #[command(flatten)]
    manifest: ManifestSettings,

    #[command(flatten)]
    target: TargetSettings,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl ManifestSettings {
    fn load_registry(&self) -> anyhow::Result<Arc<ManifestRegistry>> {
        Ok(Arc::new(ManifestRegistry::from_path(&self.shapes)?))
    }

    fn select_classes(&self, registry: &ManifestRegistry) -> anyhow::Result<Vec<ClassName>> {
        let mut classes: Vec<ClassName> = if self.class.is_empty() && self.scan.is_none() {
            registry.class_names().cloned().collect()
        } else {
            self.class.iter().map(ClassName::new).collect()
        };
        if let Some(scan_dir) = &self.scan {
            for class in scan_directory(scan_dir)? {
                if !classes.contains(&class) {
                    classes.push(class);
                }
            }
        }
        Ok(classes)
    }
}

impl TargetSettings {
    fn provider(&self, registry: Arc<ManifestRegistry>) -> Arc<dyn TargetProvider> {
        if self.hashed {
            Arc::new(HashedTargetProvider::new(
                self.out_dir.clone(),
                self.pattern.clone(),
                registry,
            ))
        } else {
            Arc::new(StaticTargetProvider::new(
                self.out_dir.clone(),
                self.pattern.clone(),
            ))
        }
    }
}

fn compiler_for(
    manifest: &ManifestSettings,
    target: &TargetSettings,
) -> anyhow::Result<(MapperCompiler, Vec<ClassName>)> {
    let registry = manifest.load_registry()?;
    let classes = manifest.select_classes(&registry)?;
    let targets = target.provider(registry.clone());
    let external = registry.clone();
    let compiler = MapperCompiler::new(registry, targets).with_external_mapper_predicate(
        Box::new(move |class| external.has_external_mapper(class)),
    );
    Ok((compiler, classes))
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Compile(settings) => {
                let (compiler, classes) = compiler_for(&settings.manifest, &settings.target)?;
                let mut compiler = compiler.with_multi_process_safety(!settings.no_lock);
                for class in &classes {
                    compiler.compile(class)?;
                }
                tracing::info!(classes = classes.len(), "compilation finished");
                Ok(())
            }
            Command::Check(settings) => {
                let (compiler, classes) = compiler_for(&settings.manifest, &settings.target)?;
                let mut compiler = compiler.with_validation_mode();
                for class in &classes {
                    compiler.compile(class)?;
                }
                tracing::info!(classes = classes.len(), "check finished");
                Ok(())
            }
        }
    }
}
