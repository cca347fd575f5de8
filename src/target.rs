//! Target naming providers: where a generated unit lives and what it is
//! called. Deterministic per provider instance.

use std::path::PathBuf;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::CompileError;
use crate::shape::{ClassName, ShapeRegistry};

#[derive(Debug, Clone, PartialEq)]
pub struct MapperTarget {
    pub class: ClassName,
    /// File the unit is written to.
    pub path: PathBuf,
    /// Fully-qualified name of the generated mapper class.
    pub mapper_class: ClassName,
}

pub trait TargetProvider {
    fn provide(&self, class: &ClassName) -> Result<MapperTarget, CompileError>;
}

/// Names derive from the source class's short name via a `{class}` pattern,
/// e.g. `Gen\Mappers\{class}Mapper`.
pub struct StaticTargetProvider {
    directory: PathBuf,
    pattern: String,
}

impl StaticTargetProvider {
    pub fn new(directory: PathBuf, pattern: impl Into<String>) -> Self {
        StaticTargetProvider {
            directory,
            pattern: pattern.into(),
        }
    }
}

impl TargetProvider for StaticTargetProvider {
    fn provide(&self, class: &ClassName) -> Result<MapperTarget, CompileError> {
        let mapper_class = ClassName::new(self.pattern.replace("{class}", class.short()));
        let path = self.directory.join(format!("{}.php", mapper_class.short()));
        Ok(MapperTarget {
            class: class.clone(),
            path,
            mapper_class,
        })
    }
}

/// Folds a structural fingerprint of the class shape into the mapper name,
/// so unrelated classes never collide and shape changes invalidate the old
/// target on their own.
pub struct HashedTargetProvider {
    directory: PathBuf,
    pattern: String,
    registry: Arc<dyn ShapeRegistry>,
}

impl HashedTargetProvider {
    pub fn new(
        directory: PathBuf,
        pattern: impl Into<String>,
        registry: Arc<dyn ShapeRegistry>,
    ) -> Self {
        HashedTargetProvider {
            directory,
            pattern: pattern.into(),
            registry,
        }
    }

    fn fingerprint(&self, class: &ClassName) -> Result<String, CompileError> {
        let shape = self.registry.shape_of(class)?;
        let bytes = serde_json::to_vec(&shape)
            .map_err(|e| CompileError::Internal(format!("cannot fingerprint `{class}`: {e}")))?;
        let digest = Sha256::digest(&bytes);
        Ok(format!("{digest:x}")[..10].to_string())
    }
}

impl TargetProvider for HashedTargetProvider {
    fn provide(&self, class: &ClassName) -> Result<MapperTarget, CompileError> {
        let fingerprint = self.fingerprint(class)?;
        let short = format!("{}_{fingerprint}", class.short());
        let mapper_class = ClassName::new(self.pattern.replace("{class}", &short));
        let path = self.directory.join(format!("{}.php", mapper_class.short()));
        Ok(MapperTarget {
            class: class.clone(),
            path,
            mapper_class,
        })
    }
}

// ------------------------------- Tests ------------------------------------ //
