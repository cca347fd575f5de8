pub mod ast;
pub mod classify;
pub mod cli;
pub mod compile;
pub mod descriptor;
pub mod error;
pub mod lock;
pub mod orchestrator;
pub mod printer;
pub mod resolve;
pub mod scan;
pub mod shape;
pub mod target;
pub mod unit;

pub use error::CompileError;
pub use orchestrator::MapperCompiler;
pub use shape::{ClassName, ClassShape, ManifestRegistry, ShapeRegistry};
pub use target::{HashedTargetProvider, MapperTarget, StaticTargetProvider, TargetProvider};
