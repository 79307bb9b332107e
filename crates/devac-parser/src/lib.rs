//! Parser orchestration: dispatch files to per-language front-ends and
//! produce uniform [`devac_core::model::StructuralParseResult`]s.
//!
//! Front-ends are plug-ins behind [`registry::LanguageFrontend`]; the
//! in-tree TypeScript/JavaScript front-ends run in process via tree-sitter,
//! and the Python front-end (feature `python-frontend`) runs out of process
//! speaking JSON over stdout.

pub mod ecma;
pub mod javascript;
pub mod orchestrator;
pub mod registry;
pub mod typescript;

#[cfg(feature = "python-frontend")]
pub mod python;

pub use orchestrator::ParserOrchestrator;
pub use registry::{LanguageFrontend, ParseOptions};
