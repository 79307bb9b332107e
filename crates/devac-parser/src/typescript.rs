//! In-process TypeScript front-end.

use crate::ecma;
use crate::registry::{LanguageFrontend, ParseOptions};
use devac_core::error::ParseError;
use devac_core::model::StructuralParseResult;
use std::path::Path;

/// TypeScript/TSX front-end backed by the tree-sitter TSX grammar (a strict
/// superset of plain TypeScript for the constructs we extract).
pub struct TypeScriptFrontend;

impl LanguageFrontend for TypeScriptFrontend {
    fn language(&self) -> &'static str {
        "typescript"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ts", "tsx", "mts", "cts"]
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn parse_content(
        &self,
        content: &str,
        path: &Path,
        options: &ParseOptions,
    ) -> Result<StructuralParseResult, ParseError> {
        let language: tree_sitter::Language = tree_sitter_typescript::LANGUAGE_TSX.into();
        ecma::parse_source(content, path, options, &language)
    }
}
