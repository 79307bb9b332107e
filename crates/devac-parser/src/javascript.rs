//! In-process JavaScript front-end.

use crate::ecma;
use crate::registry::{LanguageFrontend, ParseOptions};
use devac_core::error::ParseError;
use devac_core::model::StructuralParseResult;
use std::path::Path;

pub struct JavaScriptFrontend;

impl LanguageFrontend for JavaScriptFrontend {
    fn language(&self) -> &'static str {
        "javascript"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["js", "jsx", "mjs", "cjs"]
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
        let language: tree_sitter::Language = tree_sitter_javascript::LANGUAGE.into();
        ecma::parse_source(content, path, options, &language)
    }
}
