//! The front-end plug-in surface and the extension-keyed registry.

use devac_core::error::ParseError;
use devac_core::model::StructuralParseResult;
use std::collections::BTreeMap;
use std::path::Path;

/// Context a front-end needs to mint entity IDs and honor limits.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Normalized repo identifier (`host/org/name` form).
    pub repo: String,
    /// Package path relative to the repo root.
    pub package_path: String,
    /// Per-file parse timeout in milliseconds.
    pub timeout_ms: u64,
    /// Upper bound on files parsed concurrently within one package (also
    /// caps concurrently running out-of-process front-ends).
    pub pool_size: usize,
    /// Command used to launch the Python front-end.
    pub python_command: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            repo: "local/unknown".to_string(),
            package_path: String::new(),
            timeout_ms: 30_000,
            pool_size: 4,
            python_command: "python3".to_string(),
        }
    }
}

/// A language front-end.
///
/// Implementations must never fail on syntax errors: they return partial
/// nodes plus warnings. Empty input returns an empty result.
pub trait LanguageFrontend: Send + Sync {
    fn language(&self) -> &'static str;
    fn extensions(&self) -> &'static [&'static str];
    fn version(&self) -> &'static str;

    /// Parse a file from disk. The default implementation reads the file
    /// and delegates to [`Self::parse_content`].
    fn parse(
        &self,
        path: &Path,
        options: &ParseOptions,
    ) -> Result<StructuralParseResult, ParseError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ParseError::ExternalToolFailure {
                file: path.display().to_string(),
                detail: format!("failed to read source: {e}"),
            })?;
        self.parse_content(&content, path, options)
    }

    /// Parse in-memory content as if it lived at `path`.
    fn parse_content(
        &self,
        content: &str,
        path: &Path,
        options: &ParseOptions,
    ) -> Result<StructuralParseResult, ParseError>;

    fn can_parse(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions().contains(&ext))
    }
}

/// Registry keyed by file extension. Collisions resolve by registration
/// order: the first front-end claiming an extension keeps it.
#[derive(Default)]
pub struct FrontendRegistry {
    frontends: Vec<Box<dyn LanguageFrontend>>,
    by_extension: BTreeMap<String, usize>,
}

impl FrontendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, frontend: Box<dyn LanguageFrontend>) {
        let index = self.frontends.len();
        for ext in frontend.extensions() {
            self.by_extension.entry((*ext).to_string()).or_insert(index);
        }
        self.frontends.push(frontend);
    }

    pub fn for_path(&self, path: &Path) -> Option<&dyn LanguageFrontend> {
        let ext = path.extension()?.to_str()?;
        self.by_extension
            .get(ext)
            .map(|&i| self.frontends[i].as_ref())
    }

    pub fn supports(&self, path: &Path) -> bool {
        self.for_path(path).is_some()
    }

    /// (language, version) for each registered front-end.
    pub fn languages(&self) -> Vec<(&'static str, &'static str)> {
        self.frontends
            .iter()
            .map(|f| (f.language(), f.version()))
            .collect()
    }
}
