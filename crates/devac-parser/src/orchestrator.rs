//! The language-agnostic parser driver.

use crate::registry::{FrontendRegistry, LanguageFrontend, ParseOptions};
use devac_core::error::{BulkOutcome, ParseError};
use devac_core::model::StructuralParseResult;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

/// Per-package parse report: successful results plus per-file failures.
#[derive(Debug, Default)]
pub struct PackageParseReport {
    pub results: Vec<StructuralParseResult>,
    /// (file, failure kind, detail) for every file that did not parse.
    pub failures: Vec<(String, String, String)>,
    pub outcome: BulkOutcome,
}

/// Dispatches files to registered front-ends and enforces edge-case policy:
/// syntax errors produce warnings, empty files produce empty results, and a
/// file exceeding the configured timeout fails with `Timeout`.
pub struct ParserOrchestrator {
    registry: FrontendRegistry,
    options: ParseOptions,
}

impl ParserOrchestrator {
    /// An orchestrator with the default front-ends registered.
    pub fn new(options: ParseOptions) -> Self {
        let mut registry = FrontendRegistry::new();
        registry.register(Box::new(crate::typescript::TypeScriptFrontend));
        registry.register(Box::new(crate::javascript::JavaScriptFrontend));
        #[cfg(feature = "python-frontend")]
        registry.register(Box::new(crate::python::PythonFrontend));
        Self { registry, options }
    }

    /// An orchestrator with no front-ends; callers register their own.
    pub fn bare(options: ParseOptions) -> Self {
        Self {
            registry: FrontendRegistry::new(),
            options,
        }
    }

    pub fn register(&mut self, frontend: Box<dyn LanguageFrontend>) {
        self.registry.register(frontend);
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn can_parse(&self, path: &Path) -> bool {
        self.registry.supports(path)
    }

    /// Registered (language, version) pairs.
    pub fn languages(&self) -> Vec<(&'static str, &'static str)> {
        self.registry.languages()
    }

    pub fn parse(&self, path: &Path) -> Result<StructuralParseResult, ParseError> {
        let frontend = self
            .registry
            .for_path(path)
            .ok_or_else(|| ParseError::Unsupported {
                file: path.display().to_string(),
            })?;
        let started = Instant::now();
        let result = frontend.parse(path, &self.options)?;
        self.enforce_timeout(path, started)?;
        Ok(result)
    }

    pub fn parse_content(
        &self,
        content: &str,
        path: &Path,
    ) -> Result<StructuralParseResult, ParseError> {
        let frontend = self
            .registry
            .for_path(path)
            .ok_or_else(|| ParseError::Unsupported {
                file: path.display().to_string(),
            })?;
        let started = Instant::now();
        let result = frontend.parse_content(content, path, &self.options)?;
        self.enforce_timeout(path, started)?;
        Ok(result)
    }

    fn enforce_timeout(&self, path: &Path, started: Instant) -> Result<(), ParseError> {
        let elapsed = started.elapsed().as_millis() as u64;
        if elapsed > self.options.timeout_ms {
            return Err(ParseError::Timeout {
                file: path.display().to_string(),
                timeout_ms: self.options.timeout_ms,
            });
        }
        Ok(())
    }

    /// Parse every supported file under `root`, honoring `.gitignore`,
    /// `.devacignore`, and include/exclude globs. Files parse in parallel;
    /// per-file failures are collected, never fatal.
    pub fn parse_package(
        &self,
        root: &Path,
        include: &[String],
        exclude: &[String],
    ) -> PackageParseReport {
        let include_set = build_globset(include);
        let exclude_set = build_globset(exclude);

        let mut files: Vec<PathBuf> = Vec::new();
        let walker = ignore::WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .add_custom_ignore_filename(".devacignore")
            .build();
        for entry in walker.flatten() {
            let path = entry.path();
            if !path.is_file() || !self.can_parse(path) {
                continue;
            }
            let rel = path.strip_prefix(root).unwrap_or(path);
            if let Some(include_set) = &include_set
                && !include_set.is_match(rel)
            {
                continue;
            }
            if let Some(exclude_set) = &exclude_set
                && exclude_set.is_match(rel)
            {
                continue;
            }
            files.push(path.to_path_buf());
        }
        files.sort();
        debug!(count = files.len(), root = %root.display(), "parsing package");

        let parse_all = || {
            files
                .par_iter()
                .map(|file| {
                    self.parse(file)
                        .map_err(|e| (file.display().to_string(), e))
                })
                .collect::<Vec<Result<StructuralParseResult, (String, ParseError)>>>()
        };
        // A scoped pool bounds in-flight parses (and thus concurrently
        // running subprocess front-ends) to the configured size.
        let parsed = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.pool_size.max(1))
            .build()
        {
            Ok(pool) => pool.install(parse_all),
            Err(_) => parse_all(),
        };

        let mut report = PackageParseReport::default();
        for item in parsed {
            match item {
                Ok(result) => report.results.push(result),
                Err((file, e)) => {
                    warn!(file = %file, error = %e, "file failed to parse");
                    report
                        .failures
                        .push((file, e.kind().to_string(), e.to_string()));
                }
            }
        }
        report.outcome = BulkOutcome {
            success: true,
            error: None,
            files_processed: report.results.len(),
            files_failed: report.failures.len(),
            rows_written: 0,
        };
        report
    }
}

fn build_globset(patterns: &[String]) -> Option<GlobSet> {
    if patterns.is_empty() {
        return None;
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match GlobBuilder::new(pattern).literal_separator(false).build() {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => warn!(pattern = %pattern, error = %e, "ignoring invalid glob"),
        }
    }
    builder.build().ok()
}
