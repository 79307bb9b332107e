//! CLI binary for DevAC: sync packages into seeds, inspect hub status, and
//! run federated queries.
//!
//! Exit codes: 0 success, 1 prerequisite failure, 2 parse/storage error,
//! 3 hub error.

use anyhow::Context;
use clap::{Parser, Subcommand};
use devac_core::config::DevacConfig;
use devac_effects::PackageEffectMappings;
use devac_hub::registry::{discover_packages, probe_repo_id};
use devac_hub::{FederationHub, HubOptions};
use devac_parser::ParserOrchestrator;
use devac_parser::registry::ParseOptions;
use devac_seed::writer::SeedWriter;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};

const EXIT_PREREQUISITE: u8 = 1;
const EXIT_PARSE_STORAGE: u8 = 2;
const EXIT_HUB: u8 = 3;

#[derive(Parser)]
#[command(name = "devac", about = "DevAC code-graph seeds and federation hub")]
struct Cli {
    /// Workspace root (defaults to current directory)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a repo's packages, write their seeds, and register with the hub
    Sync {
        /// Repository root (defaults to the workspace root)
        repo: Option<PathBuf>,

        /// Branch partition to write
        #[arg(long, default_value = "base")]
        branch: String,
    },

    /// Show registered repos and refresh their statuses
    Status,

    /// Run SQL against the federated views (nodes, edges, external_refs, effects)
    Query {
        sql: String,

        /// Emit rows as JSON objects instead of tab-separated values
        #[arg(long)]
        json: bool,
    },
}

fn workspace_root(cli: &Cli) -> anyhow::Result<PathBuf> {
    match &cli.workspace {
        Some(w) => Ok(w.clone()),
        None => std::env::current_dir().context("failed to get current directory"),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let root = match workspace_root(&cli) {
        Ok(root) => root,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::from(EXIT_PREREQUISITE);
        }
    };
    let config = match DevacConfig::load(&root) {
        Ok(config) => config,
        Err(e) => {
            error!("invalid configuration: {e}");
            return ExitCode::from(EXIT_PREREQUISITE);
        }
    };

    let outcome = match cli.command {
        Commands::Sync { ref repo, ref branch } => {
            let repo_root = repo.clone().unwrap_or_else(|| root.clone());
            run_sync(&root, &repo_root, branch, &config)
        }
        Commands::Status => run_status(&root, &config),
        Commands::Query { ref sql, json } => run_query(&root, &config, sql, json),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e.message);
            ExitCode::from(e.code)
        }
    }
}

struct CliError {
    code: u8,
    message: anyhow::Error,
}

impl CliError {
    fn prerequisite(message: anyhow::Error) -> Self {
        Self { code: EXIT_PREREQUISITE, message }
    }
    fn storage(message: anyhow::Error) -> Self {
        Self { code: EXIT_PARSE_STORAGE, message }
    }
    fn hub(message: anyhow::Error) -> Self {
        Self { code: EXIT_HUB, message }
    }
}

fn open_hub(root: &Path, config: &DevacConfig) -> Result<FederationHub, CliError> {
    let db_path = root.join(&config.hub.db_path);
    let deadline = (config.hub.query_deadline_ms > 0)
        .then(|| Duration::from_millis(config.hub.query_deadline_ms));
    FederationHub::open(
        &db_path,
        HubOptions {
            force: false,
            skip_validation: config.hub.skip_validation,
            query_deadline: deadline,
        },
    )
    .map_err(|e| CliError::hub(anyhow::Error::new(e).context("failed to open hub")))
}

fn run_sync(
    root: &Path,
    repo_root: &Path,
    branch: &str,
    config: &DevacConfig,
) -> Result<(), CliError> {
    if !repo_root.exists() {
        return Err(CliError::prerequisite(anyhow::anyhow!(
            "repo root {} does not exist",
            repo_root.display()
        )));
    }
    let (repo_id, _) = probe_repo_id(repo_root);
    let workspace_catalog =
        PackageEffectMappings::load_optional(&root.join(".devac").join("effects.json"))
            .map_err(|e| CliError::prerequisite(anyhow::Error::new(e)))?
            .unwrap_or_default();

    let mut packages = discover_packages(repo_root);
    if packages.is_empty() {
        // A bare source tree is still one package rooted at the repo.
        packages.push((String::new(), repo_id.clone()));
    }
    info!(repo_id = %repo_id, packages = packages.len(), branch, "syncing repo");

    let sync_results: Vec<Result<(String, usize), CliError>> = packages
        .par_iter()
        .map(|(rel, _name)| {
            let pkg_dir = if rel.is_empty() {
                repo_root.to_path_buf()
            } else {
                repo_root.join(rel)
            };
            sync_package(&pkg_dir, rel, &repo_id, branch, config, &workspace_catalog)
        })
        .collect();

    let mut parsed_files = 0usize;
    for result in sync_results {
        let (rel, files) = result?;
        info!(package = %rel, files, "package seeded");
        parsed_files += files;
    }

    let mut hub = open_hub(root, config)?;
    hub.register_repo(repo_root)
        .map_err(|e| CliError::hub(anyhow::Error::new(e).context("registration failed")))?;

    println!("synced {parsed_files} files across {} packages", packages.len());
    Ok(())
}

fn sync_package(
    pkg_dir: &Path,
    rel: &str,
    repo_id: &str,
    branch: &str,
    config: &DevacConfig,
    workspace_catalog: &PackageEffectMappings,
) -> Result<(String, usize), CliError> {
    let options = ParseOptions {
        repo: repo_id.to_string(),
        package_path: rel.to_string(),
        timeout_ms: config.parser.timeout_ms,
        pool_size: config.parser.subprocess_pool_size,
        python_command: config.parser.python_command.clone(),
    };
    let orchestrator = ParserOrchestrator::new(options);
    let mut report =
        orchestrator.parse_package(pkg_dir, &config.parser.include, &config.parser.exclude);
    for (file, kind, detail) in &report.failures {
        error!(file = %file, kind = %kind, "{detail}");
    }

    let package_catalog =
        PackageEffectMappings::load_optional(&pkg_dir.join(".devac").join("effects.json"))
            .map_err(|e| CliError::prerequisite(anyhow::Error::new(e)))?
            .unwrap_or_default();
    let catalog = PackageEffectMappings::merged(workspace_catalog, &package_catalog);
    for result in &mut report.results {
        let effects = std::mem::take(&mut result.effects);
        result.effects = devac_effects::map_effects(effects, &catalog);
    }

    let writer = SeedWriter::new(pkg_dir)
        .with_lock_timeout(Duration::from_millis(config.storage.lock_timeout_ms));
    let outcome = writer.update_files(&report.results, branch);
    if !outcome.success {
        return Err(CliError::storage(anyhow::anyhow!(
            "seed write failed for {}: {}",
            pkg_dir.display(),
            outcome.error.unwrap_or_default()
        )));
    }

    let resolution = devac_seed::resolver::resolve_package(pkg_dir, branch)
        .map_err(|e| CliError::storage(anyhow::Error::new(e).context("resolver pass failed")))?;
    info!(
        resolved = resolution.total_resolved(),
        unresolved = resolution.failures.len(),
        "resolver pass"
    );
    Ok((rel.to_string(), report.results.len()))
}

fn run_status(root: &Path, config: &DevacConfig) -> Result<(), CliError> {
    let mut hub = open_hub(root, config)?;
    let repos = hub
        .sync()
        .map_err(|e| CliError::hub(anyhow::Error::new(e).context("status refresh failed")))?;
    if repos.is_empty() {
        println!("no repos registered");
        return Ok(());
    }
    for repo in repos {
        println!(
            "{:<40} {:<8} {}",
            repo.repo_id,
            repo.status.as_str(),
            repo.path.display()
        );
    }
    Ok(())
}

fn run_query(root: &Path, config: &DevacConfig, sql: &str, json: bool) -> Result<(), CliError> {
    let hub = open_hub(root, config)?;
    let outcome = hub
        .query_detailed(sql)
        .map_err(|e| CliError::hub(anyhow::Error::new(e).context("query failed")))?;
    if outcome.deadline_exceeded {
        return Err(CliError::hub(anyhow::anyhow!("query deadline exceeded")));
    }

    if json {
        for object in outcome.result.objects() {
            println!("{object}");
        }
    } else {
        println!("{}", outcome.result.columns.join("\t"));
        for row in &outcome.result.rows {
            let cells: Vec<String> = row
                .iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            println!("{}", cells.join("\t"));
        }
    }
    Ok(())
}
