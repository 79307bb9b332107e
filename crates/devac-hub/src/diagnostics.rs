//! Unified validation diagnostics stored alongside the seed index.

use crate::db::{FederationHub, db_err};
use chrono::Utc;
use devac_core::error::HubError;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Diagnostic severity, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Note,
    Suggestion,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Note => "note",
            Self::Suggestion => "suggestion",
        }
    }

    /// Parse a stored value; unrecognized input reads as `warning`.
    pub fn parse(s: &str) -> Self {
        match s {
            "critical" => Self::Critical,
            "error" => Self::Error,
            "note" => Self::Note,
            "suggestion" => Self::Suggestion,
            _ => Self::Warning,
        }
    }
}

/// One validation finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    #[serde(default)]
    pub repo_id: Option<String>,
    /// Producer of the finding (validator name); clear-by-source key.
    pub source: String,
    pub severity: Severity,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    pub message: String,
    #[serde(default)]
    pub github_pr_number: Option<u32>,
    #[serde(default)]
    pub resolved: bool,
}

/// Filter for [`FederationHub::get_validation_errors`].
#[derive(Debug, Clone, Default)]
pub struct DiagnosticFilter {
    pub repo_id: Option<String>,
    pub source: Option<String>,
    pub severity: Option<Severity>,
    pub file: Option<String>,
    /// `Some(false)` returns only open findings.
    pub resolved: Option<bool>,
}

impl FederationHub {
    /// Append diagnostics in one transaction.
    pub fn push_diagnostics(&mut self, diagnostics: &[Diagnostic]) -> Result<(), HubError> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction().map_err(db_err)?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO unified_diagnostics
                     (repo_id, source, severity, category, file, line, message,
                      github_pr_number, resolved, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                )
                .map_err(db_err)?;
            for d in diagnostics {
                stmt.execute(params![
                    d.repo_id,
                    d.source,
                    d.severity.as_str(),
                    d.category,
                    d.file,
                    d.line,
                    d.message,
                    d.github_pr_number,
                    d.resolved,
                    now,
                ])
                .map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    /// Atomically replace one source's rows with a new set.
    pub fn replace_diagnostics(
        &mut self,
        source: &str,
        diagnostics: &[Diagnostic],
    ) -> Result<(), HubError> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction().map_err(db_err)?;
        tx.execute(
            "DELETE FROM unified_diagnostics WHERE source = ?1",
            params![source],
        )
        .map_err(db_err)?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO unified_diagnostics
                     (repo_id, source, severity, category, file, line, message,
                      github_pr_number, resolved, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                )
                .map_err(db_err)?;
            for d in diagnostics {
                stmt.execute(params![
                    d.repo_id,
                    source,
                    d.severity.as_str(),
                    d.category,
                    d.file,
                    d.line,
                    d.message,
                    d.github_pr_number,
                    d.resolved,
                    now,
                ])
                .map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    /// Delete diagnostics, optionally scoped by repo and/or source.
    pub fn clear_diagnostics(
        &mut self,
        repo_id: Option<&str>,
        source: Option<&str>,
    ) -> Result<usize, HubError> {
        let deleted = match (repo_id, source) {
            (Some(repo), Some(src)) => self
                .conn
                .execute(
                    "DELETE FROM unified_diagnostics WHERE repo_id = ?1 AND source = ?2",
                    params![repo, src],
                )
                .map_err(db_err)?,
            (Some(repo), None) => self
                .conn
                .execute(
                    "DELETE FROM unified_diagnostics WHERE repo_id = ?1",
                    params![repo],
                )
                .map_err(db_err)?,
            (None, Some(src)) => self
                .conn
                .execute(
                    "DELETE FROM unified_diagnostics WHERE source = ?1",
                    params![src],
                )
                .map_err(db_err)?,
            (None, None) => self
                .conn
                .execute("DELETE FROM unified_diagnostics", [])
                .map_err(db_err)?,
        };
        Ok(deleted)
    }

    /// Fetch diagnostics matching a filter, most severe first.
    pub fn get_validation_errors(
        &self,
        filter: &DiagnosticFilter,
    ) -> Result<Vec<Diagnostic>, HubError> {
        let mut sql = String::from(
            "SELECT repo_id, source, severity, category, file, line, message,
                    github_pr_number, resolved
             FROM unified_diagnostics WHERE 1 = 1",
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(repo) = &filter.repo_id {
            sql.push_str(" AND repo_id = ?");
            params_vec.push(Box::new(repo.clone()));
        }
        if let Some(source) = &filter.source {
            sql.push_str(" AND source = ?");
            params_vec.push(Box::new(source.clone()));
        }
        if let Some(severity) = filter.severity {
            sql.push_str(" AND severity = ?");
            params_vec.push(Box::new(severity.as_str().to_string()));
        }
        if let Some(file) = &filter.file {
            sql.push_str(" AND file = ?");
            params_vec.push(Box::new(file.clone()));
        }
        if let Some(resolved) = filter.resolved {
            sql.push_str(" AND resolved = ?");
            params_vec.push(Box::new(resolved));
        }
        sql.push_str(
            " ORDER BY CASE severity
                 WHEN 'critical' THEN 0 WHEN 'error' THEN 1 WHEN 'warning' THEN 2
                 WHEN 'note' THEN 3 ELSE 4 END, id",
        );

        let mut stmt = self.conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(
                rusqlite::params_from_iter(params_vec.iter().map(|p| p.as_ref())),
                |row| {
                    Ok(Diagnostic {
                        repo_id: row.get(0)?,
                        source: row.get(1)?,
                        severity: Severity::parse(&row.get::<_, String>(2)?),
                        category: row.get(3)?,
                        file: row.get(4)?,
                        line: row.get(5)?,
                        message: row.get(6)?,
                        github_pr_number: row.get(7)?,
                        resolved: row.get(8)?,
                    })
                },
            )
            .map_err(db_err)?
            .collect::<Result<_, _>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    /// Counts grouped by one of severity/category/source/repo.
    pub fn get_validation_summary(
        &self,
        group_by: &str,
    ) -> Result<Vec<(String, u64)>, HubError> {
        let column = match group_by {
            "severity" => "severity",
            "category" => "category",
            "source" => "source",
            "repo" | "repo_id" => "repo_id",
            other => {
                return Err(HubError::QueryCompileFailure {
                    detail: format!("unsupported summary grouping: {other}"),
                });
            }
        };
        let sql = format!(
            "SELECT COALESCE({column}, ''), COUNT(*)
             FROM unified_diagnostics GROUP BY 1 ORDER BY 2 DESC, 1"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))
            .map_err(db_err)?
            .collect::<Result<_, _>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    /// Per-severity counts for every severity, including zeroes.
    pub fn get_validation_counts(&self) -> Result<BTreeMap<String, u64>, HubError> {
        let mut counts: BTreeMap<String, u64> = [
            Severity::Critical,
            Severity::Error,
            Severity::Warning,
            Severity::Note,
            Severity::Suggestion,
        ]
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
        for (severity, count) in self.get_validation_summary("severity")? {
            if let Some(slot) = counts.get_mut(&severity) {
                *slot = count;
            }
        }
        Ok(counts)
    }
}
