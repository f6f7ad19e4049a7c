//! Command handlers -- one module per subcommand

pub mod config;
pub mod lock;
pub mod package;

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use lockaudit_core::config::LockauditConfig;
use lockaudit_core::types::Severity;
use lockaudit_scanner::config::AuditConfigBuilder;
use lockaudit_scanner::{AdvisoryDb, AuditConfig, AuditResult, Auditor};

use crate::cli::FilterArgs;
use crate::error::CliError;
use crate::output::OutputWriter;

/// Build the audit configuration from the loaded config and CLI filters.
///
/// `--severity` replaces the configured list; `--local-only` can only
/// switch the filter on.
pub(crate) fn audit_config(
    config: &LockauditConfig,
    filter: &FilterArgs,
) -> Result<AuditConfig, CliError> {
    let mut builder = AuditConfigBuilder::from_config(AuditConfig::from_core(config));

    if !filter.severity.is_empty() {
        let severities = filter
            .severity
            .iter()
            .map(|name| {
                Severity::from_str_loose(name).ok_or_else(|| {
                    CliError::Command(format!(
                        "invalid severity: {name} (expected: none, low, medium, high, critical, unknown)"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        builder = builder.severities(severities);
    }

    if filter.local_only {
        builder = builder.local_only(true);
    }

    builder
        .build()
        .map_err(|e| CliError::Config(format!("invalid audit config: {e}")))
}

/// Load the advisory database and wrap it in an auditor.
///
/// A missing database directory or `npm.json` fails the command.
pub(crate) async fn build_auditor(config: AuditConfig) -> Result<Auditor, CliError> {
    let db_path = config.advisory_db_path.clone();
    let db = run_blocking(move || AdvisoryDb::load_from_dir(Path::new(&db_path))).await?;

    info!(records = db.len(), "advisory database ready");
    Ok(Auditor::new(config, Arc::new(db)))
}

/// Run synchronous audit work on the blocking pool.
pub(crate) async fn run_blocking<T, E, F>(f: F) -> Result<T, CliError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<CliError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CliError::Command(format!("audit task failed: {e}")))?
        .map_err(Into::into)
}

/// Render the report and turn findings into a non-zero exit.
pub(crate) fn finish(result: &AuditResult, writer: &OutputWriter) -> Result<(), CliError> {
    writer.render(result)?;

    if result.has_findings() {
        return Err(CliError::VulnerabilitiesFound(result.finding_count()));
    }
    Ok(())
}
