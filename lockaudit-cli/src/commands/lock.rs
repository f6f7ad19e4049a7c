//! `lockaudit lock` command handler

use tracing::info;

use lockaudit_core::config::LockauditConfig;
use lockaudit_scanner::parser::{read_lockfile, read_to_limit};
use lockaudit_scanner::{AuditConfig, AuditResult, LockfileFormat};

use crate::cli::{FilterArgs, LockArgs};
use crate::error::CliError;
use crate::output::OutputWriter;

/// Execute the `lock` command.
///
/// Returns `CliError::VulnerabilitiesFound` when the report contains findings.
pub async fn execute(
    args: LockArgs,
    config: &LockauditConfig,
    filter: &FilterArgs,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let audit_config = super::audit_config(config, filter)?;
    let result = audit_lockfile(args, audit_config).await?;
    super::finish(&result, writer)
}

/// Read, parse and audit one lockfile.
async fn audit_lockfile(args: LockArgs, config: AuditConfig) -> Result<AuditResult, CliError> {
    let format = resolve_format(&args)?;
    let label = args.path.display().to_string();
    info!(source = %label, format = %format, "auditing lockfile");

    let (max_file, max_stdin) = (config.max_file_size, config.max_stdin_size);
    let content = super::run_blocking(move || {
        if args.is_stdin() {
            read_to_limit(std::io::stdin().lock(), "-", max_stdin)
        } else {
            read_lockfile(&args.path, max_file)
        }
    })
    .await?;

    let auditor = super::build_auditor(config).await?;
    super::run_blocking(move || auditor.audit_lockfile(&content, format, &label)).await
}

/// `--format` wins; otherwise the format comes from the file name.
fn resolve_format(args: &LockArgs) -> Result<LockfileFormat, CliError> {
    if let Some(format) = args.format {
        return Ok(format.into());
    }
    if args.is_stdin() {
        return Err(CliError::Command(
            "reading from stdin requires --format (npm, yarn, pnpm)".to_owned(),
        ));
    }
    LockfileFormat::detect_from_path(&args.path).ok_or_else(|| {
        CliError::Command(format!(
            "cannot detect lockfile format of {}; pass --format (npm, yarn, pnpm)",
            args.path.display()
        ))
    })
}
