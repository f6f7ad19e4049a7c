//! `lockaudit package` command handler

use tracing::info;

use lockaudit_core::config::LockauditConfig;
use lockaudit_scanner::{AuditConfig, AuditResult, FsRegistry};

use crate::cli::{FilterArgs, PackageArgs};
use crate::error::CliError;
use crate::output::OutputWriter;

/// Execute the `package` command.
///
/// Resolves the package against the local registry mirror and audits
/// its dependency tree down to `registry.max_depth`.
pub async fn execute(
    args: PackageArgs,
    config: &LockauditConfig,
    filter: &FilterArgs,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let audit_config = super::audit_config(config, filter)?;
    let result = audit_package(args, audit_config).await?;
    super::finish(&result, writer)
}

async fn audit_package(args: PackageArgs, config: AuditConfig) -> Result<AuditResult, CliError> {
    info!(
        package = %args.name,
        version = args.version.as_deref().unwrap_or("latest"),
        registry = %config.registry_path,
        "auditing package"
    );

    let registry = FsRegistry::new(&config.registry_path);
    let auditor = super::build_auditor(config).await?;
    super::run_blocking(move || {
        auditor.audit_package(&registry, &args.name, args.version.as_deref())
    })
    .await
}
