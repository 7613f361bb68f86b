//! `runway sweep` command

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use runway::core::WorkspaceManager;
use runway::util::shell::{Shell, Status};
use runway::util::RuntimeContext;

use crate::cli::SweepArgs;

pub fn execute(args: SweepArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = RuntimeContext::new();
    let max_age = args
        .max_age
        .unwrap_or(ctx.config().workspace.obsolete_after_secs);

    let workspace = WorkspaceManager::new(ctx.temp_root(), ctx.data_root());
    let report = workspace.sweep_obsolete(Duration::from_secs(max_age));

    for path in &report.removed {
        shell.status(Status::Removed, path.display());
    }
    shell.json_event(&serde_json::json!({
        "reason": "sweep",
        "removed": report.removed,
        "kept": report.kept,
    }));
    shell.note(format!(
        "{} removed, {} kept",
        report.removed.len(),
        report.kept
    ));
    Ok(())
}
