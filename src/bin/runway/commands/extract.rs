//! `runway extract` command

use std::sync::Arc;

use anyhow::{bail, Result};

use runway::util::shell::{Shell, Status};
use runway::util::RuntimeContext;

use crate::cli::ExtractArgs;
use crate::commands::open_source;

pub fn execute(args: ExtractArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = RuntimeContext::new();
    let catalog = open_source(&args.source, &ctx)?;

    let spinner = shell.spinner(format!("extracting {}", args.subtree));
    let manifest = catalog.list(&args.subtree, None)?;
    let report = catalog.extract_to(&args.subtree, &manifest, &args.dest)?;
    spinner.finish();

    shell.json_event(&serde_json::json!({
        "reason": "extracted",
        "dest": args.dest,
        "extracted": report.extracted,
        "failed": report.failed,
    }));
    shell.status(
        Status::Extracted,
        format!("{} files to {}", report.extracted, args.dest.display()),
    );
    if !report.is_complete() {
        bail!("{} files could not be extracted", report.failed);
    }
    Ok(())
}
