//! `runway list` command

use std::sync::Arc;

use anyhow::Result;

use runway::resources::{filters, ResourceFilter};
use runway::util::shell::{Shell, Status};
use runway::util::RuntimeContext;

use crate::cli::ListArgs;
use crate::commands::open_source;

pub fn execute(args: ListArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = RuntimeContext::new();
    let catalog = open_source(&args.source, &ctx)?;

    let contains = args.contains.clone().map(|s| filters::name_contains(s));
    let filter = contains.as_ref().map(|f| f as &ResourceFilter<'_>);

    if let Some(dir) = &args.write {
        let manifest = catalog.write_manifest(&args.subtree, dir, filter)?;
        shell.status(
            Status::Extracted,
            format!(
                "content manifest with {} files to {}",
                manifest.file_count(),
                dir.display()
            ),
        );
        return Ok(());
    }

    let lines = if args.flat {
        catalog.list_paths(&args.subtree, filter)?
    } else {
        catalog.list(&args.subtree, filter)?.lines()
    };

    if shell.is_json() {
        shell.json_event(&serde_json::json!({
            "reason": "listing",
            "source": catalog.source().to_string(),
            "subtree": args.subtree,
            "entries": lines,
        }));
    } else {
        for line in lines {
            shell.print(line);
        }
    }
    Ok(())
}
