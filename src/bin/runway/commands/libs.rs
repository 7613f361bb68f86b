//! `runway libs` command

use std::sync::Arc;

use anyhow::Result;

use runway::core::{LifecycleCoordinator, StartOptions};
use runway::native::SystemLoader;
use runway::util::shell::{Shell, Status};
use runway::util::RuntimeContext;

use crate::cli::LibsArgs;

pub fn execute(args: LibsArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = RuntimeContext::new();
    let coordinator = LifecycleCoordinator::new(ctx, shell.clone(), Box::new(SystemLoader::new()));
    coordinator.start(StartOptions {
        batch: true,
        ..Default::default()
    })?;

    let spinner = shell.spinner("exporting native libraries");
    let folder = coordinator.natives().ensure_exported()?;
    spinner.finish();
    shell.status(Status::Exporting, folder.display());

    for lib in &args.load {
        if coordinator.ensure_loaded(lib)? {
            shell.status(Status::Loaded, lib);
        }
    }

    let records = coordinator.natives().records();
    if shell.is_json() {
        let libs: Vec<_> = records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "name": r.canonical_name,
                    "file": r.platform_file_name,
                    "loaded": r.loaded,
                    "path": r.source_path,
                })
            })
            .collect();
        shell.json_event(&serde_json::json!({
            "reason": "libs",
            "folder": folder,
            "libs": libs,
        }));
    } else {
        for record in &records {
            let state = if record.loaded { "loaded" } else { "not loaded" };
            shell.print(format!(
                "{:<20} {:<12} {}",
                record.canonical_name,
                state,
                record.source_path.display()
            ));
        }
    }

    coordinator.close();
    Ok(())
}
