//! `runway start` command
//!
//! Bootstraps a run and keeps it alive, holding the instance lock, until
//! stdin reaches EOF or a termination signal arrives.

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};

use runway::core::{LifecycleCoordinator, StartOptions};
use runway::native::SystemLoader;
use runway::util::shell::{Shell, Status};
use runway::util::RuntimeContext;

use crate::cli::StartArgs;

pub fn execute(args: StartArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = RuntimeContext::new();
    let coordinator = LifecycleCoordinator::new(ctx, shell.clone(), Box::new(SystemLoader::new()));
    coordinator.install_shutdown_hooks()?;

    let layout = coordinator.start(StartOptions {
        batch: args.batch,
        allow_multiple: args.allow_multiple,
    })?;

    for lib in &args.load {
        coordinator.ensure_loaded(lib)?;
        shell.status(Status::Loaded, lib);
    }

    shell.status(
        Status::Ready,
        format!("temp folder {}", layout.process_temp_dir.display()),
    );
    shell.json_event(&serde_json::json!({
        "reason": "ready",
        "pid": std::process::id(),
        "temp_dir": layout.process_temp_dir,
        "data_root": layout.data_root,
    }));

    io::copy(&mut io::stdin().lock(), &mut io::sink()).context("failed to read stdin")?;

    shell.status(Status::Cleaning, "closing");
    coordinator.close();
    Ok(())
}
