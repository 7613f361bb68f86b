//! `runway exec` command
//!
//! Exports the bundled libraries and runs a child process with the export
//! folder first on its loader search path. The child's exit code becomes
//! ours.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};

use runway::core::{LifecycleCoordinator, StartOptions};
use runway::native::SystemLoader;
use runway::util::process::{find_executable, ProcessBuilder};
use runway::util::shell::Shell;
use runway::util::RuntimeContext;

use crate::cli::ExecArgs;

/// Variable telling the child where this run's private temp folder is.
const ENV_PROCESS_TEMP: &str = "RUNWAY_PROCESS_TEMP";

pub fn execute(args: ExecArgs, shell: &Arc<Shell>) -> Result<()> {
    let Some((program, rest)) = args.command.split_first() else {
        bail!("no command given");
    };
    let bare = Path::new(program).components().count() == 1;
    if bare && find_executable(program).is_none() {
        bail!("command not found: {}", program);
    }

    let ctx = RuntimeContext::new();
    let coordinator = LifecycleCoordinator::new(ctx, shell.clone(), Box::new(SystemLoader::new()));
    coordinator.install_shutdown_hooks()?;
    let layout = coordinator.start(StartOptions {
        batch: true,
        ..Default::default()
    })?;

    let natives = coordinator.natives();
    let mut child = ProcessBuilder::new(program)
        .args(rest)
        .env(ENV_PROCESS_TEMP, layout.process_temp_dir.as_os_str());
    if coordinator.context().bundle().is_some() {
        natives.ensure_exported()?;
        let (var, value) = natives.loader_search_path()?;
        child = child.env(var, value);
    }

    tracing::debug!(command = %child.display_command(), "spawning");
    let status = child.status()?;
    coordinator.close();

    match status.code() {
        Some(0) => Ok(()),
        Some(code) => std::process::exit(code),
        None => bail!("`{}` was terminated by a signal", child.display_command()),
    }
}
