//! `runway env` command

use std::sync::Arc;

use anyhow::Result;

use runway::resources::AppendOutcome;
use runway::util::shell::{Shell, Status};
use runway::util::RuntimeContext;

use crate::cli::EnvArgs;

pub fn execute(args: EnvArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = RuntimeContext::new();
    let mut classpath = ctx.classpath();
    for location in &args.append {
        match classpath.append(location)? {
            AppendOutcome::AlreadyPresent(path) => {
                shell.note(format!("{} is already resolvable", path.display()))
            }
            AppendOutcome::Deferred => {
                shell.status(Status::Info, format!("{} added for the next launch", location))
            }
        }
    }
    let report = ctx.environment_report(&classpath, args.filter.as_deref());

    if shell.is_json() {
        let mut event = serde_json::to_value(&report)?;
        event["reason"] = serde_json::Value::from("env");
        shell.json_event(&event);
    } else {
        print!("{}", report);
    }
    Ok(())
}
