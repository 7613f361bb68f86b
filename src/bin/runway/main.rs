//! Runway CLI - bootstrap a run and provision its native libraries

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use runway::core::BootError;
use runway::util::diagnostic::emit;
use runway::util::Shell;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("runway=debug")
    } else if cli.quiet {
        EnvFilter::new("runway=error")
    } else {
        EnvFilter::new("runway=info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let shell = Arc::new(Shell::from_flags(cli.quiet, cli.verbose, cli.no_color, cli.json));
    if let Err(e) = run(cli.command, &shell) {
        std::process::exit(report(&e, &shell));
    }
}

fn run(command: Commands, shell: &Arc<Shell>) -> Result<()> {
    match command {
        Commands::Start(args) => commands::start::execute(args, shell),
        Commands::List(args) => commands::list::execute(args, shell),
        Commands::Extract(args) => commands::extract::execute(args, shell),
        Commands::Cat(args) => commands::cat::execute(args, shell),
        Commands::Libs(args) => commands::libs::execute(args, shell),
        Commands::Sweep(args) => commands::sweep::execute(args, shell),
        Commands::Env(args) => commands::env::execute(args, shell),
        Commands::Exec(args) => commands::exec::execute(args, shell),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}

/// Print the failure and pick the exit code.
fn report(err: &anyhow::Error, shell: &Shell) -> i32 {
    match err.downcast_ref::<BootError>() {
        Some(boot) => {
            if shell.is_json() {
                shell.json_event(&serde_json::json!({
                    "reason": "error",
                    "message": boot.to_string(),
                    "exit_code": boot.exit_code(),
                }));
            } else {
                emit(&boot.to_diagnostic(), shell.use_color());
            }
            boot.exit_code()
        }
        None => {
            shell.error(format!("{:#}", err));
            1
        }
    }
}
