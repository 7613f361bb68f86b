//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell as CompletionShell;

use runway::resources::TextEncoding;

/// Runway - process bootstrap and native library provisioning
#[derive(Parser)]
#[command(name = "runway")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Show every bootstrap step and debug logs
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Print errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit machine-readable JSON events on stdout
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bootstrap and hold the instance until stdin closes or a signal arrives
    Start(StartArgs),

    /// List the resources below a subtree
    List(ListArgs),

    /// Extract a subtree into a directory
    Extract(ExtractArgs),

    /// Print a bundled text resource
    Cat(CatArgs),

    /// Export bundled native libraries and optionally load some
    Libs(LibsArgs),

    /// Remove obsolete run folders from the temp root
    Sweep(SweepArgs),

    /// Show the runtime environment
    Env(EnvArgs),

    /// Run a command with the exported libraries on its loader path
    Exec(ExecArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct StartArgs {
    /// Headless run; skips the single-instance check
    #[arg(long)]
    pub batch: bool,

    /// Allow other interactive instances
    #[arg(long)]
    pub allow_multiple: bool,

    /// Native libraries to load after startup
    #[arg(long = "load", value_name = "LIB")]
    pub load: Vec<String>,
}

#[derive(Args)]
pub struct SourceArgs {
    /// Archive or folder to read (defaults to the native bundle)
    #[arg(long, value_name = "PATH")]
    pub source: Option<PathBuf>,
}

#[derive(Args)]
pub struct ListArgs {
    /// Subtree inside the source, e.g. `natives/linux/x86_64`
    pub subtree: String,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Print full relative paths instead of the compact manifest
    #[arg(long)]
    pub flat: bool,

    /// Only files whose name contains this text
    #[arg(long, value_name = "TEXT")]
    pub contains: Option<String>,

    /// Write the listing as a content manifest into this directory
    #[arg(long, value_name = "DIR")]
    pub write: Option<PathBuf>,
}

#[derive(Args)]
pub struct ExtractArgs {
    pub subtree: String,

    /// Destination directory
    pub dest: PathBuf,

    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Args)]
pub struct CatArgs {
    pub subtree: String,

    /// File name relative to the subtree
    pub file: String,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Text encoding (utf-8 or latin1)
    #[arg(long, default_value = "utf-8")]
    pub encoding: TextEncoding,
}

#[derive(Args)]
pub struct LibsArgs {
    /// Libraries to load, by canonical name
    #[arg(long = "load", value_name = "LIB")]
    pub load: Vec<String>,
}

#[derive(Args)]
pub struct SweepArgs {
    /// Age in seconds after which run folders are obsolete
    #[arg(long, value_name = "SECS")]
    pub max_age: Option<u64>,
}

#[derive(Args)]
pub struct EnvArgs {
    /// Only show locations containing this text (case-insensitive)
    #[arg(long, value_name = "TEXT")]
    pub filter: Option<String>,

    /// Make a location resolvable from the next launch on
    #[arg(long, value_name = "PATH")]
    pub append: Vec<String>,
}

#[derive(Args)]
pub struct ExecArgs {
    /// Command and arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub command: Vec<String>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: CompletionShell,
}
