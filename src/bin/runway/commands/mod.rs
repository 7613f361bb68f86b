//! Command implementations

pub mod cat;
pub mod completions;
pub mod env;
pub mod exec;
pub mod extract;
pub mod libs;
pub mod list;
pub mod start;
pub mod sweep;

use anyhow::{Context, Result};

use runway::resources::ResourceCatalog;
use runway::util::RuntimeContext;

use crate::cli::SourceArgs;

/// Catalog for `--source`, or the configured native bundle.
pub fn open_source(args: &SourceArgs, ctx: &RuntimeContext) -> Result<ResourceCatalog> {
    let path = match (&args.source, ctx.bundle()) {
        (Some(path), _) => path.clone(),
        (None, Some(bundle)) => bundle.to_path_buf(),
        (None, None) => anyhow::bail!("no --source given and no native bundle configured"),
    };
    ResourceCatalog::open(&path).with_context(|| format!("cannot open {}", path.display()))
}
