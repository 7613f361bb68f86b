//! `runway cat` command

use std::sync::Arc;

use anyhow::Result;

use runway::util::shell::Shell;
use runway::util::RuntimeContext;

use crate::cli::CatArgs;
use crate::commands::open_source;

pub fn execute(args: CatArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = RuntimeContext::new();
    let catalog = open_source(&args.source, &ctx)?;
    let text = catalog.read_as_text(&args.subtree, &args.file, args.encoding)?;

    if shell.is_json() {
        shell.json_event(&serde_json::json!({
            "reason": "content",
            "file": args.file,
            "text": text,
        }));
    } else {
        print!("{}", text);
    }
    Ok(())
}
