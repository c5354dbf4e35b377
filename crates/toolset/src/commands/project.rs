//! Commands that edit the spec: `init`, `add`, `include` and `remove`.

use super::CommandContext;
use crate::workdir::Workdir;
use std::path::Path;
use std::sync::Arc;
use toolset_core::Result;
use toolset_core::fs;

/// Create the spec and lock in `dir`, or in the spec directory.
pub fn execute_init(ctx: &CommandContext, dir: Option<&Path>) -> Result<String> {
    let dir = match dir {
        Some(dir) => fs::abs(ctx.fs.as_ref(), dir)?,
        None => ctx.settings.spec_dir.clone(),
    };
    let registry = ctx.settings.registry(Arc::clone(&ctx.fs), ctx.cancel.clone());
    let wd = Workdir::init(Arc::clone(&ctx.fs), &dir, registry, ctx.cancel.clone())?;
    Ok(format!("Initialized toolset in {}", wd.dir().display()))
}

/// Add one tool.
pub async fn execute_add(
    wd: &mut Workdir,
    runtime: &str,
    module: &str,
    alias: Option<&str>,
    tags: &[String],
) -> Result<String> {
    let (added, module) = wd.add(runtime, module, alias, tags).await?;
    Ok(if added {
        format!("Added {module}; run 'toolset sync' to install it")
    } else {
        format!("{module} is already in the spec")
    })
}

/// Copy every tool of a remote spec.
pub async fn execute_copy_from(wd: &mut Workdir, source: &str, tags: &[String]) -> Result<String> {
    let added = wd.copy_source(source, tags).await?;
    Ok(format!("Copied {added} tool(s) from {source}"))
}

/// Register a remote include.
pub async fn execute_include(wd: &mut Workdir, source: &str, tags: &[String]) -> Result<String> {
    let tools = wd.add_include(source, tags).await?;
    Ok(format!("Included {source} ({tools} tool(s))"))
}

/// Remove a tool by alias or program name.
pub async fn execute_remove(wd: &mut Workdir, name: &str) -> Result<String> {
    let tool = wd.remove_tool(name).await?;
    Ok(format!("Removed {}", tool.module))
}
