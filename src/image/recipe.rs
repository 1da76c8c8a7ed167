//! Dockerfile recipe generation
//!
//! Renders a task's dependency manifest into the base Dockerfile template,
//! substituting the three markers the template declares.

use std::path::Path;

use crate::error::{CommanderError, Result};
use crate::runtime::ContainerRuntime;
use crate::task::Task;

const BASE_TEMPLATE: &str = r#"FROM python:3.12-slim

WORKDIR /app

{{task.apt_packages}}
{{task.env_vars}}

COPY . /app/tasks/{{task.name}}/container

COPY task-commander /usr/local/bin/task-commander
RUN chmod +x /usr/local/bin/task-commander

ENTRYPOINT ["/bin/sh", "-c"]
"#;

/// Render the Dockerfile for `task` into `recipe_path`'s parent directory.
pub fn write_recipe(recipe_path: &Path, task: &dyn Task) -> Result<()> {
    let deps = task.dependencies();

    let apt_block = if deps.system.is_empty() {
        String::new()
    } else {
        let apt_install_lines: Vec<String> =
            deps.system.iter().map(|pkg| format!("    {}", pkg)).collect();
        let apt_install_str = apt_install_lines.join(" \\\n");
        [
            "# Install task-specific apt packages",
            "RUN apt-get update",
            "RUN apt-get install -y \\",
            &apt_install_str,
            "RUN apt-get clean",
            "RUN rm -rf /var/lib/apt/lists/*",
        ]
        .join("\n")
    };

    let mut env_block = if deps.env.is_empty() {
        String::new()
    } else {
        "# Set environment variables".to_string()
    };
    for env in &deps.env {
        env_block.push_str(&format!("\nENV {}", env));
    }

    let rendered = BASE_TEMPLATE
        .replace("{{task.apt_packages}}", &apt_block)
        .replace("{{task.env_vars}}", &env_block)
        .replace("{{task.name}}", task.name());

    std::fs::write(recipe_path, rendered).map_err(CommanderError::Io)
}

/// Copy the currently-running `task-commander` binary into the build
/// context directory so the generated Dockerfile's `COPY task-commander
/// ...` line has something to find. The in-container launcher is this same
/// binary, invoked through its `launch` subcommand.
pub fn copy_binary(task_dir: &Path) -> Result<()> {
    let exe = std::env::current_exe().map_err(CommanderError::Io)?;
    std::fs::copy(&exe, task_dir.join("task-commander")).map_err(CommanderError::Io)?;
    Ok(())
}

/// Whether the image for `tag` needs (re)building.
///
/// The recipe file's *absence* is the rebuild trigger: if it's missing, a
/// rebuild always happens (which also regenerates it). `force_rebuild`
/// always rebuilds regardless of what's on disk or in the engine.
pub async fn rebuild_needed(
    recipe_path: &Path,
    force_rebuild: bool,
    runtime: &dyn ContainerRuntime,
    tag: &str,
) -> Result<bool> {
    if force_rebuild {
        return Ok(true);
    }
    if !recipe_path.exists() {
        return Ok(true);
    }
    Ok(!runtime.image_exists(tag).await?)
}
