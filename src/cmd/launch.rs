//! In-container launch entrypoint
//!
//! Resolves a task by its registered name and runs it via the Containerless
//! Launcher machinery, reusing the exact same artifact-writing path
//! whether the task happens to be running inside a container or not.

use std::path::Path;

use anyhow::{bail, Result};

pub async fn run(outdir: &str, task_name: &str, params_json: &str) -> Result<()> {
    let registry = crate::task::Registry::global();
    let Some(task) = registry.lookup(task_name) else {
        bail!("no task registered under name '{}'", task_name);
    };

    let value: serde_json::Value = serde_json::from_str(params_json)?;
    let params = match value {
        serde_json::Value::Object(map) => map,
        _ => bail!("--params must be a JSON object"),
    };

    crate::launcher::launch(task.as_ref(), &params, Path::new(outdir)).await?;
    Ok(())
}
