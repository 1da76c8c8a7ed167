//! Containerless Launcher
//!
//! Runs a task's `run` in-process, times it, injects the timing fields into
//! its output, and writes the three artifacts the Output Sink later reads
//! back. Used both for containerless dispatch and as the body of the
//! `launch` CLI subcommand that runs inside a task's container.

use std::path::Path;
use std::time::Instant;

use tracing::{error, warn};

use crate::error::{CommanderError, Result};
use crate::task::{Params, Task, TaskOutput};

/// Run `task` against `params`, writing artifacts under `outdir`. Never
/// propagates a task body failure as an `Err`: an error inside `run` is
/// logged and an empty output written, matching the policy that a
/// misbehaving task never aborts the launcher.
pub async fn launch(task: &dyn Task, params: &Params, outdir: &Path) -> Result<TaskOutput> {
    create_dirs(outdir, task.name())?;

    let start = Instant::now();
    let run_result = task.run(params).await;
    let elapsed = start.elapsed();

    let mut output = match run_result {
        Ok(output) => output,
        Err(e) => {
            error!("task '{}' failed: {}", task.name(), e);
            return Err(CommanderError::TaskUserError(task.name().to_string(), e.to_string()));
        }
    };

    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    output.insert("time_elapsed_ms".to_string(), elapsed_ms.into());
    output.insert(
        "time_finish_ms".to_string(),
        (chrono::Utc::now().timestamp_millis() as f64).into(),
    );

    if let Some(max) = task.max_time_expected() {
        if elapsed > max {
            warn!("task '{}' took too long: {:.3}s", task.name(), elapsed.as_secs_f64());
        }
    }

    let text_output = task.text_output(&output);
    let html_output = task.html_output(&output);

    write_container_logs(outdir, task.name(), &output)?;
    write_task_output(outdir, task.name(), &text_output)?;
    write_task_html_output(outdir, task.name(), &html_output)?;

    Ok(output)
}

fn create_dirs(outdir: &Path, task_name: &str) -> Result<()> {
    std::fs::create_dir_all(outdir)?;
    let task_dir = outdir.join("tasks").join(task_name);
    std::fs::create_dir_all(&task_dir)?;
    std::fs::create_dir_all(task_dir.join("container"))?;
    Ok(())
}

fn write_container_logs(outdir: &Path, task_name: &str, output: &TaskOutput) -> Result<()> {
    use std::io::Write;
    let json_str = serde_json::to_string(output)?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(outdir.join("output.log"))?;
    writeln!(file, "{}: {}", task_name, json_str)?;
    Ok(())
}

fn write_task_output(outdir: &Path, task_name: &str, text_output: &str) -> Result<()> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(outdir.join("output.txt"))?;
    writeln!(file, "{}: {}", task_name, text_output)?;
    Ok(())
}

fn write_task_html_output(outdir: &Path, task_name: &str, html_output: &str) -> Result<()> {
    let task_dir = outdir.join("tasks").join(task_name);
    std::fs::write(task_dir.join("out.html"), html_output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Cadence, TaskOutput};
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::tempdir;

    struct Echo;

    #[async_trait]
    impl Task for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn cadence(&self) -> Cadence {
            Cadence::Interval(Duration::from_secs(1))
        }
        async fn run(&self, _params: &Params) -> anyhow::Result<TaskOutput> {
            let mut out = TaskOutput::new();
            out.insert("ok".to_string(), true.into());
            Ok(out)
        }
        fn text_output(&self, output: &TaskOutput) -> String {
            format!("ok={}", output.get("ok").map(|v| v.to_string()).unwrap_or_default())
        }
        fn html_output(&self, _output: &TaskOutput) -> String {
            "<p>ok</p>".to_string()
        }
    }

    struct Boom;

    #[async_trait]
    impl Task for Boom {
        fn name(&self) -> &str {
            "boom"
        }
        fn cadence(&self) -> Cadence {
            Cadence::Interval(Duration::from_secs(1))
        }
        async fn run(&self, _params: &Params) -> anyhow::Result<TaskOutput> {
            anyhow::bail!("kaboom")
        }
        fn text_output(&self, _output: &TaskOutput) -> String {
            String::new()
        }
        fn html_output(&self, _output: &TaskOutput) -> String {
            String::new()
        }
    }

    #[tokio::test]
    async fn launch_writes_all_three_artifacts_and_injects_timing() {
        let dir = tempdir().unwrap();
        let params = Params::new();
        let output = launch(&Echo, &params, dir.path()).await.unwrap();

        assert!(output.contains_key("time_elapsed_ms"));
        assert!(output.contains_key("time_finish_ms"));

        let log = std::fs::read_to_string(dir.path().join("output.log")).unwrap();
        assert!(log.starts_with("echo: "));

        let txt = std::fs::read_to_string(dir.path().join("output.txt")).unwrap();
        assert_eq!(txt, "echo: ok=true\n");

        let html =
            std::fs::read_to_string(dir.path().join("tasks").join("echo").join("out.html")).unwrap();
        assert_eq!(html, "<p>ok</p>");
    }

    #[tokio::test]
    async fn launch_surfaces_task_failure_without_panicking() {
        let dir = tempdir().unwrap();
        let params = Params::new();
        let result = launch(&Boom, &params, dir.path()).await;
        assert!(matches!(result, Err(CommanderError::TaskUserError(_, _))));
    }
}
