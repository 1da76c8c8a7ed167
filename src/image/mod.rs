//! Image Builder
//!
//! Turns a Task plus its dispatch parameters into an image tag, a container
//! command, mounts, ports, network mode and resource limits -- everything
//! the Container Runtime Adapter needs to start a detached container.

mod command;
mod recipe;
mod volume;

pub use command::build_command;
pub use recipe::{copy_binary, rebuild_needed, write_recipe};
pub use volume::{assemble_mounts, resolve_outdir};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Result;
use crate::runtime::{ContainerRuntime, NetworkMode, RunSpec};
use crate::task::{Params, ResourceEnvelope, Task};

/// In-container absolute path the Commander's working directory is always
/// mounted at.
pub const CONTAINER_MOUNT_PREFIX: &str = "/app";

/// Fixed in-container out-dir, relative to `CONTAINER_MOUNT_PREFIX`.
pub const CONTAINER_OUT_DIR: &str = "out";

/// Image tag namespace. The Cleaner assumes no other tenant uses this
/// prefix.
pub fn image_tag(task_name: &str) -> String {
    format!("task-commander:{}", task_name)
}

/// Convert a CPU-cores figure to nano-CPUs (`cores * 1e9`, what bollard's
/// `HostConfig::nano_cpus` expects) and a memory figure in GB to the
/// `"<n>g"` suffix string used for human-readable diagnostics output.
pub fn encode_resources(resources: ResourceEnvelope) -> (i64, String) {
    let nano_cpus = (resources.cpus * 1_000_000_000.0) as i64;
    let memory = format!("{}g", resources.memory_gb as i64);
    (nano_cpus, memory)
}

pub struct ImageBuilder<'a> {
    runtime: &'a dyn ContainerRuntime,
    tmp_dir: PathBuf,
    force_rebuild: bool,
}

impl<'a> ImageBuilder<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, tmp_dir: PathBuf, force_rebuild: bool) -> Self {
        Self { runtime, tmp_dir, force_rebuild }
    }

    fn task_dir(&self, task_name: &str) -> PathBuf {
        self.tmp_dir.join("tasks").join(task_name)
    }

    /// Ensure the task's image exists, rebuilding it if needed. Returns the
    /// image tag to run.
    pub async fn ensure_image(&self, task: &dyn Task) -> Result<String> {
        let tag = image_tag(task.name());
        let task_dir = self.task_dir(task.name());
        let recipe_path = task_dir.join("Dockerfile");

        if rebuild_needed(&recipe_path, self.force_rebuild, self.runtime, &tag).await? {
            info!("building image '{}'", tag);
            std::fs::create_dir_all(&task_dir)?;
            write_recipe(&recipe_path, task)?;
            copy_binary(&task_dir)?;

            // If the build fails, drop what we just wrote so the next tick
            // sees the recipe as absent and retries instead of being stuck
            // believing a bad build context is cached.
            let bin_path = task_dir.join("task-commander");
            let built = std::cell::Cell::new(false);
            let _guard = scopeguard::guard((), |_| {
                if !built.get() {
                    let _ = std::fs::remove_file(&recipe_path);
                    let _ = std::fs::remove_file(&bin_path);
                }
            });
            self.runtime.build_image(&task_dir, &tag).await?;
            built.set(true);
        } else {
            debug!("reusing cached image '{}'", tag);
        }

        Ok(tag)
    }

    /// Build the full invocation the Container Runtime Adapter needs to
    /// start the task's container.
    pub fn build_run_spec(
        &self,
        task: &dyn Task,
        params: &Params,
        image_tag: String,
        commander_workdir: &Path,
    ) -> RunSpec {
        let command = build_command(task, params, CONTAINER_MOUNT_PREFIX, CONTAINER_OUT_DIR);
        let mounts = assemble_mounts(task, params, commander_workdir, CONTAINER_MOUNT_PREFIX);
        let ports = task.ports(params);
        let network_mode = if task.requires_connection() || !task.dependencies().is_empty() {
            NetworkMode::Default
        } else {
            NetworkMode::None
        };

        let (_, memory_label) = encode_resources(task.resources());
        debug!("task '{}' resource envelope: {} memory", task.name(), memory_label);

        RunSpec {
            image_tag,
            command,
            working_dir: format!("{}/tasks/{}/container", CONTAINER_MOUNT_PREFIX, task.name()),
            mounts,
            ports,
            env: env_for(params),
            resources: task.resources(),
            network_mode,
        }
    }
}

fn env_for(params: &Params) -> HashMap<String, String> {
    let mut env = HashMap::new();
    env.insert(
        "PARAMS".to_string(),
        serde_json::to_string(params).unwrap_or_else(|_| "{}".to_string()),
    );
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ContainerHandle, EngineContainer, Inspection, RunSpec};
    use crate::task::{Cadence, Params, TaskOutput};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn image_tag_uses_fixed_prefix() {
        assert_eq!(image_tag("scrape"), "task-commander:scrape");
    }

    #[test]
    fn encode_resources_converts_cores_and_gb() {
        let (nano_cpus, memory) =
            encode_resources(ResourceEnvelope { cpus: 2.0, memory_gb: 4.0 });
        assert_eq!(nano_cpus, 2_000_000_000);
        assert_eq!(memory, "4g");
    }

    struct CtxTestTask;

    #[async_trait]
    impl Task for CtxTestTask {
        fn name(&self) -> &str {
            "ctx_test"
        }
        fn cadence(&self) -> Cadence {
            Cadence::Interval(Duration::from_secs(60))
        }
        async fn run(&self, _params: &Params) -> anyhow::Result<TaskOutput> {
            Ok(TaskOutput::new())
        }
        fn text_output(&self, _output: &TaskOutput) -> String {
            String::new()
        }
        fn html_output(&self, _output: &TaskOutput) -> String {
            String::new()
        }
    }

    /// Fails the build unless the binary the generated Dockerfile's `COPY
    /// task-commander ...` line expects is actually present in the tarred
    /// context, the way a real engine would reject a `COPY` of a
    /// nonexistent source file.
    struct BinaryCheckingRuntime {
        build_attempted: AtomicBool,
    }

    #[async_trait]
    impl ContainerRuntime for BinaryCheckingRuntime {
        async fn image_exists(&self, _tag: &str) -> Result<bool> {
            Ok(false)
        }
        async fn build_image(&self, context_dir: &std::path::Path, _tag: &str) -> Result<()> {
            self.build_attempted.store(true, Ordering::SeqCst);
            if !context_dir.join("task-commander").is_file() {
                return Err(crate::error::CommanderError::Recipe(
                    "task-commander: no such file or directory in build context".to_string(),
                ));
            }
            Ok(())
        }
        async fn run(&self, _spec: RunSpec) -> Result<ContainerHandle> {
            unimplemented!()
        }
        async fn inspect(&self, _handle: &ContainerHandle) -> Result<Inspection> {
            unimplemented!()
        }
        async fn logs(&self, _handle: &ContainerHandle) -> Result<Vec<u8>> {
            unimplemented!()
        }
        async fn stop(&self, _handle: &ContainerHandle, _grace: Duration) -> Result<()> {
            unimplemented!()
        }
        async fn remove(&self, _handle: &ContainerHandle) -> Result<()> {
            unimplemented!()
        }
        async fn list_all(&self) -> Result<Vec<EngineContainer>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn ensure_image_copies_running_binary_into_build_context() {
        let dir = tempdir().unwrap();
        let runtime = BinaryCheckingRuntime { build_attempted: AtomicBool::new(false) };
        let builder = ImageBuilder::new(&runtime, dir.path().to_path_buf(), false);

        let tag = builder.ensure_image(&CtxTestTask).await.unwrap();

        assert_eq!(tag, "task-commander:ctx_test");
        assert!(runtime.build_attempted.load(Ordering::SeqCst));
    }
}
