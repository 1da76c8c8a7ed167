//! Commander -- the scheduling loop
//!
//! Owns every piece of mutable state for one run: which tasks last
//! dispatched when, which containers are live, and the most recently
//! collected output per task. Nothing outside this struct ever touches
//! that state directly -- there is no `Arc<Mutex<_>>` here, only a `&mut
//! self` tick.

mod state;

pub use state::CommanderState;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cleaner;
use crate::config::Configuration;
use crate::image::{resolve_outdir, ImageBuilder, CONTAINER_MOUNT_PREFIX, CONTAINER_OUT_DIR};
use crate::launcher;
use crate::output;
use crate::runtime::{ContainerLifecycle, ContainerRuntime};
use crate::task::{validate_task_name, Cadence, Params, Task};

pub struct Commander {
    tasks: Vec<Box<dyn Task>>,
    config: Configuration,
    runtime: Box<dyn ContainerRuntime>,
    state: CommanderState,
}

impl Commander {
    /// Validate every task's name and build a fresh Commander. Fails fast
    /// at startup rather than partway through the first tick if a task's
    /// identity would produce an invalid image tag or path segment.
    pub fn new(
        tasks: Vec<Box<dyn Task>>,
        config: Configuration,
        runtime: Box<dyn ContainerRuntime>,
    ) -> crate::error::Result<Self> {
        for task in &tasks {
            validate_task_name(task.name())?;
        }
        Ok(Self { tasks, config, runtime, state: CommanderState::default() })
    }

    /// Reclaim orphaned containers, persist the task-list snapshot an
    /// external report builder reads, then tick until `cancel` fires.
    /// Runs the shutdown sweep on the way out regardless of how the loop
    /// ended.
    pub async fn start(mut self, cancel: CancellationToken) {
        info!("reclaiming orphaned containers from a prior run");
        let cleaned = cleaner::reclaim_orphans(self.runtime.as_ref()).await;
        if !cleaned.is_empty() {
            info!("reclaimed {} orphaned container(s)", cleaned.len());
        }

        if let Err(e) = self.persist_task_snapshot() {
            warn!("failed to persist task snapshot: {}", e);
        }

        let poll_interval = Duration::from_millis(self.config.commander.poll_interval_ms);
        let mut ticker = tokio::time::interval(poll_interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!("shutdown requested, stopping running containers");
                    break;
                }
                _ = ticker.tick() => {
                    if self.config.commander.print_cycles {
                        debug!("tick");
                    }
                    self.tick().await;
                }
            }
        }

        let cleaned = cleaner::stop_running(self.runtime.as_ref(), &mut self.state.running_containers).await;
        if !cleaned.is_empty() {
            info!("stopped {} running container(s) on shutdown", cleaned.len());
        }
    }

    /// One scheduling pass: reap finished containers, dispatch whatever
    /// should run this tick, merge both sets of results into
    /// `tasks_output`.
    async fn tick(&mut self) {
        self.reap().await;

        let names: Vec<String> = self.tasks.iter().map(|t| t.name().to_string()).collect();
        for name in names {
            if self.should_run(&name) {
                self.dispatch(&name).await;
            }
        }
    }

    /// Looks a task up by name against a borrow of just the task list, so
    /// callers holding a `&mut self` elsewhere (state, runtime) can still
    /// mutate those fields while the returned reference is alive.
    fn find_task<'a>(tasks: &'a [Box<dyn Task>], name: &str) -> Option<&'a dyn Task> {
        tasks.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    /// The should-run rule: keep-alive tasks run once per liveness window
    /// (containerised: absent from `running_containers`; containerless:
    /// absent from `last_execution`), interval tasks run once the interval
    /// has elapsed since the last dispatch.
    fn should_run(&self, name: &str) -> bool {
        let Some(task) = Self::find_task(&self.tasks, name) else { return false };

        match task.cadence() {
            Cadence::KeepAlive => {
                if self.config.commander.run_containerless {
                    !self.state.last_execution.contains_key(name)
                } else {
                    !self.state.running_containers.contains_key(name)
                }
            }
            Cadence::Interval(interval) => match self.state.last_execution.get(name) {
                None => true,
                Some(last) => last.elapsed() >= interval,
            },
        }
    }

    async fn dispatch(&mut self, name: &str) {
        let containerised = !self.config.commander.run_containerless;
        let outdir = resolve_outdir(
            &self.config.system.out_directory,
            containerised,
            CONTAINER_MOUNT_PREFIX,
            CONTAINER_OUT_DIR,
        );

        let mut params = Params::new();
        params.insert("outdir".to_string(), outdir.to_string_lossy().to_string().into());
        params.insert("containerised".to_string(), containerised.into());

        if containerised {
            self.dispatch_containerised(name, params).await;
        } else {
            self.dispatch_containerless(name, params).await;
        }
    }

    async fn dispatch_containerless(&mut self, name: &str, params: Params) {
        let Some(task) = Self::find_task(&self.tasks, name) else { return };
        let outdir = self.config.system.out_directory.clone();

        // `launch`'s return value is the task's raw internal result, not
        // the {text, data, html} triple `tasks_output` stores -- re-read it
        // via the Output Sink, exactly as the containerised path does in
        // `collect`, so both dispatch modes populate `tasks_output` the
        // same shape.
        match launcher::launch(task, &params, &outdir).await {
            Ok(_) => {
                let collected = self.read_output_triple(name);
                self.state.merge_output(name, collected);
            }
            Err(e) => {
                warn!("task '{}' failed: {}", name, e);
            }
        }

        self.state.last_execution.insert(name.to_string(), Instant::now());
    }

    async fn dispatch_containerised(&mut self, name: &str, params: Params) {
        let Some(task) = Self::find_task(&self.tasks, name) else { return };

        let builder = ImageBuilder::new(
            self.runtime.as_ref(),
            self.config.system.tmp_directory.clone(),
            self.config.commander.force_rebuild,
        );

        let image_tag = match builder.ensure_image(task).await {
            Ok(tag) => tag,
            Err(e) => {
                warn!("failed to prepare image for task '{}': {}", name, e);
                return;
            }
        };

        let spec = builder.build_run_spec(task, &params, image_tag, &self.config.system.root_directory);

        match self.runtime.run(spec).await {
            Ok(handle) => {
                if self.config.commander.print_docker_lifecycle {
                    info!("started container {} for task '{}'", handle, name);
                }
                self.state.running_containers.insert(name.to_string(), handle);
                self.state.last_execution.insert(name.to_string(), Instant::now());
            }
            Err(e) => {
                warn!("failed to start container for task '{}': {}", name, e);
            }
        }
    }

    /// Poll every tracked container; for each in a terminal state, collect
    /// its output via the Output Sink, merge it in, and remove it.
    async fn reap(&mut self) {
        let tracked: Vec<(String, crate::runtime::ContainerHandle)> =
            self.state.running_containers.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        for (name, handle) in tracked {
            let inspection = match self.runtime.inspect(&handle).await {
                Ok(inspection) => inspection,
                Err(e) => {
                    warn!("failed to inspect container for task '{}': {}", name, e);
                    continue;
                }
            };

            if !inspection.state.is_terminal() {
                continue;
            }

            self.collect(&name, &handle, &inspection).await;
            self.state.running_containers.remove(&name);
        }
    }

    async fn collect(
        &mut self,
        name: &str,
        handle: &crate::runtime::ContainerHandle,
        inspection: &crate::runtime::Inspection,
    ) {
        match self.runtime.logs(handle).await {
            Ok(bytes) => {
                if self.config.commander.print_docker_logs {
                    info!("container logs for '{}': {}", name, String::from_utf8_lossy(&bytes));
                }
            }
            Err(e) => warn!("failed to fetch logs for task '{}': {}", name, e),
        }

        if matches!(inspection.state, ContainerLifecycle::Exited) {
            debug!("task '{}' exited with code {:?}", name, inspection.exit_code);
        }

        let collected = self.read_output_triple(name);
        self.state.merge_output(name, collected);

        if let Err(e) = self.runtime.remove(handle).await {
            warn!("failed to remove container for task '{}': {}", name, e);
        }
    }

    /// Re-read a task's most recent `{text, data, html}` triple via the
    /// Output Sink. Used by both dispatch modes after a run completes, so
    /// `tasks_output` always holds the collected artifacts rather than a
    /// task's raw internal result.
    fn read_output_triple(&self, name: &str) -> crate::task::TaskOutput {
        let outdir = &self.config.system.out_directory;
        let text = output::read_text(outdir, name);
        let data = output::read_log(outdir, name);
        let html = output::read_html(outdir, name);

        let mut collected = crate::task::TaskOutput::new();
        collected.insert("text".to_string(), text);
        collected.insert("data".to_string(), data);
        collected.insert("html".to_string(), html.into());
        collected
    }

    fn persist_task_snapshot(&self) -> crate::error::Result<()> {
        let mut names: Vec<&str> = self.tasks.iter().map(|t| t.name()).collect();
        names.sort_unstable();
        let entries: Vec<serde_json::Value> = names
            .into_iter()
            .enumerate()
            .map(|(order, name)| serde_json::json!({ "name": name, "order": order }))
            .collect();
        let json = serde_json::to_string_pretty(&entries)?;
        let path: PathBuf = self.config.system.tmp_directory.join("output.json");
        std::fs::write(path, json)?;
        Ok(())
    }
}
