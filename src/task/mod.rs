//! Task Contract
//!
//! The interface every periodic unit of work implements. The Commander
//! only ever talks to tasks through this trait; task bodies themselves
//! (media pipelines, scrapers, inference jobs) are plug-in units defined
//! outside this crate.

mod registry;
mod types;

pub use registry::{Registry, TaskRegistration};
pub use types::{
    AccessMode, Cadence, DependencyManifest, Params, PortMap, ResourceEnvelope, TaskOutput,
    VolumeMap, VolumeMount,
};

use std::time::Duration;

use async_trait::async_trait;

/// The contract a task implements so the Commander can schedule, dispatch
/// and collect its output without knowing anything about what the task
/// actually does.
#[async_trait]
pub trait Task: Send + Sync {
    /// Stable identity, unique for the run. Used as the image-tag suffix,
    /// the artifact path segment and the registry/map key. Must match
    /// `[A-Za-z_][A-Za-z0-9_-]*`.
    fn name(&self) -> &str;

    /// Desired spacing between dispatches, or `KeepAlive` if the task
    /// should run once and stay alive.
    fn cadence(&self) -> Cadence;

    /// Whether the task needs outbound network access.
    fn requires_connection(&self) -> bool {
        false
    }

    /// Language-package / system-package / environment-variable manifest.
    fn dependencies(&self) -> DependencyManifest {
        DependencyManifest::default()
    }

    /// CPU / memory envelope for the containerised run.
    fn resources(&self) -> ResourceEnvelope {
        ResourceEnvelope::default()
    }

    /// Host path -> container bind path + access mode.
    fn volumes(&self, _params: &Params) -> VolumeMap {
        VolumeMap::default()
    }

    /// Container port -> host port.
    fn ports(&self, _params: &Params) -> PortMap {
        PortMap::default()
    }

    /// Expected upper bound on run duration, used only for a warning.
    fn max_time_expected(&self) -> Option<Duration> {
        None
    }

    /// Execute the task body. May perform I/O; may fail.
    async fn run(&self, params: &Params) -> anyhow::Result<TaskOutput>;

    /// Single-line text summary of a completed run.
    fn text_output(&self, output: &TaskOutput) -> String;

    /// HTML fragment describing a completed run.
    fn html_output(&self, output: &TaskOutput) -> String;
}

/// Validates a task identity against the identifier regex from the Task
/// Contract invariants.
pub fn validate_task_name(name: &str) -> crate::error::Result<()> {
    use regex::Regex;
    use std::sync::OnceLock;

    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").unwrap());

    if re.is_match(name) {
        Ok(())
    } else {
        Err(crate::error::CommanderError::InvalidTaskName(name.to_string()))
    }
}
