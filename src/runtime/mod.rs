//! Container Runtime Adapter
//!
//! A thin, engine-agnostic port over the container engine. The Commander
//! and Cleaner only ever talk to this trait, never to `bollard` directly,
//! so tests can swap in a fake implementation.

mod docker;

pub use docker::BollardRuntime;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::task::{AccessMode, PortMap, ResourceEnvelope};

/// Opaque handle to a running or finished container. Cheap to clone;
/// callers treat it as an identity, not as a live connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerHandle(pub String);

impl std::fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state as reported by `inspect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerLifecycle {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
}

impl ContainerLifecycle {
    pub fn is_terminal(self) -> bool {
        matches!(self, ContainerLifecycle::Exited | ContainerLifecycle::Dead)
    }
}

/// Result of inspecting a container.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub state: ContainerLifecycle,
    pub exit_code: Option<i64>,
    pub short_id: String,
}

/// Network mode for a container invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkMode {
    Default,
    None,
}

/// Everything needed to start a detached container for a task run.
pub struct RunSpec {
    pub image_tag: String,
    pub command: Vec<String>,
    pub working_dir: String,
    pub mounts: HashMap<PathBuf, (PathBuf, AccessMode)>,
    pub ports: PortMap,
    pub env: HashMap<String, String>,
    pub resources: ResourceEnvelope,
    pub network_mode: NetworkMode,
}

/// A container known to the engine, as returned by `list_all` -- used by
/// the Cleaner to find containers tagged with this system's image prefix
/// regardless of which process (if any) currently tracks them.
pub struct EngineContainer {
    pub handle: ContainerHandle,
    pub image_tags: Vec<String>,
}

/// Engine-agnostic container runtime port.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn image_exists(&self, tag: &str) -> Result<bool>;

    /// Build an image from a context directory, tagging it `tag`. Must
    /// remove intermediate build artefacts on both success and failure.
    async fn build_image(&self, context_dir: &std::path::Path, tag: &str) -> Result<()>;

    /// Start a detached container. `detach` is always true and
    /// `auto_remove` always false: the Commander owns deletion.
    async fn run(&self, spec: RunSpec) -> Result<ContainerHandle>;

    async fn inspect(&self, handle: &ContainerHandle) -> Result<Inspection>;

    async fn logs(&self, handle: &ContainerHandle) -> Result<Vec<u8>>;

    async fn stop(&self, handle: &ContainerHandle, grace: Duration) -> Result<()>;

    async fn remove(&self, handle: &ContainerHandle) -> Result<()>;

    /// All containers the engine currently knows about, paired with their
    /// image tags, used by the Cleaner to find orphans.
    async fn list_all(&self) -> Result<Vec<EngineContainer>>;
}
