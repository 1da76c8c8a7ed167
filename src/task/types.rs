//! Task Contract data types

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A task's parameter dictionary. JSON-serialisable by construction since
/// it's what gets carried across the container boundary in `PARAMS`.
pub type Params = Map<String, Value>;

/// The structured result a task's `run` produces. Timing fields are
/// injected by the Containerless Launcher / in-container launcher before
/// the result is serialised, so this is always an object.
pub type TaskOutput = Map<String, Value>;

/// Desired spacing between dispatches of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Re-dispatch once at least this many seconds have elapsed since the
    /// last dispatch.
    Interval(Duration),
    /// No interval: run once and do not re-dispatch while a previous
    /// dispatch is still known to be alive.
    KeepAlive,
}

/// Language-package / system-package / environment-variable requirements,
/// each an ordered sequence as the Task Contract specifies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyManifest {
    /// Language-level package requirements (e.g. pip requirements lines).
    pub language: Vec<String>,
    /// OS-level package requirements installed via the base image's
    /// package manager.
    pub system: Vec<String>,
    /// `KEY=value` environment variable declarations baked into the image.
    pub env: Vec<String>,
}

impl DependencyManifest {
    /// Total declared external dependencies, used by the network-mode
    /// rule: a task with no declared deps and no connectivity need gets
    /// `network_mode: none`.
    pub fn is_empty(&self) -> bool {
        self.language.is_empty() && self.system.is_empty() && self.env.is_empty()
    }
}

/// CPU / memory envelope for a containerised run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceEnvelope {
    /// CPU share, cores, fractional allowed.
    pub cpus: f64,
    /// Memory ceiling in GB.
    pub memory_gb: f64,
}

impl Default for ResourceEnvelope {
    fn default() -> Self {
        Self { cpus: 1.0, memory_gb: 1.0 }
    }
}

/// Bind mode for a volume mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// A single host-path -> container-bind-path mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeMount {
    pub bind: PathBuf,
    pub mode: AccessMode,
}

/// Host absolute path -> (container bind path, access mode).
pub type VolumeMap = HashMap<PathBuf, VolumeMount>;

/// Container port -> host port.
pub type PortMap = HashMap<u16, u16>;
