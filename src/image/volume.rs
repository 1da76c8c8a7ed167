//! Volume assembly and outdir resolution

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::task::{AccessMode, Params, Task};

/// Always mount the Commander's working directory at the fixed
/// in-container prefix, then merge in the task-declared volume map
/// verbatim (a task may override the default mount's access mode for a
/// sub-path by declaring its own entry under the same host path).
pub fn assemble_mounts(
    task: &dyn Task,
    params: &Params,
    commander_workdir: &Path,
    mount_prefix: &str,
) -> HashMap<PathBuf, (PathBuf, AccessMode)> {
    let mut mounts = HashMap::new();
    mounts.insert(
        commander_workdir.to_path_buf(),
        (PathBuf::from(mount_prefix), AccessMode::ReadWrite),
    );

    for (host, mount) in task.volumes(params) {
        mounts.insert(host, (mount.bind, mount.mode));
    }

    mounts
}

/// Resolve the out-dir a task sees: the fixed in-container absolute path
/// when running containerised, the host path to the same directory
/// otherwise.
pub fn resolve_outdir(out_root: &Path, containerised: bool, mount_prefix: &str, out_dir: &str) -> PathBuf {
    if containerised {
        PathBuf::from(format!("{}/{}", mount_prefix, out_dir))
    } else {
        out_root.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Cadence, DependencyManifest, TaskOutput, VolumeMount};
    use async_trait::async_trait;
    use std::time::Duration;

    struct WithVolume;

    #[async_trait]
    impl Task for WithVolume {
        fn name(&self) -> &str {
            "with_volume"
        }
        fn cadence(&self) -> Cadence {
            Cadence::Interval(Duration::from_secs(60))
        }
        fn volumes(&self, _params: &Params) -> crate::task::VolumeMap {
            let mut map = crate::task::VolumeMap::new();
            map.insert(
                PathBuf::from("/data/models"),
                VolumeMount { bind: PathBuf::from("/models"), mode: AccessMode::ReadOnly },
            );
            map
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

    struct NoVolume;

    #[async_trait]
    impl Task for NoVolume {
        fn name(&self) -> &str {
            "no_volume"
        }
        fn cadence(&self) -> Cadence {
            Cadence::Interval(Duration::from_secs(60))
        }
        fn dependencies(&self) -> DependencyManifest {
            DependencyManifest::default()
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

    #[test]
    fn assemble_mounts_always_includes_default_workdir_mount() {
        let params = Params::new();
        let mounts = assemble_mounts(&NoVolume, &params, Path::new("/host/commander"), "/app");

        assert_eq!(mounts.len(), 1);
        let (bind, mode) = &mounts[&PathBuf::from("/host/commander")];
        assert_eq!(bind, &PathBuf::from("/app"));
        assert_eq!(*mode, AccessMode::ReadWrite);
    }

    #[test]
    fn assemble_mounts_merges_task_declared_volumes() {
        let params = Params::new();
        let mounts = assemble_mounts(&WithVolume, &params, Path::new("/host/commander"), "/app");

        assert_eq!(mounts.len(), 2);
        let (bind, mode) = &mounts[&PathBuf::from("/data/models")];
        assert_eq!(bind, &PathBuf::from("/models"));
        assert_eq!(*mode, AccessMode::ReadOnly);
    }

    #[test]
    fn resolve_outdir_uses_container_path_when_containerised() {
        let resolved = resolve_outdir(Path::new("/host/out"), true, "/app", "out");
        assert_eq!(resolved, PathBuf::from("/app/out"));
    }

    #[test]
    fn resolve_outdir_uses_host_path_when_containerless() {
        let resolved = resolve_outdir(Path::new("/host/out"), false, "/app", "out");
        assert_eq!(resolved, PathBuf::from("/host/out"));
    }
}
