//! Cleaner
//!
//! Two best-effort, idempotent sweeps grounded on `container/Cleaner.py`'s
//! `cleanup_orphaned_containers` and `cleanup_containers`: reclaim engine
//! containers left over from a prior run (identified by image tag prefix),
//! and stop whatever this process currently believes is running. Both
//! swallow per-container failures rather than letting one bad container
//! abort the sweep.

use std::collections::HashMap;
use std::time::Duration;

use tracing::warn;

use crate::runtime::{ContainerHandle, ContainerRuntime};

/// Image tag prefix every task image is built under; used to recognise
/// orphaned containers that belong to this system regardless of which
/// process (if any) started them.
pub const IMAGE_TAG_PREFIX: &str = "task-commander:";

const STOP_GRACE: Duration = Duration::from_secs(5);

/// Stop and remove every engine container tagged with the system's image
/// prefix, regardless of whether this process is tracking it. Returns the
/// short IDs of containers it cleaned. Never fails outright: a single
/// container's stop/remove error is logged and skipped.
pub async fn reclaim_orphans(runtime: &dyn ContainerRuntime) -> Vec<String> {
    let containers = match runtime.list_all().await {
        Ok(containers) => containers,
        Err(e) => {
            warn!("failed to list containers while reclaiming orphans: {}", e);
            return Vec::new();
        }
    };

    let mut cleaned = Vec::new();
    for container in containers {
        let is_ours = container.image_tags.iter().any(|tag| tag.starts_with(IMAGE_TAG_PREFIX));
        if !is_ours {
            continue;
        }

        if let Some(short_id) = stop_and_remove(runtime, &container.handle).await {
            cleaned.push(short_id);
        }
    }

    cleaned
}

/// Stop and remove every container this process currently tracks as
/// running, then clear the map. Idempotent: calling it twice in a row with
/// an empty map is a no-op.
pub async fn stop_running(
    runtime: &dyn ContainerRuntime,
    running: &mut HashMap<String, ContainerHandle>,
) -> Vec<String> {
    let mut cleaned = Vec::new();
    for (_, handle) in running.drain() {
        if let Some(short_id) = stop_and_remove(runtime, &handle).await {
            cleaned.push(short_id);
        }
    }
    cleaned
}

async fn stop_and_remove(runtime: &dyn ContainerRuntime, handle: &ContainerHandle) -> Option<String> {
    if let Err(e) = runtime.stop(handle, STOP_GRACE).await {
        warn!("failed to stop container {}: {}", handle, e);
        return None;
    }
    if let Err(e) = runtime.remove(handle).await {
        warn!("failed to remove container {}: {}", handle, e);
        return None;
    }
    Some(handle.0.chars().take(12).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{EngineContainer, Inspection, RunSpec};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeRuntime {
        containers: Mutex<Vec<EngineContainer>>,
        stopped: Mutex<Vec<String>>,
        removed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn image_exists(&self, _tag: &str) -> crate::error::Result<bool> {
            Ok(false)
        }
        async fn build_image(&self, _dir: &std::path::Path, _tag: &str) -> crate::error::Result<()> {
            Ok(())
        }
        async fn run(&self, _spec: RunSpec) -> crate::error::Result<ContainerHandle> {
            unimplemented!()
        }
        async fn inspect(&self, _handle: &ContainerHandle) -> crate::error::Result<Inspection> {
            unimplemented!()
        }
        async fn logs(&self, _handle: &ContainerHandle) -> crate::error::Result<Vec<u8>> {
            unimplemented!()
        }
        async fn stop(&self, handle: &ContainerHandle, _grace: Duration) -> crate::error::Result<()> {
            self.stopped.lock().unwrap().push(handle.0.clone());
            Ok(())
        }
        async fn remove(&self, handle: &ContainerHandle) -> crate::error::Result<()> {
            self.removed.lock().unwrap().push(handle.0.clone());
            Ok(())
        }
        async fn list_all(&self) -> crate::error::Result<Vec<EngineContainer>> {
            Ok(self
                .containers
                .lock()
                .unwrap()
                .iter()
                .map(|c| EngineContainer {
                    handle: c.handle.clone(),
                    image_tags: c.image_tags.clone(),
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn reclaim_orphans_only_touches_tagged_images() {
        let runtime = FakeRuntime {
            containers: Mutex::new(vec![
                EngineContainer {
                    handle: ContainerHandle("abc123def456".to_string()),
                    image_tags: vec!["task-commander:scrape".to_string()],
                },
                EngineContainer {
                    handle: ContainerHandle("unrelated000000".to_string()),
                    image_tags: vec!["nginx:latest".to_string()],
                },
            ]),
            ..Default::default()
        };

        let cleaned = reclaim_orphans(&runtime).await;
        assert_eq!(cleaned, vec!["abc123def456".to_string()]);
        assert_eq!(runtime.stopped.lock().unwrap().len(), 1);
        assert_eq!(runtime.removed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stop_running_drains_and_is_idempotent() {
        let runtime = FakeRuntime::default();
        let mut running = HashMap::new();
        running.insert("scrape".to_string(), ContainerHandle("container-1".to_string()));

        let cleaned = stop_running(&runtime, &mut running).await;
        assert_eq!(cleaned, vec!["container-1".to_string()]);
        assert!(running.is_empty());

        let cleaned_again = stop_running(&runtime, &mut running).await;
        assert!(cleaned_again.is_empty());
    }
}
