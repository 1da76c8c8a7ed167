//! Bollard-backed `ContainerRuntime` implementation

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, LogsOptions, RemoveContainerOptions,
    StopContainerOptions,
};
use bollard::image::BuildImageOptions;
use bollard::models::{ContainerStateStatusEnum, HostConfig, Mount, MountTypeEnum};
use bollard::Docker;
use futures_util::stream::StreamExt;
use tracing::{debug, warn};

use crate::error::{CommanderError, Result};
use crate::task::AccessMode;

use super::{
    ContainerHandle, ContainerLifecycle, ContainerRuntime, EngineContainer, Inspection,
    NetworkMode, RunSpec,
};

pub struct BollardRuntime {
    client: Docker,
}

impl BollardRuntime {
    pub fn connect(socket: &str) -> Result<Self> {
        let client = Docker::connect_with_socket(socket, 120, bollard::API_DEFAULT_VERSION)
            .map_err(CommanderError::EngineUnavailable)?;
        Ok(Self { client })
    }

    pub fn connect_local_defaults() -> Result<Self> {
        let client =
            Docker::connect_with_local_defaults().map_err(CommanderError::EngineUnavailable)?;
        Ok(Self { client })
    }

    fn map_404(id: &str, e: bollard::errors::Error) -> CommanderError {
        match e {
            bollard::errors::Error::DockerResponseServerError { status_code: 404, .. } => {
                CommanderError::ContainerNotFound(id.to_string())
            }
            other => CommanderError::EngineUnavailable(other),
        }
    }
}

#[async_trait]
impl ContainerRuntime for BollardRuntime {
    async fn image_exists(&self, tag: &str) -> Result<bool> {
        match self.client.inspect_image(tag).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => {
                Ok(false)
            }
            Err(e) => Err(CommanderError::EngineUnavailable(e)),
        }
    }

    async fn build_image(&self, context_dir: &Path, tag: &str) -> Result<()> {
        // bollard builds from a tar stream; we build one from the context
        // directory (just the generated Dockerfile and any task scratch
        // files) so intermediate build state never outlives this call.
        let tar_bytes = tar_directory(context_dir)?;

        let options = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: tag.to_string(),
            rm: true,
            forcerm: true,
            ..Default::default()
        };

        let mut stream = self.client.build_image(options, None, Some(tar_bytes.into()));
        let mut build_error = None;
        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(err) = info.error {
                        build_error = Some(err);
                    }
                }
                Err(e) => {
                    build_error = Some(e.to_string());
                }
            }
        }

        if let Some(err) = build_error {
            return Err(CommanderError::Recipe(format!(
                "failed to build image '{}': {}",
                tag, err
            )));
        }

        Ok(())
    }

    async fn run(&self, spec: RunSpec) -> Result<ContainerHandle> {
        let mounts: Vec<Mount> = spec
            .mounts
            .iter()
            .map(|(host, (bind, mode))| Mount {
                source: Some(host.to_string_lossy().to_string()),
                target: Some(bind.to_string_lossy().to_string()),
                typ: Some(MountTypeEnum::BIND),
                read_only: Some(matches!(mode, AccessMode::ReadOnly)),
                ..Default::default()
            })
            .collect();

        let port_bindings = if spec.ports.is_empty() {
            None
        } else {
            let mut bindings: HashMap<String, Option<Vec<bollard::models::PortBinding>>> =
                HashMap::new();
            for (container_port, host_port) in &spec.ports {
                bindings.insert(
                    format!("{}/tcp", container_port),
                    Some(vec![bollard::models::PortBinding {
                        host_ip: None,
                        host_port: Some(host_port.to_string()),
                    }]),
                );
            }
            Some(bindings)
        };

        let network_mode = match spec.network_mode {
            NetworkMode::Default => "default".to_string(),
            NetworkMode::None => "none".to_string(),
        };

        let (nano_cpus, _) = crate::image::encode_resources(spec.resources);
        let memory = (spec.resources.memory_gb * 1024.0 * 1024.0 * 1024.0) as i64;

        let host_config = HostConfig {
            mounts: if mounts.is_empty() { None } else { Some(mounts) },
            port_bindings,
            network_mode: Some(network_mode),
            nano_cpus: Some(nano_cpus),
            memory: Some(memory),
            ..Default::default()
        };

        let env: Vec<String> = spec.env.iter().map(|(k, v)| format!("{}={}", k, v)).collect();

        let config = Config {
            image: Some(spec.image_tag.clone()),
            cmd: Some(spec.command.clone()),
            working_dir: Some(spec.working_dir.clone()),
            env: Some(env),
            host_config: Some(host_config),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let name = format!(
            "task-commander-{}",
            uuid::Uuid::new_v4().to_string().get(..8).unwrap_or_default()
        );

        let options = Some(CreateContainerOptions { name: name.clone(), platform: None });

        let response = self
            .client
            .create_container(options, config)
            .await
            .map_err(CommanderError::EngineUnavailable)?;

        self.client
            .start_container::<String>(&response.id, None)
            .await
            .map_err(|e| Self::map_404(&response.id, e))?;

        debug!("started container {} ({})", response.id, name);
        Ok(ContainerHandle(response.id))
    }

    async fn inspect(&self, handle: &ContainerHandle) -> Result<Inspection> {
        let inspect = self
            .client
            .inspect_container(&handle.0, None)
            .await
            .map_err(|e| Self::map_404(&handle.0, e))?;

        let state = inspect
            .state
            .as_ref()
            .and_then(|s| s.status)
            .map(|s| match s {
                ContainerStateStatusEnum::CREATED => ContainerLifecycle::Created,
                ContainerStateStatusEnum::RUNNING => ContainerLifecycle::Running,
                ContainerStateStatusEnum::PAUSED => ContainerLifecycle::Paused,
                ContainerStateStatusEnum::RESTARTING => ContainerLifecycle::Restarting,
                ContainerStateStatusEnum::REMOVING => ContainerLifecycle::Removing,
                ContainerStateStatusEnum::EXITED => ContainerLifecycle::Exited,
                ContainerStateStatusEnum::DEAD => ContainerLifecycle::Dead,
                _ => ContainerLifecycle::Dead,
            })
            .unwrap_or(ContainerLifecycle::Dead);

        let exit_code = inspect.state.as_ref().and_then(|s| s.exit_code);
        let short_id = inspect.id.unwrap_or_default().chars().take(12).collect();

        Ok(Inspection { state, exit_code, short_id })
    }

    async fn logs(&self, handle: &ContainerHandle) -> Result<Vec<u8>> {
        let options = Some(LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        });

        let mut stream = self.client.logs(&handle.0, options);
        let mut buf = Vec::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(output) => buf.extend_from_slice(&output.into_bytes()),
                Err(e) => return Err(Self::map_404(&handle.0, e)),
            }
        }
        Ok(buf)
    }

    async fn stop(&self, handle: &ContainerHandle, grace: Duration) -> Result<()> {
        let options = Some(StopContainerOptions { t: grace.as_secs() as i64 });
        match self.client.stop_container(&handle.0, options).await {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => {
                Ok(())
            }
            Err(e) => Err(CommanderError::EngineUnavailable(e)),
        }
    }

    async fn remove(&self, handle: &ContainerHandle) -> Result<()> {
        let options = Some(RemoveContainerOptions { force: true, v: true, ..Default::default() });
        match self.client.remove_container(&handle.0, options).await {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => {
                Ok(())
            }
            Err(e) => Err(CommanderError::EngineUnavailable(e)),
        }
    }

    async fn list_all(&self) -> Result<Vec<EngineContainer>> {
        let options = Some(ListContainersOptions::<String> { all: true, ..Default::default() });
        let containers = self
            .client
            .list_containers(options)
            .await
            .map_err(CommanderError::EngineUnavailable)?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                let id = c.id?;
                let tags = c.image.into_iter().collect::<Vec<_>>();
                Some(EngineContainer { handle: ContainerHandle(id), image_tags: tags })
            })
            .collect())
    }
}

/// Pack a directory's contents into an in-memory tar archive for
/// `build_image`. Errors here surface as `Recipe` failures: building an
/// image is conceptually part of Dockerfile/context preparation.
fn tar_directory(dir: &Path) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    builder
        .append_dir_all(".", dir)
        .map_err(CommanderError::Io)?;
    builder.into_inner().map_err(|e| {
        warn!("failed to finalize build context tar: {}", e);
        CommanderError::Io(e)
    })
}
