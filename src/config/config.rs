//! Configuration structures and loading

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Root configuration, loaded once at startup from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Configuration {
    /// Scheduler and dispatch behaviour.
    #[serde(default)]
    pub commander: CommanderConfiguration,

    /// Directory layout.
    #[serde(default)]
    pub system: SystemConfiguration,

    /// Container engine connection.
    #[serde(default)]
    pub docker: DockerConfiguration,
}

impl Configuration {
    /// Load configuration from a TOML file. Relative paths in the
    /// `system` section are resolved against the config file's parent
    /// directory; every declared directory is created if missing.
    pub fn load(path: &str) -> Result<Self> {
        let config_path = std::path::Path::new(path);
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read config file: {}", path))?;

        let mut config: Configuration =
            toml::from_str(&content).with_context(|| "failed to parse configuration")?;

        let base_dir = config_path
            .parent()
            .and_then(|p| if p.as_os_str().is_empty() { None } else { Some(p) })
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        config.system.resolve_paths(&base_dir);

        std::fs::create_dir_all(&config.system.root_directory)?;
        std::fs::create_dir_all(&config.system.out_directory)?;
        std::fs::create_dir_all(&config.system.tmp_directory)?;

        Ok(config)
    }
}

/// Scheduler and dispatch behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct CommanderConfiguration {
    /// Always rebuild a task's image regardless of cache state.
    #[serde(default)]
    pub force_rebuild: bool,

    /// Run every task in-process instead of inside a container.
    #[serde(default)]
    pub run_containerless: bool,

    /// Log a line at the start of every tick.
    #[serde(default)]
    pub print_cycles: bool,

    /// Log container start/stop/reap events.
    #[serde(default)]
    pub print_docker_lifecycle: bool,

    /// Log captured container stdout/stderr on reap.
    #[serde(default)]
    pub print_docker_logs: bool,

    /// Tick period, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for CommanderConfiguration {
    fn default() -> Self {
        Self {
            force_rebuild: false,
            run_containerless: false,
            print_cycles: false,
            print_docker_lifecycle: false,
            print_docker_logs: false,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

/// Directory layout.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfiguration {
    /// Root working directory mounted into every containerised task.
    #[serde(default = "default_root_directory")]
    pub root_directory: PathBuf,

    /// Directory tasks' outputs are collected under.
    #[serde(default = "default_out_directory")]
    pub out_directory: PathBuf,

    /// Scratch directory for generated Dockerfiles and build contexts.
    #[serde(default = "default_tmp_directory")]
    pub tmp_directory: PathBuf,
}

impl Default for SystemConfiguration {
    fn default() -> Self {
        Self {
            root_directory: default_root_directory(),
            out_directory: default_out_directory(),
            tmp_directory: default_tmp_directory(),
        }
    }
}

impl SystemConfiguration {
    fn resolve_paths(&mut self, base_dir: &std::path::Path) {
        self.root_directory = Self::resolve_path(&self.root_directory, base_dir);
        self.out_directory = Self::resolve_path(&self.out_directory, base_dir);
        self.tmp_directory = Self::resolve_path(&self.tmp_directory, base_dir);
    }

    fn resolve_path(path: &std::path::Path, base_dir: &std::path::Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            let resolved = base_dir.join(path);
            resolved.canonicalize().unwrap_or_else(|_| Self::normalize_path(&resolved))
        }
    }

    fn normalize_path(path: &std::path::Path) -> PathBuf {
        let mut components = Vec::new();
        for component in path.components() {
            match component {
                std::path::Component::ParentDir => {
                    components.pop();
                }
                std::path::Component::CurDir => {}
                c => components.push(c),
            }
        }
        components.iter().collect()
    }
}

fn default_root_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_out_directory() -> PathBuf {
    PathBuf::from("out")
}

fn default_tmp_directory() -> PathBuf {
    PathBuf::from("tmp")
}

/// Container engine connection.
#[derive(Debug, Clone, Deserialize)]
pub struct DockerConfiguration {
    #[serde(default = "default_docker_socket")]
    pub socket: String,
}

impl Default for DockerConfiguration {
    fn default() -> Self {
        Self { socket: default_docker_socket() }
    }
}

fn default_docker_socket() -> String {
    #[cfg(target_os = "windows")]
    {
        "npipe:////./pipe/docker_engine".into()
    }
    #[cfg(not(target_os = "windows"))]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let colima_socket = std::path::Path::new(&home).join(".colima/default/docker.sock");
            if colima_socket.exists() {
                return format!("unix://{}", colima_socket.display());
            }

            let docker_desktop = std::path::Path::new(&home).join(".docker/run/docker.sock");
            if docker_desktop.exists() {
                return format!("unix://{}", docker_desktop.display());
            }
        }

        "/var/run/docker.sock".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_resolves_relative_paths_against_config_parent() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("commander.toml");
        std::fs::write(
            &config_path,
            r#"
            [commander]
            force_rebuild = true

            [system]
            out_directory = "out"
            tmp_directory = "tmp"
            "#,
        )
        .unwrap();

        let config = Configuration::load(config_path.to_str().unwrap()).unwrap();
        assert!(config.commander.force_rebuild);
        assert!(config.system.out_directory.starts_with(dir.path()));
        assert!(config.system.tmp_directory.starts_with(dir.path()));
    }

    #[test]
    fn defaults_apply_when_sections_missing() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("commander.toml");
        std::fs::write(&config_path, "").unwrap();

        let config = Configuration::load(config_path.to_str().unwrap()).unwrap();
        assert_eq!(config.commander.poll_interval_ms, 1000);
        assert!(!config.commander.force_rebuild);
    }
}
