//! Static task registry
//!
//! Tasks are values implementing the Task Contract, submitted into this
//! table at link time via `inventory::submit!`. The in-container `launch`
//! entrypoint receives the same string identity via its `--task` argument
//! and resolves it through this same table, so there is exactly one lookup
//! mechanism on both sides of the container boundary.

use std::collections::HashMap;
use std::sync::OnceLock;

use super::Task;

/// One entry a task implementation submits to the static registry.
pub struct TaskRegistration {
    pub name: &'static str,
    pub build: fn() -> Box<dyn Task>,
}

inventory::collect!(TaskRegistration);

/// Lookup table built once from every `TaskRegistration` linked into the
/// binary.
pub struct Registry {
    by_name: HashMap<&'static str, fn() -> Box<dyn Task>>,
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

impl Registry {
    fn build() -> Self {
        let mut by_name = HashMap::new();
        for reg in inventory::iter::<TaskRegistration> {
            by_name.insert(reg.name, reg.build);
        }
        Self { by_name }
    }

    /// Global registry, built lazily on first use and then shared for the
    /// life of the process.
    pub fn global() -> &'static Registry {
        REGISTRY.get_or_init(Registry::build)
    }

    /// Construct a fresh task instance for `name`, or `None` if nothing
    /// registered under that identity.
    pub fn lookup(&self, name: &str) -> Option<Box<dyn Task>> {
        self.by_name.get(name).map(|build| build())
    }

    /// All registered task identities, in no particular order.
    pub fn names(&self) -> Vec<&'static str> {
        self.by_name.keys().copied().collect()
    }
}

#[macro_export]
macro_rules! register_task {
    ($name:expr, $build:expr) => {
        ::inventory::submit! {
            $crate::task::TaskRegistration {
                name: $name,
                build: $build,
            }
        }
    };
}
