//! Commander's in-memory state
//!
//! Three plain maps, owned exclusively by `Commander`. Nothing outside the
//! tick loop ever reads or writes these; there is no shared-memory access
//! to guard.

use std::collections::HashMap;
use std::time::Instant;

use crate::runtime::ContainerHandle;
use crate::task::TaskOutput;

#[derive(Default)]
pub struct CommanderState {
    /// Most recent dispatch time per task name.
    pub last_execution: HashMap<String, Instant>,
    /// Live container handle per task name; at most one entry per task.
    pub running_containers: HashMap<String, ContainerHandle>,
    /// Most recently collected {text, data, html} triple per task name.
    pub tasks_output: HashMap<String, TaskOutput>,
}

impl CommanderState {
    /// Merge `update` into the existing entry for `name` key-by-key,
    /// rather than replacing the whole entry -- a containerised dispatch
    /// that only registers a handle must not wipe a prior completed
    /// result for the same task.
    pub fn merge_output(&mut self, name: &str, update: TaskOutput) {
        let entry = self.tasks_output.entry(name.to_string()).or_default();
        for (key, value) in update {
            entry.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_output_updates_keys_without_replacing_entry() {
        let mut state = CommanderState::default();

        let mut first = TaskOutput::new();
        first.insert("text".to_string(), "hello".into());
        first.insert("data".to_string(), serde_json::json!({"n": 1}));
        state.merge_output("scrape", first);

        let mut second = TaskOutput::new();
        second.insert("data".to_string(), serde_json::json!({"n": 2}));
        state.merge_output("scrape", second);

        let merged = &state.tasks_output["scrape"];
        assert_eq!(merged["text"], "hello");
        assert_eq!(merged["data"], serde_json::json!({"n": 2}));
    }
}
