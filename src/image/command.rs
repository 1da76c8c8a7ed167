//! In-container command construction
//!
//! Follows `get_container_cmd` literally: write language-package
//! requirements to a scratch file, create and activate a virtualenv,
//! install requirements, then invoke the in-container launcher.

use crate::task::{Cadence, Params, Task};

/// Build the `sh -c '...'` command the Container Runtime Adapter passes to
/// the engine. `mount_prefix` is the absolute in-container path the
/// Commander's directory tree is bind-mounted at; `out_dir` is relative to
/// it.
pub fn build_command(
    task: &dyn Task,
    params: &Params,
    mount_prefix: &str,
    out_dir: &str,
) -> Vec<String> {
    let deps = task.dependencies();
    let pip_requirements = deps.language.join("\n");

    let params_json = serde_json::to_string(params).unwrap_or_else(|_| "{}".to_string());
    let quoted_params = shell_words::quote(&params_json);

    let pip_setup = format!(
        "cat > /tmp/requirements.txt << \"EOF\"\n{}\nEOF\npython -m venv /tmp/venv\n. /tmp/venv/bin/activate\npip install --no-cache-dir --root-user-action=ignore -r /tmp/requirements.txt",
        pip_requirements
    );

    let launch = format!(
        "task-commander launch --outdir {}/{} --task {} --params {}",
        mount_prefix,
        out_dir,
        task.name(),
        quoted_params
    );

    let mut body = format!("{} && {}", pip_setup, launch);
    if matches!(task.cadence(), Cadence::KeepAlive) {
        body.push_str(" && tail -f /dev/null");
    }

    vec!["sh".to_string(), "-c".to_string(), body]
}
