//! Output Sink (read path)
//!
//! Resolves a task's prior output for report assembly. Grounded on
//! `task/OutputParser.py::get_text`/`get_html`: reads never fail, any I/O
//! error or missing file yields an empty result rather than propagating.

use std::path::Path;

use serde_json::Value;

/// Scan `path` in reverse for the last line prefixed with `"<task_name>:"`,
/// returning the parsed JSON value if the remainder parses, the raw string
/// otherwise. Returns `Value::Null` if the file is absent, unreadable, or
/// has no matching line.
pub fn read_last_entry(path: &Path, task_name: &str) -> Value {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return Value::Null;
    };

    let prefix = format!("{}:", task_name);
    for line in contents.lines().rev() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix(&prefix) {
            let content = rest.trim();
            return serde_json::from_str(content).unwrap_or_else(|_| Value::String(content.to_string()));
        }
    }

    Value::Null
}

/// Read `output.txt`'s last entry for `task_name`.
pub fn read_text(outdir: &Path, task_name: &str) -> Value {
    read_last_entry(&outdir.join("output.txt"), task_name)
}

/// Read `output.log`'s last entry for `task_name`.
pub fn read_log(outdir: &Path, task_name: &str) -> Value {
    read_last_entry(&outdir.join("output.log"), task_name)
}

/// Read a task's rendered HTML fragment, or an empty string if absent or
/// unreadable.
pub fn read_html(outdir: &Path, task_name: &str) -> String {
    let path = outdir.join("output").join(format!("{}.html", task_name));
    std::fs::read_to_string(path).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_last_matching_line_as_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("output.txt");
        std::fs::write(&path, "scrape: {\"n\": 1}\nscrape: {\"n\": 2}\nother: ignored\n").unwrap();

        let value = read_last_entry(&path, "scrape");
        assert_eq!(value, serde_json::json!({"n": 2}));
    }

    #[test]
    fn falls_back_to_raw_string_when_not_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("output.txt");
        std::fs::write(&path, "scrape: plain text result\n").unwrap();

        let value = read_last_entry(&path, "scrape");
        assert_eq!(value, Value::String("plain text result".to_string()));
    }

    #[test]
    fn missing_file_yields_null() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("does-not-exist.txt");
        assert_eq!(read_last_entry(&path, "scrape"), Value::Null);
    }

    #[test]
    fn missing_html_yields_empty_string() {
        let dir = tempdir().unwrap();
        assert_eq!(read_html(dir.path(), "scrape"), "");
    }
}
