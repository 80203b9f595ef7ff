//! Field extraction from raw tool results.
//!
//! Tool services differ in how they nest values, so each reader accepts the
//! handful of shapes seen in practice and returns `None` otherwise.

use serde_json::Value;

/// Distinct `matches[].path` entries of a `search_code` result, in order.
pub fn match_paths(result: &Value) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    let Some(matches) = result.get("matches").and_then(Value::as_array) else {
        return paths;
    };
    for path in matches
        .iter()
        .filter_map(|m| m.get("path").or_else(|| m.get("file")))
        .filter_map(Value::as_str)
    {
        if !paths.iter().any(|seen| seen == path) {
            paths.push(path.to_string());
        }
    }
    paths
}

/// File text of a `read_file` result: a bare string or `{"content": "..."}`.
pub fn file_content(result: &Value) -> Option<String> {
    match result {
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => map
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

/// Task id of an `addTask` result: `{"id": ..}` or `{"task": {"id": ..}}`.
pub fn task_id(result: &Value) -> Option<String> {
    let id = result
        .get("id")
        .or_else(|| result.get("task").and_then(|task| task.get("id")))?;
    match id {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Exit code of an `execute_command` result. Missing codes count as 1.
pub fn exit_code(result: &Value) -> i64 {
    result
        .get("exitCode")
        .or_else(|| result.get("exit_code"))
        .and_then(Value::as_i64)
        .unwrap_or(1)
}

/// Output text of an `execute_command` result.
pub fn command_output(result: &Value) -> String {
    match result {
        Value::String(text) => text.clone(),
        _ => ["output", "stdout"]
            .iter()
            .find_map(|key| result.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string(),
    }
}

/// Implementation-file pattern for a test path (`tests/test_io.py` -> `tests/io.py`).
///
/// Returns `None` for paths that do not look like tests.
pub fn implementation_pattern(test_path: &str) -> Option<String> {
    if !(test_path.contains("test_") || test_path.contains("_test")) {
        return None;
    }
    Some(test_path.replace("test_", "").replace("_test", ""))
}
