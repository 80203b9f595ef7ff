//! Completion of templated tool parameters from instance data.

use serde_json::Value;

use crate::core::types::{Params, ProblemInstance};

/// Characters of the problem statement copied into task descriptions.
pub const TASK_DESCRIPTION_CHARS: usize = 500;
/// Characters of the problem statement copied into project descriptions.
pub const PROJECT_DESCRIPTION_CHARS: usize = 1000;

/// Inputs available when completing a step's parameters.
#[derive(Debug, Clone, Copy)]
pub struct CompletionContext<'a> {
    pub instance: &'a ProblemInstance,
    /// Default `timeout_ms` for command execution tools.
    pub command_timeout_ms: u64,
}

/// Fill instance-derived parameters into a copy of `defaults`.
///
/// Declared defaults win over derived values except for the repository path
/// and project identity, which always come from the instance.
pub fn complete_params(tool: &str, defaults: &Params, ctx: CompletionContext<'_>) -> Params {
    let instance = ctx.instance;
    let mut params = defaults.clone();

    match tool {
        "search_code" => {
            params.insert("path".to_string(), Value::String(repo_path(instance)));
            if is_blank(params.get("pattern")) {
                params.insert(
                    "pattern".to_string(),
                    Value::String(derive_search_pattern(instance)),
                );
            }
        }
        "addTask" => {
            if is_blank(params.get("description")) {
                params.insert(
                    "description".to_string(),
                    Value::String(truncate_chars(
                        &instance.problem_statement,
                        TASK_DESCRIPTION_CHARS,
                    )),
                );
            }
        }
        "initProject" => {
            params.insert(
                "projectName".to_string(),
                Value::String(instance.instance_id.clone()),
            );
            params.insert(
                "projectDescription".to_string(),
                Value::String(truncate_chars(
                    &instance.problem_statement,
                    PROJECT_DESCRIPTION_CHARS,
                )),
            );
        }
        "execute_command" => {
            if !params.contains_key("timeout_ms") {
                params.insert("timeout_ms".to_string(), Value::from(ctx.command_timeout_ms));
            }
        }
        "read_file" => {
            if is_blank(params.get("path"))
                && let Some(hint) = instance.file_hints.first()
            {
                params.insert("path".to_string(), Value::String(hint.clone()));
            }
        }
        "read_multiple_files" => {
            if !params.contains_key("paths") && !instance.file_hints.is_empty() {
                params.insert("paths".to_string(), Value::from(instance.file_hints.clone()));
            }
        }
        _ => {}
    }

    params
}

/// Derive a code-search pattern from the first failing test.
///
/// - `tests/test_x.py::test_name` yields `test_name` (text after the last `::`).
/// - A test id without a separator yields `def test_`.
/// - No failing tests yields `def `.
pub fn derive_search_pattern(instance: &ProblemInstance) -> String {
    match instance.fail_to_pass.first() {
        Some(test) => match test.rsplit_once("::") {
            Some((_, name)) => name.to_string(),
            None => "def test_".to_string(),
        },
        None => "def ".to_string(),
    }
}

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

fn repo_path(instance: &ProblemInstance) -> String {
    if instance.repo.trim().is_empty() {
        ".".to_string()
    } else {
        instance.repo.clone()
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::instance;
    use serde_json::json;

    fn ctx(instance: &ProblemInstance) -> CompletionContext<'_> {
        CompletionContext {
            instance,
            command_timeout_ms: 30_000,
        }
    }

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => Params::new(),
        }
    }

    #[test]
    fn search_pattern_uses_text_after_namespace_separator() {
        let inst = instance(
            "a",
            "p",
            vec!["tests/test_io.py::TestReader::test_utf8".to_string()],
        );
        assert_eq!(derive_search_pattern(&inst), "test_utf8");
    }

    #[test]
    fn search_pattern_falls_back_to_function_definitions() {
        let no_separator = instance("b", "p", vec!["test_io.py".to_string()]);
        assert_eq!(derive_search_pattern(&no_separator), "def test_");
        let no_tests = instance("c", "p", Vec::new());
        assert_eq!(derive_search_pattern(&no_tests), "def ");
    }

    #[test]
    fn search_code_gets_repo_path_and_keeps_declared_pattern() {
        let inst = instance("d", "p", vec!["t.py::test_x".to_string()]);
        let derived = complete_params("search_code", &Params::new(), ctx(&inst));
        assert_eq!(derived["path"], json!(inst.repo));
        assert_eq!(derived["pattern"], json!("test_x"));

        let declared = complete_params(
            "search_code",
            &params(json!({ "pattern": "def |class ", "path": "elsewhere" })),
            ctx(&inst),
        );
        assert_eq!(declared["pattern"], json!("def |class "));
        assert_eq!(declared["path"], json!(inst.repo));
    }

    #[test]
    fn project_and_task_descriptions_are_truncated() {
        let statement = "é".repeat(1200);
        let inst = instance("proj-1", &statement, Vec::new());

        let project = complete_params("initProject", &Params::new(), ctx(&inst));
        assert_eq!(project["projectName"], json!("proj-1"));
        let desc = project["projectDescription"].as_str().expect("description");
        assert_eq!(desc.chars().count(), PROJECT_DESCRIPTION_CHARS);

        let task = complete_params(
            "addTask",
            &params(json!({ "title": "Fix" })),
            ctx(&inst),
        );
        let desc = task["description"].as_str().expect("description");
        assert_eq!(desc.chars().count(), TASK_DESCRIPTION_CHARS);
        assert_eq!(task["title"], json!("Fix"));
    }

    #[test]
    fn command_timeout_is_surfaced_unless_declared() {
        let inst = instance("e", "p", Vec::new());
        let filled = complete_params(
            "execute_command",
            &params(json!({ "command": "pytest" })),
            ctx(&inst),
        );
        assert_eq!(filled["timeout_ms"], json!(30_000));

        let declared = complete_params(
            "execute_command",
            &params(json!({ "command": "pytest", "timeout_ms": 5 })),
            ctx(&inst),
        );
        assert_eq!(declared["timeout_ms"], json!(5));
    }

    #[test]
    fn read_tools_use_file_hints() {
        let mut inst = instance("f", "p", Vec::new());
        inst.file_hints = vec!["src/a.py".to_string(), "src/b.py".to_string()];
        let single = complete_params("read_file", &Params::new(), ctx(&inst));
        assert_eq!(single["path"], json!("src/a.py"));
        let multi = complete_params("read_multiple_files", &Params::new(), ctx(&inst));
        assert_eq!(multi["paths"], json!(["src/a.py", "src/b.py"]));
    }

    #[test]
    fn unknown_tools_keep_defaults() {
        let inst = instance("g", "p", Vec::new());
        let defaults = params(json!({ "depth": 3 }));
        assert_eq!(complete_params("tree", &defaults, ctx(&inst)), defaults);
    }

    #[test]
    fn truncate_chars_handles_short_text() {
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abcdef", 3), "abc");
    }
}
