use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use coding_agent::tools::{BuiltinToolExecutor, ToolCall, ToolExecutor, UNKNOWN_TOOL_OUTPUT};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::tempdir;

fn new_executor(workspace_root: &Path) -> BuiltinToolExecutor {
    BuiltinToolExecutor::new(workspace_root).expect("workspace root should be valid")
}

fn parse_report(content: &str) -> Value {
    serde_json::from_str(content).expect("tool report should be JSON")
}

#[test]
fn all_five_tools_have_success_paths() {
    let workspace = tempdir().expect("temp workspace");
    let mut executor = new_executor(workspace.path());

    let write_result = executor.execute(ToolCall::Write {
        path: "notes/hello.txt".to_string(),
        content: "hello\n".to_string(),
    });
    assert!(write_result.ok, "write should succeed: {}", write_result.content);
    assert_eq!(
        write_result.content,
        r#"{"success":true,"path":"notes/hello.txt","old_lines":0,"new_lines":1,"is_new_file":true,"error":null}"#
    );

    let read_result = executor.execute(ToolCall::Read {
        path: "notes/hello.txt".to_string(),
        offset: 0,
        limit: 0,
    });
    assert!(read_result.ok, "read should succeed: {}", read_result.content);
    assert_eq!(read_result.content, "   1 | hello\n");

    let edit_result = executor.execute(ToolCall::Edit {
        path: "notes/hello.txt".to_string(),
        old_string: "hello".to_string(),
        new_string: "hello\nworld".to_string(),
    });
    assert!(edit_result.ok, "edit should succeed: {}", edit_result.content);
    assert_eq!(
        parse_report(&edit_result.content),
        json!({
            "success": true,
            "path": "notes/hello.txt",
            "start_line": 1,
            "old_line_count": 1,
            "new_line_count": 2,
            "error": null,
        })
    );
    assert_eq!(
        fs::read_to_string(workspace.path().join("notes/hello.txt")).expect("read back"),
        "hello\nworld\n"
    );

    let glob_result = executor.execute(ToolCall::Glob {
        pattern: "**/*.txt".to_string(),
        path: None,
    });
    assert!(glob_result.ok);
    assert_eq!(glob_result.content, "notes/hello.txt");

    let shell_result = executor.execute(ToolCall::Shell {
        command: "printf 'shell-ok'; ls notes".to_string(),
        timeout_sec: 5,
    });
    assert!(shell_result.ok, "shell should succeed: {}", shell_result.content);
    assert_eq!(
        shell_result.content,
        r#"{"exit_code":0,"stdout":"shell-okhello.txt\n","error":null}"#
    );
}

#[test]
fn edit_with_two_matches_reports_count_and_leaves_file_untouched() {
    let workspace = tempdir().expect("temp workspace");
    let path = workspace.path().join("dup.txt");
    fs::write(&path, "foo\nbar\nfoo\n").expect("seed file");
    let mut executor = new_executor(workspace.path());

    let result = executor.execute_named(
        "edit",
        &json!({"path": "dup.txt", "old_string": "foo", "new_string": "baz"}),
    );

    assert!(!result.ok);
    assert_eq!(
        parse_report(&result.content),
        json!({
            "success": false,
            "error": "String found 2 times in dup.txt. Provide a more specific string with surrounding context.",
        })
    );
    assert_eq!(fs::read_to_string(&path).expect("read back"), "foo\nbar\nfoo\n");
}

#[test]
fn edit_reports_missing_target_and_missing_file() {
    let workspace = tempdir().expect("temp workspace");
    fs::write(workspace.path().join("a.txt"), "alpha\n").expect("seed file");
    let mut executor = new_executor(workspace.path());

    let not_found = executor.execute_named(
        "edit",
        &json!({"path": "a.txt", "old_string": "omega", "new_string": "x"}),
    );
    assert_eq!(
        parse_report(&not_found.content)["error"],
        "String not found in a.txt"
    );

    let no_file = executor.execute_named(
        "edit",
        &json!({"path": "missing.txt", "old_string": "a", "new_string": "b"}),
    );
    assert_eq!(
        parse_report(&no_file.content)["error"],
        "File not found: missing.txt"
    );
}

#[test]
fn edit_reports_start_line_of_a_later_match() {
    let workspace = tempdir().expect("temp workspace");
    fs::write(workspace.path().join("lines.txt"), "one\ntwo\nthree\nfour\n").expect("seed");
    let mut executor = new_executor(workspace.path());

    let result = executor.execute_named(
        "edit",
        &json!({"path": "lines.txt", "old_string": "three\nfour", "new_string": "3"}),
    );

    let report = parse_report(&result.content);
    assert_eq!(report["start_line"], 3);
    assert_eq!(report["old_line_count"], 2);
    assert_eq!(report["new_line_count"], 1);
}

#[test]
fn read_honours_offset_and_limit() {
    let workspace = tempdir().expect("temp workspace");
    let body: String = (1..=12).map(|n| format!("line {n}\n")).collect();
    fs::write(workspace.path().join("long.txt"), body).expect("seed file");
    let mut executor = new_executor(workspace.path());

    let window = executor.execute_named("read", &json!({"path": "long.txt", "offset": 9, "limit": 2}));
    assert_eq!(window.content, "  10 | line 10\n  11 | line 11\n");

    let past_end = executor.execute_named("read", &json!({"path": "long.txt", "offset": 40}));
    assert!(past_end.ok);
    assert_eq!(past_end.content, "(empty file)");
}

#[test]
fn read_with_huge_limit_returns_the_rest_of_the_file() {
    let workspace = tempdir().expect("temp workspace");
    fs::write(workspace.path().join("a.txt"), "one\ntwo\nthree\n").expect("seed file");
    let mut executor = new_executor(workspace.path());

    let result = executor.execute_named("read", &json!({"path": "a.txt", "offset": 1, "limit": 1e30}));

    assert!(result.ok);
    assert_eq!(result.content, "   2 | two\n   3 | three\n");
}

#[test]
fn read_rejects_directories_missing_and_oversized_files() {
    let workspace = tempdir().expect("temp workspace");
    fs::create_dir(workspace.path().join("dir")).expect("mkdir");
    fs::write(workspace.path().join("big.bin"), vec![b'x'; 1024 * 1024 + 1]).expect("big file");
    let mut executor = new_executor(workspace.path());

    let dir = executor.execute_named("read", &json!({"path": "dir"}));
    assert!(!dir.ok);
    assert_eq!(dir.content, "Error: File not found: dir");

    let missing = executor.execute_named("read", &json!({"path": "nope.txt"}));
    assert_eq!(missing.content, "Error: File not found: nope.txt");

    let big = executor.execute_named("read", &json!({"path": "big.bin"}));
    assert_eq!(big.content, "Error: File too large (1048577 bytes): big.bin");
}

#[test]
fn write_over_existing_file_reports_old_line_count() {
    let workspace = tempdir().expect("temp workspace");
    fs::write(workspace.path().join("cfg.toml"), "a = 1\nb = 2\nc = 3\n").expect("seed");
    let mut executor = new_executor(workspace.path());

    let result = executor.execute_named("write", &json!({"path": "cfg.toml", "content": "a = 9"}));

    let report = parse_report(&result.content);
    assert_eq!(report["old_lines"], 3);
    assert_eq!(report["new_lines"], 1);
    assert_eq!(report["is_new_file"], false);
}

#[test]
fn glob_caps_collected_and_displayed_results() {
    let workspace = tempdir().expect("temp workspace");
    for n in 0..250 {
        fs::write(workspace.path().join(format!("f{n:03}.rs")), "").expect("seed file");
    }
    fs::write(workspace.path().join("readme.md"), "").expect("seed other");
    let mut executor = new_executor(workspace.path());

    let result = executor.execute_named("glob", &json!({"pattern": "*.rs"}));

    let lines: Vec<&str> = result.content.lines().collect();
    assert_eq!(lines.len(), 101);
    assert_eq!(lines[0], "f000.rs");
    assert_eq!(lines[99], "f099.rs");
    assert_eq!(lines[100], "... and 100 more");
}

#[test]
fn glob_without_matches_names_pattern_and_root() {
    let workspace = tempdir().expect("temp workspace");
    fs::create_dir(workspace.path().join("src")).expect("mkdir");
    let mut executor = new_executor(workspace.path());

    let result = executor.execute_named("glob", &json!({"pattern": "*.py", "path": "src"}));

    assert!(result.ok);
    assert_eq!(result.content, "No files matching '*.py' in src");
}

#[test]
fn shell_deadline_returns_promptly_with_timeout_note() {
    let workspace = tempdir().expect("temp workspace");
    let mut executor = new_executor(workspace.path());

    let started = Instant::now();
    let result = executor.execute_named("shell", &json!({"command": "echo start; sleep 30", "timeout": 1}));

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!result.ok);
    let report = parse_report(&result.content);
    assert_eq!(report["stdout"], "start\n");
    assert_eq!(
        report["note"],
        "Output was truncated: command timed out after 1s"
    );
}

#[test]
fn shell_output_cap_truncates_exactly() {
    let workspace = tempdir().expect("temp workspace");
    let mut executor = new_executor(workspace.path()).with_shell_max_output_bytes(64);

    let result = executor.execute_named("shell", &json!({"command": "yes abc"}));

    let report = parse_report(&result.content);
    assert_eq!(report["stdout"].as_str().map(str::len), Some(64));
    assert_eq!(report["note"], "Output was truncated");
}

#[test]
fn unknown_tools_and_missing_arguments_are_tool_results() {
    let workspace = tempdir().expect("temp workspace");
    let mut executor = new_executor(workspace.path());

    let unknown = executor.execute_named("teleport", &json!({}));
    assert!(!unknown.ok);
    assert_eq!(unknown.content, UNKNOWN_TOOL_OUTPUT);

    let missing = executor.execute_named("read", &json!({}));
    assert_eq!(missing.content, "Error: 'path' parameter required");
}
