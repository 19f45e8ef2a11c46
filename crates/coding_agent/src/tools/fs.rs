use std::fs;

use serde::Serialize;

use super::{count_lines, failure_json, BuiltinToolExecutor, ToolOutput, READ_MAX_FILE_BYTES};

#[derive(Serialize)]
struct WriteReport<'a> {
    success: bool,
    path: &'a str,
    old_lines: usize,
    new_lines: usize,
    is_new_file: bool,
    error: Option<&'a str>,
}

#[derive(Serialize)]
struct EditReport<'a> {
    success: bool,
    path: &'a str,
    start_line: usize,
    old_line_count: usize,
    new_line_count: usize,
    error: Option<&'a str>,
}

pub(super) fn read(
    executor: &BuiltinToolExecutor,
    path: &str,
    offset: i64,
    limit: i64,
) -> ToolOutput {
    let resolved = executor.resolve_path(path);
    let display = executor.display_path(&resolved);

    let metadata = match fs::metadata(&resolved) {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return ToolOutput::fail(format!("Error: File not found: {display}")),
    };

    if metadata.len() > READ_MAX_FILE_BYTES {
        return ToolOutput::fail(format!(
            "Error: File too large ({} bytes): {display}",
            metadata.len()
        ));
    }

    let bytes = match fs::read(&resolved) {
        Ok(bytes) => bytes,
        Err(_) => return ToolOutput::fail("Error: Could not read file"),
    };
    let content = String::from_utf8_lossy(&bytes);

    let end = offset.saturating_add(limit);
    let mut numbered = String::new();
    for (index, line) in content.split_terminator('\n').enumerate() {
        let line_number = index as i64 + 1;
        if line_number <= offset {
            continue;
        }
        if limit > 0 && line_number > end {
            break;
        }
        numbered.push_str(&format!("{line_number:>4} | {line}\n"));
    }

    if numbered.is_empty() {
        return ToolOutput::ok("(empty file)");
    }

    ToolOutput::ok(numbered)
}

pub(super) fn write(executor: &BuiltinToolExecutor, path: &str, content: &str) -> ToolOutput {
    let resolved = executor.resolve_path(path);
    let display = executor.display_path(&resolved);

    let existing = fs::symlink_metadata(&resolved).is_ok();
    let old_lines = if existing {
        fs::read(&resolved)
            .map(|bytes| count_lines(&String::from_utf8_lossy(&bytes)))
            .unwrap_or(0)
    } else {
        0
    };

    if let Some(parent) = resolved.parent() {
        if let Err(error) = fs::create_dir_all(parent) {
            tracing::debug!(parent = %parent.display(), %error, "could not create parent directories");
        }
    }

    if let Err(error) = fs::write(&resolved, content) {
        tracing::debug!(path = %resolved.display(), %error, "write failed");
        return ToolOutput::fail(failure_json(&format!("Cannot write: {display}")));
    }

    let report = WriteReport {
        success: true,
        path: &display,
        old_lines,
        new_lines: count_lines(content),
        is_new_file: !existing,
        error: None,
    };
    ToolOutput::ok(serde_json::to_string(&report).unwrap_or_default())
}

pub(super) fn edit(
    executor: &BuiltinToolExecutor,
    path: &str,
    old_string: &str,
    new_string: &str,
) -> ToolOutput {
    let resolved = executor.resolve_path(path);
    let display = executor.display_path(&resolved);

    match fs::metadata(&resolved) {
        Ok(metadata) if metadata.is_file() => {}
        _ => return ToolOutput::fail(failure_json(&format!("File not found: {display}"))),
    }

    if old_string.is_empty() {
        return ToolOutput::fail(failure_json("old_string must not be empty"));
    }

    let content = match fs::read_to_string(&resolved) {
        Ok(content) => content,
        Err(_) => return ToolOutput::fail(failure_json("Could not read file")),
    };

    let occurrences = content.matches(old_string).count();
    if occurrences == 0 {
        return ToolOutput::fail(failure_json(&format!("String not found in {display}")));
    }
    if occurrences > 1 {
        return ToolOutput::fail(failure_json(&format!(
            "String found {occurrences} times in {display}. Provide a more specific string with surrounding context."
        )));
    }

    let Some(match_start) = content.find(old_string) else {
        return ToolOutput::fail(failure_json(&format!("String not found in {display}")));
    };
    let start_line = 1 + content[..match_start].matches('\n').count();
    let updated = content.replacen(old_string, new_string, 1);

    if fs::write(&resolved, updated).is_err() {
        return ToolOutput::fail(failure_json("Could not write file"));
    }

    let report = EditReport {
        success: true,
        path: &display,
        start_line,
        old_line_count: 1 + old_string.matches('\n').count(),
        new_line_count: 1 + new_string.matches('\n').count(),
        error: None,
    };
    ToolOutput::ok(serde_json::to_string(&report).unwrap_or_default())
}
