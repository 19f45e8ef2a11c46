use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use super::{BuiltinToolExecutor, ToolOutput, GLOB_MAX_COLLECTED, GLOB_MAX_DISPLAYED};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

pub(super) fn glob(executor: &BuiltinToolExecutor, pattern: &str, base: Option<&str>) -> ToolOutput {
    let root = executor.resolve_path(base.unwrap_or("."));
    let display_root = executor.display_path(&root);

    let no_matches = || ToolOutput::ok(format!("No files matching '{pattern}' in {display_root}"));

    let compiled = match Pattern::new(pattern) {
        Ok(compiled) => compiled,
        Err(error) => {
            tracing::debug!(%pattern, %error, "invalid glob pattern");
            return no_matches();
        }
    };

    let mut matches = Vec::new();
    let walker = WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok);

    for entry in walker {
        if matches.len() >= GLOB_MAX_COLLECTED {
            break;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(&root) else {
            continue;
        };
        if compiled.matches_path_with(relative, MATCH_OPTIONS) {
            matches.push(executor.display_path(entry.path()));
        }
    }

    if matches.is_empty() {
        return no_matches();
    }

    let mut listing = matches
        .iter()
        .take(GLOB_MAX_DISPLAYED)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");
    if matches.len() > GLOB_MAX_DISPLAYED {
        listing.push_str(&format!(
            "\n... and {} more",
            matches.len() - GLOB_MAX_DISPLAYED
        ));
    }

    ToolOutput::ok(listing)
}
