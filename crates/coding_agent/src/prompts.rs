use std::fs;
use std::path::{Path, PathBuf};

/// Source of named system prompts.
pub trait PromptStore {
    /// Returns the prompt text for `name`, or `None` when it is unknown.
    fn load(&self, name: &str) -> Option<String>;

    /// Names of every available prompt, earlier sources shadowing later ones.
    fn list(&self) -> Vec<String>;
}

pub const PROMPT_DIR: [&str; 2] = [".artifice", "prompts"];

/// Looks up `<dir>/<name>.md` in each directory in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirPromptStore {
    dirs: Vec<PathBuf>,
}

impl DirPromptStore {
    #[must_use]
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// Project-local prompts under `cwd` first, then the user's home prompts.
    #[must_use]
    pub fn default_locations(cwd: &Path, home: Option<&Path>) -> Self {
        let mut dirs = vec![prompt_dir(cwd)];
        if let Some(home) = home {
            dirs.push(prompt_dir(home));
        }
        Self::new(dirs)
    }

    #[must_use]
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

impl PromptStore for DirPromptStore {
    fn load(&self, name: &str) -> Option<String> {
        self.dirs.iter().find_map(|dir| {
            let path = dir.join(format!("{name}.md"));
            if !path.is_file() {
                return None;
            }
            fs::read_to_string(&path).ok()
        })
    }

    fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for dir in &self.dirs {
            let Ok(entries) = fs::read_dir(dir) else {
                continue;
            };
            let mut found: Vec<String> = entries
                .filter_map(Result::ok)
                .filter_map(|entry| {
                    let file_name = entry.file_name().into_string().ok()?;
                    let stem = file_name.strip_suffix(".md")?;
                    (!stem.is_empty()).then(|| stem.to_string())
                })
                .collect();
            found.sort();
            for name in found {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}

fn prompt_dir(root: &Path) -> PathBuf {
    root.join(PROMPT_DIR[0]).join(PROMPT_DIR[1])
}
