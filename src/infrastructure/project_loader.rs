use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub struct ProjectLoader;

impl ProjectLoader {
    /// Program entry directories of a service checkout.
    ///
    /// An explicit entry subpath wins; otherwise every directory holding a
    /// `main` package is returned, in path order.
    pub fn discover_entries(root: &Path, entry: Option<&str>) -> Result<Vec<PathBuf>> {
        if let Some(entry) = entry.filter(|e| !e.is_empty()) {
            return Ok(vec![root.join(entry)]);
        }
        let mut dirs = Vec::new();
        Self::collect_main_dirs(root, &mut dirs)?;
        dirs.sort();
        Ok(dirs)
    }

    fn collect_main_dirs(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
        if dir.ends_with(".git") {
            return Ok(());
        }
        if !dir.is_dir() {
            return Ok(());
        }

        let mut is_main = false;
        let mut subdirs = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("Failed to walk {}", dir.display()))? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                subdirs.push(path);
            } else if !is_main && Self::is_source_file(&path) {
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read file {}", path.display()))?;
                is_main = package_clause(&content) == Some("main");
            }
        }
        if is_main {
            out.push(dir.to_path_buf());
        }
        for sub in subdirs {
            Self::collect_main_dirs(&sub, out)?;
        }
        Ok(())
    }

    /// A `.go` file that is neither a test, hidden, nor an editor leftover.
    fn is_source_file(path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        name.ends_with(".go")
            && !name.ends_with("_test.go")
            && !name.starts_with(['.', '#', '~'])
    }
}

/// Package name from the first `package` clause, skipping comments.
pub fn package_clause(source: &str) -> Option<&str> {
    let mut in_block = false;
    for line in source.lines() {
        let mut trimmed = line.trim();
        if in_block {
            match trimmed.find("*/") {
                Some(end) => {
                    in_block = false;
                    trimmed = trimmed[end + 2..].trim();
                }
                None => continue,
            }
        }
        if trimmed.starts_with("/*") {
            match trimmed.find("*/") {
                Some(end) => trimmed = trimmed[end + 2..].trim(),
                None => {
                    in_block = true;
                    continue;
                }
            }
        }
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }
        return trimmed
            .strip_prefix("package ")
            .and_then(|rest| rest.split_whitespace().next());
    }
    None
}
