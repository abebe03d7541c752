use crate::error::{OptiError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Directories never worth descending into: VCS data, package caches and
/// .NET build output.
const SKIP_DIRS: [&str; 4] = [".git", "node_modules", "bin", "obj"];

#[derive(Debug, Clone, Copy)]
pub enum Match<'a> {
    /// Exact file name, e.g. `appsettings.json`.
    Name(&'a str),
    /// File extension without the dot, e.g. `bacpac`.
    Extension(&'a str),
}

impl Match<'_> {
    fn matches(&self, path: &Path) -> bool {
        match self {
            Match::Name(name) => path.file_name().and_then(|n| n.to_str()) == Some(*name),
            Match::Extension(ext) => path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext)),
        }
    }
}

/// Every file under `root` that matches, sorted. Unreadable directories are
/// skipped.
pub fn search(root: &Path, pattern: Match<'_>) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(e) => e,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(_) => continue,
            };
            if file_type.is_dir() {
                let name = entry.file_name();
                if !SKIP_DIRS.iter().any(|s| name.to_str() == Some(*s)) {
                    stack.push(path);
                }
            } else if file_type.is_file() && pattern.matches(&path) {
                found.push(path);
            }
        }
    }

    found.sort();
    found
}

/// Replace the file at `path` with `body` through a sibling temp file, so the
/// previous content survives a failed write.
pub fn write_atomic(path: &Path, body: &str) -> Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{name}.tmp"));
    fs::write(&tmp, body).map_err(|e| OptiError::persistence("write", &tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(OptiError::persistence("write", path, e));
    }
    Ok(())
}
