//! Path sandbox
//!
//! Maps client-supplied SFTP paths onto the served root. Resolution is
//! purely lexical: nothing here touches the filesystem, so a rejected path
//! is never stat'ed, opened or created.

use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: PathBuf,
}

impl PathSandbox {
    /// `root` must already be absolute and canonical.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a virtual path to a local path inside the root.
    ///
    /// Every virtual path is rooted at the served directory regardless of
    /// leading separators. Returns `None` if the path escapes the root.
    pub fn resolve(&self, virtual_path: &str) -> Option<PathBuf> {
        let virtual_path = virtual_path.replace('\\', "/");
        let relative = virtual_path.trim_start_matches('/');
        let local = normalize_lexically(&self.root.join(relative));

        local.strip_prefix(&self.root).ok()?;
        Some(local)
    }
}

/// Collapse `.` and `..` components without consulting the filesystem.
/// `..` at the filesystem root stays at the root.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(name) => normalized.push(name),
        }
    }
    normalized
}

/// Display form of a virtual path for REALPATH: absolute, forward-slash
/// separated, with `.` and `..` applied and clamped at `/`.
pub fn normalize_virtual_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    format!("/{}", segments.join("/"))
}
