//! The staged project tree: the single shared mutable resource the pipeline
//! operates over. Paths are `/`-separated and relative to the tree root.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("no file at path: {path}")]
    NotFound { path: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Read/write/delete/enumerate access to staged file content by path.
pub trait StagedTree {
    fn read_text(&self, path: &str) -> Result<String, TreeError>;

    /// Full overwrite; creates the file (and any parent directories) if absent.
    fn write_text(&mut self, path: &str, text: &str) -> Result<(), TreeError>;

    fn delete(&mut self, path: &str) -> Result<(), TreeError>;

    fn exists(&self, path: &str) -> bool;

    /// Visit every file path under `dir`, in a stable order.
    fn visit(&self, dir: &str, visitor: &mut dyn FnMut(&str));
}

/// In-memory tree used by tests and dry runs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryTree {
    files: BTreeMap<String, String>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the tree with a file, builder-style.
    pub fn with_file(mut self, path: &str, text: &str) -> Self {
        self.files.insert(path.to_string(), text.to_string());
        self
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

impl StagedTree for MemoryTree {
    fn read_text(&self, path: &str) -> Result<String, TreeError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| TreeError::NotFound {
                path: path.to_string(),
            })
    }

    fn write_text(&mut self, path: &str, text: &str) -> Result<(), TreeError> {
        self.files.insert(path.to_string(), text.to_string());
        Ok(())
    }

    fn delete(&mut self, path: &str) -> Result<(), TreeError> {
        self.files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| TreeError::NotFound {
                path: path.to_string(),
            })
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn visit(&self, dir: &str, visitor: &mut dyn FnMut(&str)) {
        let prefix = normalized_dir_prefix(dir);
        for path in self.files.keys() {
            if prefix.is_empty() || path.starts_with(&prefix) {
                visitor(path);
            }
        }
    }
}

/// Tree backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct DiskTree {
    root: PathBuf,
}

impl DiskTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl StagedTree for DiskTree {
    fn read_text(&self, path: &str) -> Result<String, TreeError> {
        let resolved = self.resolve(path);
        fs::read_to_string(&resolved).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                TreeError::NotFound {
                    path: path.to_string(),
                }
            } else {
                TreeError::Io {
                    path: path.to_string(),
                    source,
                }
            }
        })
    }

    fn write_text(&mut self, path: &str, text: &str) -> Result<(), TreeError> {
        let resolved = self.resolve(path);
        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent).map_err(|source| TreeError::Io {
                path: path.to_string(),
                source,
            })?;
        }
        fs::write(&resolved, text).map_err(|source| TreeError::Io {
            path: path.to_string(),
            source,
        })
    }

    fn delete(&mut self, path: &str) -> Result<(), TreeError> {
        let resolved = self.resolve(path);
        if !resolved.exists() {
            return Err(TreeError::NotFound {
                path: path.to_string(),
            });
        }
        fs::remove_file(&resolved).map_err(|source| TreeError::Io {
            path: path.to_string(),
            source,
        })
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn visit(&self, dir: &str, visitor: &mut dyn FnMut(&str)) {
        let base = self.resolve(dir);
        let mut paths = Vec::new();
        for entry in WalkDir::new(&base).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                paths.push(relative.to_string_lossy().replace('\\', "/"));
            }
        }
        paths.sort();
        for path in paths {
            visitor(&path);
        }
    }
}

fn normalized_dir_prefix(dir: &str) -> String {
    let trimmed = dir.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}
