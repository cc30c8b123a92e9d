//! External collaborator seams: module wiring edits and follow-up task
//! queueing. These are data-record operations, not syntax-aware rewrites,
//! so they stay behind narrow traits.

use crate::tree::StagedTree;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WiringError {
    #[error("no file at path: {path}")]
    MissingFile { path: String },

    #[error("wiring edit failed on {path}: {reason}")]
    EditFailed { path: String, reason: String },
}

/// A constructor-style dependency to register on every class in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    /// Free-variable name being replaced (e.g. `window`)
    pub name: String,
    /// Type label for the injected member (e.g. `Window`)
    pub type_label: String,
    /// Module the provider token is imported from
    pub provider_module: String,
    /// Provider token identifier (e.g. `WINDOW`)
    pub provider_token: String,
}

impl Capability {
    pub fn new(
        name: impl Into<String>,
        type_label: impl Into<String>,
        provider_module: impl Into<String>,
        provider_token: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_label: type_label.into(),
            provider_module: provider_module.into(),
            provider_token: provider_token.into(),
        }
    }

    /// The browser `window` object, provided by the portability runtime.
    pub fn window() -> Self {
        Self::new("window", "Window", "@ng-toolkit/universal", "WINDOW")
    }

    /// The browser `localStorage` object.
    pub fn local_storage() -> Self {
        Self::new("localStorage", "any", "@ng-toolkit/universal", "LOCAL_STORAGE")
    }
}

/// Edits to the wiring between generated modules: clause entries on a
/// structural descriptor and constructor dependencies on class files.
pub trait ModuleWiring {
    fn add_clause_entry(
        &mut self,
        tree: &mut dyn StagedTree,
        descriptor_path: &str,
        clause: &str,
        entry: &str,
    ) -> Result<(), WiringError>;

    fn remove_clause_entry(
        &mut self,
        tree: &mut dyn StagedTree,
        descriptor_path: &str,
        clause: &str,
        entry: &str,
    ) -> Result<(), WiringError>;

    /// Ensure `symbol` is imported from `module_specifier` in `file_path`.
    fn add_import(
        &mut self,
        tree: &mut dyn StagedTree,
        file_path: &str,
        symbol: &str,
        module_specifier: &str,
    ) -> Result<(), WiringError>;

    /// Register a constructor-style dependency on every class declaration in
    /// `class_file`. Registering the same capability on the same file twice
    /// must be an upsert, not a duplicate: the lexical gate in front of the
    /// injection pass can fire again for look-alike identifiers.
    fn register_constructor_dependency(
        &mut self,
        tree: &mut dyn StagedTree,
        class_file: &str,
        capability: &Capability,
    ) -> Result<(), WiringError>;
}

/// A follow-up task queued for after the pipeline completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskDescriptor {
    /// Install manifest dependencies in the given directory.
    PackageInstall { directory: String },
}

pub trait TaskQueue {
    fn queue(&mut self, task: TaskDescriptor);
}

/// Ledger entry for a clause edit observed by [`RecordingWiring`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClauseEdit {
    pub descriptor_path: String,
    pub clause: String,
    pub entry: String,
    pub removed: bool,
}

/// Ledger entry for an import request observed by [`RecordingWiring`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEdit {
    pub file_path: String,
    pub symbol: String,
    pub module_specifier: String,
}

/// Wiring double that records every request. Used by tests and dry runs;
/// registration requests are deduplicated per (file, capability name).
#[derive(Debug, Default)]
pub struct RecordingWiring {
    pub clause_edits: Vec<ClauseEdit>,
    pub imports: Vec<ImportEdit>,
    pub registrations: Vec<(String, Capability)>,
}

impl RecordingWiring {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModuleWiring for RecordingWiring {
    fn add_clause_entry(
        &mut self,
        _tree: &mut dyn StagedTree,
        descriptor_path: &str,
        clause: &str,
        entry: &str,
    ) -> Result<(), WiringError> {
        self.clause_edits.push(ClauseEdit {
            descriptor_path: descriptor_path.to_string(),
            clause: clause.to_string(),
            entry: entry.to_string(),
            removed: false,
        });
        Ok(())
    }

    fn remove_clause_entry(
        &mut self,
        _tree: &mut dyn StagedTree,
        descriptor_path: &str,
        clause: &str,
        entry: &str,
    ) -> Result<(), WiringError> {
        self.clause_edits.push(ClauseEdit {
            descriptor_path: descriptor_path.to_string(),
            clause: clause.to_string(),
            entry: entry.to_string(),
            removed: true,
        });
        Ok(())
    }

    fn add_import(
        &mut self,
        _tree: &mut dyn StagedTree,
        file_path: &str,
        symbol: &str,
        module_specifier: &str,
    ) -> Result<(), WiringError> {
        self.imports.push(ImportEdit {
            file_path: file_path.to_string(),
            symbol: symbol.to_string(),
            module_specifier: module_specifier.to_string(),
        });
        Ok(())
    }

    fn register_constructor_dependency(
        &mut self,
        _tree: &mut dyn StagedTree,
        class_file: &str,
        capability: &Capability,
    ) -> Result<(), WiringError> {
        let already = self
            .registrations
            .iter()
            .any(|(file, cap)| file == class_file && cap.name == capability.name);
        if !already {
            self.registrations
                .push((class_file.to_string(), capability.clone()));
        }
        Ok(())
    }
}

/// In-memory task queue double.
#[derive(Debug, Default)]
pub struct RecordingQueue {
    pub tasks: Vec<TaskDescriptor>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskQueue for RecordingQueue {
    fn queue(&mut self, task: TaskDescriptor) {
        self.tasks.push(task);
    }
}
