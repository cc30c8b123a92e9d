//! Scaffold Patcher: project-scaffolding transformer for staged project trees
//!
//! Given an existing application project, the pipeline materializes template
//! files, edits the manifest, wires generated modules, and rewrites source
//! files so that free global references (`window`, `localStorage`) become
//! member accesses routed through an owning object (`this.window`), making
//! the files portable between browser and server execution environments.
//!
//! # Architecture
//!
//! All rewrite operations compile down to a single primitive: [`EditSpan`],
//! a byte-span replacement applied in descending offset order. Intelligence
//! lives in span acquisition (a tree-sitter scan of class method bodies),
//! not in the application logic.
//!
//! # Safety
//!
//! - Scanning is CST-based: strings, comments, and look-alike identifiers
//!   are never rewritten
//! - Overlapping span sets fail fast instead of corrupting text
//! - Passes are idempotent: a second run never nests qualification
//!
//! # Example
//!
//! ```no_run
//! use scaffold_patcher::inject::inject_capability;
//! use scaffold_patcher::tree::MemoryTree;
//! use scaffold_patcher::wiring::{Capability, RecordingWiring};
//!
//! let mut tree = MemoryTree::new().with_file(
//!     "src/app.component.ts",
//!     "export class AppComponent { width() { return window.innerWidth; } }",
//! );
//! let mut wiring = RecordingWiring::new();
//!
//! let outcome = inject_capability(
//!     &mut tree,
//!     &mut wiring,
//!     "src/app.component.ts",
//!     &Capability::window(),
//! )?;
//! println!("outcome: {outcome:?}");
//! # Ok::<(), scaffold_patcher::inject::InjectError>(())
//! ```

pub mod diag;
pub mod edit;
pub mod inject;
pub mod manifest;
pub mod pipeline;
pub mod template;
pub mod tree;
pub mod ts;
pub mod wiring;

// Re-exports
pub use edit::{splice, EditError, EditSpan};
pub use inject::{inject_capability, InjectError, InjectOutcome};
pub use pipeline::{Collaborators, Pipeline, PipelineContext, PipelineStep, ScaffoldOptions};
pub use template::{substitute, PlaceholderMap};
pub use tree::{DiskTree, MemoryTree, StagedTree, TreeError};
pub use ts::{Dialect, ReferenceScanner, TargetReference, TreeSitterError};
pub use wiring::{Capability, ModuleWiring, RecordingQueue, RecordingWiring, TaskDescriptor, TaskQueue};
