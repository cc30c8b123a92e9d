//! Injection orchestrator: per file, per capability, turn free global
//! references into member accesses routed through the owning object.
//!
//! Two-phase filter: a cheap lexical gate over the raw text decides whether
//! the expensive syntax-aware scan/patch pass runs at all.

use crate::diag;
use crate::edit::{splice, EditError};
use crate::tree::{StagedTree, TreeError};
use crate::ts::{Dialect, ReferenceScanner, TargetReference, TreeSitterError};
use crate::wiring::{Capability, ModuleWiring, WiringError};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};
use thiserror::Error;
use tracing::debug;

/// Accessor prefix routing a rewritten reference through the owning object.
const QUALIFYING_PREFIX: &str = "this.";

/// Compiled gate per target name. The pipeline runs the gate once per
/// (file, capability) pair, so each distinct name is compiled exactly once.
static GATES: LazyLock<Mutex<HashMap<String, Regex>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

#[derive(Error, Debug)]
pub enum InjectError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Parse(#[from] TreeSitterError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Wiring(#[from] WiringError),
}

/// Result of one injection pass over one file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "InjectOutcome should be checked for rewritten/unchanged"]
pub enum InjectOutcome {
    /// References were qualified and the file was written back.
    Rewritten { edits: usize },
    /// Nothing to rewrite; the file is byte-identical.
    Unchanged,
}

/// Lexical gate: does the raw text mention `name` right after a boundary
/// character somewhere inside a class body region? Runs without the parser;
/// over-matching is acceptable because the scanner behind it is exact.
fn class_body_mentions(text: &str, name: &str) -> bool {
    class_body_gate(name).is_match(text)
}

fn class_body_gate(name: &str) -> Regex {
    let mut gates = GATES.lock().expect("gate cache mutex poisoned");
    if let Some(gate) = gates.get(name) {
        // `Regex` clones share the compiled program.
        return gate.clone();
    }
    let pattern = format!(r#"class.*\{{[\s\S]*?[()'"`\s]{}"#, regex::escape(name));
    // The name is escaped, so the pattern is always valid.
    let gate = Regex::new(&pattern).expect("escaped gate pattern is valid");
    gates.insert(name.to_string(), gate.clone());
    gate
}

/// Rewrite free references to `capability.name` in the file at `path`.
///
/// Steps: lexical gate (absent is a no-op, not an error), constructor
/// dependency registration via the wiring collaborator, syntax-aware scan,
/// descending-order patch, persist through the staged tree.
///
/// Running this twice for the same file and capability never nests the
/// qualification: after the first pass every occurrence sits behind the
/// owning-object accessor, where neither the gate nor the scanner matches it.
pub fn inject_capability(
    tree: &mut dyn StagedTree,
    wiring: &mut dyn ModuleWiring,
    path: &str,
    capability: &Capability,
) -> Result<InjectOutcome, InjectError> {
    let text = tree.read_text(path)?;

    if !class_body_mentions(&text, &capability.name) {
        debug!(path, name = %capability.name, "gate miss, skipping scan");
        return Ok(InjectOutcome::Unchanged);
    }

    wiring.register_constructor_dependency(tree, path, capability)?;

    let dialect = path
        .rsplit('.')
        .next()
        .and_then(Dialect::from_extension)
        .unwrap_or_default();
    let mut scanner = ReferenceScanner::with_dialect(dialect)?;
    let target = TargetReference::new(capability.name.clone(), QUALIFYING_PREFIX);
    let spans = scanner.scan(&text, &target)?;

    if spans.is_empty() {
        debug!(path, name = %capability.name, "gate hit but no free references");
        return Ok(InjectOutcome::Unchanged);
    }

    let edits = spans.len();
    let rewritten = splice(&text, &spans)?;
    tree.write_text(path, &rewritten)?;

    debug!(path, name = %capability.name, edits, "qualified free references");
    diag::report("inject.rewritten", path);

    Ok(InjectOutcome::Rewritten { edits })
}
