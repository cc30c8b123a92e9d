//! Free-reference scanner over TypeScript class method bodies.
//!
//! Produces ordered [`EditSpan`]s, one per free occurrence of a target name,
//! without touching declarations, strings, comments, or nested scopes. Span
//! acquisition is CST-based; a textual find/replace would corrupt string
//! literals and look-alike substrings.

use crate::edit::EditSpan;
use crate::ts::errors::TreeSitterError;
use crate::ts::parser::{Dialect, TsParser};
use tree_sitter::Node;

/// A free-variable name to rewrite plus the qualifying prefix to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReference {
    /// Exact identifier token to match (e.g. `window`)
    pub name: String,
    /// Member-access prefix including the trailing dot (e.g. `this.`)
    pub prefix: String,
}

impl TargetReference {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
        }
    }

    /// The qualified form inserted in place of a matched token.
    pub fn qualified(&self) -> String {
        format!("{}{}", self.prefix, self.name)
    }
}

/// Node kinds that open a new scope. The walk never descends into these:
/// only direct method-statement-level free references are rewritten.
const SCOPE_BOUNDARY_KINDS: &[&str] = &[
    "statement_block",
    "arrow_function",
    "function_expression",
    "function",
    "function_declaration",
    "generator_function",
    "generator_function_declaration",
    "class_declaration",
    "abstract_class_declaration",
    "class_expression",
    "method_definition",
];

/// Node kinds whose content is literal text, never identifier references.
const OPAQUE_KINDS: &[&str] = &["string", "template_string", "comment"];

/// Syntax-aware scanner that locates free references to a target name.
pub struct ReferenceScanner {
    parser: TsParser,
}

impl ReferenceScanner {
    pub fn new() -> Result<Self, TreeSitterError> {
        Ok(Self {
            parser: TsParser::new()?,
        })
    }

    pub fn with_dialect(dialect: Dialect) -> Result<Self, TreeSitterError> {
        Ok(Self {
            parser: TsParser::with_dialect(dialect)?,
        })
    }

    /// Scan `source` for free references to `target.name` inside class method
    /// bodies, returning spans ordered by source position.
    ///
    /// Absence of classes, methods, or matches is not an error: the result is
    /// simply empty. Malformed source fails the scan.
    pub fn scan(
        &mut self,
        source: &str,
        target: &TargetReference,
    ) -> Result<Vec<EditSpan>, TreeSitterError> {
        let parsed = self.parser.parse_with_source(source)?;
        if let Some(err) = parsed.first_error() {
            return Err(TreeSitterError::SyntaxError {
                byte_start: err.byte_start,
                byte_end: err.byte_end,
            });
        }

        let mut spans = Vec::new();
        let root = parsed.root_node();
        let mut cursor = root.walk();
        for item in root.named_children(&mut cursor) {
            if let Some(class) = as_class_declaration(item) {
                scan_class(class, source, target, &mut spans);
            }
        }

        spans.sort_by_key(|span| span.byte_start);
        Ok(spans)
    }
}

/// Unwrap `export class …` / `export default class …` down to the class node.
fn as_class_declaration(node: Node<'_>) -> Option<Node<'_>> {
    match node.kind() {
        "class_declaration" | "abstract_class_declaration" => Some(node),
        "export_statement" => {
            let declaration = node.child_by_field_name("declaration")?;
            match declaration.kind() {
                "class_declaration" | "abstract_class_declaration" => Some(declaration),
                _ => None,
            }
        }
        _ => None,
    }
}

fn scan_class(class: Node<'_>, source: &str, target: &TargetReference, out: &mut Vec<EditSpan>) {
    let Some(body) = class.child_by_field_name("body") else {
        return;
    };

    let mut members = body.walk();
    for member in body.named_children(&mut members) {
        if member.kind() != "method_definition" {
            continue;
        }
        // Constructors receive the dependency as a parameter; a bare name in
        // a constructor body resolves to that parameter, not to a global.
        if member
            .child_by_field_name("name")
            .is_some_and(|name| &source[name.byte_range()] == "constructor")
        {
            continue;
        }
        let Some(method_body) = member.child_by_field_name("body") else {
            continue;
        };

        // Only the method's direct statements; nested blocks are a separate
        // scope and stay untouched.
        let mut statements = method_body.walk();
        for statement in method_body.named_children(&mut statements) {
            collect_references(statement, source, target, out);
        }
    }
}

/// Depth-first walk over a statement's descendants. Identifier leaves are
/// tested and never descended into; scope boundaries and literal content are
/// skipped entirely.
fn collect_references(
    node: Node<'_>,
    source: &str,
    target: &TargetReference,
    out: &mut Vec<EditSpan>,
) {
    let kind = node.kind();
    if SCOPE_BOUNDARY_KINDS.contains(&kind) || OPAQUE_KINDS.contains(&kind) {
        return;
    }

    if kind == "identifier" {
        // Exact token equality: `windowSize` must never match target `window`.
        if &source[node.byte_range()] != target.name.as_str() {
            return;
        }
        if is_declaration_site(node) || is_member_property(node) {
            return;
        }
        out.push(EditSpan::new(
            node.start_byte(),
            node.end_byte(),
            target.qualified(),
        ));
        return;
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_references(child, source, target, out);
    }
}

/// A name being introduced (parameter, variable declarator) is a declaration,
/// not a free reference.
fn is_declaration_site(node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    match parent.kind() {
        "variable_declarator" => parent
            .child_by_field_name("name")
            .is_some_and(|name| name.id() == node.id()),
        "required_parameter" | "optional_parameter" => parent
            .child_by_field_name("pattern")
            .is_some_and(|pattern| pattern.id() == node.id()),
        _ => false,
    }
}

/// The property side of a member access is never a free reference. This also
/// keeps a repeated pass from re-qualifying an already-qualified `this.window`.
fn is_member_property(node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    parent.kind() == "member_expression"
        && parent
            .child_by_field_name("property")
            .is_some_and(|property| property.id() == node.id())
}
