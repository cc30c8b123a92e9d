use crate::ts::errors::TreeSitterError;
use tree_sitter::{Parser, Tree};

/// TypeScript dialect selecting the grammar variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    Ts,
    Tsx,
}

impl Dialect {
    /// Pick the dialect from a file extension, if it is one we parse.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "ts" => Some(Dialect::Ts),
            "tsx" => Some(Dialect::Tsx),
            _ => None,
        }
    }

    fn language(self) -> tree_sitter::Language {
        match self {
            Dialect::Ts => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Dialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

/// Tree-sitter parser wrapper for TypeScript source code.
pub struct TsParser {
    parser: Parser,
    dialect: Dialect,
}

impl TsParser {
    /// Create a new parser for the plain TypeScript grammar.
    pub fn new() -> Result<Self, TreeSitterError> {
        Self::with_dialect(Dialect::default())
    }

    /// Create a new parser targeting a specific dialect.
    pub fn with_dialect(dialect: Dialect) -> Result<Self, TreeSitterError> {
        let mut parser = Parser::new();
        parser
            .set_language(&dialect.language())
            .map_err(|_| TreeSitterError::LanguageSet)?;

        Ok(Self { parser, dialect })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Parse source code into a tree-sitter Tree.
    pub fn parse(&mut self, source: &str) -> Result<Tree, TreeSitterError> {
        self.parser
            .parse(source, None)
            .ok_or(TreeSitterError::ParseFailed)
    }

    /// Parse source code and return the tree along with the source.
    pub fn parse_with_source<'a>(
        &mut self,
        source: &'a str,
    ) -> Result<ParsedSource<'a>, TreeSitterError> {
        let tree = self.parse(source)?;
        Ok(ParsedSource { source, tree })
    }
}

/// A parsed source file with its tree-sitter tree.
pub struct ParsedSource<'a> {
    pub source: &'a str,
    pub tree: Tree,
}

impl<'a> ParsedSource<'a> {
    /// Get the root node of the tree.
    pub fn root_node(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    /// Check if the tree contains any ERROR nodes.
    pub fn has_errors(&self) -> bool {
        has_error_nodes(self.tree.root_node())
    }

    /// Get the first ERROR node in the tree, if any.
    pub fn first_error(&self) -> Option<ErrorNode> {
        find_first_error(self.tree.root_node())
    }

    /// Extract text for a node's byte range.
    pub fn node_text(&self, node: tree_sitter::Node<'_>) -> &'a str {
        &self.source[node.byte_range()]
    }
}

/// Information about an ERROR node in the parse tree.
#[derive(Debug, Clone)]
pub struct ErrorNode {
    pub byte_start: usize,
    pub byte_end: usize,
}

fn has_error_nodes(node: tree_sitter::Node<'_>) -> bool {
    if node.is_error() || node.is_missing() {
        return true;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if has_error_nodes(child) {
            return true;
        }
    }

    false
}

fn find_first_error(node: tree_sitter::Node<'_>) -> Option<ErrorNode> {
    if node.is_error() || node.is_missing() {
        return Some(ErrorNode {
            byte_start: node.start_byte(),
            byte_end: node.end_byte(),
        });
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(err) = find_first_error(child) {
            return Some(err);
        }
    }

    None
}
