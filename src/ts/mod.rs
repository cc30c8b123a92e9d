//! Tree-sitter integration for TypeScript source files.
//!
//! CST-based span acquisition: free-reference scanning happens over a parsed
//! tree so string literals, comments, and look-alike substrings are never
//! mistaken for references.

pub mod errors;
pub mod parser;
pub mod scanner;

pub use errors::TreeSitterError;
pub use parser::{Dialect, ParsedSource, TsParser};
pub use scanner::{ReferenceScanner, TargetReference};
