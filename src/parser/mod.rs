pub mod imports;
pub mod languages;

use std::path::Path;

use thiserror::Error;
use tree_sitter::{Node, Parser};

use imports::{ImportInfo, extract_imports};
use languages::Grammar;

/// Why a source file could not be turned into an import list.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The source is not syntactically valid. Positions are 1-based.
    #[error("syntax error at line {line}, column {column}")]
    Syntax {
        line: usize,
        column: usize,
        /// The offending source line followed by a caret line.
        snippet: String,
    },
    #[error("failed to load tree-sitter grammar: {0}")]
    Grammar(#[from] tree_sitter::LanguageError),
    #[error("tree-sitter returned no tree")]
    NoTree,
}

/// Parse a source file and extract its static import targets.
///
/// Returns `Ok(None)` when the extension is not a parsed source language; such files are
/// leaves of the dependency graph.
///
/// # Errors
/// Returns [`ParseError::Syntax`] for the first syntax error in document order. A tree
/// with error or missing nodes is never accepted, even though tree-sitter recovers
/// from them.
pub fn parse_file(path: &Path, source: &[u8]) -> Result<Option<Vec<ImportInfo>>, ParseError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let Some(grammar) = Grammar::for_extension(ext) else {
        return Ok(None);
    };

    let mut parser = Parser::new();
    parser.set_language(&grammar.language())?;
    let tree = parser.parse(source, None).ok_or(ParseError::NoTree)?;

    let root = tree.root_node();
    if root.has_error() {
        let node = first_error(root).unwrap_or(root);
        let position = node.start_position();
        return Err(ParseError::Syntax {
            line: position.row + 1,
            column: display_column(source, position.row, position.column) + 1,
            snippet: render_snippet(source, position.row, position.column),
        });
    }

    Ok(Some(extract_imports(&tree, source, grammar)))
}

/// Depth-first search for the first `ERROR` or `MISSING` node.
fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if (child.has_error() || child.is_missing())
            && let Some(found) = first_error(child)
        {
            return Some(found);
        }
    }
    None
}

fn source_line(source: &[u8], row: usize) -> String {
    let text = String::from_utf8_lossy(source);
    text.lines().nth(row).unwrap_or("").to_owned()
}

/// Convert a byte column into a character column on the given row.
fn display_column(source: &[u8], row: usize, byte_column: usize) -> usize {
    let line = source.split(|b| *b == b'\n').nth(row).unwrap_or(&[]);
    let prefix = &line[..byte_column.min(line.len())];
    String::from_utf8_lossy(prefix).chars().count()
}

fn render_snippet(source: &[u8], row: usize, byte_column: usize) -> String {
    let line = source_line(source, row);
    let column = display_column(source, row, byte_column);
    format!("{line}\n{}^", " ".repeat(column))
}
