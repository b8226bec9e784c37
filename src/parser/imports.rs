use std::sync::OnceLock;

use tree_sitter::{Node, Query, QueryCursor, StreamingIterator, Tree};

use super::languages::Grammar;

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// The kind of statement an import specifier was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// ESM static import: `import { X } from './module'` or `import './module'`
    Esm,
    /// CommonJS require with a literal argument: `const X = require('./module')`
    Require,
}

/// An import extracted from a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportInfo {
    pub kind: ImportKind,
    /// The raw module specifier string, e.g. `"webpack"` or `"./paths"`.
    pub module_path: String,
    /// 1-based line of the specifier, used in debug output.
    pub line: usize,
}

// ---------------------------------------------------------------------------
// Query strings
// ---------------------------------------------------------------------------

/// Tree-sitter query for ESM static imports, including bare side-effect imports.
const IMPORT_QUERY: &str = r#"
    (import_statement
      source: (string (string_fragment) @module_path))
"#;

/// Tree-sitter query for calls whose first argument is a plain string literal.
/// tree-sitter 0.26 StreamingIterator does not auto-filter `#eq?` predicates, so the
/// callee is filtered for `require` in code.
const REQUIRE_QUERY: &str = r#"
    (call_expression
      function: (identifier) @fn
      arguments: (arguments . (string (string_fragment) @module_path)))
"#;

// ---------------------------------------------------------------------------
// Query cache
// ---------------------------------------------------------------------------

struct ImportQueries {
    import: Query,
    require: Query,
}

impl ImportQueries {
    fn compile(grammar: Grammar) -> Self {
        let language = grammar.language();
        Self {
            import: Query::new(&language, IMPORT_QUERY).expect("invalid import query"),
            require: Query::new(&language, REQUIRE_QUERY).expect("invalid require query"),
        }
    }
}

static JS_QUERIES: OnceLock<ImportQueries> = OnceLock::new();
static TS_QUERIES: OnceLock<ImportQueries> = OnceLock::new();
static TSX_QUERIES: OnceLock<ImportQueries> = OnceLock::new();

/// Queries must be compiled against the same grammar the tree was parsed with.
fn queries(grammar: Grammar) -> &'static ImportQueries {
    let cell = match grammar {
        Grammar::JavaScript => &JS_QUERIES,
        Grammar::TypeScript => &TS_QUERIES,
        Grammar::Tsx => &TSX_QUERIES,
    };
    cell.get_or_init(|| ImportQueries::compile(grammar))
}

fn node_text<'a>(node: Node<'a>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

// ---------------------------------------------------------------------------
// Import extraction
// ---------------------------------------------------------------------------

/// Extract every statically-literal import target from a parsed syntax tree.
///
/// Returns ESM imports first, then `require()` calls, each group in source order.
/// Computed specifiers (`require(name)`, `require('./a' + b)`, template strings) are not
/// reported.
pub fn extract_imports(tree: &Tree, source: &[u8], grammar: Grammar) -> Vec<ImportInfo> {
    let queries = queries(grammar);
    let mut imports = Vec::new();

    // --- ESM static imports ---
    {
        let query = &queries.import;
        let module_path_idx = query
            .capture_index_for_name("module_path")
            .expect("import query must have @module_path");

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, tree.root_node(), source);

        while let Some(m) = matches.next() {
            for capture in m.captures {
                if capture.index == module_path_idx {
                    imports.push(ImportInfo {
                        kind: ImportKind::Esm,
                        module_path: node_text(capture.node, source).to_owned(),
                        line: capture.node.start_position().row + 1,
                    });
                }
            }
        }
    }

    // --- CJS require() calls ---
    {
        let query = &queries.require;
        let module_path_idx = query
            .capture_index_for_name("module_path")
            .expect("require query must have @module_path");
        let fn_idx = query
            .capture_index_for_name("fn")
            .expect("require query must have @fn");

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, tree.root_node(), source);

        while let Some(m) = matches.next() {
            let mut module_path: Option<Node> = None;
            let mut fn_name: Option<&str> = None;

            for capture in m.captures {
                if capture.index == module_path_idx {
                    module_path = Some(capture.node);
                } else if capture.index == fn_idx {
                    fn_name = Some(node_text(capture.node, source));
                }
            }

            // Only calls to `require(...)`, not arbitrary identifier calls.
            if fn_name != Some("require") {
                continue;
            }

            if let Some(node) = module_path {
                imports.push(ImportInfo {
                    kind: ImportKind::Require,
                    module_path: node_text(node, source).to_owned(),
                    line: node.start_position().row + 1,
                });
            }
        }
    }

    imports
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
