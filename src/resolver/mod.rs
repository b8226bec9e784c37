pub mod file_resolver;

pub use file_resolver::{ResolutionOutcome, build_resolver, resolve_import};

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use oxc_resolver::Resolver;
use thiserror::Error;
use tracing::debug;

use crate::parser::{self, ParseError};

/// A resolution pass failed. No partial dependency set is ever returned.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{}:{line}:{column}: syntax error\n{snippet}", .path.display())]
    Syntax {
        path: PathBuf,
        line: usize,
        column: usize,
        snippet: String,
    },
    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {message}", .path.display())]
    Parser { path: PathBuf, message: String },
}

impl ResolveError {
    /// The file that caused the failure.
    pub fn path(&self) -> &Path {
        match self {
            ResolveError::Syntax { path, .. }
            | ResolveError::Read { path, .. }
            | ResolveError::Parser { path, .. } => path,
        }
    }

    fn from_parse(path: &Path, err: ParseError) -> Self {
        match err {
            ParseError::Syntax {
                line,
                column,
                snippet,
            } => ResolveError::Syntax {
                path: path.to_path_buf(),
                line,
                column,
                snippet,
            },
            other => ResolveError::Parser {
                path: path.to_path_buf(),
                message: other.to_string(),
            },
        }
    }
}

/// One source file in the dependency tree.
///
/// A node owns its children exclusively. A file reached a second time in the same pass
/// (a diamond or a cycle) appears only once, under the first parent that reached it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Every import specifier literally found in the file, packages included.
    /// Empty for leaves that are not parsed (`.json`, `.node`, ...).
    pub specifiers: Vec<String>,
    /// Nodes for specifiers that resolved to local files not yet visited in this pass.
    pub children: Vec<DependencyNode>,
}

impl DependencyNode {
    fn collect_into(&self, out: &mut BTreeSet<PathBuf>) {
        out.insert(self.path.clone());
        for child in &self.children {
            child.collect_into(out);
        }
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(f, "{}{}", "  ".repeat(depth), self.path.display())?;
        for child in &self.children {
            child.fmt_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

/// The result of one resolution pass from an entry file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    pub root: DependencyNode,
}

impl DependencyGraph {
    /// Flat set of every visited file: the entry plus all transitive local dependencies.
    pub fn files(&self) -> BTreeSet<PathBuf> {
        let mut out = BTreeSet::new();
        self.root.collect_into(&mut out);
        out
    }

    pub fn entry(&self) -> &Path {
        &self.root.path
    }
}

impl fmt::Display for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.fmt_tree(f, 0)
    }
}

/// Make `path` absolute against the current directory and canonical when it exists.
pub fn absolute_path(path: &Path) -> io::Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(joined.canonicalize().unwrap_or(joined))
}

/// Resolve the transitive closure of local-file dependencies reachable from `entry`.
///
/// The graph is rebuilt from scratch on every call. Bare package imports are dropped,
/// unresolvable local imports are skipped, and a visited set keyed by absolute path makes
/// cycles harmless.
///
/// # Errors
/// Fails on the first file that cannot be read or does not parse. The error identifies
/// the file (and for syntax errors the line and column).
pub fn resolve_dependencies(entry: &Path) -> Result<DependencyGraph, ResolveError> {
    let entry = absolute_path(entry).map_err(|source| ResolveError::Read {
        path: entry.to_path_buf(),
        source,
    })?;

    let resolver = build_resolver();
    let mut visited = HashSet::new();
    visited.insert(entry.clone());
    let root = visit(&resolver, entry, &mut visited)?;

    Ok(DependencyGraph { root })
}

fn visit(
    resolver: &Resolver,
    path: PathBuf,
    visited: &mut HashSet<PathBuf>,
) -> Result<DependencyNode, ResolveError> {
    let source = std::fs::read(&path).map_err(|source| ResolveError::Read {
        path: path.clone(),
        source,
    })?;

    let Some(imports) =
        parser::parse_file(&path, &source).map_err(|e| ResolveError::from_parse(&path, e))?
    else {
        return Ok(DependencyNode {
            path,
            specifiers: Vec::new(),
            children: Vec::new(),
        });
    };

    let mut specifiers: Vec<String> = Vec::new();
    for import in imports {
        debug!(
            file = %path.display(),
            line = import.line,
            kind = ?import.kind,
            specifier = %import.module_path,
            "import"
        );
        if !specifiers.contains(&import.module_path) {
            specifiers.push(import.module_path);
        }
    }

    let mut children = Vec::new();
    for specifier in &specifiers {
        match resolve_import(resolver, &path, specifier) {
            ResolutionOutcome::Resolved(target) => {
                if visited.insert(target.clone()) {
                    children.push(visit(resolver, target, visited)?);
                }
            }
            ResolutionOutcome::Package => {}
            ResolutionOutcome::Unresolved(reason) => {
                debug!(
                    file = %path.display(),
                    specifier = %specifier,
                    %reason,
                    "skipping unresolved import"
                );
            }
        }
    }

    Ok(DependencyNode {
        path,
        specifiers,
        children,
    })
}
