use tree_sitter::Language;

/// Grammar used to parse a source file.
///
/// Queries are compiled per grammar, so this doubles as the key for the query cache in
/// [`super::imports`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grammar {
    JavaScript,
    TypeScript,
    Tsx,
}

impl Grammar {
    /// Return the grammar for the given file extension, or `None` when files with that
    /// extension are not parsed (they are still tracked as leaf dependencies).
    ///
    /// # Grammar selection rules
    /// - `.js`/`.mjs`/`.cjs`/`.jsx` -> JavaScript grammar (handles JSX natively)
    /// - `.ts`/`.mts`/`.cts`        -> TypeScript grammar
    /// - `.tsx`                     -> TSX grammar
    ///   The TypeScript grammar cannot parse JSX and the TSX grammar breaks angle-bracket
    ///   type assertions (`<T>expr`), so the two must stay separate.
    pub fn for_extension(ext: &str) -> Option<Grammar> {
        match ext {
            "js" | "mjs" | "cjs" | "jsx" => Some(Grammar::JavaScript),
            "ts" | "mts" | "cts" => Some(Grammar::TypeScript),
            "tsx" => Some(Grammar::Tsx),
            _ => None,
        }
    }

    pub fn language(self) -> Language {
        match self {
            Grammar::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Grammar::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Grammar::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_extensions_are_parsed() {
        for ext in ["js", "mjs", "cjs", "jsx"] {
            assert_eq!(Grammar::for_extension(ext), Some(Grammar::JavaScript), "{ext}");
        }
        assert_eq!(Grammar::for_extension("ts"), Some(Grammar::TypeScript));
        assert_eq!(Grammar::for_extension("tsx"), Some(Grammar::Tsx));
    }

    #[test]
    fn test_other_extensions_are_leaves() {
        assert_eq!(Grammar::for_extension("json"), None);
        assert_eq!(Grammar::for_extension("node"), None);
        assert_eq!(Grammar::for_extension(""), None);
    }
}
