use std::path::{Path, PathBuf};

use oxc_resolver::{ResolveOptions, Resolver};

/// The outcome of resolving a single import specifier.
#[derive(Debug, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// A local specifier that resolved to an absolute file path.
    Resolved(PathBuf),
    /// A bare package name (`"webpack"`, `"@babel/core"`, `"node:path"`). Never tracked.
    Package,
    /// A local specifier that does not map to an existing file right now.
    /// `String` contains a human-readable reason.
    Unresolved(String),
}

/// Build an `oxc_resolver::Resolver` that follows Node's `require.resolve` rules for
/// local files: extension inference, directory `index` files and `package.json` `main`.
///
/// TypeScript extensions are probed after the Node defaults so a `webpack.config.ts`
/// can pull in sibling `.ts` modules.
///
/// A fresh resolver is built for every resolution pass. The resolver caches file
/// system lookups, and a long-lived one would not notice files created later.
pub fn build_resolver() -> Resolver {
    Resolver::new(ResolveOptions {
        extensions: vec![
            ".js".into(),
            ".json".into(),
            ".node".into(),
            ".mjs".into(),
            ".cjs".into(),
            ".ts".into(),
            ".mts".into(),
            ".cts".into(),
            ".tsx".into(),
            ".jsx".into(),
        ],
        condition_names: vec!["node".into(), "require".into()],
        ..ResolveOptions::default()
    })
}

/// True when the specifier points at a file on disk rather than a package:
/// `./x`, `../x`, `.`, `..` or an absolute path.
pub fn is_local_specifier(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
        || Path::new(specifier).is_absolute()
}

/// Resolve a single import specifier from the perspective of `from_file`.
///
/// The resolver uses `from_file`'s parent directory as the resolution base, which matches
/// how Node.js resolves relative requires.
pub fn resolve_import(resolver: &Resolver, from_file: &Path, specifier: &str) -> ResolutionOutcome {
    if !is_local_specifier(specifier) {
        return ResolutionOutcome::Package;
    }

    let Some(dir) = from_file.parent() else {
        return ResolutionOutcome::Unresolved("from_file has no parent directory".to_owned());
    };

    match resolver.resolve(dir, specifier) {
        Ok(resolution) => ResolutionOutcome::Resolved(resolution.into_path_buf()),
        Err(e) => ResolutionOutcome::Unresolved(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_local_specifiers() {
        assert!(is_local_specifier("./a"));
        assert!(is_local_specifier("../a/b.js"));
        assert!(is_local_specifier("/abs/path.js"));
        assert!(is_local_specifier("."));
        assert!(is_local_specifier(".."));
    }

    #[test]
    fn test_package_specifiers() {
        assert!(!is_local_specifier("lodash"));
        assert!(!is_local_specifier("@babel/core"));
        assert!(!is_local_specifier("node:path"));
        assert!(!is_local_specifier(".hidden"));
        assert!(!is_local_specifier("webpack/lib/Compiler"));
    }

    #[test]
    fn test_resolve_infers_extension_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::write(root.join("main.js"), "").unwrap();
        fs::write(root.join("util.js"), "").unwrap();
        fs::create_dir(root.join("lib")).unwrap();
        fs::write(root.join("lib").join("index.js"), "").unwrap();

        let resolver = build_resolver();
        let from = root.join("main.js");

        assert_eq!(
            resolve_import(&resolver, &from, "./util"),
            ResolutionOutcome::Resolved(root.join("util.js"))
        );
        assert_eq!(
            resolve_import(&resolver, &from, "./lib"),
            ResolutionOutcome::Resolved(root.join("lib").join("index.js"))
        );
    }

    #[test]
    fn test_resolve_missing_file_is_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let resolver = build_resolver();
        let outcome = resolve_import(&resolver, &root.join("main.js"), "./nope");
        assert!(matches!(outcome, ResolutionOutcome::Unresolved(_)));
    }

    #[test]
    fn test_packages_are_never_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let resolver = build_resolver();
        let outcome = resolve_import(&resolver, &root.join("main.js"), "lodash");
        assert_eq!(outcome, ResolutionOutcome::Package);
    }
}
