use ::ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

/// Gitignore-style filter applied when loading or watching a grammar directory
pub struct IgnoreFilter {
    inner: Gitignore,
}

impl IgnoreFilter {
    pub fn new(root: &Path, extra_excludes: Option<&[String]>) -> Self {
        let mut builder = GitignoreBuilder::new(root);

        // 1. Load from .gitignore and .ignore
        builder.add(root.join(".gitignore"));
        builder.add(root.join(".ignore"));

        // 2. Add defaults (global)
        let defaults = [
            // Noise directories
            "target/", "node_modules/", "dist/", "build/", "out/",
            ".git/", ".vscode/", ".idea/", ".antlr/",

            // Generated parser sources
            "gen/", "generated/",

            // Editor leftovers
            "*.swp", "*~", "*.bak", "*.orig",
        ];

        for pattern in defaults {
            // Static patterns; a bad one only loses that pattern
            builder.add_line(None, pattern).ok();
        }

        // 3. Add user config excludes
        if let Some(excludes) = extra_excludes {
            for pattern in excludes {
                builder.add_line(None, pattern).ok();
            }
        }

        Self {
            inner: builder.build().unwrap_or_else(|_| Gitignore::empty()),
        }
    }

    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        self.inner.matched(path, is_dir).is_ignore()
    }

    /// True if `path` or any of its ancestors below the root is ignored
    pub fn is_ignored_recursive(&self, path: &Path, is_dir: bool) -> bool {
        self.inner.matched_path_or_any_parents(path, is_dir).is_ignore()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_excludes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join(".gitignore"), "scratch.g4\n").unwrap();

        let excludes = vec!["legacy/".to_string()];
        let filter = IgnoreFilter::new(root, Some(&excludes));

        assert!(filter.is_ignored(&root.join("gen"), true));
        assert!(filter.is_ignored(&root.join("legacy"), true));
        assert!(filter.is_ignored(&root.join("scratch.g4"), false));
        assert!(!filter.is_ignored(&root.join("Expr.g4"), false));
        assert!(filter.is_ignored_recursive(&root.join("gen").join("ExprParser.g4"), false));
    }
}
