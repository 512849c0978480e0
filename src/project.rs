use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use rayon::prelude::*;
use tracing::info;

use crate::config::AtlasConfig;
use crate::error::AtlasError;
use crate::parser::extract_file;
use crate::parser::facts::FactSheet;
use crate::walker::{WalkFilter, find_project_root, walk_project};

/// Fact sheets for every script file under one root, in file-scan (sorted path) order.
#[derive(Debug)]
pub struct ProjectFacts {
    pub root: PathBuf,
    pub sheets: Vec<FactSheet>,
    index: HashMap<PathBuf, usize>,
}

impl ProjectFacts {
    /// Walk `root` and extract every script file in parallel.
    ///
    /// Per-file failures degrade to empty sheets; only a missing root is an error.
    pub fn collect(root: &Path, config: &AtlasConfig) -> Result<Self> {
        let files = walk_project(root, config, WalkFilter::Scripts)?;
        let sheets: Vec<FactSheet> = files.par_iter().map(|f| extract_file(f)).collect();

        let failed = sheets.iter().filter(|s| s.parse_failed).count();
        info!(
            "extracted {} file(s) under {} ({failed} unparseable)",
            sheets.len(),
            root.display()
        );
        Ok(Self::from_sheets(root.to_path_buf(), sheets))
    }

    /// Collect the whole project enclosing `path`; returns the facts and the canonical
    /// `path` to scope reporting to.
    pub fn for_scope(path: &Path, config: &AtlasConfig) -> Result<(Self, PathBuf)> {
        let scope = path
            .canonicalize()
            .map_err(|_| AtlasError::MissingPath(path.to_path_buf()))?;
        let root = find_project_root(&scope);
        let facts = Self::collect(&root, config)?;
        Ok((facts, scope))
    }

    pub fn from_sheets(root: PathBuf, sheets: Vec<FactSheet>) -> Self {
        let index = sheets
            .iter()
            .enumerate()
            .map(|(i, s)| (s.path.clone(), i))
            .collect();
        Self {
            root,
            sheets,
            index,
        }
    }

    pub fn get(&self, path: &Path) -> Option<&FactSheet> {
        self.index.get(path).map(|&i| &self.sheets[i])
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.index.contains_key(path)
    }

    /// Sheets whose path lies under `scope` (all sheets when `scope` is the root).
    pub fn in_scope<'a>(&'a self, scope: &'a Path) -> impl Iterator<Item = &'a FactSheet> + 'a {
        self.sheets.iter().filter(move |s| s.path.starts_with(scope))
    }

    /// Path relative to the project root, for display.
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_collect_extracts_all_scripts_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/b.ts"), "export function b() {}\n").unwrap();
        fs::write(dir.path().join("src/a.js"), "function a() {}\n").unwrap();
        fs::write(dir.path().join("src/broken.js"), "function (\n").unwrap();

        let facts = ProjectFacts::collect(dir.path(), &AtlasConfig::default()).unwrap();
        let names: Vec<String> = facts
            .sheets
            .iter()
            .map(|s| facts.relative(&s.path).to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["src/a.js", "src/b.ts", "src/broken.js"]);
        assert!(facts.sheets[2].parse_failed);
        assert!(facts.contains(&dir.path().join("src/a.js")));
        assert_eq!(facts.in_scope(&dir.path().join("src")).count(), 3);
    }

    #[test]
    fn test_for_scope_collects_enclosing_project() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();
        fs::create_dir_all(dir.path().join("src/deep")).unwrap();
        fs::write(dir.path().join("top.js"), "").unwrap();
        fs::write(dir.path().join("src/deep/x.js"), "").unwrap();

        let (facts, scope) =
            ProjectFacts::for_scope(&dir.path().join("src/deep"), &AtlasConfig::default()).unwrap();
        assert_eq!(facts.sheets.len(), 2);
        assert_eq!(facts.in_scope(&scope).count(), 1);
    }

    #[test]
    fn test_collect_missing_root_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ProjectFacts::collect(&dir.path().join("nope"), &AtlasConfig::default()).is_err());
    }
}
