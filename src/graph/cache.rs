use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::SymbolGraph;
use crate::config::AtlasConfig;

/// Single-slot cache holding the last-built graph, keyed by project root.
///
/// Inserting a graph for a different root replaces the previous one. The cache is an
/// ordinary value owned by its caller; there is no process-wide instance.
#[derive(Debug, Default)]
pub struct GraphCache {
    slot: Option<(PathBuf, Arc<SymbolGraph>)>,
}

impl GraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached graph, if it was built for `root`.
    pub fn get(&self, root: &Path) -> Option<Arc<SymbolGraph>> {
        match &self.slot {
            Some((cached_root, graph)) if cached_root == root => Some(Arc::clone(graph)),
            _ => None,
        }
    }

    pub fn insert(&mut self, root: PathBuf, graph: SymbolGraph) -> Arc<SymbolGraph> {
        let graph = Arc::new(graph);
        if let Some((previous, _)) = &self.slot
            && previous != &root
        {
            debug!("graph cache: {} superseded by {}", previous.display(), root.display());
        }
        self.slot = Some((root, Arc::clone(&graph)));
        graph
    }

    /// Return the cached graph for `root`, building and caching it on a miss.
    pub fn get_or_build(
        &mut self,
        root: &Path,
        config: &AtlasConfig,
    ) -> anyhow::Result<Arc<SymbolGraph>> {
        if let Some(graph) = self.get(root) {
            return Ok(graph);
        }
        let graph = super::build_for_root(root, config)?;
        Ok(self.insert(root.to_path_buf(), graph))
    }

    /// Drop the cached graph. With `Some(root)`, only when it was built for that root.
    /// Returns true when something was dropped.
    pub fn invalidate(&mut self, root: Option<&Path>) -> bool {
        let matches = match (&self.slot, root) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some((cached, _)), Some(root)) => cached == root,
        };
        if matches {
            self.slot = None;
        }
        matches
    }

    pub fn cached_root(&self) -> Option<&Path> {
        self.slot.as_ref().map(|(root, _)| root.as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn project_with(fn_name: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("index.js"),
            format!("function {fn_name}() {{}}\n"),
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_get_or_build_reuses_slot() {
        let dir = project_with("alpha");
        let mut cache = GraphCache::new();
        let config = AtlasConfig::default();

        let first = cache.get_or_build(dir.path(), &config).unwrap();
        let second = cache.get_or_build(dir.path(), &config).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.cached_root(), Some(dir.path()));
    }

    #[test]
    fn test_different_root_supersedes() {
        let a = project_with("alpha");
        let b = project_with("beta");
        let mut cache = GraphCache::new();
        let config = AtlasConfig::default();

        cache.get_or_build(a.path(), &config).unwrap();
        let graph_b = cache.get_or_build(b.path(), &config).unwrap();
        assert!(cache.get(a.path()).is_none());
        assert!(graph_b.legend.code_of("beta").is_some());
    }

    #[test]
    fn test_invalidate_rebuilds_from_current_files() {
        let dir = project_with("alpha");
        let mut cache = GraphCache::new();
        let config = AtlasConfig::default();

        cache.get_or_build(dir.path(), &config).unwrap();
        fs::write(dir.path().join("index.js"), "function gamma() {}\n").unwrap();

        // Still the stale graph until invalidated.
        assert!(cache.get(dir.path()).unwrap().legend.code_of("alpha").is_some());
        assert!(!cache.invalidate(Some(Path::new("/elsewhere"))));
        assert!(cache.invalidate(Some(dir.path())));

        let rebuilt = cache.get_or_build(dir.path(), &config).unwrap();
        assert!(rebuilt.legend.code_of("gamma").is_some());
        assert!(rebuilt.legend.code_of("alpha").is_none());
    }
}
