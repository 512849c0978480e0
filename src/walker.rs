use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::AtlasConfig;
use crate::language::LanguageKind;

/// Which files a walk should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkFilter {
    /// Files the fact extractor parses (TS/JS family).
    Scripts,
    /// Scripts plus markup files (Vue, Svelte, HTML) for the rule engine.
    ScriptsAndMarkup,
}

/// Walk a project directory and collect analyzable files, sorted by path.
///
/// Respects `.gitignore` rules, always excludes `node_modules`, and applies any
/// additional exclusions from `config.exclude`. Unreadable entries are skipped.
pub fn walk_project(
    root: &Path,
    config: &AtlasConfig,
    filter: WalkFilter,
) -> anyhow::Result<Vec<PathBuf>> {
    if !root.exists() {
        anyhow::bail!("path does not exist: {}", root.display());
    }

    let mut files = Vec::new();
    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(true)
        // Read .gitignore files even when the directory is not inside a git repository.
        .require_git(false)
        .build();

    for result in walker {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                warn!("walk error: {err}");
                continue;
            }
        };

        let path = entry.path();
        if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
            continue;
        }

        if path_contains_node_modules(path) {
            continue;
        }

        if is_excluded_by_config(path, config) {
            continue;
        }

        let Some(kind) = LanguageKind::from_path(path) else {
            continue;
        };
        if filter == WalkFilter::Scripts && !kind.is_script() {
            continue;
        }

        debug!("discovered {}", path.display());
        files.push(path.to_path_buf());
    }

    // File-scan order feeds the legend, so it must not depend on directory iteration order.
    files.sort();
    Ok(files)
}

/// Locate the project that encloses `path`: the nearest ancestor (inclusive) holding a
/// `package.json`, else the nearest holding `.git`, else `path` itself.
pub fn find_project_root(path: &Path) -> PathBuf {
    let start = if path.is_file() {
        path.parent().unwrap_or(path)
    } else {
        path
    };

    for marker in ["package.json", ".git"] {
        for ancestor in start.ancestors() {
            if ancestor.join(marker).exists() {
                return ancestor.to_path_buf();
            }
        }
    }
    start.to_path_buf()
}

/// Returns true if any component of `path` is named `node_modules`.
fn path_contains_node_modules(path: &Path) -> bool {
    path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| s == "node_modules")
            .unwrap_or(false)
    })
}

/// Returns true if `path` matches any exclusion pattern from config.
fn is_excluded_by_config(path: &Path, config: &AtlasConfig) -> bool {
    let patterns = match &config.exclude {
        Some(p) => p,
        None => return false,
    };

    let path_str = path.to_string_lossy();

    for pattern in patterns {
        let Ok(matched) = glob::Pattern::new(pattern) else {
            continue;
        };
        if matched.matches(&path_str) {
            return true;
        }
        // Also check if any component matches the pattern directly.
        for component in path.components() {
            if let Some(s) = component.as_os_str().to_str()
                && matched.matches(s)
            {
                return true;
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("tempdir")
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.file_name().unwrap().to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_walk_returns_sorted_scripts_only() {
        let dir = tmp();
        fs::write(dir.path().join("b.ts"), "export {}").unwrap();
        fs::write(dir.path().join("a.js"), "").unwrap();
        fs::write(dir.path().join("App.vue"), "<template></template>").unwrap();
        fs::write(dir.path().join("README.md"), "# Hello").unwrap();

        let config = AtlasConfig::default();
        let files = walk_project(dir.path(), &config, WalkFilter::Scripts).unwrap();
        assert_eq!(names(&files), vec!["a.js", "b.ts"]);

        let all = walk_project(dir.path(), &config, WalkFilter::ScriptsAndMarkup).unwrap();
        assert_eq!(names(&all), vec!["App.vue", "a.js", "b.ts"]);
    }

    #[test]
    fn test_walk_excludes_node_modules_and_config_patterns() {
        let dir = tmp();
        let nm = dir.path().join("node_modules").join("pkg");
        fs::create_dir_all(&nm).unwrap();
        fs::write(nm.join("index.js"), "").unwrap();
        fs::create_dir_all(dir.path().join("vendor")).unwrap();
        fs::write(dir.path().join("vendor").join("lib.js"), "").unwrap();
        fs::write(dir.path().join("main.js"), "").unwrap();

        let config = AtlasConfig {
            exclude: Some(vec!["vendor".to_string()]),
            ..Default::default()
        };
        let files = walk_project(dir.path(), &config, WalkFilter::Scripts).unwrap();
        assert_eq!(names(&files), vec!["main.js"]);
    }

    #[test]
    fn test_walk_missing_root_errors() {
        let dir = tmp();
        let missing = dir.path().join("nope");
        assert!(walk_project(&missing, &AtlasConfig::default(), WalkFilter::Scripts).is_err());
    }

    #[test]
    fn test_find_project_root_walks_up_to_manifest() {
        let dir = tmp();
        fs::write(dir.path().join("package.json"), "{}").unwrap();
        let nested = dir.path().join("src").join("lib");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_project_root(&nested), dir.path().to_path_buf());
    }
}
