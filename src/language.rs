use std::path::Path;

use serde::{Deserialize, Serialize};

/// The kind of source file handled by code-atlas.
///
/// Script kinds are parsed into Fact Sheets; markup files (single-file components,
/// HTML) are only visible to the line-oriented rule engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LanguageKind {
    TypeScript,
    Tsx,
    JavaScript,
    Markup,
}

impl LanguageKind {
    /// Classify a file by its extension. Returns `None` for files code-atlas ignores.
    pub fn from_extension(ext: &str) -> Option<LanguageKind> {
        match ext {
            "ts" | "mts" | "cts" => Some(LanguageKind::TypeScript),
            "tsx" => Some(LanguageKind::Tsx),
            "js" | "jsx" | "mjs" | "cjs" => Some(LanguageKind::JavaScript),
            "vue" | "svelte" | "html" => Some(LanguageKind::Markup),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<LanguageKind> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        Self::from_extension(ext)
    }

    /// True for kinds the fact extractor parses.
    pub fn is_script(&self) -> bool {
        !matches!(self, LanguageKind::Markup)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LanguageKind::TypeScript => "typescript",
            LanguageKind::Tsx => "tsx",
            LanguageKind::JavaScript => "javascript",
            LanguageKind::Markup => "markup",
        }
    }
}

/// Script extensions probed, in order, when resolving an extension-less import specifier.
pub const RESOLVE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

/// `path` with forward slashes and a leading `/`, so directory markers also match at the
/// start of a project-relative path.
fn rooted(path: &Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    format!("/{}", normalized.trim_start_matches('/'))
}

/// Returns true if the path looks like a test or spec file.
///
/// Pass a project-relative path: directories above the project root must not count.
pub fn is_test_path(path: &Path) -> bool {
    let path_str = rooted(path);
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    path_str.contains("/__tests__/")
        || path_str.contains("/tests/")
        || path_str.contains("/test/")
        || path_str.contains("/__mocks__/")
        || file_name.contains(".test.")
        || file_name.contains(".spec.")
        || file_name.contains(".stories.")
}

/// Returns true if the path looks like a generated or bundled asset. Expects a
/// project-relative path, like [`is_test_path`].
pub fn is_generated_path(path: &Path) -> bool {
    let path_str = rooted(path);
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    path_str.contains("/dist/")
        || path_str.contains("/build/")
        || path_str.contains("/coverage/")
        || path_str.contains("/.next/")
        || file_name.ends_with(".d.ts")
        || file_name.contains(".min.")
        || file_name.contains(".generated.")
        || file_name.contains(".bundle.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(LanguageKind::from_extension("ts"), Some(LanguageKind::TypeScript));
        assert_eq!(LanguageKind::from_extension("tsx"), Some(LanguageKind::Tsx));
        assert_eq!(LanguageKind::from_extension("mjs"), Some(LanguageKind::JavaScript));
        assert_eq!(LanguageKind::from_extension("vue"), Some(LanguageKind::Markup));
        assert_eq!(LanguageKind::from_extension("rs"), None);
        assert!(!LanguageKind::Markup.is_script());
    }

    #[test]
    fn test_test_and_generated_paths() {
        assert!(is_test_path(Path::new("/p/src/a.test.ts")));
        assert!(is_test_path(Path::new("/p/src/__tests__/a.ts")));
        assert!(!is_test_path(Path::new("/p/src/testing.ts")));
        assert!(is_generated_path(Path::new("/p/dist/index.js")));
        assert!(is_generated_path(Path::new("/p/src/types.d.ts")));
        assert!(is_generated_path(Path::new("/p/vendor/jquery.min.js")));
        assert!(!is_generated_path(Path::new("/p/src/builder.ts")));
        assert!(is_generated_path(Path::new("dist/index.js")));
        assert!(is_test_path(Path::new("test/helpers.js")));
        assert!(!is_test_path(Path::new("src/app.js")));
    }
}
