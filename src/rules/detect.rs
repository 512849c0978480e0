use std::path::{Path, PathBuf};

use tracing::debug;

use super::model::RuleSet;
use crate::manifest::PackageManifest;

/// Upper bound on files read when the manifest does not settle detection.
pub const SAMPLE_FILES: usize = 40;

/// Pick the rule sets that apply to a project.
///
/// A set applies when it is flagged `always_apply`, when `package.json` lists one of
/// its packages, or (for sets still undecided) when one of the first [`SAMPLE_FILES`]
/// files imports one of its marker modules or contains one of its code fragments.
/// `disabled` sets never apply.
pub fn detect_sets<'a>(
    root: &Path,
    sets: impl IntoIterator<Item = &'a RuleSet>,
    files: &[PathBuf],
    disabled: &[String],
) -> Vec<&'a RuleSet> {
    let manifest = PackageManifest::load(root).unwrap_or_default();

    let mut active = Vec::new();
    let mut undecided = Vec::new();
    for set in sets {
        if disabled.iter().any(|d| d == &set.name) {
            continue;
        }
        if set.always_apply {
            active.push(set);
        } else if set.detect.packages.iter().any(|p| manifest.depends_on(p)) {
            debug!("rule set '{}' detected from package.json", set.name);
            active.push(set);
        } else if !set.detect.imports.is_empty() || !set.detect.fragments.is_empty() {
            undecided.push(set);
        }
    }

    if undecided.is_empty() {
        return active;
    }

    let samples: Vec<String> = files
        .iter()
        .take(SAMPLE_FILES)
        .filter_map(|f| std::fs::read_to_string(f).ok())
        .collect();

    for set in undecided {
        let hit = samples.iter().any(|text| {
            set.detect.imports.iter().any(|m| imports_module(text, m))
                || set.detect.fragments.iter().any(|f| text.contains(f.as_str()))
        });
        if hit {
            debug!("rule set '{}' detected from sample files", set.name);
            active.push(set);
        }
    }
    active
}

/// A quoted specifier naming `module` or one of its subpaths.
fn imports_module(text: &str, module: &str) -> bool {
    ['\'', '"'].iter().any(|q| {
        text.contains(&format!("{q}{module}{q}")) || text.contains(&format!("{q}{module}/"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::model::Detect;

    fn set(name: &str, detect: Detect, always: bool) -> RuleSet {
        let mut s = RuleSet::new(name);
        s.detect = detect;
        s.always_apply = always;
        s
    }

    fn names(sets: &[&RuleSet]) -> Vec<String> {
        sets.iter().map(|s| s.name.clone()).collect()
    }

    #[test]
    fn test_manifest_then_samples_then_always() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{ "dependencies": { "react": "18" } }"#,
        )
        .unwrap();
        let app = dir.path().join("app.js");
        std::fs::write(&app, "import _ from 'lodash/fp';\n").unwrap();

        let sets = vec![
            set("base", Detect::default(), true),
            set(
                "react",
                Detect {
                    packages: vec!["react".into()],
                    ..Detect::default()
                },
                false,
            ),
            set(
                "lodash",
                Detect {
                    imports: vec!["lodash".into()],
                    ..Detect::default()
                },
                false,
            ),
            set(
                "vue",
                Detect {
                    packages: vec!["vue".into()],
                    fragments: vec!["<template".into()],
                    ..Detect::default()
                },
                false,
            ),
        ];

        let active = detect_sets(dir.path(), &sets, &[app], &[]);
        assert_eq!(names(&active), vec!["base", "react", "lodash"]);
    }

    #[test]
    fn test_disabled_sets_never_apply() {
        let dir = tempfile::tempdir().unwrap();
        let sets = vec![set("base", Detect::default(), true)];
        assert!(detect_sets(dir.path(), &sets, &[], &["base".into()]).is_empty());
    }

    #[test]
    fn test_imports_module_needs_quoted_specifier() {
        assert!(imports_module("require(\"axios\")", "axios"));
        assert!(!imports_module("import x from 'axios-retry'", "axios"));
    }
}
