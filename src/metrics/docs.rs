use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::AtlasConfig;
use crate::language::{is_generated_path, is_test_path};
use crate::parser::facts::DeclarationKind;
use crate::project::ProjectFacts;

#[derive(Debug, Clone, Serialize)]
pub struct UndocumentedItem {
    pub name: String,
    pub kind: DeclarationKind,
    pub file: PathBuf,
    pub line: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocsResult {
    /// Exported functions and classes considered.
    pub exported: usize,
    pub total: usize,
    pub items: Vec<UndocumentedItem>,
}

pub fn score_docs(path: &Path, config: &AtlasConfig, limit: Option<usize>) -> anyhow::Result<DocsResult> {
    let (facts, scope) = ProjectFacts::for_scope(path, config)?;
    Ok(docs_of(&facts, &scope, limit.unwrap_or(config.mcp.default_limit)))
}

/// Exported top-level functions and classes without a preceding `/** */` comment.
/// Methods are covered by their class.
pub fn docs_of(facts: &ProjectFacts, scope: &Path, limit: usize) -> DocsResult {
    let mut exported = 0;
    let mut items = Vec::new();
    for sheet in facts.in_scope(scope) {
        let file = facts.relative(&sheet.path);
        if is_test_path(file) || is_generated_path(file) {
            continue;
        }
        for decl in &sheet.declarations {
            if decl.kind == DeclarationKind::Method || !decl.exported {
                continue;
            }
            exported += 1;
            if !decl.documented {
                items.push(UndocumentedItem {
                    name: decl.name.clone(),
                    kind: decl.kind,
                    file: file.to_path_buf(),
                    line: decl.line,
                });
            }
        }
    }

    let total = items.len();
    items.truncate(limit);
    DocsResult {
        exported,
        total,
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::test_support::project;

    #[test]
    fn test_undocumented_exports_only() {
        let src = r#"
/** Adds numbers. */
export function add(a, b) { return a + b; }

export function sub(a, b) { return a - b; }

function internal() {}

export class Store {
  get() {}
}
"#;
        let facts = project(&[("m.js", src)]);
        let result = docs_of(&facts, &facts.root, 10);
        assert_eq!(result.exported, 3);
        let names: Vec<&str> = result.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["sub", "Store"]);
    }

    #[test]
    fn test_test_files_skipped() {
        let facts = project(&[("m.test.js", "export function helper() {}")]);
        assert_eq!(docs_of(&facts, &facts.root, 10).total, 0);
    }
}
