use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{AtlasConfig, LivenessConfig};
use crate::language::{is_generated_path, is_test_path};
use crate::manifest::{MANIFEST_FILE, PackageManifest};
use crate::parser::facts::{DeclarationKind, FactSheet, NAMESPACE_IMPORT};
use crate::project::ProjectFacts;
use crate::resolver::{normalize, resolve_relative};

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeadKind {
    Function,
    Class,
    Method,
    Export,
    Variable,
}

impl DeadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeadKind::Function => "function",
            DeadKind::Class => "class",
            DeadKind::Method => "method",
            DeadKind::Export => "export",
            DeadKind::Variable => "variable",
        }
    }
}

/// A single dead declaration, export, or unused local.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadItem {
    pub kind: DeadKind,
    pub name: String,
    /// Owning class for methods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Path relative to the project root.
    pub file: PathBuf,
    pub line: usize,
}

/// Result of liveness analysis.
#[derive(Debug, Clone, Serialize)]
pub struct DeadCodeResult {
    /// True number of dead items before the cap.
    pub total: usize,
    pub by_type: BTreeMap<DeadKind, usize>,
    /// At most `limit` items, ordered by file, line, name.
    pub items: Vec<DeadItem>,
    /// Directory the report covers, relative to the project root ("" for the whole project).
    pub scope: PathBuf,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Run liveness analysis for `path`.
///
/// Imports are resolved across the whole enclosing project (see [`ProjectFacts::for_scope`]);
/// only items under `path` are reported.
pub fn analyze_liveness(
    path: &Path,
    config: &AtlasConfig,
    limit: Option<usize>,
) -> anyhow::Result<DeadCodeResult> {
    let (facts, scope) = ProjectFacts::for_scope(path, config)?;
    Ok(classify(
        &facts,
        &scope,
        &config.liveness,
        limit.unwrap_or(config.liveness.limit),
    ))
}

/// Classify every declaration, export, and local binding of the sheets under `scope`.
pub fn classify(
    facts: &ProjectFacts,
    scope: &Path,
    config: &LivenessConfig,
    limit: usize,
) -> DeadCodeResult {
    let referenced = referenced_names(facts);
    let imports = ImportIndex::build(facts, &config.default_extension);
    let entry_files = entry_files(facts, config);

    let mut items = Vec::new();
    for sheet in facts.in_scope(scope) {
        let file = facts.relative(&sheet.path).to_path_buf();
        if sheet.parse_failed || is_test_path(&file) || is_generated_path(&file) {
            continue;
        }
        let is_entry_file = entry_files.contains(&sheet.path);

        dead_declarations(sheet, &referenced, config, &file, &mut items);
        if !is_entry_file {
            dead_exports(sheet, &imports, config, &file, &mut items);
        }
        unused_locals(sheet, &file, &mut items);
    }

    items.sort_by(|a, b| {
        a.file
            .cmp(&b.file)
            .then(a.line.cmp(&b.line))
            .then_with(|| a.name.cmp(&b.name))
    });

    let mut by_type: BTreeMap<DeadKind, usize> = BTreeMap::new();
    for item in &items {
        *by_type.entry(item.kind).or_insert(0) += 1;
    }
    let total = items.len();
    items.truncate(limit);

    DeadCodeResult {
        total,
        by_type,
        items,
        scope: facts.relative(scope).to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// Project-wide indexes
// ---------------------------------------------------------------------------

/// Every bare callee name project-wide, plus every class used as a parent.
fn referenced_names(facts: &ProjectFacts) -> HashSet<&str> {
    let mut names = HashSet::new();
    for sheet in &facts.sheets {
        for call in &sheet.calls {
            names.insert(call.callee.as_str());
        }
        for class in &sheet.classes {
            if let Some(parent) = &class.extends {
                names.insert(parent.as_str());
            }
        }
    }
    names
}

/// `(imported name, resolved target file) -> importer files`, plus targets imported whole.
struct ImportIndex {
    by_name: HashMap<(String, PathBuf), BTreeSet<PathBuf>>,
    wildcard: HashSet<PathBuf>,
}

impl ImportIndex {
    fn build(facts: &ProjectFacts, default_extension: &str) -> Self {
        let mut by_name: HashMap<(String, PathBuf), BTreeSet<PathBuf>> = HashMap::new();
        let mut wildcard = HashSet::new();

        for sheet in &facts.sheets {
            for import in sheet.imports.iter().filter(|i| i.is_relative()) {
                let outcome = resolve_relative(
                    &sheet.path,
                    &import.source,
                    |p| facts.contains(p),
                    default_extension,
                );
                let Some(target) = outcome.path() else {
                    continue;
                };
                if import.imported == NAMESPACE_IMPORT {
                    wildcard.insert(target.to_path_buf());
                } else {
                    by_name
                        .entry((import.imported.clone(), target.to_path_buf()))
                        .or_default()
                        .insert(sheet.path.clone());
                }
            }
        }
        debug!(
            "import index: {} named keys, {} wildcard targets",
            by_name.len(),
            wildcard.len()
        );
        Self { by_name, wildcard }
    }

    fn is_imported(&self, name: &str, file: &Path) -> bool {
        if self.wildcard.contains(file) {
            return true;
        }
        self.by_name
            .get(&(name.to_owned(), file.to_path_buf()))
            .map(|importers| !importers.is_empty())
            .unwrap_or(false)
    }
}

/// Files whose exports are public surface: package.json `main`/`module` and configured globs.
fn entry_files(facts: &ProjectFacts, config: &LivenessConfig) -> HashSet<PathBuf> {
    let mut entries = HashSet::new();

    if let Some(manifest) = PackageManifest::load(&facts.root) {
        let manifest_path = facts.root.join(MANIFEST_FILE);
        for spec in [&manifest.main, &manifest.module].into_iter().flatten() {
            let spec = if spec.starts_with('.') {
                spec.to_owned()
            } else {
                format!("./{spec}")
            };
            let outcome = resolve_relative(
                &manifest_path,
                &spec,
                |p| facts.contains(p),
                &config.default_extension,
            );
            if let Some(p) = outcome.path() {
                entries.insert(normalize(p));
            }
        }
    }

    let patterns: Vec<glob::Pattern> = config
        .entry_files
        .iter()
        .filter_map(|p| match glob::Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(err) => {
                warn!("invalid entry_files pattern '{p}': {err}");
                None
            }
        })
        .collect();
    if !patterns.is_empty() {
        for sheet in &facts.sheets {
            let rel = facts.relative(&sheet.path);
            if patterns.iter().any(|p| p.matches_path(rel)) {
                entries.insert(sheet.path.clone());
            }
        }
    }

    entries
}

// ---------------------------------------------------------------------------
// Per-file classification
// ---------------------------------------------------------------------------

fn is_exempt(name: &str, config: &LivenessConfig) -> bool {
    name == "constructor" || config.entry_points.iter().any(|e| e == name)
}

/// Unexported declarations whose bare name no call site references.
fn dead_declarations(
    sheet: &FactSheet,
    referenced: &HashSet<&str>,
    config: &LivenessConfig,
    file: &Path,
    out: &mut Vec<DeadItem>,
) {
    for decl in &sheet.declarations {
        if decl.exported || referenced.contains(decl.name.as_str()) || is_exempt(&decl.name, config)
        {
            continue;
        }
        let kind = match decl.kind {
            DeclarationKind::Function => DeadKind::Function,
            DeclarationKind::Class => DeadKind::Class,
            DeclarationKind::Method => DeadKind::Method,
        };
        out.push(DeadItem {
            kind,
            name: decl.name.clone(),
            owner: decl.owner.clone(),
            file: file.to_path_buf(),
            line: decl.line,
        });
    }
}

/// Exports with no resolved importer that the file does not use as a call qualifier.
fn dead_exports(
    sheet: &FactSheet,
    imports: &ImportIndex,
    config: &LivenessConfig,
    file: &Path,
    out: &mut Vec<DeadItem>,
) {
    let qualifiers: HashSet<&str> = sheet
        .calls
        .iter()
        .filter_map(|c| c.qualifier.as_deref())
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();
    for export in &sheet.exports {
        if !seen.insert(export.name.as_str()) {
            continue;
        }
        if imports.is_imported(&export.name, &sheet.path)
            || qualifiers.contains(export.name.as_str())
            || qualifiers.contains(export.local.as_str())
            || is_exempt(&export.name, config)
            || is_exempt(&export.local, config)
        {
            continue;
        }
        out.push(DeadItem {
            kind: DeadKind::Export,
            name: export.name.clone(),
            owner: None,
            file: file.to_path_buf(),
            line: export.line,
        });
    }
}

/// Local bindings whose name occurs exactly once in the file text (the binding itself).
fn unused_locals(sheet: &FactSheet, file: &Path, out: &mut Vec<DeadItem>) {
    if sheet.bindings.is_empty() {
        return;
    }
    let text = match std::fs::read_to_string(&sheet.path) {
        Ok(t) => t,
        Err(err) => {
            debug!("skipping locals of {}: {err}", sheet.path.display());
            return;
        }
    };

    let mut seen: HashSet<&str> = HashSet::new();
    for binding in &sheet.bindings {
        if binding.name.starts_with('_') || !seen.insert(binding.name.as_str()) {
            continue;
        }
        if count_identifier(&text, &binding.name) == 1 {
            out.push(DeadItem {
                kind: DeadKind::Variable,
                name: binding.name.clone(),
                owner: None,
                file: file.to_path_buf(),
                line: binding.line,
            });
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Occurrences of `name` in `text` as a whole identifier.
pub fn count_identifier(text: &str, name: &str) -> usize {
    if name.is_empty() {
        return 0;
    }
    text.match_indices(name)
        .filter(|(start, _)| {
            let before = text[..*start].chars().next_back();
            let after = text[start + name.len()..].chars().next();
            !before.map(is_ident_char).unwrap_or(false) && !after.map(is_ident_char).unwrap_or(false)
        })
        .count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
