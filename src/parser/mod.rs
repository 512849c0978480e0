pub mod declarations;
pub mod facts;
pub mod imports;
pub mod languages;
pub mod syntax;

use std::cell::RefCell;
use std::path::Path;

use anyhow::{Result, anyhow, bail};
use tracing::{debug, warn};
use tree_sitter::Parser;

use crate::language::LanguageKind;

use declarations::extract_declarations;
use facts::{DeclarationKind, ExportKind, FactSheet};
use imports::{extract_exports, extract_imports};
use languages::grammar_for;

// Thread-local Parser instances, one per rayon worker thread.
// Each Parser is initialised once per thread with the appropriate grammar.
thread_local! {
    static PARSER_TS: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()).unwrap();
        p
    });
    static PARSER_TSX: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_typescript::LANGUAGE_TSX.into()).unwrap();
        p
    });
    static PARSER_JS: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_javascript::LANGUAGE.into()).unwrap();
        p
    });
}

/// Parse one source file into a [`FactSheet`].
///
/// # Errors
/// Returns an error if:
/// - the file kind is not a script (markup is rule-engine only)
/// - `tree-sitter` returns `None` or the tree contains syntax errors
///
/// Note: the tree-sitter `Tree` is NOT retained; only the extracted facts are.
pub fn parse_source(path: &Path, source: &[u8], kind: LanguageKind) -> Result<FactSheet> {
    let language =
        grammar_for(kind).ok_or_else(|| anyhow!("not a script file: {}", path.display()))?;

    let tree = match kind {
        LanguageKind::TypeScript => PARSER_TS.with(|p| p.borrow_mut().parse(source, None)),
        LanguageKind::Tsx => PARSER_TSX.with(|p| p.borrow_mut().parse(source, None)),
        LanguageKind::JavaScript => PARSER_JS.with(|p| p.borrow_mut().parse(source, None)),
        LanguageKind::Markup => None,
    };
    let tree = tree.ok_or_else(|| anyhow!("tree-sitter returned None for {:?}", path))?;

    if tree.root_node().has_error() {
        let at = first_error_line(tree.root_node()).unwrap_or(0);
        bail!("syntax error in {} near line {at}", path.display());
    }

    let decls = extract_declarations(&tree, source);
    let imports = extract_imports(&tree, source, kind, &language);
    let exports = extract_exports(&tree, source, kind, &language);

    let mut sheet = FactSheet {
        path: path.to_path_buf(),
        language: kind,
        line_count: count_lines(source),
        parse_failed: false,
        declarations: decls.declarations,
        classes: decls.classes,
        calls: decls.calls,
        imports,
        exports,
        bindings: decls.bindings,
        functions: decls.functions,
    };
    reconcile_exports(&mut sheet);
    Ok(sheet)
}

/// Read and parse a file. Never fails: unreadable or unparseable files degrade to an
/// empty sheet so the whole-project query keeps going.
pub fn extract_file(path: &Path) -> FactSheet {
    let kind = LanguageKind::from_path(path).unwrap_or(LanguageKind::JavaScript);

    let source = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("skipping unreadable file {}: {err}", path.display());
            return FactSheet::empty(path.to_path_buf(), kind, 0);
        }
    };

    match parse_source(path, &source, kind) {
        Ok(sheet) => sheet,
        Err(err) => {
            debug!("parse failure: {err:#}");
            FactSheet::empty(path.to_path_buf(), kind, count_lines(&source))
        }
    }
}

/// Number of lines, counting a final line without trailing newline.
pub fn count_lines(source: &[u8]) -> usize {
    if source.is_empty() {
        return 0;
    }
    let newlines = source.iter().filter(|&&b| b == b'\n').count();
    if source.ends_with(b"\n") {
        newlines
    } else {
        newlines + 1
    }
}

/// Mark declarations exported through a separate `export { x }`, `export default x`,
/// or CommonJS assignment, then propagate the class flag to its methods.
fn reconcile_exports(sheet: &mut FactSheet) {
    let exported_locals: Vec<String> = sheet
        .exports
        .iter()
        .filter(|e| e.kind != ExportKind::ReExport)
        .map(|e| e.local.clone())
        .collect();

    for decl in sheet.declarations.iter_mut() {
        if decl.owner.is_none() && exported_locals.contains(&decl.name) {
            decl.exported = true;
        }
    }

    let exported_classes: Vec<String> = sheet
        .declarations
        .iter()
        .filter(|d| d.kind == DeclarationKind::Class && d.exported)
        .map(|d| d.name.clone())
        .collect();

    for decl in sheet.declarations.iter_mut() {
        if decl.kind == DeclarationKind::Method
            && let Some(owner) = &decl.owner
            && exported_classes.contains(owner)
        {
            decl.exported = true;
        }
    }
}

fn first_error_line(node: tree_sitter::Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row + 1);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error()
            && let Some(line) = first_error_line(child)
        {
            return Some(line);
        }
    }
    None
}
