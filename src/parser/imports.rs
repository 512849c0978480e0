use std::sync::OnceLock;

use tree_sitter::{Language, Node, Query, QueryCursor, StreamingIterator, Tree};

use super::facts::{
    DEFAULT_EXPORT, ExportBinding, ExportKind, ImportBinding, ImportKind, NAMESPACE_IMPORT,
};
use super::languages::{GRAMMAR_COUNT, grammar_slot};
use crate::language::LanguageKind;

// ---------------------------------------------------------------------------
// Query strings
// ---------------------------------------------------------------------------

/// ESM static imports: `import { X } from 'm'`, `import X from 'm'`, `import * as X from 'm'`.
const IMPORT_QUERY: &str = r#"
    (import_statement
      source: (string (string_fragment) @module_path)) @import
"#;

/// CJS require calls.
/// Note: we do not use #eq? predicate here because tree-sitter 0.26 StreamingIterator
/// does not auto-filter custom predicates. We filter for "require" in code instead.
const REQUIRE_QUERY: &str = r#"
    (call_expression
      function: (identifier) @fn
      arguments: (arguments (string (string_fragment) @module_path))) @call
"#;

/// Dynamic `import()` calls.
const DYNAMIC_IMPORT_QUERY: &str = r#"
    (call_expression
      function: (import)
      arguments: (arguments (string (string_fragment) @module_path))) @dynamic_import
"#;

const EXPORT_QUERY: &str = r#"
    (export_statement) @export_stmt
"#;

/// CommonJS export assignments: `module.exports = ...`, `exports.x = ...`.
const CJS_EXPORT_QUERY: &str = r#"
    (assignment_expression
      left: (member_expression) @target
      right: (_) @value) @assign
"#;

// ---------------------------------------------------------------------------
// Query cache
// ---------------------------------------------------------------------------

/// Compiled queries for one grammar. A query is bound to the grammar it was built for.
struct ModuleQueries {
    import: Query,
    require: Query,
    dynamic_import: Query,
    export: Query,
    cjs_export: Query,
}

static QUERIES: [OnceLock<ModuleQueries>; GRAMMAR_COUNT] =
    [OnceLock::new(), OnceLock::new(), OnceLock::new()];

fn queries(kind: LanguageKind, language: &Language) -> Option<&'static ModuleQueries> {
    let slot = grammar_slot(kind)?;
    Some(QUERIES[slot].get_or_init(|| ModuleQueries {
        import: Query::new(language, IMPORT_QUERY).expect("invalid import query"),
        require: Query::new(language, REQUIRE_QUERY).expect("invalid require query"),
        dynamic_import: Query::new(language, DYNAMIC_IMPORT_QUERY)
            .expect("invalid dynamic import query"),
        export: Query::new(language, EXPORT_QUERY).expect("invalid export query"),
        cjs_export: Query::new(language, CJS_EXPORT_QUERY).expect("invalid cjs export query"),
    }))
}

// ---------------------------------------------------------------------------
// Helper utilities
// ---------------------------------------------------------------------------

fn node_text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

fn line_of(node: Node) -> usize {
    node.start_position().row + 1
}

/// Find the first direct child of `node` with the given kind.
fn find_child_of_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

fn has_token(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| !c.is_named() && c.kind() == token);
    found
}

fn binding(imported: &str, local: &str, source: &str, kind: ImportKind, line: usize) -> ImportBinding {
    ImportBinding {
        imported: imported.to_owned(),
        local: local.to_owned(),
        source: source.to_owned(),
        kind,
        line,
    }
}

// ---------------------------------------------------------------------------
// Import extraction
// ---------------------------------------------------------------------------

/// Extract every import binding (ESM, require, dynamic import, re-export source).
///
/// One binding per imported name. Default imports use the name `"default"`; namespace,
/// bare `require`, and dynamic imports use `"*"`.
pub fn extract_imports(
    tree: &Tree,
    source: &[u8],
    kind: LanguageKind,
    language: &Language,
) -> Vec<ImportBinding> {
    let Some(queries) = queries(kind, language) else {
        return Vec::new();
    };
    let mut imports = Vec::new();

    // --- ESM static imports ---
    {
        let query = &queries.import;
        let module_path_idx = query.capture_index_for_name("module_path");
        let import_idx = query.capture_index_for_name("import");

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, tree.root_node(), source);

        while let Some(m) = matches.next() {
            let mut import_node: Option<Node> = None;
            let mut module_path: Option<&str> = None;

            for capture in m.captures {
                if Some(capture.index) == import_idx {
                    import_node = Some(capture.node);
                } else if Some(capture.index) == module_path_idx {
                    module_path = Some(node_text(capture.node, source));
                }
            }

            if let (Some(node), Some(path)) = (import_node, module_path) {
                extract_esm_bindings(node, path, source, &mut imports);
            }
        }
    }

    // --- CJS require() calls ---
    {
        let query = &queries.require;
        let module_path_idx = query.capture_index_for_name("module_path");
        let fn_idx = query.capture_index_for_name("fn");
        let call_idx = query.capture_index_for_name("call");

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, tree.root_node(), source);

        while let Some(m) = matches.next() {
            let mut module_path: Option<&str> = None;
            let mut call_node: Option<Node> = None;
            let mut fn_name: Option<&str> = None;

            for capture in m.captures {
                if Some(capture.index) == module_path_idx {
                    module_path = Some(node_text(capture.node, source));
                } else if Some(capture.index) == fn_idx {
                    fn_name = Some(node_text(capture.node, source));
                } else if Some(capture.index) == call_idx {
                    call_node = Some(capture.node);
                }
            }

            // Only process calls to `require(...)`, not arbitrary identifier calls.
            if fn_name != Some("require") {
                continue;
            }
            if let (Some(call), Some(path)) = (call_node, module_path) {
                extract_require_bindings(call, path, source, &mut imports);
            }
        }
    }

    // --- Dynamic import() calls ---
    {
        let query = &queries.dynamic_import;
        let module_path_idx = query.capture_index_for_name("module_path");

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, tree.root_node(), source);

        while let Some(m) = matches.next() {
            for capture in m.captures {
                if Some(capture.index) == module_path_idx {
                    imports.push(binding(
                        NAMESPACE_IMPORT,
                        NAMESPACE_IMPORT,
                        node_text(capture.node, source),
                        ImportKind::Dynamic,
                        line_of(capture.node),
                    ));
                }
            }
        }
    }

    // --- Re-export sources ---
    {
        let query = &queries.export;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, tree.root_node(), source);

        while let Some(m) = matches.next() {
            for capture in m.captures {
                extract_reexport_bindings(capture.node, source, &mut imports);
            }
        }
    }

    imports.sort_by_key(|b| b.line);
    imports
}

/// Extract the bindings of one `import_statement`.
///
/// Handles:
/// - Named: `import { useState, useEffect as UE } from 'react'`
/// - Default: `import React from 'react'`
/// - Namespace: `import * as path from 'path'`
/// - Combined: `import React, { useState } from 'react'`
fn extract_esm_bindings(node: Node, module: &str, source: &[u8], out: &mut Vec<ImportBinding>) {
    let line = line_of(node);
    let Some(clause) = find_child_of_kind(node, "import_clause") else {
        // Side-effect import: no bindings.
        return;
    };

    let mut cursor = clause.walk();
    for child in clause.children(&mut cursor) {
        match child.kind() {
            "identifier" => {
                let local = node_text(child, source);
                out.push(binding(DEFAULT_EXPORT, local, module, ImportKind::Esm, line));
            }
            "namespace_import" => {
                // The identifier has no field name; find it by kind.
                if let Some(ident) = find_child_of_kind(child, "identifier") {
                    let local = node_text(ident, source);
                    out.push(binding(NAMESPACE_IMPORT, local, module, ImportKind::Esm, line));
                }
            }
            "named_imports" => {
                let mut inner = child.walk();
                for spec in child.children(&mut inner) {
                    if spec.kind() != "import_specifier" {
                        continue;
                    }
                    // In `import { foo as bar }`: name="foo", alias="bar".
                    let Some(name) = spec.child_by_field_name("name") else {
                        continue;
                    };
                    let imported = node_text(name, source);
                    let local = spec
                        .child_by_field_name("alias")
                        .map(|a| node_text(a, source))
                        .unwrap_or(imported);
                    out.push(binding(imported, local, module, ImportKind::Esm, line));
                }
            }
            _ => {}
        }
    }
}

/// Extract the bindings of one `require('m')` call from its surrounding expression.
///
/// - `const m = require('m')`          -> `*` bound to `m`
/// - `const { a, b: c } = require('m')` -> `a`, `b` (bound to `c`)
/// - `const x = require('m').foo`       -> `foo` bound to `x`
/// - anything else                      -> `*`
fn extract_require_bindings(call: Node, module: &str, source: &[u8], out: &mut Vec<ImportBinding>) {
    let line = line_of(call);
    let parent = call.parent();

    // `require('m').foo`
    if let Some(member) = parent
        && member.kind() == "member_expression"
        && let Some(property) = member.child_by_field_name("property")
    {
        let imported = node_text(property, source);
        let local = member
            .parent()
            .filter(|p| p.kind() == "variable_declarator")
            .and_then(|d| d.child_by_field_name("name"))
            .filter(|n| n.kind() == "identifier")
            .map(|n| node_text(n, source))
            .unwrap_or(imported);
        out.push(binding(imported, local, module, ImportKind::Require, line));
        return;
    }

    if let Some(declarator) = parent
        && declarator.kind() == "variable_declarator"
        && let Some(name) = declarator.child_by_field_name("name")
    {
        match name.kind() {
            "identifier" => {
                let local = node_text(name, source);
                out.push(binding(NAMESPACE_IMPORT, local, module, ImportKind::Require, line));
                return;
            }
            "object_pattern" => {
                let mut cursor = name.walk();
                for prop in name.named_children(&mut cursor) {
                    match prop.kind() {
                        "shorthand_property_identifier_pattern" => {
                            let n = node_text(prop, source);
                            out.push(binding(n, n, module, ImportKind::Require, line));
                        }
                        "pair_pattern" => {
                            let key = prop.child_by_field_name("key").map(|k| node_text(k, source));
                            let value = prop
                                .child_by_field_name("value")
                                .map(|v| node_text(v, source));
                            if let Some(key) = key {
                                let local = value.unwrap_or(key);
                                out.push(binding(key, local, module, ImportKind::Require, line));
                            }
                        }
                        "object_assignment_pattern" => {
                            if let Some(left) = prop.child_by_field_name("left") {
                                let n = node_text(left, source);
                                out.push(binding(n, n, module, ImportKind::Require, line));
                            }
                        }
                        _ => {}
                    }
                }
                return;
            }
            _ => {}
        }
    }

    out.push(binding(
        NAMESPACE_IMPORT,
        NAMESPACE_IMPORT,
        module,
        ImportKind::Require,
        line,
    ));
}

/// Re-exports import from their source: `export { a as b } from 'm'` imports `a`,
/// `export * from 'm'` and `export * as ns from 'm'` import `*`.
fn extract_reexport_bindings(node: Node, source: &[u8], out: &mut Vec<ImportBinding>) {
    let Some(module) = export_source(node, source) else {
        return;
    };
    let line = line_of(node);

    if let Some(clause) = find_child_of_kind(node, "export_clause") {
        let mut cursor = clause.walk();
        for spec in clause.named_children(&mut cursor) {
            if spec.kind() != "export_specifier" {
                continue;
            }
            if let Some(name) = spec.child_by_field_name("name") {
                let imported = node_text(name, source);
                let local = spec
                    .child_by_field_name("alias")
                    .map(|a| node_text(a, source))
                    .unwrap_or(imported);
                out.push(binding(imported, local, module, ImportKind::ReExport, line));
            }
        }
        return;
    }

    out.push(binding(
        NAMESPACE_IMPORT,
        NAMESPACE_IMPORT,
        module,
        ImportKind::ReExport,
        line,
    ));
}

/// The module specifier of a re-export. `export { X } from './utils'` -> `./utils`.
fn export_source<'a>(node: Node, source: &'a [u8]) -> Option<&'a str> {
    let string = node.child_by_field_name("source")?;
    // The string's first named child is string_fragment.
    string.named_child(0).map(|frag| node_text(frag, source))
}

// ---------------------------------------------------------------------------
// Export extraction
// ---------------------------------------------------------------------------

/// Extract every name the file exports, ESM and CommonJS.
pub fn extract_exports(
    tree: &Tree,
    source: &[u8],
    kind: LanguageKind,
    language: &Language,
) -> Vec<ExportBinding> {
    let Some(queries) = queries(kind, language) else {
        return Vec::new();
    };
    let mut exports = Vec::new();

    {
        let query = &queries.export;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, tree.root_node(), source);
        while let Some(m) = matches.next() {
            for capture in m.captures {
                classify_export(capture.node, source, &mut exports);
            }
        }
    }

    {
        let query = &queries.cjs_export;
        let target_idx = query.capture_index_for_name("target");
        let value_idx = query.capture_index_for_name("value");

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, tree.root_node(), source);
        while let Some(m) = matches.next() {
            let mut target: Option<Node> = None;
            let mut value: Option<Node> = None;
            for capture in m.captures {
                if Some(capture.index) == target_idx {
                    target = Some(capture.node);
                } else if Some(capture.index) == value_idx {
                    value = Some(capture.node);
                }
            }
            if let (Some(target), Some(value)) = (target, value) {
                classify_cjs_export(target, value, source, &mut exports);
            }
        }
    }

    exports.sort_by_key(|e| e.line);
    exports
}

fn push_export(out: &mut Vec<ExportBinding>, name: &str, local: &str, line: usize, kind: ExportKind) {
    out.push(ExportBinding {
        name: name.to_owned(),
        local: local.to_owned(),
        line,
        kind,
    });
}

/// Classify a single `export_statement` node into the names it exports.
fn classify_export(node: Node, source: &[u8], out: &mut Vec<ExportBinding>) {
    let line = line_of(node);
    let reexport = export_source(node, source).is_some();

    if let Some(clause) = find_child_of_kind(node, "export_clause") {
        let mut cursor = clause.walk();
        for spec in clause.named_children(&mut cursor) {
            if spec.kind() != "export_specifier" {
                continue;
            }
            let Some(name) = spec.child_by_field_name("name") else {
                continue;
            };
            let local = node_text(name, source);
            let exported = spec
                .child_by_field_name("alias")
                .map(|a| node_text(a, source))
                .unwrap_or(local);
            let kind = if reexport {
                ExportKind::ReExport
            } else if exported == DEFAULT_EXPORT {
                ExportKind::Default
            } else {
                ExportKind::Named
            };
            push_export(out, exported, local, line, kind);
        }
        return;
    }

    // `export * as ns from './m'`
    if let Some(ns) = find_child_of_kind(node, "namespace_export") {
        if let Some(ident) = ns.named_child(0) {
            let name = node_text(ident, source);
            push_export(out, name, name, line, ExportKind::ReExport);
        }
        return;
    }

    // `export * from './m'` exports nothing of its own.
    if reexport {
        return;
    }

    if has_token(node, "default") {
        let local = node
            .child_by_field_name("declaration")
            .or_else(|| node.child_by_field_name("value"))
            .and_then(|d| match d.kind() {
                "identifier" => Some(node_text(d, source)),
                _ => d.child_by_field_name("name").map(|n| node_text(n, source)),
            })
            .unwrap_or(DEFAULT_EXPORT);
        push_export(out, DEFAULT_EXPORT, local, line, ExportKind::Default);
        return;
    }

    let Some(declaration) = node.child_by_field_name("declaration") else {
        return;
    };
    match declaration.kind() {
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = declaration.walk();
            for declarator in declaration.named_children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                let Some(name) = declarator.child_by_field_name("name") else {
                    continue;
                };
                let mut names = Vec::new();
                pattern_names(name, source, &mut names);
                for n in names {
                    push_export(out, n, n, line, ExportKind::Named);
                }
            }
        }
        _ => {
            // function, class, interface, type alias, enum, namespace
            if let Some(name) = declaration.child_by_field_name("name") {
                let n = node_text(name, source);
                push_export(out, n, n, line, ExportKind::Named);
            }
        }
    }
}

/// `exports.x = ...` / `module.exports.x = ...` export `x`;
/// `module.exports = { a, b }` exports `a` and `b`; any other `module.exports = X` is a default.
fn classify_cjs_export(target: Node, value: Node, source: &[u8], out: &mut Vec<ExportBinding>) {
    let line = line_of(target);
    let text = node_text(target, source);

    if text == "module.exports" {
        if value.kind() == "object" {
            let mut cursor = value.walk();
            for prop in value.named_children(&mut cursor) {
                match prop.kind() {
                    "shorthand_property_identifier" => {
                        let n = node_text(prop, source);
                        push_export(out, n, n, line, ExportKind::CommonJs);
                    }
                    "pair" | "method_definition" => {
                        let key = prop
                            .child_by_field_name("key")
                            .or_else(|| prop.child_by_field_name("name"));
                        if let Some(key) = key {
                            let name = node_text(key, source);
                            let local = prop
                                .child_by_field_name("value")
                                .filter(|v| v.kind() == "identifier")
                                .map(|v| node_text(v, source))
                                .unwrap_or(name);
                            push_export(out, name, local, line, ExportKind::CommonJs);
                        }
                    }
                    _ => {}
                }
            }
        } else {
            let local = if value.kind() == "identifier" {
                node_text(value, source)
            } else {
                DEFAULT_EXPORT
            };
            push_export(out, DEFAULT_EXPORT, local, line, ExportKind::CommonJs);
        }
        return;
    }

    let Some(object) = target.child_by_field_name("object") else {
        return;
    };
    let object_text = node_text(object, source);
    if object_text == "exports" || object_text == "module.exports" {
        if let Some(property) = target.child_by_field_name("property") {
            let name = node_text(property, source);
            let local = if value.kind() == "identifier" {
                node_text(value, source)
            } else {
                name
            };
            push_export(out, name, local, line, ExportKind::CommonJs);
        }
    }
}

fn pattern_names<'a>(node: Node, source: &'a [u8], out: &mut Vec<&'a str>) {
    match node.kind() {
        "identifier" | "shorthand_property_identifier_pattern" => out.push(node_text(node, source)),
        "pair_pattern" => {
            if let Some(v) = node.child_by_field_name("value") {
                pattern_names(v, source, out);
            }
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                pattern_names(child, source, out);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
