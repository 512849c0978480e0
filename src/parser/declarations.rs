use std::collections::{BTreeSet, HashSet};

use tree_sitter::{Node, Tree};

use super::facts::{
    CallSite, ClassInfo, Declaration, DeclarationKind, FunctionFacts, FunctionKind, LocalBinding,
};
use super::syntax::SyntaxKind;

/// Declarations, call sites, local bindings, and per-function body facts of one file.
#[derive(Debug, Default)]
pub struct DeclarationFacts {
    pub declarations: Vec<Declaration>,
    pub classes: Vec<ClassInfo>,
    pub calls: Vec<CallSite>,
    pub bindings: Vec<LocalBinding>,
    pub functions: Vec<FunctionFacts>,
}

/// Walk a syntax tree once and collect declaration-level facts.
///
/// Call sites are normalised into four shapes:
/// - `foo()`              → bare `foo`
/// - `obj.method()`       → `obj.method`
/// - `this.method()`      → `<DeclaringClass>.method`
/// - `this.field.method()`→ `field.method`
///
/// and deduplicated per enclosing declaration.
pub fn extract_declarations(tree: &Tree, source: &[u8]) -> DeclarationFacts {
    let mut visitor = Visitor {
        source,
        out: DeclarationFacts::default(),
        classes: Vec::new(),
        callers: Vec::new(),
        frames: Vec::new(),
        seen_calls: HashSet::new(),
    };
    visitor.visit(tree.root_node());
    visitor.out
}

fn node_text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

fn line_of(node: Node) -> usize {
    node.start_position().row + 1
}

/// The class currently being visited.
struct ClassFrame {
    name: String,
    extends: Option<String>,
    exported: bool,
    index: usize,
}

struct Visitor<'a> {
    source: &'a [u8],
    out: DeclarationFacts,
    classes: Vec<ClassFrame>,
    /// Keys of the enclosing declarations; calls attribute to the innermost.
    callers: Vec<String>,
    /// Indices into `out.functions`; flow tokens and call keys go to the innermost.
    frames: Vec<usize>,
    seen_calls: HashSet<(Option<String>, String)>,
}

impl<'a> Visitor<'a> {
    fn visit(&mut self, node: Node) {
        let kind = SyntaxKind::of(node);

        if let Some(token) = kind.flow_token(node)
            && let Some(&frame) = self.frames.last()
        {
            self.out.functions[frame].structure.push(token);
        }

        match kind {
            SyntaxKind::FunctionDeclaration => self.visit_function_declaration(node),
            // `export default function () {}` / `export default () => {}`
            SyntaxKind::FunctionExpression | SyntaxKind::ArrowFunction if is_export_child(node) => {
                self.visit_function_declaration(node)
            }
            SyntaxKind::FunctionExpression | SyntaxKind::ArrowFunction => {
                // Named through a declarator, field, or pair elsewhere; reaching it here
                // means it is a callback or an IIFE.
                let own_name = node
                    .child_by_field_name("name")
                    .map(|n| node_text(n, self.source).to_owned());
                self.visit_function_body(node, own_name, None);
            }
            SyntaxKind::MethodDefinition => self.visit_method(node),
            SyntaxKind::ClassDeclaration => self.visit_class(node, None),
            SyntaxKind::FieldDefinition => self.visit_field(node),
            SyntaxKind::VariableDeclarator => self.visit_declarator(node),
            SyntaxKind::CallExpression => {
                if let Some(function) = node.child_by_field_name("function") {
                    self.record_call(function, line_of(node));
                }
                self.visit_children(node);
            }
            SyntaxKind::NewExpression => {
                if let Some(constructor) = node.child_by_field_name("constructor") {
                    self.record_call(constructor, line_of(node));
                }
                self.visit_children(node);
            }
            SyntaxKind::Program
            | SyntaxKind::ClassBody
            | SyntaxKind::MemberExpression
            | SyntaxKind::AssignmentExpression
            | SyntaxKind::ImportStatement
            | SyntaxKind::ExportStatement
            | SyntaxKind::StatementBlock
            | SyntaxKind::Comment
            | SyntaxKind::If
            | SyntaxKind::Else
            | SyntaxKind::For
            | SyntaxKind::ForIn
            | SyntaxKind::While
            | SyntaxKind::DoWhile
            | SyntaxKind::Switch
            | SyntaxKind::SwitchCase
            | SyntaxKind::SwitchDefault
            | SyntaxKind::Try
            | SyntaxKind::Catch
            | SyntaxKind::Ternary
            | SyntaxKind::Binary
            | SyntaxKind::Return
            | SyntaxKind::Throw
            | SyntaxKind::Await
            | SyntaxKind::Other => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child);
        }
    }

    // -----------------------------------------------------------------------
    // Functions
    // -----------------------------------------------------------------------

    fn visit_function_declaration(&mut self, node: Node) {
        let name = node
            .child_by_field_name("name")
            .map(|n| node_text(n, self.source).to_owned())
            .unwrap_or_else(|| "default".to_owned());

        self.out.declarations.push(Declaration {
            name: name.clone(),
            kind: DeclarationKind::Function,
            owner: None,
            line: line_of(node),
            exported: is_export_child(node),
            documented: has_doc_comment(export_wrapper(node), self.source),
        });

        self.callers.push(name.clone());
        self.visit_function_body(node, Some(name), None);
        self.callers.pop();
    }

    /// Open a metrics frame for `node` (block bodies only) and visit its parameters and body.
    fn visit_function_body(&mut self, node: Node, name: Option<String>, owner: Option<String>) {
        let kind = match SyntaxKind::of(node) {
            SyntaxKind::FunctionDeclaration => FunctionKind::Declaration,
            SyntaxKind::MethodDefinition => FunctionKind::Method,
            SyntaxKind::ArrowFunction => FunctionKind::Arrow,
            _ => FunctionKind::Expression,
        };

        let body = node.child_by_field_name("body");
        let has_block = body
            .map(|b| SyntaxKind::of(b) == SyntaxKind::StatementBlock)
            .unwrap_or(false);

        if has_block {
            let frame = FunctionFacts {
                name,
                owner,
                kind,
                line: line_of(node),
                end_line: node.end_position().row + 1,
                params: parameter_names(node, self.source),
                is_async: is_async(node),
                structure: Vec::new(),
                calls: BTreeSet::new(),
            };
            self.out.functions.push(frame);
            self.frames.push(self.out.functions.len() - 1);
        }

        if let Some(params) = node
            .child_by_field_name("parameters")
            .or_else(|| node.child_by_field_name("parameter"))
        {
            self.visit(params);
        }
        if let Some(body) = body {
            self.visit(body);
        }

        if has_block {
            self.frames.pop();
        }
    }

    fn visit_method(&mut self, node: Node) {
        let name = node
            .child_by_field_name("name")
            .map(|n| node_text(n, self.source).to_owned())
            .unwrap_or_default();

        let in_class = node
            .parent()
            .map(|p| SyntaxKind::of(p) == SyntaxKind::ClassBody)
            .unwrap_or(false);

        match self.classes.last() {
            Some(class) if in_class => {
                let owner = class.name.clone();
                let exported = class.exported;
                let index = class.index;
                self.out.classes[index].methods.push((name.clone(), line_of(node)));
                let decl = Declaration {
                    name: name.clone(),
                    kind: DeclarationKind::Method,
                    owner: Some(owner.clone()),
                    line: line_of(node),
                    exported,
                    documented: has_doc_comment(node, self.source),
                };
                self.callers.push(decl.key());
                self.out.declarations.push(decl);
                self.visit_function_body(node, Some(name), Some(owner));
                self.callers.pop();
            }
            // Object-literal method: measured, but not a declaration.
            _ => self.visit_function_body(node, Some(name), None),
        }
    }

    // -----------------------------------------------------------------------
    // Classes
    // -----------------------------------------------------------------------

    fn visit_class(&mut self, node: Node, binding_name: Option<String>) {
        let name = node
            .child_by_field_name("name")
            .map(|n| node_text(n, self.source).to_owned())
            .or(binding_name)
            .or_else(|| is_export_child(node).then(|| "default".to_owned()));

        let Some(name) = name else {
            self.visit_children(node);
            return;
        };

        let extends = class_parent(node, self.source);
        let exported = is_export_child(node);

        self.out.declarations.push(Declaration {
            name: name.clone(),
            kind: DeclarationKind::Class,
            owner: None,
            line: line_of(node),
            exported,
            documented: has_doc_comment(export_wrapper(node), self.source),
        });
        self.out.classes.push(ClassInfo {
            name: name.clone(),
            line: line_of(node),
            extends: extends.clone(),
            methods: Vec::new(),
            properties: Vec::new(),
        });

        self.classes.push(ClassFrame {
            name,
            extends,
            exported,
            index: self.out.classes.len() - 1,
        });
        if let Some(body) = node.child_by_field_name("body") {
            self.visit(body);
        }
        self.classes.pop();
    }

    /// Class field: arrow/function-valued fields are methods, everything else a property.
    fn visit_field(&mut self, node: Node) {
        let name_node = node
            .child_by_field_name("property")
            .or_else(|| node.child_by_field_name("name"));
        let name = name_node
            .map(|n| node_text(n, self.source).to_owned())
            .unwrap_or_default();
        let value = node.child_by_field_name("value");

        let Some(class) = self.classes.last() else {
            self.visit_children(node);
            return;
        };
        let owner = class.name.clone();
        let exported = class.exported;
        let index = class.index;

        match value {
            Some(v) if is_function_value(v) => {
                self.out.classes[index].methods.push((name.clone(), line_of(node)));
                let decl = Declaration {
                    name: name.clone(),
                    kind: DeclarationKind::Method,
                    owner: Some(owner.clone()),
                    line: line_of(node),
                    exported,
                    documented: has_doc_comment(node, self.source),
                };
                self.callers.push(decl.key());
                self.out.declarations.push(decl);
                self.visit_function_body(v, Some(name), Some(owner));
                self.callers.pop();
            }
            _ => {
                if !name.is_empty() {
                    self.out.classes[index].properties.push(name);
                }
                if let Some(v) = value {
                    self.visit(v);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Variables
    // -----------------------------------------------------------------------

    fn visit_declarator(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else {
            self.visit_children(node);
            return;
        };
        let value = node.child_by_field_name("value");
        let declaration = node.parent();
        let exported = declaration.map(is_export_child).unwrap_or(false);
        let top_level = declaration
            .and_then(|d| d.parent())
            .map(|p| matches!(SyntaxKind::of(p), SyntaxKind::Program | SyntaxKind::ExportStatement))
            .unwrap_or(false);

        if name_node.kind() == "identifier" {
            let name = node_text(name_node, self.source).to_owned();

            if let Some(v) = value
                && is_function_value(v)
            {
                if top_level {
                    let documented = declaration
                        .map(|d| has_doc_comment(export_wrapper(d), self.source))
                        .unwrap_or(false);
                    self.out.declarations.push(Declaration {
                        name: name.clone(),
                        kind: DeclarationKind::Function,
                        owner: None,
                        line: line_of(node),
                        exported,
                        documented,
                    });
                    self.callers.push(name.clone());
                    self.visit_function_body(v, Some(name), None);
                    self.callers.pop();
                } else {
                    self.visit_function_body(v, Some(name), None);
                }
                return;
            }

            if let Some(v) = value
                && SyntaxKind::of(v) == SyntaxKind::ClassDeclaration
            {
                self.visit_class(v, Some(name));
                return;
            }

            if !exported {
                self.out.bindings.push(LocalBinding {
                    name,
                    line: line_of(node),
                });
            }
        } else if !exported {
            let mut names = Vec::new();
            pattern_identifiers(name_node, self.source, &mut names);
            for name in names {
                self.out.bindings.push(LocalBinding {
                    name,
                    line: line_of(node),
                });
            }
        }

        if let Some(v) = value {
            self.visit(v);
        }
    }

    // -----------------------------------------------------------------------
    // Calls
    // -----------------------------------------------------------------------

    /// Normalise the callee expression of a call or `new` and record it.
    fn record_call(&mut self, callee: Node, line: usize) {
        let (name, qualifier) = match callee.kind() {
            "identifier" => (node_text(callee, self.source).to_owned(), None),
            "member_expression" => {
                let Some(property) = callee.child_by_field_name("property") else {
                    return;
                };
                let name = node_text(property, self.source).to_owned();
                let qualifier = callee
                    .child_by_field_name("object")
                    .and_then(|object| self.qualifier_of(object));
                (name, qualifier)
            }
            _ => return,
        };
        if name.is_empty() {
            return;
        }

        let site = CallSite {
            caller: self.callers.last().cloned(),
            callee: name,
            qualifier,
            line,
        };
        let key = site.key();

        if let Some(&frame) = self.frames.last() {
            self.out.functions[frame].calls.insert(key.clone());
        }
        if self.seen_calls.insert((site.caller.clone(), key)) {
            self.out.calls.push(site);
        }
    }

    fn qualifier_of(&self, object: Node) -> Option<String> {
        match object.kind() {
            "this" => self.classes.last().map(|c| c.name.clone()),
            "super" => self.classes.last().and_then(|c| c.extends.clone()),
            "identifier" => Some(node_text(object, self.source).to_owned()),
            // `this.field.method()` and `a.b.method()` qualify by the last property.
            "member_expression" => object
                .child_by_field_name("property")
                .map(|p| node_text(p, self.source).to_owned()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Helper utilities
// ---------------------------------------------------------------------------

fn is_function_value(node: Node) -> bool {
    matches!(
        SyntaxKind::of(node),
        SyntaxKind::ArrowFunction | SyntaxKind::FunctionExpression
    )
}

fn is_export_child(node: Node) -> bool {
    node.parent()
        .map(|p| SyntaxKind::of(p) == SyntaxKind::ExportStatement)
        .unwrap_or(false)
}

/// The node whose preceding sibling may hold a doc comment: the export statement when exported.
fn export_wrapper(node: Node) -> Node {
    match node.parent() {
        Some(p) if SyntaxKind::of(p) == SyntaxKind::ExportStatement => p,
        _ => node,
    }
}

/// True when a `/** ... */` comment ends on the line directly above `node` (decorators skipped).
fn has_doc_comment(node: Node, source: &[u8]) -> bool {
    let mut anchor = node;
    let mut prev = node.prev_named_sibling();
    while let Some(p) = prev {
        if p.kind() == "decorator" {
            anchor = p;
            prev = p.prev_named_sibling();
            continue;
        }
        let adjacent = p.end_position().row + 1 >= anchor.start_position().row;
        return SyntaxKind::of(p) == SyntaxKind::Comment
            && node_text(p, source).starts_with("/**")
            && adjacent;
    }
    false
}

fn is_async(node: Node) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == "async");
    found
}

/// The `extends` target of a class: `extends_clause` in TypeScript, a bare expression in JS.
fn class_parent(node: Node, source: &[u8]) -> Option<String> {
    let mut cursor = node.walk();
    let heritage = node
        .children(&mut cursor)
        .find(|c| c.kind() == "class_heritage")?;

    let mut hc = heritage.walk();
    for child in heritage.named_children(&mut hc) {
        if child.kind() == "extends_clause" {
            return child
                .child_by_field_name("value")
                .map(|v| node_text(v, source).to_owned());
        }
        if child.kind() != "implements_clause" {
            return Some(node_text(child, source).to_owned());
        }
    }
    None
}

/// Parameter names in declaration order. Patterns are kept as compact source text.
fn parameter_names(node: Node, source: &[u8]) -> Vec<String> {
    if let Some(single) = node.child_by_field_name("parameter") {
        return vec![node_text(single, source).to_owned()];
    }
    let Some(params) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };

    let mut names = Vec::new();
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        if let Some(name) = parameter_name(param, source) {
            names.push(name);
        }
    }
    names
}

fn parameter_name(param: Node, source: &[u8]) -> Option<String> {
    match param.kind() {
        "comment" | "this" => None,
        "identifier" => Some(node_text(param, source).to_owned()),
        "required_parameter" | "optional_parameter" => param
            .child_by_field_name("pattern")
            .and_then(|p| parameter_name(p, source)),
        "assignment_pattern" => param
            .child_by_field_name("left")
            .and_then(|p| parameter_name(p, source)),
        "rest_pattern" => param
            .named_child(0)
            .and_then(|p| parameter_name(p, source)),
        _ => Some(
            node_text(param, source)
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect(),
        ),
    }
}

/// Collect identifiers bound by a destructuring pattern.
fn pattern_identifiers(node: Node, source: &[u8], out: &mut Vec<String>) {
    match node.kind() {
        "identifier" | "shorthand_property_identifier_pattern" => {
            out.push(node_text(node, source).to_owned());
        }
        "pair_pattern" => {
            if let Some(value) = node.child_by_field_name("value") {
                pattern_identifiers(value, source, out);
            }
        }
        "assignment_pattern" | "object_assignment_pattern" => {
            if let Some(left) = node.child_by_field_name("left") {
                pattern_identifiers(left, source, out);
            }
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                pattern_identifiers(child, source, out);
            }
        }
    }
}
