use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Serialize;

use super::syntax::FlowToken;
use crate::language::LanguageKind;

/// The kind of a declared symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    Function,
    Class,
    Method,
}

impl DeclarationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclarationKind::Function => "function",
            DeclarationKind::Class => "class",
            DeclarationKind::Method => "method",
        }
    }
}

/// A declared function, class, or class method. Identity is `(file, line, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclarationKind,
    /// Owning class for methods.
    pub owner: Option<String>,
    /// 1-based line of the declaration.
    pub line: usize,
    /// Explicitly exported. Methods inherit the flag of their class.
    pub exported: bool,
    /// A `/** ... */` comment immediately precedes the declaration.
    pub documented: bool,
}

impl Declaration {
    /// Key used to attribute call sites: `name` or `Owner.name` for methods.
    pub fn key(&self) -> String {
        match &self.owner {
            Some(owner) => format!("{owner}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Class shape: methods (including arrow-valued fields), plain properties, parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassInfo {
    pub name: String,
    pub line: usize,
    pub extends: Option<String>,
    /// `(method name, line)` in source order.
    pub methods: Vec<(String, usize)>,
    pub properties: Vec<String>,
}

/// A call site, resolved only by name text.
///
/// `caller` is the enclosing declaration's [`Declaration::key`]; `None` for module-level code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CallSite {
    pub caller: Option<String>,
    pub callee: String,
    pub qualifier: Option<String>,
    pub line: usize,
}

impl CallSite {
    /// Normalised call key: `qualifier.callee` or bare `callee`.
    pub fn key(&self) -> String {
        match &self.qualifier {
            Some(q) => format!("{q}.{}", self.callee),
            None => self.callee.clone(),
        }
    }
}

/// How a binding was imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    /// `import { X } from './m'`
    Esm,
    /// `const X = require('./m')`
    Require,
    /// `import('./m')`
    Dynamic,
    /// `export { X } from './m'` / `export * from './m'`
    ReExport,
}

/// Imported name `"default"` marks a default import; `"*"` a namespace or wildcard import.
pub const DEFAULT_EXPORT: &str = "default";
pub const NAMESPACE_IMPORT: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportBinding {
    /// The name as exported by the source module.
    pub imported: String,
    /// The local name bound in this file.
    pub local: String,
    /// Raw module specifier as written.
    pub source: String,
    pub kind: ImportKind,
    pub line: usize,
}

impl ImportBinding {
    /// Only relative specifiers take part in liveness resolution.
    pub fn is_relative(&self) -> bool {
        self.source.starts_with('.')
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Named,
    Default,
    ReExport,
    CommonJs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportBinding {
    /// The name importers see (`"default"` for default exports).
    pub name: String,
    /// The local name the export refers to (equal to `name` when not renamed).
    pub local: String,
    pub line: usize,
    pub kind: ExportKind,
}

/// A local variable binding, input to the unused-local heuristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalBinding {
    pub name: String,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    Declaration,
    Method,
    Expression,
    /// Arrow function with a block body. Expression-bodied arrows are not recorded.
    Arrow,
}

/// Body-level facts for one function, consumed by the metric scorers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionFacts {
    /// `None` for anonymous callbacks.
    pub name: Option<String>,
    pub owner: Option<String>,
    pub kind: FunctionKind,
    pub line: usize,
    pub end_line: usize,
    pub params: Vec<String>,
    pub is_async: bool,
    /// Ordered control-flow tokens of the body: the structural hash.
    pub structure: Vec<FlowToken>,
    /// Normalised call keys made directly from this body.
    pub calls: BTreeSet<String>,
}

impl FunctionFacts {
    pub fn display_name(&self) -> String {
        match (&self.owner, &self.name) {
            (Some(owner), Some(name)) => format!("{owner}.{name}"),
            (None, Some(name)) => name.clone(),
            (_, None) => "<anonymous>".to_owned(),
        }
    }
}

/// Structured summary of one file's declarations, calls, imports, and exports.
#[derive(Debug, Clone, Serialize)]
pub struct FactSheet {
    pub path: PathBuf,
    pub language: LanguageKind,
    pub line_count: usize,
    /// The file failed to parse; every fact list is empty.
    pub parse_failed: bool,
    pub declarations: Vec<Declaration>,
    pub classes: Vec<ClassInfo>,
    pub calls: Vec<CallSite>,
    pub imports: Vec<ImportBinding>,
    pub exports: Vec<ExportBinding>,
    pub bindings: Vec<LocalBinding>,
    pub functions: Vec<FunctionFacts>,
}

impl FactSheet {
    /// An empty sheet for a file that could not be read or parsed.
    pub fn empty(path: PathBuf, language: LanguageKind, line_count: usize) -> Self {
        Self {
            path,
            language,
            line_count,
            parse_failed: true,
            declarations: Vec::new(),
            classes: Vec::new(),
            calls: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            bindings: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn is_exported(&self, name: &str) -> bool {
        self.exports.iter().any(|e| e.name == name)
    }
}
