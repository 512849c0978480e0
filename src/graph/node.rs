use std::path::PathBuf;

use serde::Serialize;

/// The kind of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A class declaration.
    Class,
    /// A function declaration or top-level const arrow/function expression.
    Function,
}

/// A class or function in the symbol graph, addressed by its legend code.
#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub code: String,
    pub name: String,
    pub kind: NodeKind,
    /// File of the first declaration carrying this name.
    pub file: PathBuf,
    pub line: usize,
    pub exported: bool,
    /// Method codes (classes only), in declaration order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
    /// Plain property names (classes only).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<String>,
    /// Code of the parent class when it is a known node, else its name as written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl GraphNode {
    pub fn is_class(&self) -> bool {
        self.kind == NodeKind::Class
    }
}

/// One location of a method name that several classes declare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateSite {
    pub owner: String,
    pub file: PathBuf,
    pub line: usize,
}
