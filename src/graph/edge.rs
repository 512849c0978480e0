use serde::Serialize;

/// A directed call edge between legend addresses.
///
/// `from` is a node code, `Owner.method` code pair, or the root-relative path of the file
/// for module-level calls. `to` is a node code or `Owner.method` code pair whose owner is
/// a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallEdge {
    pub from: String,
    pub to: String,
    /// Line of the first call site producing this edge.
    pub line: usize,
}
