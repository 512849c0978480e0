pub mod cache;
pub mod edge;
pub mod legend;
pub mod node;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use crate::error::AtlasError;
use crate::parser::facts::{CallSite, DeclarationKind, FactSheet};
use crate::project::ProjectFacts;

use edge::CallEdge;
use legend::Legend;
use node::{DuplicateSite, GraphNode, NodeKind};

pub use cache::GraphCache;

/// The project-wide symbol graph: legend, class/function nodes, call edges, orphans,
/// and method names shared by several classes.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolGraph {
    pub legend: Legend,
    /// Nodes keyed by legend code.
    pub nodes: BTreeMap<String, GraphNode>,
    /// Edges in call-site order, unique on `(from, to)`.
    pub edges: Vec<CallEdge>,
    /// Codes of non-exported functions nothing calls.
    pub orphans: Vec<String>,
    /// Method name -> every class declaring it, for names declared by ≥2 classes.
    pub duplicates: BTreeMap<String, Vec<DuplicateSite>>,
}

/// A resolved lookup: the addressed symbol plus its direct callers and callees.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolContext {
    /// Code (`US`) or member address (`US.fU`).
    pub address: String,
    /// Full name (`UserService` or `UserService.findUser`).
    pub name: String,
    /// The node itself, or the owning class for a member address.
    pub node: GraphNode,
    pub callers: Vec<String>,
    pub callees: Vec<String>,
}

impl SymbolGraph {
    /// Aggregate fact sheets into one graph. Deterministic for a given sheet order.
    pub fn build(facts: &ProjectFacts) -> Self {
        let sheets = &facts.sheets;

        // Names in file-scan order; the legend keeps the first occurrence.
        let legend = Legend::build(
            sheets
                .iter()
                .flat_map(|s| s.declarations.iter().map(|d| d.name.as_str())),
        );

        let mut nodes: BTreeMap<String, GraphNode> = BTreeMap::new();
        for sheet in sheets {
            let file = facts.relative(&sheet.path).to_path_buf();
            for decl in &sheet.declarations {
                let kind = match decl.kind {
                    DeclarationKind::Function => NodeKind::Function,
                    DeclarationKind::Class => NodeKind::Class,
                    DeclarationKind::Method => continue,
                };
                let Some(code) = legend.code_of(&decl.name) else {
                    continue;
                };
                nodes
                    .entry(code.to_owned())
                    .and_modify(|n| n.exported |= decl.exported)
                    .or_insert_with(|| GraphNode {
                        code: code.to_owned(),
                        name: decl.name.clone(),
                        kind,
                        file: file.clone(),
                        line: decl.line,
                        exported: decl.exported,
                        methods: Vec::new(),
                        properties: Vec::new(),
                        parent: None,
                    });
            }
        }

        for sheet in sheets {
            for class in &sheet.classes {
                let Some(code) = legend.code_of(&class.name) else {
                    continue;
                };
                let parent = class.extends.as_ref().map(|p| {
                    legend
                        .code_of(p)
                        .filter(|c| nodes.contains_key(*c))
                        .map(str::to_owned)
                        .unwrap_or_else(|| p.clone())
                });
                let Some(node) = nodes.get_mut(code) else {
                    continue;
                };
                if node.kind != NodeKind::Class {
                    continue;
                }
                for (method, _) in &class.methods {
                    if let Some(mc) = legend.code_of(method)
                        && !node.methods.iter().any(|m| m == mc)
                    {
                        node.methods.push(mc.to_owned());
                    }
                }
                for prop in &class.properties {
                    if !node.properties.contains(prop) {
                        node.properties.push(prop.clone());
                    }
                }
                if node.parent.is_none() {
                    node.parent = parent;
                }
            }
        }

        let mut graph = SymbolGraph {
            legend,
            nodes,
            edges: Vec::new(),
            orphans: Vec::new(),
            duplicates: BTreeMap::new(),
        };
        graph.edges = graph.collect_edges(facts);
        graph.orphans = graph.find_orphans();
        graph.duplicates = find_duplicates(facts);
        graph
    }

    fn collect_edges(&self, facts: &ProjectFacts) -> Vec<CallEdge> {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut edges = Vec::new();

        for sheet in &facts.sheets {
            for call in &sheet.calls {
                let Some(to) = self.call_target(call) else {
                    continue;
                };
                let from = match &call.caller {
                    Some(caller) => self.address_of_key(caller),
                    None => module_address(facts, sheet),
                };
                if seen.insert((from.clone(), to.clone())) {
                    edges.push(CallEdge {
                        from,
                        to,
                        line: call.line,
                    });
                }
            }
        }
        edges
    }

    /// Resolve a call site to an edge target, or `None` when it leaves the graph.
    fn call_target(&self, call: &CallSite) -> Option<String> {
        match &call.qualifier {
            Some(qualifier) => {
                let owner = self
                    .node_code(qualifier)
                    .or_else(|| self.node_code(&pascal_case(qualifier)))?;
                let member = self
                    .legend
                    .code_of(&call.callee)
                    .unwrap_or(call.callee.as_str());
                Some(format!("{owner}.{member}"))
            }
            None => self.node_code(&call.callee).map(str::to_owned),
        }
    }

    /// Code of the node declaring `name`, if any.
    fn node_code(&self, name: &str) -> Option<&str> {
        self.legend
            .code_of(name)
            .filter(|code| self.nodes.contains_key(*code))
    }

    /// `name` -> `code`, `Owner.name` -> `OwnerCode.nameCode`.
    fn address_of_key(&self, key: &str) -> String {
        let encode = |part: &str| self.legend.code_of(part).unwrap_or(part).to_owned();
        match key.split_once('.') {
            Some((owner, member)) => format!("{}.{}", encode(owner), encode(member)),
            None => encode(key),
        }
    }

    /// Function nodes that are not exported and have no incoming edge.
    fn find_orphans(&self) -> Vec<String> {
        let (graph, index) = self.call_graph();
        self.nodes
            .values()
            .filter(|n| n.kind == NodeKind::Function && !n.exported)
            .filter(|n| {
                index
                    .get(n.code.as_str())
                    .map(|&i| graph.neighbors_directed(i, Direction::Incoming).next().is_none())
                    .unwrap_or(true)
            })
            .map(|n| n.code.clone())
            .collect()
    }

    /// Directed graph over edge endpoints, for neighbourhood queries.
    fn call_graph(&self) -> (DiGraph<&str, usize>, HashMap<&str, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();
        for edge in &self.edges {
            let from = *index
                .entry(edge.from.as_str())
                .or_insert_with(|| graph.add_node(edge.from.as_str()));
            let to = *index
                .entry(edge.to.as_str())
                .or_insert_with(|| graph.add_node(edge.to.as_str()));
            graph.add_edge(from, to, edge.line);
        }
        (graph, index)
    }

    /// Resolve a code, full name, or `Owner.member` (names or codes) to its context.
    ///
    /// # Errors
    /// [`AtlasError::UnknownSymbol`] with up to three close names when nothing matches.
    pub fn lookup(&self, query: &str) -> Result<SymbolContext, AtlasError> {
        let query = query.trim();
        let resolved = match query.split_once('.') {
            Some((owner, member)) => self.resolve_member(owner, member),
            None => self.resolve_node(query).or_else(|| self.resolve_method(query)),
        };

        let Some((address, name, node)) = resolved else {
            return Err(AtlasError::UnknownSymbol {
                query: query.to_owned(),
                suggestions: self.suggest(query),
            });
        };

        let (graph, index) = self.call_graph();
        let neighbours = |direction: Direction| -> Vec<String> {
            let mut out: Vec<String> = index
                .get(address.as_str())
                .map(|&i| {
                    graph
                        .neighbors_directed(i, direction)
                        .map(|n| graph[n].to_owned())
                        .collect()
                })
                .unwrap_or_default();
            out.sort();
            out.dedup();
            out
        };
        let callers = neighbours(Direction::Incoming);
        let callees = neighbours(Direction::Outgoing);

        Ok(SymbolContext {
            address,
            name,
            node,
            callers,
            callees,
        })
    }

    fn resolve_node(&self, query: &str) -> Option<(String, String, GraphNode)> {
        let code = self.legend.resolve(query)?;
        let node = self.nodes.get(code)?;
        Some((code.to_owned(), node.name.clone(), node.clone()))
    }

    fn resolve_member(&self, owner: &str, member: &str) -> Option<(String, String, GraphNode)> {
        let owner_code = self.legend.resolve(owner)?;
        let node = self.nodes.get(owner_code)?;
        let member_code = self.legend.resolve(member)?;
        if !node.methods.iter().any(|m| m == member_code) {
            return None;
        }
        let member_name = self.legend.name_of(member_code)?;
        Some((
            format!("{owner_code}.{member_code}"),
            format!("{}.{member_name}", node.name),
            node.clone(),
        ))
    }

    /// A bare method name or code: the first class (by code) declaring it.
    fn resolve_method(&self, query: &str) -> Option<(String, String, GraphNode)> {
        let member_code = self.legend.resolve(query)?;
        let owner = self
            .nodes
            .values()
            .find(|n| n.methods.iter().any(|m| m == member_code))?;
        self.resolve_member(&owner.code, member_code)
    }

    fn suggest(&self, query: &str) -> Vec<String> {
        suggest_similar_fuzzy(self.legend.entries().map(|(name, _)| name), query)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

fn module_address(facts: &ProjectFacts, sheet: &FactSheet) -> String {
    facts
        .relative(&sheet.path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn pascal_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Method names declared by at least two classes, with every location.
fn find_duplicates(facts: &ProjectFacts) -> BTreeMap<String, Vec<DuplicateSite>> {
    let mut by_name: BTreeMap<String, Vec<DuplicateSite>> = BTreeMap::new();
    for sheet in &facts.sheets {
        let file = facts.relative(&sheet.path).to_path_buf();
        for class in &sheet.classes {
            for (method, line) in &class.methods {
                // `constructor` is shared by construction, not by design.
                if method == "constructor" {
                    continue;
                }
                by_name.entry(method.clone()).or_default().push(DuplicateSite {
                    owner: class.name.clone(),
                    file: file.clone(),
                    line: *line,
                });
            }
        }
    }
    // Distinct owning classes, not sites: a getter/setter pair is one owner.
    by_name.retain(|_, sites| {
        let owners: HashSet<(&str, &Path)> = sites
            .iter()
            .map(|s| (s.owner.as_str(), s.file.as_path()))
            .collect();
        owners.len() >= 2
    });
    by_name
}

// ---------------------------------------------------------------------------
// Fuzzy suggestions
// ---------------------------------------------------------------------------

/// Compute character-level trigrams from a string (lowercased).
/// Returns an empty set for strings shorter than 3 characters.
fn trigrams(s: &str) -> HashSet<[char; 3]> {
    let chars: Vec<char> = s.to_lowercase().chars().collect();
    if chars.len() < 3 {
        return HashSet::new();
    }
    chars.windows(3).map(|w| [w[0], w[1], w[2]]).collect()
}

/// Jaccard similarity between two trigram sets: |A ∩ B| / |A ∪ B|.
fn jaccard_similarity(a: &HashSet<[char; 3]>, b: &HashSet<[char; 3]>) -> f32 {
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f32 / union as f32
}

/// Suggest similar names using trigram Jaccard similarity.
///
/// Returns at most 3 candidates with Jaccard >= 0.3, sorted descending by score.
pub fn suggest_similar_fuzzy<'a>(
    candidates: impl Iterator<Item = &'a str>,
    query: &str,
) -> Vec<String> {
    let query_trigrams = trigrams(query);
    if query_trigrams.is_empty() {
        return Vec::new();
    }

    const THRESHOLD: f32 = 0.3;

    let mut scored: Vec<(String, f32)> = candidates
        .filter_map(|name| {
            let score = jaccard_similarity(&query_trigrams, &trigrams(name));
            (score >= THRESHOLD).then(|| (name.to_owned(), score))
        })
        .collect();

    // Best match first; ties keep candidate order.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.dedup_by(|a, b| a.0 == b.0);
    scored.truncate(3);
    scored.into_iter().map(|(name, _)| name).collect()
}

/// Build a graph straight from a directory, for callers that do not cache.
pub fn build_for_root(root: &Path, config: &crate::config::AtlasConfig) -> anyhow::Result<SymbolGraph> {
    let facts = ProjectFacts::collect(root, config)?;
    Ok(SymbolGraph::build(&facts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::LanguageKind;
    use crate::parser::parse_source;
    use std::path::PathBuf;

    fn project(files: &[(&str, &str)]) -> ProjectFacts {
        let root = PathBuf::from("/proj");
        let sheets = files
            .iter()
            .map(|(name, src)| {
                let path = root.join(name);
                let kind = LanguageKind::from_path(&path).unwrap();
                parse_source(&path, src.as_bytes(), kind).unwrap()
            })
            .collect();
        ProjectFacts::from_sheets(root, sheets)
    }

    const SERVICE: &str = r#"
export class UserService {
  constructor(repo) { this.repo = repo; }
  findUser(id) {
    const user = this.repo.find(id);
    return formatUser(user);
  }
  remove(id) { this.findUser(id); }
}

function formatUser(user) { return user; }
function unusedHelper() {}
"#;

    #[test]
    fn test_nodes_edges_and_legend() {
        let graph = SymbolGraph::build(&project(&[("service.js", SERVICE)]));

        assert_eq!(graph.legend.code_of("UserService"), Some("US"));
        assert_eq!(graph.legend.code_of("findUser"), Some("fU"));
        let class = &graph.nodes["US"];
        assert!(class.is_class());
        assert!(class.exported);
        assert_eq!(class.methods.len(), 3);

        let pairs: Vec<(&str, &str)> = graph
            .edges
            .iter()
            .map(|e| (e.from.as_str(), e.to.as_str()))
            .collect();
        let format_code = graph.legend.code_of("formatUser").unwrap();
        assert!(pairs.contains(&("US.fU", format_code)));
        assert!(pairs.contains(&(graph.legend.code_of("remove").map(|r| format!("US.{r}")).unwrap().as_str(), "US.fU")));

        // `this.repo.find()` qualifies by `repo`, which is not a node: no edge.
        assert!(!pairs.iter().any(|(_, to)| to.ends_with(".find")));
    }

    #[test]
    fn test_every_edge_target_exists() {
        let graph = SymbolGraph::build(&project(&[("service.js", SERVICE)]));
        for edge in &graph.edges {
            let owner = edge.to.split('.').next().unwrap();
            assert!(graph.nodes.contains_key(owner), "dangling edge target {}", edge.to);
        }
    }

    #[test]
    fn test_orphans_drop_once_called() {
        let graph = SymbolGraph::build(&project(&[("service.js", SERVICE)]));
        let helper = graph.legend.code_of("unusedHelper").unwrap().to_owned();
        let format = graph.legend.code_of("formatUser").unwrap().to_owned();
        assert!(graph.orphans.contains(&helper));
        assert!(!graph.orphans.contains(&format));

        let called = format!("{SERVICE}\nunusedHelper();\n");
        let graph = SymbolGraph::build(&project(&[("service.js", &called)]));
        assert!(!graph.orphans.contains(&helper), "module-level call removes the orphan");
    }

    #[test]
    fn test_duplicates_need_two_classes() {
        let graph = SymbolGraph::build(&project(&[
            ("a.ts", "class A { render() {} save() {} }"),
            ("b.ts", "class B { render() {} }"),
        ]));
        let sites = &graph.duplicates["render"];
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].owner, "A");
        assert_eq!(sites[1].owner, "B");
        assert!(!graph.duplicates.contains_key("save"));
    }

    #[test]
    fn test_accessor_pair_in_one_class_is_not_duplicate() {
        let graph = SymbolGraph::build(&project(&[(
            "a.js",
            "class A { get value() { return 1; } set value(v) {} }",
        )]));
        assert!(graph.duplicates.is_empty(), "{:?}", graph.duplicates);

        let graph = SymbolGraph::build(&project(&[
            ("a.js", "class A { get value() { return 1; } set value(v) {} }"),
            ("b.js", "class B { value() {} }"),
        ]));
        let owners: Vec<&str> = graph.duplicates["value"].iter().map(|s| s.owner.as_str()).collect();
        assert_eq!(owners, vec!["A", "A", "B"]);
    }

    #[test]
    fn test_lookup_by_code_name_and_member() {
        let graph = SymbolGraph::build(&project(&[("service.js", SERVICE)]));

        let by_code = graph.lookup("US").unwrap();
        assert_eq!(by_code.name, "UserService");

        let member = graph.lookup("UserService.findUser").unwrap();
        assert_eq!(member.address, "US.fU");
        assert_eq!(member.callers.len(), 1);
        assert_eq!(member.callees, vec![graph.legend.code_of("formatUser").unwrap().to_string()]);

        let bare_method = graph.lookup("findUser").unwrap();
        assert_eq!(bare_method.address, "US.fU");
    }

    #[test]
    fn test_lookup_unknown_suggests() {
        let graph = SymbolGraph::build(&project(&[("service.js", SERVICE)]));
        let err = graph.lookup("formatUsr").unwrap_err();
        match err {
            AtlasError::UnknownSymbol { suggestions, .. } => {
                assert_eq!(suggestions.first().map(String::as_str), Some("formatUser"));
            }
            other => panic!("unexpected error {other}"),
        }
    }
}
