use std::path::{Path, PathBuf};
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{ServerCapabilities, ServerInfo};
use rmcp::{ServerHandler, tool, tool_handler, tool_router};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use super::hints;
use super::params::{
    AddRuleParams, CheckRulesParams, DeleteRuleParams, FindDeadCodeParams, FindSimilarParams,
    GetComplexityParams, GetGraphParams, GetHealthParams, GetLargeFilesParams,
    InvalidateGraphParams, ListRuleSetsParams, LookupSymbolParams, UpdateRuleParams,
};
use crate::config::{AtlasConfig, McpConfig};
use crate::graph::{GraphCache, SymbolGraph, build_for_root};
use crate::health::{Check, aggregate};
use crate::metrics::{
    ComplexityOptions, SimilarityOptions, score_complexity, score_file_sizes, score_similarity,
};
use crate::output;
use crate::query::dead_code::analyze_liveness;
use crate::rules::{PatternKind, Rule, RuleOptions, RulePatch, RuleStore, Severity, check_rules};
use crate::walker::find_project_root;

// ---------------------------------------------------------------------------
// AtlasServer
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AtlasServer {
    default_project_root: Arc<PathBuf>,
    graph_cache: Arc<RwLock<GraphCache>>,
    /// Serializes rule-set writes so concurrent calls cannot interleave load and save.
    rule_writes: Arc<Mutex<()>>,
    mcp_config: McpConfig,
    tool_router: ToolRouter<Self>,
}

impl AtlasServer {
    pub fn new(project_root: PathBuf) -> Self {
        let config = AtlasConfig::load(&project_root);
        Self {
            default_project_root: Arc::new(project_root),
            graph_cache: Arc::new(RwLock::new(GraphCache::new())),
            rule_writes: Arc::new(Mutex::new(())),
            mcp_config: config.mcp,
            tool_router: Self::tool_router(),
        }
    }

    /// Effective project root: the override (or the default), canonicalized, then walked up
    /// to the nearest `package.json` / `.git`.
    fn project_root(&self, project_path_override: Option<&str>) -> Result<PathBuf, String> {
        let path = match project_path_override {
            Some(p) => PathBuf::from(p),
            None => (*self.default_project_root).clone(),
        };
        let path = path
            .canonicalize()
            .map_err(|_| format!("path '{}' does not exist", path.display()))?;
        Ok(find_project_root(&path))
    }

    /// Return the cached graph for the effective root, building it on a miss.
    ///
    ///  1. Fast path: read lock, return the cached graph for this root.
    ///  2. Slow path: write lock, double-check, build on the blocking pool, insert.
    async fn resolve_graph(
        &self,
        project_path_override: Option<&str>,
    ) -> Result<(Arc<SymbolGraph>, PathBuf), String> {
        let root = self.project_root(project_path_override)?;

        {
            let cache = self.graph_cache.read().await;
            if let Some(graph) = cache.get(&root) {
                return Ok((graph, root));
            }
        }

        let mut cache = self.graph_cache.write().await;
        if let Some(graph) = cache.get(&root) {
            return Ok((graph, root));
        }

        let build_root = root.clone();
        let graph = blocking(move || {
            let config = AtlasConfig::load(&build_root);
            build_for_root(&build_root, &config)
        })
        .await?;

        if graph.node_count() == 0 && graph.orphans.is_empty() {
            return Err(format!(
                "No source files found at '{}'. Ensure the directory contains .ts, .tsx, .js or .jsx files.",
                root.display()
            ));
        }
        debug!("graph built for {}: {} nodes", root.display(), graph.node_count());
        Ok((cache.insert(root.clone(), graph), root))
    }
}

/// Run `f` on the blocking pool and flatten join and analysis errors into tool errors.
async fn blocking<T, F>(f: F) -> Result<T, String>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| format!("task join error: {e}"))?
        .map_err(|e| e.to_string())
}

/// Scope directory for a tool call: `path` relative to the root, an absolute path, or the root.
fn scope_path(root: &Path, path: Option<&str>) -> PathBuf {
    match path {
        Some(p) if Path::new(p).is_absolute() => PathBuf::from(p),
        Some(p) => root.join(p),
        None => root.to_path_buf(),
    }
}

/// Return the effective result limit: use the explicit per-call value when present,
/// otherwise fall back to the project config default.
fn resolve_limit(call_limit: Option<usize>, config: &McpConfig) -> usize {
    call_limit.unwrap_or(config.default_limit)
}

/// Prefix `output` with `truncated: shown/total` when the cap cut results.
fn with_summary(output: String, shown: usize, total: usize, config: &McpConfig) -> String {
    if shown < total && !config.suppress_summary_line {
        format!("truncated: {}/{}\n{}", shown, total, output)
    } else {
        output
    }
}

fn parse_severity(s: &str) -> Result<Severity, String> {
    Severity::parse(s).ok_or_else(|| format!("unknown severity '{s}' (use error, warning, or info)"))
}

fn parse_kind(s: &str) -> Result<PatternKind, String> {
    match s.to_ascii_lowercase().as_str() {
        "literal" => Ok(PatternKind::Literal),
        "regex" => Ok(PatternKind::Regex),
        _ => Err(format!("unknown pattern kind '{s}' (use literal or regex)")),
    }
}

#[tool_router]
impl AtlasServer {
    #[tool(
        description = "Compact symbol graph of the project: a legend mapping short codes to names, one line per class/function (file:line, exp=exported, ^parent, m[methods], p[properties]), call edges a>b, orphans, and duplicate method names. Start here, then lookup_symbol on codes."
    )]
    async fn get_graph(&self, Parameters(p): Parameters<GetGraphParams>) -> Result<String, String> {
        let (graph, _root) = self.resolve_graph(p.project_path.as_deref()).await?;
        let output = output::render_graph(&graph, p.max_edges);
        Ok(format!("{}{}", output, hints::graph_hint(graph.orphans.len())))
    }

    #[tool(
        description = "Details for one symbol: location, parent, methods, properties, callers and callees. Accepts a short code from get_graph, a full name, or Owner.member."
    )]
    async fn lookup_symbol(
        &self,
        Parameters(p): Parameters<LookupSymbolParams>,
    ) -> Result<String, String> {
        let (graph, _root) = self.resolve_graph(p.project_path.as_deref()).await?;
        let ctx = graph.lookup(&p.symbol).map_err(|e| e.to_string())?;
        let hint = hints::lookup_hint(&ctx.address, !ctx.callees.is_empty());
        Ok(format!("{}{}", output::render_lookup(&ctx), hint))
    }

    #[tool(
        description = "Find dead code: unused functions, classes, methods, exports nobody imports, and unused locals. Imports are resolved across the whole project; only items under path are reported."
    )]
    async fn find_dead_code(
        &self,
        Parameters(p): Parameters<FindDeadCodeParams>,
    ) -> Result<String, String> {
        let root = self.project_root(p.project_path.as_deref())?;
        let scope = scope_path(&root, p.path.as_deref());
        let limit = resolve_limit(p.limit, &self.mcp_config);
        let result = blocking(move || {
            let config = AtlasConfig::load(&root);
            analyze_liveness(&scope, &config, Some(limit))
        })
        .await?;
        let output = with_summary(
            output::render_dead_code(&result),
            result.items.len(),
            result.total,
            &self.mcp_config,
        );
        Ok(format!("{}{}", output, hints::dead_code_hint(result.total)))
    }

    #[tool(
        description = "Cyclomatic complexity per function, highest first, with low/moderate/high/critical bands."
    )]
    async fn get_complexity(
        &self,
        Parameters(p): Parameters<GetComplexityParams>,
    ) -> Result<String, String> {
        let root = self.project_root(p.project_path.as_deref())?;
        let scope = scope_path(&root, p.path.as_deref());
        let options = ComplexityOptions {
            min_score: p.min_score,
            limit: Some(resolve_limit(p.limit, &self.mcp_config)),
        };
        let result = blocking(move || {
            let config = AtlasConfig::load(&root);
            score_complexity(&scope, &config, &options)
        })
        .await?;
        let output = with_summary(
            output::render_complexity(&result),
            result.items.len(),
            result.total,
            &self.mcp_config,
        );
        let hint = hints::complexity_hint(result.stats.critical, result.stats.high);
        Ok(format!("{}{}", output, hint))
    }

    #[tool(
        description = "Pairs of structurally similar functions (0-100 score from names, parameters, calls, control flow). Candidates for merging."
    )]
    async fn find_similar(
        &self,
        Parameters(p): Parameters<FindSimilarParams>,
    ) -> Result<String, String> {
        let root = self.project_root(p.project_path.as_deref())?;
        let scope = scope_path(&root, p.path.as_deref());
        let options = SimilarityOptions {
            threshold: p.threshold,
            limit: Some(resolve_limit(p.limit, &self.mcp_config)),
        };
        let result = blocking(move || {
            let config = AtlasConfig::load(&root);
            score_similarity(&scope, &config, &options)
        })
        .await?;
        let output = with_summary(
            output::render_similarity(&result),
            result.pairs.len(),
            result.total,
            &self.mcp_config,
        );
        Ok(format!("{}{}", output, hints::similarity_hint(result.total)))
    }

    #[tool(
        description = "Files that are too large by lines, functions, classes, or exports, rated warning or critical."
    )]
    async fn get_large_files(
        &self,
        Parameters(p): Parameters<GetLargeFilesParams>,
    ) -> Result<String, String> {
        let root = self.project_root(p.project_path.as_deref())?;
        let scope = scope_path(&root, p.path.as_deref());
        let limit = resolve_limit(p.limit, &self.mcp_config);
        let result = blocking(move || {
            let config = AtlasConfig::load(&root);
            score_file_sizes(&scope, &config, Some(limit))
        })
        .await?;
        let output = with_summary(
            output::render_file_sizes(&result),
            result.items.len(),
            result.total,
            &self.mcp_config,
        );
        Ok(format!("{}{}", output, hints::large_files_hint(result.total)))
    }

    #[tool(
        description = "Check source and markup files against pattern rule sets. Sets are auto-detected from package.json and sample imports unless listed explicitly."
    )]
    async fn check_rules(
        &self,
        Parameters(p): Parameters<CheckRulesParams>,
    ) -> Result<String, String> {
        let root = self.project_root(p.project_path.as_deref())?;
        let scope = scope_path(&root, p.path.as_deref());
        let options = RuleOptions {
            sets: p.sets,
            min_severity: p.severity.as_deref().map(parse_severity).transpose()?,
            limit: Some(resolve_limit(p.limit, &self.mcp_config)),
        };
        let result = blocking(move || {
            let config = AtlasConfig::load(&root);
            check_rules(&scope, &config, &options)
        })
        .await?;
        let output = with_summary(
            output::render_rules(&result),
            result.violations.len(),
            result.total,
            &self.mcp_config,
        );
        Ok(format!("{}{}", output, hints::rules_hint(result.total, result.sets.len())))
    }

    #[tool(
        description = "Project health score 0-100 with rating, per-signal penalty breakdown, and top issues. Optionally restrict to some checks."
    )]
    async fn get_health(
        &self,
        Parameters(p): Parameters<GetHealthParams>,
    ) -> Result<String, String> {
        let root = self.project_root(p.project_path.as_deref())?;
        let scope = scope_path(&root, p.path.as_deref());
        let checks = p
            .checks
            .unwrap_or_default()
            .iter()
            .map(|name| Check::parse(name).ok_or_else(|| format!("unknown check '{name}'")))
            .collect::<Result<Vec<_>, _>>()?;
        let health = blocking(move || {
            let config = AtlasConfig::load(&root);
            aggregate(&scope, &config, &checks)
        })
        .await?;
        let top_signal = health
            .breakdown
            .iter()
            .filter(|line| line.penalty > 0.0)
            .max_by(|a, b| a.penalty.total_cmp(&b.penalty))
            .map(|line| line.signal);
        Ok(format!(
            "{}{}",
            output::render_health(&health),
            hints::health_hint(top_signal)
        ))
    }

    #[tool(description = "List built-in and stored rule sets with their detection markers.")]
    async fn list_rule_sets(
        &self,
        Parameters(p): Parameters<ListRuleSetsParams>,
    ) -> Result<String, String> {
        let root = self.project_root(p.project_path.as_deref())?;
        let listing = blocking(move || {
            let config = AtlasConfig::load(&root);
            Ok(output::render_rule_sets(&RuleStore::load(&root, &config.rules)))
        })
        .await?;
        Ok(format!("{}{}", listing, hints::rule_sets_hint()))
    }

    #[tool(
        description = "Add a pattern rule to a rule set, creating the set if needed. Saved under .code-atlas/rules/<set>.toml."
    )]
    async fn add_rule(&self, Parameters(p): Parameters<AddRuleParams>) -> Result<String, String> {
        let root = self.project_root(p.project_path.as_deref())?;
        let mut rule = Rule::new(p.id, p.pattern);
        if let Some(kind) = p.kind.as_deref() {
            rule.kind = parse_kind(kind)?;
        }
        if let Some(severity) = p.severity.as_deref() {
            rule.severity = parse_severity(severity)?;
        }
        rule.message = p.message;
        rule.replacement = p.replacement;
        rule.files = p.files;
        rule.exclude = p.exclude.unwrap_or_default();
        rule.context = p.context;

        let set = p.set;
        let _guard = self.rule_writes.lock().await;
        let message = {
            let set = set.clone();
            blocking(move || {
                let config = AtlasConfig::load(&root);
                let mut store = RuleStore::load(&root, &config.rules);
                let id = rule.id.clone();
                store.add_rule(&set, rule)?;
                Ok(format!("added rule '{id}' to set '{set}'"))
            })
            .await?
        };
        Ok(format!("{}{}", message, hints::rule_write_hint(&set)))
    }

    #[tool(description = "Change fields of an existing rule; omitted fields stay as they are.")]
    async fn update_rule(
        &self,
        Parameters(p): Parameters<UpdateRuleParams>,
    ) -> Result<String, String> {
        let root = self.project_root(p.project_path.as_deref())?;
        let patch = RulePatch {
            pattern: p.pattern,
            kind: p.kind.as_deref().map(parse_kind).transpose()?,
            severity: p.severity.as_deref().map(parse_severity).transpose()?,
            message: p.message,
            replacement: p.replacement,
            files: p.files,
            exclude: p.exclude,
            context: p.context,
        };

        let (set, id) = (p.set, p.id);
        let _guard = self.rule_writes.lock().await;
        let message = {
            let (set, id) = (set.clone(), id);
            blocking(move || {
                let config = AtlasConfig::load(&root);
                let mut store = RuleStore::load(&root, &config.rules);
                let rule = store.update_rule(&set, &id, patch)?;
                Ok(format!(
                    "updated rule '{}' in set '{set}': {} `{}`",
                    rule.id,
                    rule.severity.as_str(),
                    rule.pattern
                ))
            })
            .await?
        };
        Ok(format!("{}{}", message, hints::rule_write_hint(&set)))
    }

    #[tool(description = "Remove a rule from a rule set.")]
    async fn delete_rule(
        &self,
        Parameters(p): Parameters<DeleteRuleParams>,
    ) -> Result<String, String> {
        let root = self.project_root(p.project_path.as_deref())?;
        let _guard = self.rule_writes.lock().await;
        blocking(move || {
            let config = AtlasConfig::load(&root);
            let mut store = RuleStore::load(&root, &config.rules);
            let rule = store.delete_rule(&p.set, &p.id)?;
            Ok(format!("deleted rule '{}' from set '{}'", rule.id, p.set))
        })
        .await
    }

    #[tool(
        description = "Drop the cached symbol graph so the next get_graph or lookup_symbol re-reads the files. Call after editing code."
    )]
    async fn invalidate_graph(
        &self,
        Parameters(p): Parameters<InvalidateGraphParams>,
    ) -> Result<String, String> {
        let root = match p.project_path.as_deref() {
            Some(path) => Some(self.project_root(Some(path))?),
            None => None,
        };
        let dropped = self.graph_cache.write().await.invalidate(root.as_deref());
        Ok(if dropped {
            "graph cache cleared".to_owned()
        } else {
            "no cached graph for that project".to_owned()
        })
    }
}

#[tool_handler]
impl ServerHandler for AtlasServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "code-atlas analyzes TypeScript/JavaScript projects for dead code, complexity, duplication, oversized files, and custom pattern rules. \
                 The symbol graph is built automatically on first use and cached; call invalidate_graph after editing files. \
                 All tools accept an optional project_path parameter to override the default project root. \
                 Overview: get_health (score and top issues) → get_graph (legend + codes) → lookup_symbol (callers/callees). \
                 Cleanup: find_dead_code, find_similar, get_complexity, get_large_files. \
                 Conventions: check_rules runs auto-detected rule sets; list_rule_sets, add_rule, update_rule, delete_rule manage them."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir should succeed");
        fs::write(dir.path().join("package.json"), r#"{ "name": "fixture" }"#).unwrap();
        fs::write(
            dir.path().join("a.js"),
            "export function helperFn() { return 1; }\n\
             function unused() { return 2; }\n\
             export function main() { return helperFn(); }\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("b.js"),
            "import { main } from './a';\nmain();\nconsole.log('done');\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_resolve_limit_explicit_overrides_config() {
        let config = McpConfig {
            default_limit: 20,
            ..Default::default()
        };
        assert_eq!(resolve_limit(Some(50), &config), 50);
    }

    #[test]
    fn test_resolve_limit_none_uses_config() {
        let config = McpConfig {
            default_limit: 20,
            ..Default::default()
        };
        assert_eq!(resolve_limit(None, &config), 20);
    }

    #[test]
    fn test_summary_line_only_when_truncated() {
        let config = McpConfig::default();
        assert_eq!(with_summary("x".into(), 2, 5, &config), "truncated: 2/5\nx");
        assert_eq!(with_summary("x".into(), 5, 5, &config), "x");

        let quiet = McpConfig {
            suppress_summary_line: true,
            ..Default::default()
        };
        assert_eq!(with_summary("x".into(), 2, 5, &quiet), "x");
    }

    #[test]
    fn test_scope_path() {
        let root = Path::new("/proj");
        assert_eq!(scope_path(root, None), PathBuf::from("/proj"));
        assert_eq!(scope_path(root, Some("src")), PathBuf::from("/proj/src"));
        assert_eq!(scope_path(root, Some("/other")), PathBuf::from("/other"));
    }

    #[test]
    fn test_server_loads_mcp_config() {
        let dir = tempfile::tempdir().expect("tempdir should succeed");
        fs::write(
            dir.path().join(crate::config::CONFIG_FILE),
            "[mcp]\ndefault_limit = 42\nsuppress_summary_line = true\n",
        )
        .unwrap();

        let server = AtlasServer::new(dir.path().to_path_buf());
        assert_eq!(server.mcp_config.default_limit, 42);
        assert!(server.mcp_config.suppress_summary_line);
    }

    #[test]
    fn test_get_info_describes_tools() {
        let server = AtlasServer::new(PathBuf::from("/tmp/test"));
        let info = server.get_info();
        let instructions = info.instructions.expect("instructions should be set");
        assert!(instructions.contains("automatically"));
        assert!(instructions.contains("project_path"));
        assert!(instructions.contains("invalidate_graph"));
        assert!(instructions.contains("get_health") && instructions.contains("check_rules"));
    }

    #[tokio::test]
    async fn test_graph_tools_share_cache() {
        let dir = fixture();
        let server = AtlasServer::new(dir.path().to_path_buf());

        let graph = server
            .get_graph(Parameters(GetGraphParams {
                max_edges: None,
                project_path: None,
            }))
            .await
            .unwrap();
        assert!(graph.starts_with("legend "));
        assert!(graph.contains("helperFn"));

        let lookup = server
            .lookup_symbol(Parameters(LookupSymbolParams {
                symbol: "main".into(),
                project_path: None,
            }))
            .await
            .unwrap();
        assert!(lookup.contains("a.js:3"), "{lookup}");

        let missing = server
            .lookup_symbol(Parameters(LookupSymbolParams {
                symbol: "mian".into(),
                project_path: None,
            }))
            .await
            .unwrap_err();
        assert!(missing.contains("not found"), "{missing}");

        let cleared = server
            .invalidate_graph(Parameters(InvalidateGraphParams { project_path: None }))
            .await
            .unwrap();
        assert_eq!(cleared, "graph cache cleared");
    }

    #[tokio::test]
    async fn test_find_dead_code_reports_truncation() {
        let dir = fixture();
        let server = AtlasServer::new(dir.path().to_path_buf());

        let full = server
            .find_dead_code(Parameters(FindDeadCodeParams {
                path: None,
                limit: None,
                project_path: None,
            }))
            .await
            .unwrap();
        assert!(full.contains("unused"), "{full}");
        assert!(!full.starts_with("truncated"));

        let capped = server
            .find_dead_code(Parameters(FindDeadCodeParams {
                path: None,
                limit: Some(0),
                project_path: None,
            }))
            .await
            .unwrap();
        assert!(capped.starts_with("truncated: 0/"), "{capped}");
    }

    #[tokio::test]
    async fn test_rule_crud_round_trip() {
        let dir = fixture();
        let server = AtlasServer::new(dir.path().to_path_buf());

        let added = server
            .add_rule(Parameters(AddRuleParams {
                set: "team".into(),
                id: "no-console".into(),
                pattern: "console.log(".into(),
                kind: None,
                severity: Some("error".into()),
                message: Some("use the logger".into()),
                replacement: None,
                files: None,
                exclude: None,
                context: None,
                project_path: None,
            }))
            .await
            .unwrap();
        assert!(added.starts_with("added rule 'no-console' to set 'team'"));
        assert!(dir.path().join(".code-atlas/rules/team.toml").exists());

        let checked = server
            .check_rules(Parameters(CheckRulesParams {
                path: None,
                sets: Some(vec!["team".into()]),
                severity: None,
                limit: None,
                project_path: None,
            }))
            .await
            .unwrap();
        assert!(checked.contains("error no-console b.js:3"), "{checked}");

        let updated = server
            .update_rule(Parameters(UpdateRuleParams {
                set: "team".into(),
                id: "no-console".into(),
                pattern: None,
                kind: None,
                severity: Some("info".into()),
                message: None,
                replacement: None,
                files: None,
                exclude: None,
                context: None,
                project_path: None,
            }))
            .await
            .unwrap();
        assert!(updated.contains("info `console.log(`"), "{updated}");

        let bad = server
            .update_rule(Parameters(UpdateRuleParams {
                set: "team".into(),
                id: "no-console".into(),
                pattern: None,
                kind: Some("glob".into()),
                severity: None,
                message: None,
                replacement: None,
                files: None,
                exclude: None,
                context: None,
                project_path: None,
            }))
            .await
            .unwrap_err();
        assert!(bad.contains("unknown pattern kind"));

        server
            .delete_rule(Parameters(DeleteRuleParams {
                set: "team".into(),
                id: "no-console".into(),
                project_path: None,
            }))
            .await
            .unwrap();
        let gone = server
            .delete_rule(Parameters(DeleteRuleParams {
                set: "team".into(),
                id: "no-console".into(),
                project_path: None,
            }))
            .await
            .unwrap_err();
        assert!(gone.contains("not found"), "{gone}");
    }

    #[tokio::test]
    async fn test_get_health_rejects_unknown_check() {
        let dir = fixture();
        let server = AtlasServer::new(dir.path().to_path_buf());
        let err = server
            .get_health(Parameters(GetHealthParams {
                path: None,
                checks: Some(vec!["vibes".into()]),
                project_path: None,
            }))
            .await
            .unwrap_err();
        assert_eq!(err, "unknown check 'vibes'");

        let health = server
            .get_health(Parameters(GetHealthParams {
                path: None,
                checks: Some(vec!["dead_code".into()]),
                project_path: None,
            }))
            .await
            .unwrap();
        assert!(health.starts_with("health "), "{health}");
        assert!(health.contains("dead_code"));
    }
}
