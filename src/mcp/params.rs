use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Deserialize, JsonSchema)]
pub struct GetGraphParams {
    /// Max call edges listed (default: all)
    pub max_edges: Option<usize>,
    /// Project root path override
    pub project_path: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct LookupSymbolParams {
    /// Short code (e.g. "US"), full name ("UserService"), or member ("US.fU", "UserService.findUser")
    pub symbol: String,
    /// Project root path override
    pub project_path: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct FindDeadCodeParams {
    /// Directory to report on (relative to project root, or absolute). Imports are always
    /// resolved across the whole project. Omit for the entire project.
    pub path: Option<String>,
    /// Max results (default: 30)
    pub limit: Option<usize>,
    /// Project root path override
    pub project_path: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct GetComplexityParams {
    /// Directory to report on (relative to project root, or absolute)
    pub path: Option<String>,
    /// Hide functions scoring below this (default: 1)
    pub min_score: Option<u32>,
    /// Max results (default: 30)
    pub limit: Option<usize>,
    /// Project root path override
    pub project_path: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct FindSimilarParams {
    /// Directory to report on (relative to project root, or absolute)
    pub path: Option<String>,
    /// Minimum pair score 0-100 (default: 60)
    pub threshold: Option<u32>,
    /// Max pairs (default: 30)
    pub limit: Option<usize>,
    /// Project root path override
    pub project_path: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct GetLargeFilesParams {
    /// Directory to report on (relative to project root, or absolute)
    pub path: Option<String>,
    /// Max files (default: 30)
    pub limit: Option<usize>,
    /// Project root path override
    pub project_path: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct CheckRulesParams {
    /// Directory to check (relative to project root, or absolute)
    pub path: Option<String>,
    /// Rule sets to run; omit to auto-detect from the project
    pub sets: Option<Vec<String>>,
    /// Minimum severity: error, warning, or info (default: info)
    pub severity: Option<String>,
    /// Max violations (default: 30)
    pub limit: Option<usize>,
    /// Project root path override
    pub project_path: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct GetHealthParams {
    /// Directory to score (relative to project root, or absolute)
    pub path: Option<String>,
    /// Checks to run: dead_code, docs, similarity, complexity, file_size, rules, dependencies.
    /// Omit for all.
    pub checks: Option<Vec<String>>,
    /// Project root path override
    pub project_path: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct ListRuleSetsParams {
    /// Project root path override
    pub project_path: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct AddRuleParams {
    /// Rule set name; created when it does not exist
    pub set: String,
    /// Rule id, unique within the set
    pub id: String,
    /// Text or regex to match, one line at a time
    pub pattern: String,
    /// "literal" (default) or "regex"
    pub kind: Option<String>,
    /// error, warning (default), or info
    pub severity: Option<String>,
    /// Explanation shown with each violation
    pub message: Option<String>,
    /// Suggested replacement text
    pub replacement: Option<String>,
    /// File glob relative to project root, `{a,b}` allowed (default: all files)
    pub files: Option<String>,
    /// Globs to skip
    pub exclude: Option<Vec<String>>,
    /// Markup tag the match must be inside, e.g. "template"
    pub context: Option<String>,
    /// Project root path override
    pub project_path: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct UpdateRuleParams {
    /// Rule set name
    pub set: String,
    /// Rule id
    pub id: String,
    pub pattern: Option<String>,
    /// "literal" or "regex"
    pub kind: Option<String>,
    /// error, warning, or info
    pub severity: Option<String>,
    pub message: Option<String>,
    pub replacement: Option<String>,
    pub files: Option<String>,
    pub exclude: Option<Vec<String>>,
    pub context: Option<String>,
    /// Project root path override
    pub project_path: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct DeleteRuleParams {
    /// Rule set name
    pub set: String,
    /// Rule id
    pub id: String,
    /// Project root path override
    pub project_path: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct InvalidateGraphParams {
    /// Project root path override; omit to drop whatever graph is cached
    pub project_path: Option<String>,
}
