use std::path::Path;

use serde::Deserialize;
use tracing::warn;

/// Name of the optional configuration file at the project root.
pub const CONFIG_FILE: &str = "code-atlas.toml";

/// Configuration loaded from `code-atlas.toml` at the project root.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct AtlasConfig {
    /// Additional path patterns to exclude from analysis (beyond .gitignore and node_modules).
    pub exclude: Option<Vec<String>>,
    pub liveness: LivenessConfig,
    pub complexity: ComplexityConfig,
    pub similarity: SimilarityConfig,
    pub file_size: FileSizeConfig,
    pub rules: RulesConfig,
    pub mcp: McpConfig,
}

/// Knobs for the dead-code query.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LivenessConfig {
    /// Declaration names that are never reported dead (framework hooks, entry functions).
    pub entry_points: Vec<String>,
    /// Glob patterns (relative to the project root) whose exports are never dead.
    pub entry_files: Vec<String>,
    /// Extension appended to extension-less relative specifiers that match no known file.
    pub default_extension: String,
    /// Maximum number of items returned.
    pub limit: usize,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            entry_points: Vec::new(),
            entry_files: Vec::new(),
            default_extension: "js".to_owned(),
            limit: 50,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ComplexityConfig {
    /// Functions scoring below this value are not listed.
    pub min_score: u32,
    pub limit: usize,
}

impl Default for ComplexityConfig {
    fn default() -> Self {
        Self {
            min_score: 1,
            limit: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Minimum pair score (0-100) to report.
    pub threshold: u32,
    pub limit: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            threshold: 60,
            limit: 20,
        }
    }
}

/// Two-tier thresholds for each file-size metric: `(upper, lower)`.
/// Exceeding `upper` costs 2 points, exceeding only `lower` costs 1.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FileSizeConfig {
    pub lines: (usize, usize),
    pub functions: (usize, usize),
    pub classes: (usize, usize),
    pub exports: (usize, usize),
    pub limit: usize,
}

impl Default for FileSizeConfig {
    fn default() -> Self {
        Self {
            lines: (500, 300),
            functions: (30, 20),
            classes: (5, 2),
            exports: (20, 10),
            limit: 20,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RulesConfig {
    /// Directory (relative to the project root) holding rule-set files.
    pub directory: String,
    /// Rule sets that never run, even when detected or flagged always-apply.
    pub disabled_sets: Vec<String>,
    pub limit: usize,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            directory: ".code-atlas/rules".to_owned(),
            disabled_sets: Vec::new(),
            limit: 50,
        }
    }
}

/// Settings for the MCP tool server.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct McpConfig {
    /// Fallback result cap when a tool call passes no `limit`.
    pub default_limit: usize,
    /// Omit the `truncated: N/M` header line from capped responses.
    pub suppress_summary_line: bool,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            default_limit: 30,
            suppress_summary_line: false,
        }
    }
}

impl AtlasConfig {
    /// Load configuration from `code-atlas.toml` in the given root directory.
    ///
    /// Returns a default configuration if the file does not exist or cannot be parsed.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);

        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    warn!("failed to parse {CONFIG_FILE}: {err}. Using defaults.");
                    Self::default()
                }
            },
            Err(err) => {
                warn!("failed to read {CONFIG_FILE}: {err}. Using defaults.");
                Self::default()
            }
        }
    }
}
