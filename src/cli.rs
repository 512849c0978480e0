use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::health::Check;
use crate::rules::Severity;

/// Code intelligence for TypeScript/JavaScript codebases.
///
/// code-atlas extracts a compact symbol graph and scores a project for dead code,
/// complexity, duplication, oversized files, and custom pattern rules, so agents can
/// reason about a codebase without reading every source file.
#[derive(Parser, Debug)]
#[command(
    name = "code-atlas",
    version,
    about,
    long_about = None,
    propagate_version = true,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for query results.
#[derive(Clone, Copy, Debug, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Compact line-per-result text, token-optimized for AI agent use (default).
    #[default]
    Compact,
    /// Pretty-printed JSON of the full result.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the symbol graph: legend, nodes, call edges, orphans, duplicate methods.
    Graph {
        /// Directory inside the project (the project root is found by walking up).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// List at most this many call edges.
        #[arg(long)]
        max_edges: Option<usize>,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,
    },

    /// Show one symbol with its callers and callees.
    ///
    /// Accepts a legend code ("US"), a full name ("UserService"), or a member
    /// address ("US.fU" or "UserService.findUser").
    Lookup {
        /// Code, name, or Owner.member.
        symbol: String,

        #[arg(default_value = ".")]
        path: PathBuf,

        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,
    },

    /// Find unused functions, classes, methods, exports, and locals.
    ///
    /// Imports are resolved across the whole project; only items under `path` are reported.
    DeadCode {
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Maximum number of items listed (the total is always reported).
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,
    },

    /// Cyclomatic complexity per function, highest first.
    Complexity {
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Hide functions scoring below this.
        #[arg(long)]
        min_score: Option<u32>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,
    },

    /// Pairs of structurally similar functions.
    Similarity {
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Minimum pair score, 0-100.
        #[arg(long)]
        threshold: Option<u32>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,
    },

    /// Files too large by lines, functions, classes, or exports.
    LargeFiles {
        #[arg(default_value = ".")]
        path: PathBuf,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,
    },

    /// Check files against pattern rule sets (auto-detected unless --sets is given).
    Rules {
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Run exactly these rule sets (comma-separated).
        #[arg(long, value_delimiter = ',')]
        sets: Vec<String>,

        /// Minimum severity reported: error, warning, or info.
        #[arg(long, value_parser = parse_severity)]
        severity: Option<Severity>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,
    },

    /// List built-in and stored rule sets.
    RuleSets {
        #[arg(default_value = ".")]
        path: PathBuf,

        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,
    },

    /// Weighted health score 0-100 with a per-signal breakdown.
    Health {
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Only run these checks (comma-separated: dead_code, docs, similarity,
        /// complexity, file_size, rules, dependencies). Default: all.
        #[arg(long, value_delimiter = ',', value_parser = parse_check)]
        checks: Vec<Check>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,
    },

    /// Start an MCP server on stdio exposing the analyses as tools.
    Mcp {
        /// Default project root for tool calls without `project_path`.
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

fn parse_severity(s: &str) -> Result<Severity, String> {
    Severity::parse(s).ok_or_else(|| format!("unknown severity '{s}' (use error, warning, or info)"))
}

fn parse_check(s: &str) -> Result<Check, String> {
    Check::parse(s).ok_or_else(|| format!("unknown check '{s}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_flags() {
        let cli = Cli::parse_from([
            "code-atlas",
            "rules",
            "src",
            "--sets",
            "node,react",
            "--severity",
            "warn",
        ]);
        match cli.command {
            Commands::Rules {
                path,
                sets,
                severity,
                format,
                ..
            } => {
                assert_eq!(path, PathBuf::from("src"));
                assert_eq!(sets, vec!["node", "react"]);
                assert_eq!(severity, Some(Severity::Warning));
                assert_eq!(format, OutputFormat::Compact);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_health_checks_parse() {
        let cli = Cli::parse_from(["code-atlas", "health", "--checks", "dead-code,deps"]);
        match cli.command {
            Commands::Health { path, checks, .. } => {
                assert_eq!(path, PathBuf::from("."));
                assert_eq!(checks, vec![Check::DeadCode, Check::Dependencies]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_unknown_check_is_rejected() {
        let err = Cli::try_parse_from(["code-atlas", "health", "--checks", "vibes"]).unwrap_err();
        assert!(err.to_string().contains("unknown check 'vibes'"));
    }
}
