use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use code_atlas::cli::{Cli, Commands, OutputFormat};
use code_atlas::config::AtlasConfig;
use code_atlas::error::AtlasError;
use code_atlas::graph::build_for_root;
use code_atlas::health::aggregate;
use code_atlas::metrics::{
    ComplexityOptions, SimilarityOptions, score_complexity, score_file_sizes, score_similarity,
};
use code_atlas::output;
use code_atlas::query::dead_code::analyze_liveness;
use code_atlas::rules::{RuleOptions, RuleStore, check_rules};
use code_atlas::walker::find_project_root;

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    execute(cli)
}

/// Logs go to stderr so stdout stays clean for JSON and the MCP transport.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Canonical project root enclosing `path`, plus its configuration.
fn project(path: &Path) -> Result<(PathBuf, AtlasConfig)> {
    let canonical = path
        .canonicalize()
        .map_err(|_| AtlasError::MissingPath(path.to_path_buf()))?;
    let root = find_project_root(&canonical);
    let config = AtlasConfig::load(&root);
    Ok((root, config))
}

fn emit<T: serde::Serialize>(format: OutputFormat, value: &T, compact: impl FnOnce(&T) -> String) {
    match format {
        OutputFormat::Compact => println!("{}", compact(value)),
        OutputFormat::Json => println!("{}", output::to_json(value)),
    }
}

fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Graph {
            path,
            max_edges,
            format,
        } => {
            let (root, config) = project(&path)?;
            let graph = build_for_root(&root, &config)?;
            emit(format, &graph, |g| output::render_graph(g, max_edges));
        }

        Commands::Lookup {
            symbol,
            path,
            format,
        } => {
            let (root, config) = project(&path)?;
            let graph = build_for_root(&root, &config)?;
            let ctx = graph.lookup(&symbol)?;
            emit(format, &ctx, output::render_lookup);
        }

        Commands::DeadCode {
            path,
            limit,
            format,
        } => {
            let (_, config) = project(&path)?;
            let result = analyze_liveness(&path, &config, limit)?;
            emit(format, &result, output::render_dead_code);
        }

        Commands::Complexity {
            path,
            min_score,
            limit,
            format,
        } => {
            let (_, config) = project(&path)?;
            let options = ComplexityOptions { min_score, limit };
            let result = score_complexity(&path, &config, &options)?;
            emit(format, &result, output::render_complexity);
        }

        Commands::Similarity {
            path,
            threshold,
            limit,
            format,
        } => {
            let (_, config) = project(&path)?;
            let options = SimilarityOptions { threshold, limit };
            let result = score_similarity(&path, &config, &options)?;
            emit(format, &result, output::render_similarity);
        }

        Commands::LargeFiles {
            path,
            limit,
            format,
        } => {
            let (_, config) = project(&path)?;
            let result = score_file_sizes(&path, &config, limit)?;
            emit(format, &result, output::render_file_sizes);
        }

        Commands::Rules {
            path,
            sets,
            severity,
            limit,
            format,
        } => {
            let (_, config) = project(&path)?;
            let options = RuleOptions {
                sets: (!sets.is_empty()).then_some(sets),
                min_severity: severity,
                limit,
            };
            let result = check_rules(&path, &config, &options)?;
            emit(format, &result, output::render_rules);
        }

        Commands::RuleSets { path, format } => {
            let (root, config) = project(&path)?;
            let store = RuleStore::load(&root, &config.rules);
            match format {
                OutputFormat::Compact => println!("{}", output::render_rule_sets(&store)),
                OutputFormat::Json => {
                    let sets: Vec<_> = store.sets().collect();
                    println!("{}", output::to_json(&sets));
                }
            }
        }

        Commands::Health {
            path,
            checks,
            format,
        } => {
            let (_, config) = project(&path)?;
            let health = aggregate(&path, &config, &checks)?;
            emit(format, &health, output::render_health);
        }

        Commands::Mcp { path } => {
            let (root, _) = project(&path)?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(code_atlas::mcp::run(root))?;
        }
    }

    Ok(())
}
