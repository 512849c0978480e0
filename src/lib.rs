//! code-atlas: symbol graph, liveness, quality metrics and pattern rules for
//! TypeScript/JavaScript projects.

pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod health;
pub mod language;
pub mod manifest;
pub mod mcp;
pub mod metrics;
pub mod output;
pub mod parser;
pub mod project;
pub mod query;
pub mod resolver;
pub mod rules;
pub mod walker;

pub use config::AtlasConfig;
pub use error::AtlasError;
pub use graph::{GraphCache, SymbolGraph};
pub use project::ProjectFacts;
