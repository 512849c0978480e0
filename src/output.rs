//! Compact, token-lean text renderers shared by the CLI and the MCP server.
//!
//! Every renderer returns a `String` without a trailing newline. Paths are already
//! project-relative in the result types.

use std::fmt::Write as _;

use serde::Serialize;

use crate::graph::{SymbolContext, SymbolGraph};
use crate::health::HealthScore;
use crate::metrics::complexity::ComplexityResult;
use crate::metrics::file_size::FileSizeResult;
use crate::metrics::similarity::SimilarityResult;
use crate::query::dead_code::DeadCodeResult;
use crate::rules::{RuleCheckResult, RuleSet, RuleSource, RuleStore};

/// Pretty JSON for `--format json`.
pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

/// Legend first, then nodes, edges, orphans and duplicates. `max_edges` caps the edge list.
pub fn render_graph(graph: &SymbolGraph, max_edges: Option<usize>) -> String {
    let mut out = String::new();

    let legend: Vec<String> = graph
        .legend
        .entries()
        .map(|(name, code)| format!("{code}={name}"))
        .collect();
    let _ = writeln!(out, "legend {}", legend.join(" "));

    for node in graph.nodes.values() {
        let kind = if node.is_class() { "c" } else { "f" };
        let _ = write!(out, "{} {kind} {}:{}", node.code, node.file.display(), node.line);
        if node.exported {
            out.push_str(" exp");
        }
        if let Some(parent) = &node.parent {
            let _ = write!(out, " ^{parent}");
        }
        if !node.methods.is_empty() {
            let _ = write!(out, " m[{}]", node.methods.join(","));
        }
        if !node.properties.is_empty() {
            let _ = write!(out, " p[{}]", node.properties.join(","));
        }
        out.push('\n');
    }

    let shown = max_edges.unwrap_or(graph.edges.len()).min(graph.edges.len());
    let edges: Vec<String> = graph.edges[..shown]
        .iter()
        .map(|e| format!("{}>{}", e.from, e.to))
        .collect();
    let _ = writeln!(out, "edges {}", edges.join(" "));
    if shown < graph.edges.len() {
        let _ = writeln!(out, "edges omitted {}", graph.edges.len() - shown);
    }

    if !graph.orphans.is_empty() {
        let _ = writeln!(out, "orphans {}", graph.orphans.join(","));
    }
    for (name, sites) in &graph.duplicates {
        let sites: Vec<String> = sites
            .iter()
            .map(|s| format!("{}@{}:{}", s.owner, s.file.display(), s.line))
            .collect();
        let _ = writeln!(out, "dup {name} {}", sites.join(" "));
    }
    let _ = write!(
        out,
        "{} nodes, {} edges",
        graph.node_count(),
        graph.edge_count()
    );
    out
}

pub fn render_lookup(ctx: &SymbolContext) -> String {
    let node = &ctx.node;
    let mut out = format!(
        "{} {} {}:{}",
        ctx.address,
        ctx.name,
        node.file.display(),
        node.line
    );
    if node.exported {
        out.push_str(" exp");
    }
    if let Some(parent) = &node.parent {
        let _ = write!(out, "\nextends {parent}");
    }
    if !node.methods.is_empty() && !ctx.address.contains('.') {
        let _ = write!(out, "\nmethods {}", node.methods.join(","));
    }
    if !node.properties.is_empty() && !ctx.address.contains('.') {
        let _ = write!(out, "\nprops {}", node.properties.join(","));
    }
    let _ = write!(out, "\ncallers {}", list_or_dash(&ctx.callers));
    let _ = write!(out, "\ncallees {}", list_or_dash(&ctx.callees));
    out
}

pub fn render_dead_code(result: &DeadCodeResult) -> String {
    let mut out = String::new();
    let counts: Vec<String> = result
        .by_type
        .iter()
        .map(|(kind, n)| format!("{}={n}", kind.as_str()))
        .collect();
    let _ = write!(out, "dead {} ({})", result.total, counts.join(" "));
    for item in &result.items {
        let name = match &item.owner {
            Some(owner) => format!("{owner}.{}", item.name),
            None => item.name.clone(),
        };
        let _ = write!(
            out,
            "\n{} {name} {}:{}",
            item.kind.as_str(),
            item.file.display(),
            item.line
        );
    }
    out
}

pub fn render_complexity(result: &ComplexityResult) -> String {
    let s = &result.stats;
    let mut out = format!(
        "functions {} low={} moderate={} high={} critical={}",
        result.total, s.low, s.moderate, s.high, s.critical
    );
    for item in &result.items {
        let _ = write!(
            out,
            "\n{} {} {} {}:{}-{}",
            item.score,
            item.band.as_str(),
            item.name,
            item.file.display(),
            item.line,
            item.end_line
        );
    }
    out
}

pub fn render_similarity(result: &SimilarityResult) -> String {
    let mut out = format!("similar pairs {} (threshold {})", result.total, result.threshold);
    for pair in &result.pairs {
        let _ = write!(
            out,
            "\n{} {} {}:{} ~ {} {}:{}",
            pair.score,
            pair.a.name,
            pair.a.file.display(),
            pair.a.line,
            pair.b.name,
            pair.b.file.display(),
            pair.b.line
        );
    }
    out
}

pub fn render_file_sizes(result: &FileSizeResult) -> String {
    let s = &result.stats;
    let mut out = format!(
        "large files {} of {} (critical={} warning={})",
        result.total, s.files, s.critical, s.warning
    );
    for item in &result.items {
        let _ = write!(
            out,
            "\n{} {} {}: {}",
            item.rating.as_str(),
            item.points,
            item.file.display(),
            item.reasons.join(", ")
        );
    }
    out
}

pub fn render_rules(result: &RuleCheckResult) -> String {
    let severities: Vec<String> = result
        .by_severity
        .iter()
        .map(|(sev, n)| format!("{}={n}", sev.as_str()))
        .collect();
    let mut out = format!(
        "violations {} ({}) sets [{}]",
        result.total,
        severities.join(" "),
        result.sets.join(",")
    );
    for v in &result.violations {
        let _ = write!(
            out,
            "\n{} {} {}:{} `{}`",
            v.severity.as_str(),
            v.rule_id,
            v.file,
            v.line,
            v.matched_text
        );
        if let Some(replacement) = &v.suggested_replacement {
            let _ = write!(out, " -> `{replacement}`");
        }
    }
    out
}

pub fn render_health(health: &HealthScore) -> String {
    let mut out = format!("health {} {}", health.score, health.rating.as_str());
    for line in &health.breakdown {
        let _ = write!(out, "\n  {} {} -{:.1}", line.signal, line.count, line.penalty);
    }
    if !health.top_issues.is_empty() {
        out.push_str("\ntop issues:");
        for issue in &health.top_issues {
            let _ = write!(out, "\n  {issue}");
        }
    }
    out
}

pub fn render_rule_sets(store: &RuleStore) -> String {
    let lines: Vec<String> = store.sets().map(|set| rule_set_line(store, set)).collect();
    if lines.is_empty() {
        return "no rule sets".to_owned();
    }
    lines.join("\n")
}

fn rule_set_line(store: &RuleStore, set: &RuleSet) -> String {
    let source = match store.source(&set.name) {
        Some(RuleSource::File(_)) => "stored",
        _ => "builtin",
    };
    let mut line = format!("{} {} rules={}", set.name, source, set.rules.len());
    if set.always_apply {
        line.push_str(" always");
    }
    if !set.detect.packages.is_empty() {
        let _ = write!(line, " pkgs[{}]", set.detect.packages.join(","));
    }
    if !set.description.is_empty() {
        let _ = write!(line, " - {}", set.description);
    }
    line
}

fn list_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_owned()
    } else {
        items.join(",")
    }
}
