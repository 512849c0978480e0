use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::AtlasConfig;
use crate::language::is_generated_path;
use crate::parser::facts::{FunctionFacts, FunctionKind};
use crate::project::ProjectFacts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityBand {
    Low,
    Moderate,
    High,
    Critical,
}

impl ComplexityBand {
    pub fn of(score: u32) -> Self {
        match score {
            0..=5 => ComplexityBand::Low,
            6..=10 => ComplexityBand::Moderate,
            11..=20 => ComplexityBand::High,
            _ => ComplexityBand::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityBand::Low => "low",
            ComplexityBand::Moderate => "moderate",
            ComplexityBand::High => "high",
            ComplexityBand::Critical => "critical",
        }
    }
}

/// Cyclomatic complexity: 1 plus one per decision point in the body.
pub fn cyclomatic(function: &FunctionFacts) -> u32 {
    1 + function.structure.iter().filter(|t| t.is_decision()).count() as u32
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplexityItem {
    pub name: String,
    pub file: PathBuf,
    pub line: usize,
    pub end_line: usize,
    pub score: u32,
    pub band: ComplexityBand,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ComplexityStats {
    pub low: usize,
    pub moderate: usize,
    pub high: usize,
    pub critical: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplexityResult {
    pub total: usize,
    pub stats: ComplexityStats,
    pub items: Vec<ComplexityItem>,
}

#[derive(Debug, Clone, Default)]
pub struct ComplexityOptions {
    pub min_score: Option<u32>,
    pub limit: Option<usize>,
}

pub fn score_complexity(
    path: &Path,
    config: &AtlasConfig,
    options: &ComplexityOptions,
) -> anyhow::Result<ComplexityResult> {
    let (facts, scope) = ProjectFacts::for_scope(path, config)?;
    Ok(complexity_of(
        &facts,
        &scope,
        options.min_score.unwrap_or(config.complexity.min_score),
        options.limit.unwrap_or(config.complexity.limit),
    ))
}

pub fn complexity_of(
    facts: &ProjectFacts,
    scope: &Path,
    min_score: u32,
    limit: usize,
) -> ComplexityResult {
    let mut items = Vec::new();
    for sheet in facts.in_scope(scope) {
        if is_generated_path(facts.relative(&sheet.path)) {
            continue;
        }
        for function in &sheet.functions {
            let score = cyclomatic(function);
            // Block arrows and anonymous callbacks are only worth listing when non-trivial.
            let always = match function.kind {
                FunctionKind::Declaration | FunctionKind::Method => true,
                FunctionKind::Expression => function.name.is_some(),
                FunctionKind::Arrow => false,
            };
            if (!always && score <= 5) || score < min_score {
                continue;
            }
            items.push(ComplexityItem {
                name: function.display_name(),
                file: facts.relative(&sheet.path).to_path_buf(),
                line: function.line,
                end_line: function.end_line,
                score,
                band: ComplexityBand::of(score),
            });
        }
    }

    items.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.file.cmp(&b.file))
            .then(a.line.cmp(&b.line))
    });

    let mut stats = ComplexityStats::default();
    for item in &items {
        match item.band {
            ComplexityBand::Low => stats.low += 1,
            ComplexityBand::Moderate => stats.moderate += 1,
            ComplexityBand::High => stats.high += 1,
            ComplexityBand::Critical => stats.critical += 1,
        }
    }

    let total = items.len();
    items.truncate(limit);
    ComplexityResult {
        total,
        stats,
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::test_support::project;

    fn scores(src: &str) -> Vec<(String, u32, ComplexityBand)> {
        let facts = project(&[("m.js", src)]);
        complexity_of(&facts, &facts.root, 1, 100)
            .items
            .into_iter()
            .map(|i| (i.name, i.score, i.band))
            .collect()
    }

    #[test]
    fn test_single_if_scores_two() {
        let got = scores("function f(x) { if (x) { return 1; } return 0; }");
        assert_eq!(got, vec![("f".to_string(), 2, ComplexityBand::Low)]);
    }

    #[test]
    fn test_six_ifs_score_seven() {
        let body: String = (0..6).map(|i| format!("if (x === {i}) {{ y++; }}\n")).collect();
        let got = scores(&format!("function f(x) {{ let y = 0;\n{body} return y; }}"));
        assert_eq!(got, vec![("f".to_string(), 7, ComplexityBand::Moderate)]);
    }

    #[test]
    fn test_decision_points() {
        let src = r#"
function g(a, b, list) {
  for (const x of list) {}
  while (a) { a--; }
  const c = a ? 1 : 2;
  const d = a && b || c;
  const e = a ?? b;
  switch (a) { case 1: break; case 2: break; default: break; }
  try { g(); } catch (err) {}
}
"#;
        // for-of, while, ternary, &&, ||, ??, two cases, catch
        assert_eq!(scores(src)[0].1, 10);
    }

    #[test]
    fn test_arrows_report_only_above_five() {
        let small = "const f = (x) => { if (x) { return 1; } return 2; };";
        assert!(scores(small).is_empty());

        let body: String = (0..5).map(|i| format!("if (x === {i}) {{ y++; }}\n")).collect();
        let big = format!("const f = (x) => {{ let y = 0;\n{body} return y; }};");
        assert_eq!(scores(&big), vec![("f".to_string(), 6, ComplexityBand::Moderate)]);
    }

    #[test]
    fn test_methods_named_with_owner_and_sorted() {
        let src = "class A { easy() {} hard(x) { if (x) {} if (!x) {} } }";
        let got = scores(src);
        assert_eq!(got[0].0, "A.hard");
        assert_eq!(got[1].0, "A.easy");
    }

    #[test]
    fn test_band_edges() {
        assert_eq!(ComplexityBand::of(5), ComplexityBand::Low);
        assert_eq!(ComplexityBand::of(10), ComplexityBand::Moderate);
        assert_eq!(ComplexityBand::of(20), ComplexityBand::High);
        assert_eq!(ComplexityBand::of(21), ComplexityBand::Critical);
    }
}
