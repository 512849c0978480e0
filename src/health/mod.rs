//! Weighted project health score.
//!
//! Start at 100 and subtract a capped penalty per signal:
//!
//! | signal                  | per item | cap |
//! |-------------------------|----------|-----|
//! | dead code               | 0.5      | 15  |
//! | undocumented exports    | 0.2      | 10  |
//! | similar function pairs  | 1        | 10  |
//! | critical complexity     | 3        | 15  |
//! | high complexity         | 1        | 10  |
//! | critical large files    | 3        | 10  |
//! | warning large files     | 1        | 5   |
//! | rule errors             | 2        | 15  |
//! | rule warnings           | 0.5      | 10  |
//! | redundant dependencies  | 2        | 10  |

pub mod dependencies;

use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::config::AtlasConfig;
use crate::error::AtlasError;
use crate::manifest::PackageManifest;
use crate::metrics::complexity::complexity_of;
use crate::metrics::docs::docs_of;
use crate::metrics::file_size::file_sizes_of;
use crate::metrics::similarity::similarity_of;
use crate::project::ProjectFacts;
use crate::query::dead_code::classify;
use crate::rules::{RuleOptions, Severity, check_rules};
use crate::walker::find_project_root;

pub use dependencies::{RedundantDependency, redundant_dependencies};

/// One group of scorers the caller can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    DeadCode,
    Docs,
    Similarity,
    Complexity,
    FileSize,
    Rules,
    Dependencies,
}

impl Check {
    pub const ALL: [Check; 7] = [
        Check::DeadCode,
        Check::Docs,
        Check::Similarity,
        Check::Complexity,
        Check::FileSize,
        Check::Rules,
        Check::Dependencies,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "dead_code" | "dead" => Some(Check::DeadCode),
            "docs" | "undocumented" => Some(Check::Docs),
            "similarity" | "similar" => Some(Check::Similarity),
            "complexity" => Some(Check::Complexity),
            "file_size" | "large_files" => Some(Check::FileSize),
            "rules" => Some(Check::Rules),
            "dependencies" | "deps" => Some(Check::Dependencies),
            _ => None,
        }
    }

    fn needs_facts(&self) -> bool {
        !matches!(self, Check::Rules | Check::Dependencies)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthRating {
    Excellent,
    Good,
    Warning,
    Critical,
}

impl HealthRating {
    pub fn of(score: u32) -> Self {
        match score {
            90.. => HealthRating::Excellent,
            70..=89 => HealthRating::Good,
            50..=69 => HealthRating::Warning,
            _ => HealthRating::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthRating::Excellent => "excellent",
            HealthRating::Good => "good",
            HealthRating::Warning => "warning",
            HealthRating::Critical => "critical",
        }
    }
}

/// Raw counts per signal; `None` for signals whose check did not run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SignalCounts {
    pub dead_code: Option<usize>,
    pub undocumented: Option<usize>,
    pub similar_pairs: Option<usize>,
    pub complexity_critical: Option<usize>,
    pub complexity_high: Option<usize>,
    pub large_files_critical: Option<usize>,
    pub large_files_warning: Option<usize>,
    pub rule_errors: Option<usize>,
    pub rule_warnings: Option<usize>,
    pub redundant_dependencies: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PenaltyLine {
    pub signal: &'static str,
    pub count: usize,
    pub penalty: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthScore {
    pub score: u32,
    pub rating: HealthRating,
    pub top_issues: Vec<String>,
    pub breakdown: Vec<PenaltyLine>,
}

const MAX_TOP_ISSUES: usize = 5;

/// `(signal, per item, cap, issue label)` in computation order.
type Weight = (&'static str, f64, f64, &'static str);

const WEIGHTS: [Weight; 10] = [
    ("dead_code", 0.5, 15.0, "dead code item(s)"),
    ("undocumented", 0.2, 10.0, "undocumented export(s)"),
    ("similar_pairs", 1.0, 10.0, "similar function pair(s)"),
    ("complexity_critical", 3.0, 15.0, "function(s) with critical complexity"),
    ("complexity_high", 1.0, 10.0, "function(s) with high complexity"),
    ("large_files_critical", 3.0, 10.0, "critically large file(s)"),
    ("large_files_warning", 1.0, 5.0, "large file(s)"),
    ("rule_errors", 2.0, 15.0, "rule error(s)"),
    ("rule_warnings", 0.5, 10.0, "rule warning(s)"),
    ("redundant_dependencies", 2.0, 10.0, "redundant dependenc(ies)"),
];

impl SignalCounts {
    fn in_order(&self) -> [Option<usize>; 10] {
        [
            self.dead_code,
            self.undocumented,
            self.similar_pairs,
            self.complexity_critical,
            self.complexity_high,
            self.large_files_critical,
            self.large_files_warning,
            self.rule_errors,
            self.rule_warnings,
            self.redundant_dependencies,
        ]
    }
}

/// Combine signal counts into a score, rating, and up to five top issues.
pub fn score_signals(counts: &SignalCounts) -> HealthScore {
    let mut total = 0.0;
    let mut breakdown = Vec::new();
    let mut top_issues = Vec::new();

    for (&(signal, per_item, cap, label), count) in WEIGHTS.iter().zip(counts.in_order()) {
        let Some(count) = count else {
            continue;
        };
        let penalty = (count as f64 * per_item).min(cap);
        total += penalty;
        breakdown.push(PenaltyLine {
            signal,
            count,
            penalty,
        });
        if count > 0 && top_issues.len() < MAX_TOP_ISSUES {
            top_issues.push(format!("{count} {label}"));
        }
    }

    let score = (100.0 - total).clamp(0.0, 100.0).round() as u32;
    HealthScore {
        score,
        rating: HealthRating::of(score),
        top_issues,
        breakdown,
    }
}

/// Run the requested checks (all when `checks` is empty) over `path` and score them.
///
/// Fact-based scorers share one extraction pass and run concurrently; rules and
/// dependency checks read raw files alongside them.
pub fn aggregate(path: &Path, config: &AtlasConfig, checks: &[Check]) -> anyhow::Result<HealthScore> {
    let checks: Vec<Check> = if checks.is_empty() {
        Check::ALL.to_vec()
    } else {
        checks.to_vec()
    };
    let wants = |c: Check| checks.contains(&c);

    let scope = path
        .canonicalize()
        .map_err(|_| AtlasError::MissingPath(path.to_path_buf()))?;
    let root = find_project_root(&scope);
    let facts = if checks.iter().any(Check::needs_facts) {
        Some(ProjectFacts::collect(&root, config)?)
    } else {
        None
    };

    let mut counts = SignalCounts::default();
    let mut rules_outcome = None;
    {
        let SignalCounts {
            dead_code,
            undocumented,
            similar_pairs,
            complexity_critical,
            complexity_high,
            large_files_critical,
            large_files_warning,
            redundant_dependencies: redundant,
            ..
        } = &mut counts;
        let rules_slot = &mut rules_outcome;
        let scope = scope.as_path();
        let root = root.as_path();
        let facts = facts.as_ref();

        rayon::scope(move |s| {
            if let Some(facts) = facts {
                if wants(Check::DeadCode) {
                    s.spawn(move |_| {
                        *dead_code = Some(classify(facts, scope, &config.liveness, 0).total);
                    });
                }
                if wants(Check::Docs) {
                    s.spawn(move |_| *undocumented = Some(docs_of(facts, scope, 0).total));
                }
                if wants(Check::Similarity) {
                    s.spawn(move |_| {
                        let threshold = config.similarity.threshold;
                        *similar_pairs = Some(similarity_of(facts, scope, threshold, 0).total);
                    });
                }
                if wants(Check::Complexity) {
                    s.spawn(move |_| {
                        let stats = complexity_of(facts, scope, config.complexity.min_score, 0).stats;
                        *complexity_critical = Some(stats.critical);
                        *complexity_high = Some(stats.high);
                    });
                }
                if wants(Check::FileSize) {
                    s.spawn(move |_| {
                        let stats = file_sizes_of(facts, scope, &config.file_size, 0).stats;
                        *large_files_critical = Some(stats.critical);
                        *large_files_warning = Some(stats.warning);
                    });
                }
            }
            if wants(Check::Rules) {
                s.spawn(move |_| {
                    let options = RuleOptions {
                        limit: Some(0),
                        ..RuleOptions::default()
                    };
                    *rules_slot = Some(check_rules(scope, config, &options));
                });
            }
            if wants(Check::Dependencies) {
                s.spawn(move |_| {
                    let manifest = PackageManifest::load(root).unwrap_or_default();
                    *redundant = Some(redundant_dependencies(&manifest).len());
                });
            }
        });
    }

    if let Some(outcome) = rules_outcome {
        let rules = outcome?;
        let count = |sev| rules.by_severity.get(&sev).copied().unwrap_or(0);
        counts.rule_errors = Some(count(Severity::Error));
        counts.rule_warnings = Some(count(Severity::Warning));
    }

    debug!("health signals: {counts:?}");
    Ok(score_signals(&counts))
}
