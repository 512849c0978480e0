use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{AtlasConfig, FileSizeConfig};
use crate::language::is_generated_path;
use crate::parser::facts::FactSheet;
use crate::project::ProjectFacts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeRating {
    Ok,
    Warning,
    Critical,
}

impl SizeRating {
    pub fn of(points: u32) -> Self {
        match points {
            4.. => SizeRating::Critical,
            2..=3 => SizeRating::Warning,
            _ => SizeRating::Ok,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeRating::Ok => "ok",
            SizeRating::Warning => "warning",
            SizeRating::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileSizeItem {
    pub file: PathBuf,
    pub lines: usize,
    pub functions: usize,
    pub classes: usize,
    pub exports: usize,
    pub points: u32,
    pub rating: SizeRating,
    /// Human-readable reasons, one per metric over a tier.
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FileSizeStats {
    pub files: usize,
    pub critical: usize,
    pub warning: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileSizeResult {
    /// Files rated warning or critical.
    pub total: usize,
    pub stats: FileSizeStats,
    pub items: Vec<FileSizeItem>,
}

pub fn score_file_sizes(
    path: &Path,
    config: &AtlasConfig,
    limit: Option<usize>,
) -> anyhow::Result<FileSizeResult> {
    let (facts, scope) = ProjectFacts::for_scope(path, config)?;
    Ok(file_sizes_of(
        &facts,
        &scope,
        &config.file_size,
        limit.unwrap_or(config.file_size.limit),
    ))
}

pub fn file_sizes_of(
    facts: &ProjectFacts,
    scope: &Path,
    thresholds: &FileSizeConfig,
    limit: usize,
) -> FileSizeResult {
    let mut stats = FileSizeStats::default();
    let mut items = Vec::new();

    for sheet in facts.in_scope(scope) {
        if is_generated_path(facts.relative(&sheet.path)) {
            continue;
        }
        stats.files += 1;
        let item = measure(sheet, facts.relative(&sheet.path), thresholds);
        match item.rating {
            SizeRating::Ok => continue,
            SizeRating::Warning => stats.warning += 1,
            SizeRating::Critical => stats.critical += 1,
        }
        items.push(item);
    }

    items.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then(b.lines.cmp(&a.lines))
            .then_with(|| a.file.cmp(&b.file))
    });

    let total = items.len();
    items.truncate(limit);
    FileSizeResult {
        total,
        stats,
        items,
    }
}

/// Score one file against the two-tier thresholds.
pub fn measure(sheet: &FactSheet, file: &Path, thresholds: &FileSizeConfig) -> FileSizeItem {
    let lines = sheet.line_count;
    let functions = sheet.functions.len();
    let classes = sheet.classes.len();
    let exports = sheet.exports.len();

    let mut points = 0;
    let mut reasons = Vec::new();
    for (label, value, tiers) in [
        ("lines", lines, thresholds.lines),
        ("functions", functions, thresholds.functions),
        ("classes", classes, thresholds.classes),
        ("exports", exports, thresholds.exports),
    ] {
        let (upper, lower) = tiers;
        if value > upper {
            points += 2;
            reasons.push(format!("{value} {label} (>{upper})"));
        } else if value > lower {
            points += 1;
            reasons.push(format!("{value} {label} (>{lower})"));
        }
    }

    FileSizeItem {
        file: file.to_path_buf(),
        lines,
        functions,
        classes,
        exports,
        points,
        rating: SizeRating::of(points),
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::test_support::project;

    fn functions(n: usize) -> String {
        (0..n).map(|i| format!("function f{i}() {{ return {i}; }}\n")).collect()
    }

    #[test]
    fn test_small_file_is_ok_and_not_listed() {
        let facts = project(&[("a.js", "function a() {}\n")]);
        let result = file_sizes_of(&facts, &facts.root, &FileSizeConfig::default(), 10);
        assert_eq!(result.total, 0);
        assert_eq!(result.stats.files, 1);
    }

    #[test]
    fn test_tiers_accumulate_points() {
        // 25 functions: lower tier (1 point); padded past 300 lines: lower tier (1 point).
        let mut src = functions(25);
        src.push_str(&"\n".repeat(300));
        let facts = project(&[("big.js", &src)]);
        let result = file_sizes_of(&facts, &facts.root, &FileSizeConfig::default(), 10);
        assert_eq!(result.total, 1);
        let item = &result.items[0];
        assert_eq!(item.functions, 25);
        assert_eq!(item.points, 2);
        assert_eq!(item.rating, SizeRating::Warning);
        assert_eq!(item.reasons.len(), 2);
    }

    #[test]
    fn test_upper_tiers_make_critical() {
        let mut src = functions(31);
        src.push_str(&"\n".repeat(520));
        let facts = project(&[("huge.js", &src), ("mid.js", &functions(21))]);
        let result = file_sizes_of(&facts, &facts.root, &FileSizeConfig::default(), 10);
        assert_eq!(result.stats.critical, 1);
        assert_eq!(result.items[0].file, PathBuf::from("huge.js"));
        assert_eq!(result.items[0].points, 4);
        // mid.js only crosses the lower function tier
        assert_eq!(result.total, 1);
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = FileSizeConfig {
            classes: (1, 0),
            ..FileSizeConfig::default()
        };
        let facts = project(&[("c.js", "class A {}\nclass B {}\n")]);
        let result = file_sizes_of(&facts, &facts.root, &thresholds, 10);
        assert_eq!(result.items[0].points, 2);
        assert_eq!(result.items[0].rating, SizeRating::Warning);
    }

    #[test]
    fn test_rating_edges() {
        assert_eq!(SizeRating::of(1), SizeRating::Ok);
        assert_eq!(SizeRating::of(2), SizeRating::Warning);
        assert_eq!(SizeRating::of(4), SizeRating::Critical);
    }
}
