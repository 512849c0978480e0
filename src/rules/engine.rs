use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use super::detect::detect_sets;
use super::matcher::{CompiledRule, tag_depth};
use super::model::{RuleSet, Severity, Violation};
use super::store::RuleStore;
use crate::config::AtlasConfig;
use crate::error::AtlasError;
use crate::walker::{WalkFilter, find_project_root, walk_project};

#[derive(Debug, Clone, Default)]
pub struct RuleOptions {
    /// Run exactly these sets, bypassing detection.
    pub sets: Option<Vec<String>>,
    /// Drop violations less severe than this.
    pub min_severity: Option<Severity>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleCheckResult {
    pub total: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_rule: BTreeMap<String, usize>,
    /// Rule sets that ran, in run order.
    pub sets: Vec<String>,
    pub violations: Vec<Violation>,
}

/// Check every script and markup file under `path` against the applicable rule sets.
pub fn check_rules(
    path: &Path,
    config: &AtlasConfig,
    options: &RuleOptions,
) -> anyhow::Result<RuleCheckResult> {
    let scope = path
        .canonicalize()
        .map_err(|_| AtlasError::MissingPath(path.to_path_buf()))?;
    let root = find_project_root(&scope);
    let store = RuleStore::load(&root, &config.rules);
    let files: Vec<PathBuf> = walk_project(&root, config, WalkFilter::ScriptsAndMarkup)?
        .into_iter()
        .filter(|f| f.starts_with(&scope))
        .collect();

    let sets: Vec<&RuleSet> = match &options.sets {
        Some(names) => names
            .iter()
            .map(|n| store.get(n).ok_or_else(|| AtlasError::UnknownRuleSet(n.clone())))
            .collect::<Result<_, _>>()?,
        None => detect_sets(&root, store.sets(), &files, &config.rules.disabled_sets),
    };
    info!(
        "checking {} file(s) against {} rule set(s)",
        files.len(),
        sets.len()
    );

    let mut result = run_rules(&root, &files, &sets, options.min_severity);
    result.violations.truncate(options.limit.unwrap_or(config.rules.limit));
    Ok(result)
}

/// Match `sets` over `files`. Uncapped; violations sorted by severity, file, line.
pub fn run_rules(
    root: &Path,
    files: &[PathBuf],
    sets: &[&RuleSet],
    min_severity: Option<Severity>,
) -> RuleCheckResult {
    let compiled: Vec<CompiledRule> = sets
        .iter()
        .flat_map(|set| set.rules.iter().map(move |rule| (set.name.as_str(), rule)))
        .filter(|(_, rule)| min_severity.is_none_or(|min| rule.severity <= min))
        .filter_map(|(set, rule)| match CompiledRule::compile(set, rule) {
            Ok(c) => Some(c),
            Err(err) => {
                warn!("skipping rule: {err}");
                None
            }
        })
        .collect();

    let mut violations: Vec<Violation> = files
        .par_iter()
        .flat_map_iter(|file| {
            let relative = file
                .strip_prefix(root)
                .unwrap_or(file)
                .to_string_lossy()
                .replace('\\', "/");
            match std::fs::read_to_string(file) {
                Ok(text) => check_text(&relative, &text, &compiled),
                Err(err) => {
                    warn!("skipping unreadable file {}: {err}", file.display());
                    Vec::new()
                }
            }
        })
        .collect();

    violations.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then_with(|| a.file.cmp(&b.file))
            .then(a.line.cmp(&b.line))
            .then_with(|| a.rule_id.cmp(&b.rule_id))
    });

    let mut by_severity = BTreeMap::new();
    let mut by_rule = BTreeMap::new();
    for v in &violations {
        *by_severity.entry(v.severity).or_insert(0) += 1;
        *by_rule.entry(v.rule_id.clone()).or_insert(0) += 1;
    }

    RuleCheckResult {
        total: violations.len(),
        by_severity,
        by_rule,
        sets: sets.iter().map(|s| s.name.clone()).collect(),
        violations,
    }
}

/// Match every rule against one file's text.
///
/// `(line, matched text)` is reported once per file: the first rule in set order wins.
pub fn check_text(relative: &str, text: &str, rules: &[CompiledRule]) -> Vec<Violation> {
    let applicable: Vec<&CompiledRule> = rules.iter().filter(|r| r.applies_to(relative)).collect();
    if applicable.is_empty() {
        return Vec::new();
    }

    let mut seen: HashSet<(usize, String)> = HashSet::new();
    let mut out = Vec::new();
    let mut consumed = 0usize;
    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        for rule in &applicable {
            let Some((_, matched)) = rule.find_live(line) else {
                continue;
            };
            if let Some(tag) = &rule.rule.context {
                let through_line = &text[..consumed + line.len()];
                if tag_depth(through_line, tag) <= 0 {
                    continue;
                }
            }
            if !seen.insert((line_no, matched.clone())) {
                continue;
            }
            out.push(Violation {
                rule_id: rule.rule.id.clone(),
                rule_set: rule.set.to_owned(),
                severity: rule.rule.severity,
                file: relative.to_owned(),
                line: line_no,
                matched_text: matched,
                suggested_replacement: rule.rule.replacement.clone(),
                message: rule.rule.message.clone(),
            });
        }
        consumed += line.len() + line_ending_len(&text[consumed + line.len()..]);
    }
    out
}

fn line_ending_len(rest: &str) -> usize {
    if rest.starts_with("\r\n") {
        2
    } else if rest.starts_with('\n') {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::model::{PatternKind, Rule};

    fn set(name: &str, rules: Vec<Rule>) -> RuleSet {
        let mut s = RuleSet::new(name);
        s.rules = rules;
        s
    }

    fn check(relative: &str, text: &str, sets: &[RuleSet]) -> Vec<Violation> {
        let compiled: Vec<CompiledRule> = sets
            .iter()
            .flat_map(|s| s.rules.iter().map(move |r| CompiledRule::compile(&s.name, r).unwrap()))
            .collect();
        check_text(relative, text, &compiled)
    }

    #[test]
    fn test_string_hit_ignored_next_line_reported() {
        let sets = [set("s", vec![Rule::new("no-eval", "eval(")])];
        let text = "const help = 'avoid eval( here';\neval(userInput);\n";
        let got = check("a.js", text, &sets);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].line, 2);
        assert_eq!(got[0].matched_text, "eval(");
    }

    #[test]
    fn test_multiline_comment_is_not_understood() {
        let sets = [set("s", vec![Rule::new("no-eval", "eval(")])];
        let text = "/*\n  eval(x) was here\n*/\n// eval(y)\n";
        let got = check("a.js", text, &sets);
        // Only the second line of the block comment is reported; `//` comments are exempt.
        assert_eq!(got.iter().map(|v| v.line).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_same_hit_from_two_sets_reported_once() {
        let mut first = Rule::new("legacy-a", "oldApi(");
        first.severity = Severity::Error;
        let second = Rule::new("legacy-b", "oldApi(");
        let sets = [set("one", vec![first]), set("two", vec![second])];
        let got = check("x.ts", "oldApi(1);\n", &sets);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].rule_set, "one");
        assert_eq!(got[0].rule_id, "legacy-a");
    }

    #[test]
    fn test_markup_context_gates_matches() {
        let mut rule = Rule::new("v-html", "v-html=");
        rule.context = Some("template".into());
        let sets = [set("vue", vec![rule])];
        let text = r#"<template>
  <div v-html="raw"></div>
</template>
<script>
const doc = { attr: 1 }; el.setAttribute(name, v); // v-html= in a comment
const t = h('div', { 'v-html=': 1 });
const s = tpl + v-html=bad;
</script>
"#;
        let got = check("App.vue", text, &sets);
        assert_eq!(got.iter().map(|v| v.line).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_context_depth_counts_through_whole_line() {
        let mut rule = Rule::new("v-html", "v-html=");
        rule.context = Some("template".into());
        let sets = [set("vue", vec![rule])];

        // Opened and closed on the same line: depth after the line is back to zero.
        let one_line = "<template><div v-html=\"x\"></div></template>\n";
        assert!(check("App.vue", one_line, &sets).is_empty());

        let still_open = "<template><div v-html=\"x\"></div>\n</template>\n";
        assert_eq!(check("App.vue", still_open, &sets).len(), 1);
    }

    #[test]
    fn test_file_globs_limit_rules() {
        let mut rule = Rule::new("tsx-only", "any");
        rule.files = Some("**/*.tsx".into());
        let sets = [set("s", vec![rule])];
        assert!(check("src/a.ts", "let x: any;\n", &sets).is_empty());
        assert_eq!(check("src/a.tsx", "let x: any;\n", &sets).len(), 1);
    }

    #[test]
    fn test_run_rules_sorts_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.js");
        let b = dir.path().join("b.js");
        std::fs::write(&a, "foo();\nbar();\n").unwrap();
        std::fs::write(&b, "bar();\n").unwrap();

        let mut bar = Rule::new("no-bar", "bar(");
        bar.severity = Severity::Error;
        let mut foo = Rule::new("no-foo", r"\bfoo\(");
        foo.kind = PatternKind::Regex;
        foo.severity = Severity::Info;
        let s = set("s", vec![foo, bar]);

        let result = run_rules(dir.path(), &[a.clone(), b.clone()], &[&s], None);
        assert_eq!(result.total, 3);
        let order: Vec<(String, usize)> = result
            .violations
            .iter()
            .map(|v| (v.file.clone(), v.line))
            .collect();
        assert_eq!(
            order,
            vec![("a.js".into(), 2), ("b.js".into(), 1), ("a.js".into(), 1)]
        );
        assert_eq!(result.by_severity[&Severity::Error], 2);
        assert_eq!(result.by_rule["no-foo"], 1);

        let errors_only = run_rules(dir.path(), &[a, b], &[&s], Some(Severity::Error));
        assert_eq!(errors_only.total, 2);
    }

    #[test]
    fn test_check_rules_detects_and_caps() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        std::fs::write(
            dir.path().join("legacy.js"),
            "var a = 1;\nvar b = 2;\nvar c = 3;\n",
        )
        .unwrap();

        let options = RuleOptions {
            limit: Some(2),
            ..RuleOptions::default()
        };
        let result = check_rules(dir.path(), &AtlasConfig::default(), &options).unwrap();
        assert_eq!(result.sets, vec!["javascript"]);
        assert_eq!(result.by_rule["no-var"], 3);
        assert_eq!(result.total, 3);
        assert_eq!(result.violations.len(), 2);
    }

    #[test]
    fn test_unknown_explicit_set_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let options = RuleOptions {
            sets: Some(vec!["nope".into()]),
            ..RuleOptions::default()
        };
        let err = check_rules(dir.path(), &AtlasConfig::default(), &options).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AtlasError>(),
            Some(AtlasError::UnknownRuleSet(_))
        ));
    }
}
