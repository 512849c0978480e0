use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::matcher::CompiledRule;
use super::model::{Rule, RulePatch, RuleSet};
use crate::config::RulesConfig;
use crate::error::AtlasError;

const BUILTIN_SETS: &[(&str, &str)] = &[
    ("javascript", include_str!("builtin/javascript.toml")),
    ("react", include_str!("builtin/react.toml")),
    ("vue", include_str!("builtin/vue.toml")),
    ("lodash", include_str!("builtin/lodash.toml")),
    ("node", include_str!("builtin/node.toml")),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
    Builtin,
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct StoredSet {
    pub set: RuleSet,
    pub source: RuleSource,
}

/// Built-in rule sets plus one TOML file per set under the project's rule directory.
///
/// A stored file overrides the built-in set of the same name. Every write replaces the
/// whole file atomically (temp file in the same directory, then rename).
#[derive(Debug)]
pub struct RuleStore {
    directory: PathBuf,
    sets: BTreeMap<String, StoredSet>,
}

impl RuleStore {
    pub fn load(root: &Path, config: &RulesConfig) -> Self {
        let directory = root.join(&config.directory);
        let mut sets = BTreeMap::new();

        for (name, text) in BUILTIN_SETS {
            match parse_set(name, text) {
                Ok(set) => {
                    sets.insert(set.name.clone(), StoredSet {
                        set,
                        source: RuleSource::Builtin,
                    });
                }
                Err(err) => warn!("skipping built-in rule set: {err}"),
            }
        }

        let mut files: Vec<PathBuf> = match std::fs::read_dir(&directory) {
            Ok(entries) => entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("toml"))
                .collect(),
            Err(_) => Vec::new(),
        };
        files.sort();

        for path in files {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_owned();
            let loaded = std::fs::read_to_string(&path)
                .map_err(AtlasError::from)
                .and_then(|text| parse_set(&stem, &text));
            match loaded {
                Ok(set) => {
                    debug!("loaded rule set '{}' from {}", set.name, path.display());
                    sets.insert(set.name.clone(), StoredSet {
                        set,
                        source: RuleSource::File(path),
                    });
                }
                Err(err) => warn!("skipping {}: {err}", path.display()),
            }
        }

        Self { directory, sets }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn get(&self, name: &str) -> Option<&RuleSet> {
        self.sets.get(name).map(|s| &s.set)
    }

    pub fn source(&self, name: &str) -> Option<&RuleSource> {
        self.sets.get(name).map(|s| &s.source)
    }

    /// All sets in name order.
    pub fn sets(&self) -> impl Iterator<Item = &RuleSet> {
        self.sets.values().map(|s| &s.set)
    }

    /// Add `rule` to `set_name`, creating the set when it does not exist.
    pub fn add_rule(&mut self, set_name: &str, rule: Rule) -> Result<(), AtlasError> {
        validate_set_name(set_name)?;
        CompiledRule::compile(set_name, &rule)?;

        let mut set = self
            .get(set_name)
            .cloned()
            .unwrap_or_else(|| RuleSet::new(set_name));
        if set.rule(&rule.id).is_some() {
            return Err(AtlasError::DuplicateRule {
                set: set_name.to_owned(),
                id: rule.id,
            });
        }
        set.rules.push(rule);
        self.save(set)
    }

    pub fn update_rule(&mut self, set_name: &str, id: &str, patch: RulePatch) -> Result<Rule, AtlasError> {
        let mut set = self.existing(set_name)?.clone();
        let rule = set
            .rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AtlasError::UnknownRule {
                set: set_name.to_owned(),
                id: id.to_owned(),
            })?;
        patch.apply(rule);
        CompiledRule::compile(set_name, rule)?;
        let updated = rule.clone();
        self.save(set)?;
        Ok(updated)
    }

    pub fn delete_rule(&mut self, set_name: &str, id: &str) -> Result<Rule, AtlasError> {
        let mut set = self.existing(set_name)?.clone();
        let index = set
            .rules
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| AtlasError::UnknownRule {
                set: set_name.to_owned(),
                id: id.to_owned(),
            })?;
        let removed = set.rules.remove(index);
        self.save(set)?;
        Ok(removed)
    }

    fn existing(&self, set_name: &str) -> Result<&RuleSet, AtlasError> {
        self.get(set_name)
            .ok_or_else(|| AtlasError::UnknownRuleSet(set_name.to_owned()))
    }

    /// Write `set` to `<directory>/<name>.toml` as one atomic replacement.
    fn save(&mut self, set: RuleSet) -> Result<(), AtlasError> {
        std::fs::create_dir_all(&self.directory)?;
        let target = self.directory.join(format!("{}.toml", set.name));
        let text = toml::to_string_pretty(&set)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.directory)?;
        tmp.write_all(text.as_bytes())?;
        tmp.as_file().flush()?;
        tmp.persist(&target).map_err(|e| e.error)?;

        debug!("saved rule set '{}' to {}", set.name, target.display());
        self.sets.insert(set.name.clone(), StoredSet {
            set,
            source: RuleSource::File(target),
        });
        Ok(())
    }
}

/// Parse one set record; the file stem names it when the record has no `name`, and a
/// `name` that differs from the stem is rejected.
fn parse_set(stem: &str, text: &str) -> Result<RuleSet, AtlasError> {
    let mut set: RuleSet = toml::from_str(text).map_err(|e| AtlasError::Configuration {
        name: stem.to_owned(),
        reason: e.message().to_owned(),
    })?;
    if set.name.is_empty() {
        set.name = stem.to_owned();
    } else if set.name != stem {
        // Saves write `<name>.toml`, so the record must name its own file.
        return Err(AtlasError::Configuration {
            name: stem.to_owned(),
            reason: format!("record names the set '{}'; rename the file or the record", set.name),
        });
    }
    let mut seen = std::collections::HashSet::new();
    for rule in &set.rules {
        if !seen.insert(rule.id.as_str()) {
            return Err(AtlasError::Configuration {
                name: set.name.clone(),
                reason: format!("duplicate rule id '{}'", rule.id),
            });
        }
    }
    Ok(set)
}

fn validate_set_name(name: &str) -> Result<(), AtlasError> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !name.starts_with('.');
    if ok {
        Ok(())
    } else {
        Err(AtlasError::Configuration {
            name: name.to_owned(),
            reason: "set names may only contain letters, digits, '-', '_' and '.'".to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::model::{PatternKind, Severity};

    fn store(dir: &Path) -> RuleStore {
        RuleStore::load(dir, &RulesConfig::default())
    }

    #[test]
    fn test_builtins_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        for (name, _) in BUILTIN_SETS {
            assert_eq!(store.source(name), Some(&RuleSource::Builtin), "{name}");
        }
        assert!(store.get("javascript").unwrap().always_apply);
    }

    #[test]
    fn test_add_creates_file_and_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());
        store.add_rule("team", Rule::new("no-foo", "foo(")).unwrap();

        let path = dir.path().join(".code-atlas/rules/team.toml");
        assert!(path.exists());
        let reloaded = RuleStore::load(dir.path(), &RulesConfig::default());
        assert_eq!(reloaded.get("team").unwrap().rules[0].pattern, "foo(");

        assert!(matches!(
            store.add_rule("team", Rule::new("no-foo", "bar(")),
            Err(AtlasError::DuplicateRule { .. })
        ));
    }

    #[test]
    fn test_add_rejects_invalid_regex_and_bad_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());
        let mut rule = Rule::new("bad", "(");
        rule.kind = PatternKind::Regex;
        assert!(store.add_rule("team", rule).is_err());
        assert!(store.add_rule("../escape", Rule::new("r", "x")).is_err());
        assert!(!dir.path().join(".code-atlas/rules/team.toml").exists());
    }

    #[test]
    fn test_update_preserves_untouched_fields() {
        let dir = tempfile::tempdir().unwrap();
        let rules_dir = dir.path().join(".code-atlas/rules");
        std::fs::create_dir_all(&rules_dir).unwrap();
        std::fs::write(
            rules_dir.join("team.toml"),
            r#"
name = "team"
description = "House style"
owner = "platform"

[detect]
packages = ["express"]

[[rules]]
id = "a"
pattern = "res.send("
message = "Use res.json"
ticket = "PLAT-1"

[[rules]]
id = "b"
pattern = "app.del("
severity = "error"
"#,
        )
        .unwrap();

        let mut store = store(dir.path());
        let before = store.get("team").unwrap().clone();
        store
            .update_rule(
                "team",
                "a",
                RulePatch {
                    severity: Some(Severity::Info),
                    ..RulePatch::default()
                },
            )
            .unwrap();

        let after = RuleStore::load(dir.path(), &RulesConfig::default())
            .get("team")
            .unwrap()
            .clone();
        assert_eq!(after.description, before.description);
        assert_eq!(after.extra, before.extra);
        assert_eq!(after.detect, before.detect);
        assert_eq!(after.rules[1], before.rules[1]);
        assert_eq!(after.rules[0].severity, Severity::Info);
        assert_eq!(after.rules[0].message, before.rules[0].message);
        assert_eq!(after.rules[0].extra, before.rules[0].extra);
    }

    #[test]
    fn test_delete_and_unknown_targets() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());
        store.add_rule("team", Rule::new("x", "x(")).unwrap();
        assert_eq!(store.delete_rule("team", "x").unwrap().id, "x");
        assert!(store.get("team").unwrap().rules.is_empty());

        assert!(matches!(
            store.delete_rule("team", "x"),
            Err(AtlasError::UnknownRule { .. })
        ));
        assert!(matches!(
            store.delete_rule("nope", "x"),
            Err(AtlasError::UnknownRuleSet(_))
        ));
    }

    #[test]
    fn test_stored_set_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());
        let builtin_rules = store.get("react").unwrap().rules.len();
        store.add_rule("react", Rule::new("team-extra", "legacyThing(")).unwrap();

        let reloaded = RuleStore::load(dir.path(), &RulesConfig::default());
        assert!(matches!(reloaded.source("react"), Some(RuleSource::File(_))));
        assert_eq!(reloaded.get("react").unwrap().rules.len(), builtin_rules + 1);
    }

    #[test]
    fn test_malformed_file_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let rules_dir = dir.path().join(".code-atlas/rules");
        std::fs::create_dir_all(&rules_dir).unwrap();
        std::fs::write(rules_dir.join("broken.toml"), "rules = [[[").unwrap();
        std::fs::write(rules_dir.join("ok.toml"), "[[rules]]\nid = \"r\"\npattern = \"p\"\n").unwrap();

        let store = store(dir.path());
        assert!(store.get("broken").is_none());
        assert_eq!(store.get("ok").unwrap().name, "ok");
    }

    #[test]
    fn test_set_name_must_match_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let rules_dir = dir.path().join(".code-atlas/rules");
        std::fs::create_dir_all(&rules_dir).unwrap();
        std::fs::write(
            rules_dir.join("foo.toml"),
            "name = \"bar\"\n[[rules]]\nid = \"r\"\npattern = \"p\"\n",
        )
        .unwrap();

        let store = store(dir.path());
        assert!(store.get("bar").is_none());
        assert!(store.get("foo").is_none());
        assert!(matches!(
            parse_set("foo", "name = \"bar\"\n"),
            Err(AtlasError::Configuration { .. })
        ));
        assert_eq!(parse_set("foo", "name = \"foo\"\n").unwrap().name, "foo");
    }
}
