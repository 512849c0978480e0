use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Violation severity. Ordered most severe first, so sorting puts errors on top.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    #[default]
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Some(Severity::Error),
            "warning" | "warn" => Some(Severity::Warning),
            "info" => Some(Severity::Info),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    #[default]
    Literal,
    Regex,
}

/// One pattern rule as stored on disk.
///
/// Fields the engine does not know are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub pattern: String,
    #[serde(default)]
    pub kind: PatternKind,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    /// Glob (relative to the project root, `{a,b}` alternation allowed); all files when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    /// Markup tag the match must sit inside, e.g. `template`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, toml::Value>,
}

impl Rule {
    pub fn new(id: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pattern: pattern.into(),
            kind: PatternKind::Literal,
            severity: Severity::Warning,
            message: None,
            replacement: None,
            files: None,
            exclude: Vec::new(),
            context: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Partial update for an existing rule; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct RulePatch {
    pub pattern: Option<String>,
    pub kind: Option<PatternKind>,
    pub severity: Option<Severity>,
    pub message: Option<String>,
    pub replacement: Option<String>,
    pub files: Option<String>,
    pub exclude: Option<Vec<String>>,
    pub context: Option<String>,
}

impl RulePatch {
    pub fn apply(self, rule: &mut Rule) {
        if let Some(pattern) = self.pattern {
            rule.pattern = pattern;
        }
        if let Some(kind) = self.kind {
            rule.kind = kind;
        }
        if let Some(severity) = self.severity {
            rule.severity = severity;
        }
        if let Some(message) = self.message {
            rule.message = Some(message);
        }
        if let Some(replacement) = self.replacement {
            rule.replacement = Some(replacement);
        }
        if let Some(files) = self.files {
            rule.files = Some(files);
        }
        if let Some(exclude) = self.exclude {
            rule.exclude = exclude;
        }
        if let Some(context) = self.context {
            rule.context = Some(context);
        }
    }
}

/// Project fingerprints that switch a rule set on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Detect {
    /// Dependency names in `package.json`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<String>,
    /// Module specifiers imported by sample files.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    /// Raw text fragments found in sample files.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fragments: Vec<String>,
}

impl Detect {
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.imports.is_empty() && self.fragments.is_empty()
    }
}

/// A named collection of rules; one TOML file per set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub always_apply: bool,
    #[serde(default, skip_serializing_if = "Detect::is_empty")]
    pub detect: Detect,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, toml::Value>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            always_apply: false,
            detect: Detect::default(),
            rules: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }
}

/// One pattern hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub rule_id: String,
    pub rule_set: String,
    pub severity: Severity,
    /// Path relative to the project root.
    pub file: String,
    pub line: usize,
    pub matched_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_replacement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
