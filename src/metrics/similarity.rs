use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;

use crate::config::AtlasConfig;
use crate::language::is_generated_path;
use crate::parser::facts::FunctionFacts;
use crate::parser::syntax::FlowToken;
use crate::project::ProjectFacts;

/// Structure sequences shorter than this are too generic to compare.
const MIN_STRUCTURE_TOKENS: usize = 3;

/// The comparable shape of one named function.
#[derive(Debug, Clone)]
pub struct Signature<'a> {
    pub name: String,
    pub file: &'a Path,
    pub line: usize,
    pub params: &'a [String],
    pub is_async: bool,
    pub structure: &'a [FlowToken],
    pub calls: &'a BTreeSet<String>,
}

impl<'a> Signature<'a> {
    /// Anonymous functions have no signature.
    pub fn of(function: &'a FunctionFacts, file: &'a Path) -> Option<Self> {
        function.name.as_ref()?;
        Some(Self {
            name: function.display_name(),
            file,
            line: function.line,
            params: &function.params,
            is_async: function.is_async,
            structure: &function.structure,
            calls: &function.calls,
        })
    }

    fn bare_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

/// Score two signatures on a 0–100 scale.
///
/// | component                         | weight |
/// |-----------------------------------|--------|
/// | same parameter count              | 30     |
/// | parameter-name overlap            | 20     |
/// | same async-ness                   | 10     |
/// | identical structure / token overlap | 25   |
/// | call-name overlap                 | 15     |
pub fn similarity_score(a: &Signature, b: &Signature) -> u32 {
    let mut score = 0.0f64;

    if a.params.len() == b.params.len() {
        score += 30.0;
    }
    let pa: BTreeSet<&str> = a.params.iter().map(String::as_str).collect();
    let pb: BTreeSet<&str> = b.params.iter().map(String::as_str).collect();
    score += overlap(&pa, &pb) * 20.0;

    if a.is_async == b.is_async {
        score += 10.0;
    }

    if a.structure == b.structure {
        score += 25.0;
    } else {
        score += token_overlap(a.structure, b.structure) * 25.0;
    }

    let ca: BTreeSet<&str> = a.calls.iter().map(String::as_str).collect();
    let cb: BTreeSet<&str> = b.calls.iter().map(String::as_str).collect();
    score += overlap(&ca, &cb) * 15.0;

    score.round().clamp(0.0, 100.0) as u32
}

/// |A ∩ B| / |A ∪ B|; two empty sets overlap fully.
fn overlap(a: &BTreeSet<&str>, b: &BTreeSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Multiset intersection size over the longer sequence length.
fn token_overlap(a: &[FlowToken], b: &[FlowToken]) -> f64 {
    let longer = a.len().max(b.len());
    if longer == 0 {
        return 1.0;
    }
    let mut counts: HashMap<FlowToken, usize> = HashMap::new();
    for t in a {
        *counts.entry(*t).or_insert(0) += 1;
    }
    let mut common = 0usize;
    for t in b {
        if let Some(n) = counts.get_mut(t)
            && *n > 0
        {
            *n -= 1;
            common += 1;
        }
    }
    common as f64 / longer as f64
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionRef {
    pub name: String,
    pub file: PathBuf,
    pub line: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimilarPair {
    pub score: u32,
    pub a: FunctionRef,
    pub b: FunctionRef,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimilarityResult {
    pub total: usize,
    pub threshold: u32,
    pub pairs: Vec<SimilarPair>,
}

#[derive(Debug, Clone, Default)]
pub struct SimilarityOptions {
    pub threshold: Option<u32>,
    pub limit: Option<usize>,
}

pub fn score_similarity(
    path: &Path,
    config: &AtlasConfig,
    options: &SimilarityOptions,
) -> anyhow::Result<SimilarityResult> {
    let (facts, scope) = ProjectFacts::for_scope(path, config)?;
    Ok(similarity_of(
        &facts,
        &scope,
        options.threshold.unwrap_or(config.similarity.threshold),
        options.limit.unwrap_or(config.similarity.limit),
    ))
}

pub fn similarity_of(
    facts: &ProjectFacts,
    scope: &Path,
    threshold: u32,
    limit: usize,
) -> SimilarityResult {
    let signatures: Vec<Signature> = facts
        .in_scope(scope)
        .filter(|s| !is_generated_path(facts.relative(&s.path)))
        .flat_map(|sheet| {
            let file = facts.relative(&sheet.path);
            sheet
                .functions
                .iter()
                .filter_map(move |f| Signature::of(f, file))
        })
        .filter(|s| s.structure.len() >= MIN_STRUCTURE_TOKENS)
        .collect();

    let mut pairs: Vec<SimilarPair> = (0..signatures.len())
        .into_par_iter()
        .flat_map_iter(|i| {
            let signatures = &signatures;
            (i + 1..signatures.len()).filter_map(move |j| {
                let (a, b) = (&signatures[i], &signatures[j]);
                if a.file == b.file && a.bare_name() == b.bare_name() {
                    return None;
                }
                let score = similarity_score(a, b);
                (score >= threshold).then(|| SimilarPair {
                    score,
                    a: function_ref(a),
                    b: function_ref(b),
                })
            })
        })
        .collect();

    pairs.sort_by(|x, y| {
        y.score
            .cmp(&x.score)
            .then_with(|| x.a.file.cmp(&y.a.file))
            .then(x.a.line.cmp(&y.a.line))
            .then_with(|| x.b.file.cmp(&y.b.file))
            .then(x.b.line.cmp(&y.b.line))
    });

    let total = pairs.len();
    pairs.truncate(limit);
    SimilarityResult {
        total,
        threshold,
        pairs,
    }
}

fn function_ref(s: &Signature) -> FunctionRef {
    FunctionRef {
        name: s.name.clone(),
        file: s.file.to_path_buf(),
        line: s.line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::test_support::project;

    const BODY: &str = "if (a) { return b; } for (const x of a) { if (x) { throw x; } } return null;";

    #[test]
    fn test_identical_shapes_score_100() {
        let facts = project(&[
            ("a.js", &format!("function loadUser(a, b) {{ {BODY} }}")),
            ("b.js", &format!("function loadOrder(a, b) {{ {BODY} }}")),
        ]);
        let result = similarity_of(&facts, &facts.root, 60, 10);
        assert_eq!(result.total, 1);
        assert_eq!(result.pairs[0].score, 100);
        assert_eq!(result.pairs[0].a.name, "loadUser");
        assert_eq!(result.pairs[0].b.name, "loadOrder");
    }

    #[test]
    fn test_only_param_count_in_common_not_reported() {
        let facts = project(&[(
            "a.js",
            r#"
function first(a, b) { if (a) { return b; } if (b) { return a; } return 0; }
async function second(x, y) { for (const i of x) { await y(i); } while (y) { y = null; } try { z(); } catch (e) { log(e); } }
"#,
        )]);
        let result = similarity_of(&facts, &facts.root, 60, 10);
        assert_eq!(result.total, 0);

        let sheet = &facts.sheets[0];
        let a = Signature::of(&sheet.functions[0], Path::new("a.js")).unwrap();
        let b = Signature::of(&sheet.functions[1], Path::new("a.js")).unwrap();
        assert!(similarity_score(&a, &b) < 60);
    }

    #[test]
    fn test_same_file_same_name_skipped() {
        let src = format!(
            "class A {{ run(a) {{ {BODY} }} }}\nclass B {{ run(a) {{ {BODY} }} }}"
        );
        let facts = project(&[("m.js", &src)]);
        assert_eq!(similarity_of(&facts, &facts.root, 60, 10).total, 0);
    }

    #[test]
    fn test_short_structures_skipped() {
        let facts = project(&[
            ("a.js", "function a(x) { return x; }"),
            ("b.js", "function b(x) { return x; }"),
        ]);
        assert_eq!(similarity_of(&facts, &facts.root, 0, 10).total, 0);
    }

    #[test]
    fn test_token_overlap_is_multiset() {
        use FlowToken::*;
        assert_eq!(token_overlap(&[If, If, Return], &[If, Return, Return]), 2.0 / 3.0);
        assert_eq!(token_overlap(&[], &[]), 1.0);
    }
}
