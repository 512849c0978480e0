use std::path::{Component, Path, PathBuf};

use crate::language::{LanguageKind, RESOLVE_EXTENSIONS};

/// Outcome of resolving one relative import specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// The specifier names a known project file.
    Resolved(PathBuf),
    /// No known file matched; the lexical target (default extension appended when the
    /// specifier had none). Importer bookkeeping still keys on it.
    Assumed(PathBuf),
    /// Bare package specifiers and specifiers without a base directory.
    Unresolved(String),
}

impl ResolutionOutcome {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ResolutionOutcome::Resolved(p) | ResolutionOutcome::Assumed(p) => Some(p),
            ResolutionOutcome::Unresolved(_) => None,
        }
    }
}

/// Resolve a relative specifier from the perspective of `from_file`.
///
/// Resolution is lexical against the set of known files (`is_known`), probing in order:
/// 1. the joined path as written
/// 2. a TypeScript sibling for a `.js`-family extension (`./a.js` -> `a.ts`)
/// 3. each script extension appended (`./a` -> `a.ts`, `a.tsx`, `a.js`, ...)
/// 4. a directory index (`./dir` -> `dir/index.ts`, ...)
///
/// Falls back to [`ResolutionOutcome::Assumed`] with `default_extension` appended.
pub fn resolve_relative<F>(
    from_file: &Path,
    specifier: &str,
    is_known: F,
    default_extension: &str,
) -> ResolutionOutcome
where
    F: Fn(&Path) -> bool,
{
    if !specifier.starts_with('.') {
        return ResolutionOutcome::Unresolved(format!("not a relative specifier: {specifier}"));
    }
    let Some(dir) = from_file.parent() else {
        return ResolutionOutcome::Unresolved("importing file has no parent directory".to_owned());
    };

    let base = normalize(&dir.join(specifier));
    if is_known(&base) {
        return ResolutionOutcome::Resolved(base);
    }

    let has_script_ext = LanguageKind::from_path(&base)
        .map(|k| k.is_script())
        .unwrap_or(false);

    if has_script_ext {
        for swapped in typescript_siblings(&base) {
            if is_known(&swapped) {
                return ResolutionOutcome::Resolved(swapped);
            }
        }
    }

    for ext in RESOLVE_EXTENSIONS {
        let candidate = append_extension(&base, ext);
        if is_known(&candidate) {
            return ResolutionOutcome::Resolved(candidate);
        }
    }

    for ext in RESOLVE_EXTENSIONS {
        let candidate = base.join(format!("index.{ext}"));
        if is_known(&candidate) {
            return ResolutionOutcome::Resolved(candidate);
        }
    }

    if has_script_ext {
        ResolutionOutcome::Assumed(base)
    } else {
        ResolutionOutcome::Assumed(append_extension(&base, default_extension))
    }
}

/// Lexically normalise `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `a.service` + `ts` -> `a.service.ts` (appends rather than replaces).
fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

fn typescript_siblings(path: &Path) -> Vec<PathBuf> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let targets: &[&str] = match ext {
        "js" => &["ts", "tsx"],
        "jsx" => &["tsx"],
        "mjs" => &["mts"],
        "cjs" => &["cts"],
        _ => &[],
    };
    targets.iter().map(|t| path.with_extension(t)).collect()
}
