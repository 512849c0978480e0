use tree_sitter::Language;

use crate::language::LanguageKind;

/// Return the tree-sitter [`Language`] for a script kind, or `None` for markup.
///
/// # Grammar selection rules
/// - `.ts`/`.mts`/`.cts` -> TypeScript grammar (`LANGUAGE_TYPESCRIPT`)
/// - `.tsx`              -> TSX grammar        (`LANGUAGE_TSX`)
///   These MUST be different: the TypeScript grammar cannot parse JSX, and the TSX grammar
///   breaks angle-bracket type assertions (`<T>expr`).
/// - `.js`/`.jsx`/`.mjs`/`.cjs` -> JavaScript grammar (`LANGUAGE`), which accepts JSX.
pub fn grammar_for(kind: LanguageKind) -> Option<Language> {
    match kind {
        LanguageKind::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        LanguageKind::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        LanguageKind::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
        LanguageKind::Markup => None,
    }
}

/// Stable slot index per grammar, used to key per-grammar query caches.
pub(crate) fn grammar_slot(kind: LanguageKind) -> Option<usize> {
    match kind {
        LanguageKind::TypeScript => Some(0),
        LanguageKind::Tsx => Some(1),
        LanguageKind::JavaScript => Some(2),
        LanguageKind::Markup => None,
    }
}

pub(crate) const GRAMMAR_COUNT: usize = 3;
