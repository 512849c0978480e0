use std::path::PathBuf;

use thiserror::Error;

/// Structured failures surfaced to callers of the query layer.
///
/// Per-file problems (unparseable source, unreadable file, unresolvable import)
/// never reach this type: they are logged and degrade to an empty contribution.
#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("path not found: {}", .0.display())]
    MissingPath(PathBuf),

    /// The caller referenced a short code or name absent from the current graph.
    /// This is normal caller input, rendered as a readable message.
    #[error("{}", unknown_symbol_message(.query, .suggestions))]
    UnknownSymbol {
        query: String,
        suggestions: Vec<String>,
    },

    #[error("invalid rule set '{name}': {reason}")]
    Configuration { name: String, reason: String },

    #[error("rule set '{0}' not found")]
    UnknownRuleSet(String),

    #[error("rule '{id}' not found in rule set '{set}'")]
    UnknownRule { set: String, id: String },

    #[error("rule '{id}' already exists in rule set '{set}'")]
    DuplicateRule { set: String, id: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

fn unknown_symbol_message(query: &str, suggestions: &[String]) -> String {
    let mut msg = format!("Symbol '{}' not found.", query);
    if !suggestions.is_empty() {
        msg.push_str(&format!(" Did you mean: {}?", suggestions.join(", ")));
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_symbol_message_lists_suggestions() {
        let err = AtlasError::UnknownSymbol {
            query: "getUsr".into(),
            suggestions: vec!["getUser".into(), "getUsers".into()],
        };
        assert_eq!(
            err.to_string(),
            "Symbol 'getUsr' not found. Did you mean: getUser, getUsers?"
        );
    }

    #[test]
    fn test_unknown_symbol_message_without_suggestions() {
        let err = AtlasError::UnknownSymbol {
            query: "zz".into(),
            suggestions: Vec::new(),
        };
        assert_eq!(err.to_string(), "Symbol 'zz' not found.");
    }
}
