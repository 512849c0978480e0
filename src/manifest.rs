use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

pub const MANIFEST_FILE: &str = "package.json";

/// The parts of `package.json` the analyzers read.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PackageManifest {
    pub main: Option<String>,
    pub module: Option<String>,
    pub dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(rename = "devDependencies")]
    pub dev_dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(rename = "peerDependencies")]
    pub peer_dependencies: BTreeMap<String, serde_json::Value>,
}

impl PackageManifest {
    /// Read `<root>/package.json`. Missing is `None`; malformed is `None` with a warning.
    pub fn load(root: &Path) -> Option<Self> {
        let path = root.join(MANIFEST_FILE);
        let text = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<Self>(&text) {
            Ok(manifest) => Some(manifest),
            Err(err) => {
                warn!("failed to parse {}: {err}", path.display());
                None
            }
        }
    }

    /// Every declared package name across all dependency tables.
    pub fn all_dependencies(&self) -> impl Iterator<Item = &str> {
        self.dependencies
            .keys()
            .chain(self.dev_dependencies.keys())
            .chain(self.peer_dependencies.keys())
            .map(String::as_str)
    }

    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.contains_key(name)
            || self.dev_dependencies.contains_key(name)
            || self.peer_dependencies.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_reads_dependency_tables() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{ "main": "lib/index.js", "dependencies": { "react": "^18" },
                 "devDependencies": { "jest": "29" }, "scripts": { "test": "jest" } }"#,
        )
        .unwrap();
        let manifest = PackageManifest::load(dir.path()).unwrap();
        assert_eq!(manifest.main.as_deref(), Some("lib/index.js"));
        assert!(manifest.depends_on("jest"));
        assert_eq!(manifest.all_dependencies().collect::<Vec<_>>(), vec!["react", "jest"]);
    }

    #[test]
    fn test_missing_and_malformed_are_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(PackageManifest::load(dir.path()).is_none());
        std::fs::write(dir.path().join(MANIFEST_FILE), "{ not json").unwrap();
        assert!(PackageManifest::load(dir.path()).is_none());
    }
}
