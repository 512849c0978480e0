use serde::Serialize;

use crate::manifest::PackageManifest;

/// Packages that solve the same problem; a project needs at most one of each.
const OVERLAPPING_FAMILIES: &[(&str, &[&str])] = &[
    ("date", &["moment", "dayjs", "date-fns", "luxon"]),
    ("http", &["axios", "node-fetch", "got", "superagent", "request"]),
    ("utility", &["lodash", "underscore", "ramda"]),
    ("test runner", &["jest", "mocha", "vitest", "jasmine", "ava"]),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedundantDependency {
    pub name: String,
    pub reason: String,
}

/// Dependencies that are declared twice or duplicate another package's job.
pub fn redundant_dependencies(manifest: &PackageManifest) -> Vec<RedundantDependency> {
    let mut out = Vec::new();

    for name in manifest.dependencies.keys() {
        if manifest.dev_dependencies.contains_key(name) {
            out.push(RedundantDependency {
                name: name.clone(),
                reason: "listed in both dependencies and devDependencies".to_owned(),
            });
        }
    }

    for (family, members) in OVERLAPPING_FAMILIES {
        let present: Vec<&str> = members
            .iter()
            .copied()
            .filter(|m| manifest.depends_on(m))
            .collect();
        if let Some((kept, extra)) = present.split_first() {
            for name in extra {
                out.push(RedundantDependency {
                    name: (*name).to_owned(),
                    reason: format!("overlaps with {kept} ({family} library)"),
                });
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(json: &str) -> PackageManifest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_declared_twice() {
        let m = manifest(r#"{ "dependencies": { "chalk": "5" }, "devDependencies": { "chalk": "5" } }"#);
        let found = redundant_dependencies(&m);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "chalk");
    }

    #[test]
    fn test_overlapping_family_keeps_first() {
        let m = manifest(
            r#"{ "dependencies": { "dayjs": "1", "moment": "2", "axios": "1" },
                 "devDependencies": { "jest": "29", "vitest": "1" } }"#,
        );
        let names: Vec<String> = redundant_dependencies(&m).into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["dayjs", "vitest"]);
    }

    #[test]
    fn test_clean_manifest() {
        let m = manifest(r#"{ "dependencies": { "react": "18" }, "devDependencies": { "jest": "29" } }"#);
        assert!(redundant_dependencies(&m).is_empty());
    }
}
