use std::collections::HashMap;

use serde::{Serialize, Serializer};

/// Bidirectional full-name ↔ short-code mapping.
///
/// Codes are unique within one legend and depend only on insertion order:
/// rebuilding from the same ordered name list yields the same codes.
#[derive(Debug, Clone, Default)]
pub struct Legend {
    entries: Vec<(String, String)>,
    by_name: HashMap<String, usize>,
    by_code: HashMap<String, usize>,
}

impl Legend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a legend from names in order. Repeated names keep their first code.
    pub fn build<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut legend = Self::new();
        for name in names {
            legend.insert(name);
        }
        legend
    }

    /// Assign a code to `name` (or return the code it already has).
    ///
    /// On collision the base code gets an increasing integer suffix (`gU`, `gU1`, `gU2`, …)
    /// until unused; the first claimant keeps the bare code.
    pub fn insert(&mut self, name: &str) -> &str {
        if let Some(&i) = self.by_name.get(name) {
            return &self.entries[i].1;
        }

        let base = base_code(name);
        let mut code = base.clone();
        let mut suffix = 1usize;
        while self.by_code.contains_key(&code) {
            code = format!("{base}{suffix}");
            suffix += 1;
        }

        let index = self.entries.len();
        self.by_name.insert(name.to_owned(), index);
        self.by_code.insert(code.clone(), index);
        self.entries.push((name.to_owned(), code));
        &self.entries[index].1
    }

    pub fn code_of(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(|&i| self.entries[i].1.as_str())
    }

    pub fn name_of(&self, code: &str) -> Option<&str> {
        self.by_code.get(code).map(|&i| self.entries[i].0.as_str())
    }

    /// Resolve either a code or a full name to its code.
    pub fn resolve(&self, code_or_name: &str) -> Option<&str> {
        if self.by_code.contains_key(code_or_name) {
            return self.by_code.get(code_or_name).map(|&i| self.entries[i].1.as_str());
        }
        self.code_of(code_or_name)
    }

    /// `(name, code)` pairs in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, c)| (n.as_str(), c.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Legend {
    /// Serialized as a `code -> name` map in insertion order.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, code) in &self.entries {
            map.serialize_entry(code, name)?;
        }
        map.end()
    }
}

/// Derive the unsuffixed code for a name.
///
/// - PascalCase with ≥2 uppercase letters: the uppercase letters, at most 3 (`UserService` → `US`)
/// - otherwise, first char lowercased + first uppercase after position 0 (`getUser` → `gU`)
/// - otherwise the first 2 characters verbatim (`load` → `lo`, `Widget` → `Wi`)
pub fn base_code(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let Some(&first) = chars.first() else {
        return String::new();
    };

    if first.is_uppercase() {
        let upper: Vec<char> = chars.iter().copied().filter(|c| c.is_uppercase()).collect();
        if upper.len() >= 2 {
            return upper.into_iter().take(3).collect();
        }
    }

    if let Some(&hump) = chars.iter().skip(1).find(|c| c.is_uppercase()) {
        let mut code: String = first.to_lowercase().collect();
        code.push(hump);
        return code;
    }

    chars.into_iter().take(2).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_base_code_rules() {
        assert_eq!(base_code("UserService"), "US");
        assert_eq!(base_code("HTTPClientFactory"), "HTT");
        assert_eq!(base_code("getUser"), "gU");
        assert_eq!(base_code("load"), "lo");
        assert_eq!(base_code("Widget"), "Wi");
        assert_eq!(base_code("x"), "x");
        assert_eq!(base_code("_privateHelper"), "_H");
    }

    #[test]
    fn test_collision_suffixing_first_claimant_keeps_base() {
        let legend = Legend::build(["getUser", "getUsers", "gitUrl"]);
        assert_eq!(legend.code_of("getUser"), Some("gU"));
        assert_eq!(legend.code_of("getUsers"), Some("gU1"));
        assert_eq!(legend.code_of("gitUrl"), Some("gU2"));
        assert_eq!(legend.name_of("gU1"), Some("getUsers"));
    }

    #[test]
    fn test_codes_unique_and_deterministic() {
        let names: Vec<String> = (0..200)
            .map(|i| match i % 4 {
                0 => format!("getItem{i}"),
                1 => format!("GetItem{i}"),
                2 => format!("item{i}"),
                _ => "UserService".to_string(),
            })
            .collect();
        let a = Legend::build(names.iter().map(|s| s.as_str()));
        let b = Legend::build(names.iter().map(|s| s.as_str()));

        let codes: HashSet<&str> = a.entries().map(|(_, c)| c).collect();
        assert_eq!(codes.len(), a.len(), "no two names share a code");
        assert_eq!(
            a.entries().collect::<Vec<_>>(),
            b.entries().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_resolve_accepts_code_or_name() {
        let legend = Legend::build(["UserService"]);
        assert_eq!(legend.resolve("US"), Some("US"));
        assert_eq!(legend.resolve("UserService"), Some("US"));
        assert_eq!(legend.resolve("nope"), None);
    }
}
