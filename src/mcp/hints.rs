/// Next-step hints appended to MCP tool responses.
///
/// Each function returns a `String` that starts with `\n` so the hint lands on its own
/// line after the response body. Empty string means no hint.

pub fn graph_hint(orphans: usize) -> String {
    if orphans > 0 {
        "\nhint: lookup_symbol <code> | alt: find_dead_code".to_owned()
    } else {
        "\nhint: lookup_symbol <code>".to_owned()
    }
}

pub fn lookup_hint(address: &str, has_callees: bool) -> String {
    if has_callees {
        format!(
            "\nhint: lookup_symbol \"<callee>\" | alt: get_complexity (check {address} body)"
        )
    } else {
        "\nhint: get_graph".to_owned()
    }
}

pub fn dead_code_hint(total: usize) -> String {
    match total {
        0 => "\nhint: get_health".to_owned(),
        _ => "\nhint: lookup_symbol \"<name>\" to confirm before deleting".to_owned(),
    }
}

pub fn complexity_hint(critical: usize, high: usize) -> String {
    if critical + high > 0 {
        "\nhint: find_similar (complex functions are often duplicated)".to_owned()
    } else {
        String::new()
    }
}

pub fn similarity_hint(total: usize) -> String {
    if total > 0 {
        "\nhint: lookup_symbol \"<name>\" on both sides before merging".to_owned()
    } else {
        "\nhint: find_similar threshold=50".to_owned()
    }
}

pub fn large_files_hint(total: usize) -> String {
    if total > 0 {
        "\nhint: get_complexity path=<file dir>".to_owned()
    } else {
        String::new()
    }
}

pub fn rules_hint(total: usize, sets_run: usize) -> String {
    match (total, sets_run) {
        (_, 0) => "\nhint: list_rule_sets | alt: check_rules sets=[\"javascript\"]".to_owned(),
        (0, _) => "\nhint: add_rule to encode a project convention".to_owned(),
        _ => "\nhint: check_rules severity=error".to_owned(),
    }
}

pub fn health_hint(top_signal: Option<&str>) -> String {
    let tool = match top_signal {
        Some("dead_code") => "find_dead_code",
        Some("similar_pairs") => "find_similar",
        Some("complexity_critical") | Some("complexity_high") => "get_complexity",
        Some("large_files_critical") | Some("large_files_warning") => "get_large_files",
        Some("rule_errors") | Some("rule_warnings") => "check_rules",
        _ => return String::new(),
    };
    format!("\nhint: {tool}")
}

pub fn rule_sets_hint() -> String {
    "\nhint: check_rules sets=[\"<name>\"] | alt: add_rule".to_owned()
}

pub fn rule_write_hint(set: &str) -> String {
    format!("\nhint: check_rules sets=[\"{set}\"]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hints_start_on_new_line() {
        for hint in [
            graph_hint(1),
            lookup_hint("US", true),
            dead_code_hint(0),
            similarity_hint(0),
            rules_hint(3, 1),
            rule_sets_hint(),
        ] {
            assert!(hint.starts_with("\nhint: "), "{hint}");
        }
    }

    #[test]
    fn test_health_hint_follows_top_signal() {
        assert_eq!(health_hint(Some("complexity_high")), "\nhint: get_complexity");
        assert_eq!(health_hint(None), "");
    }

    #[test]
    fn test_rules_hint_when_nothing_detected() {
        assert!(rules_hint(0, 0).contains("list_rule_sets"));
    }
}
