//! Service-level enable/disable selection

use std::collections::BTreeSet;
use tracing::debug;

/// Work out which known services to exclude.
///
/// A non-empty `enabled` list is an allow-list: every known service missing
/// from it is excluded on top of whatever `disabled` names. Names that match
/// no known service are ignored.
pub fn resolve_excluded(known: &[&str], disabled: &[String], enabled: &[String]) -> BTreeSet<String> {
    let mut excluded = BTreeSet::new();

    for name in disabled {
        if known.contains(&name.as_str()) {
            excluded.insert(name.clone());
        } else {
            debug!("Ignoring unknown service in disabled list: {}", name);
        }
    }

    if !enabled.is_empty() {
        for name in enabled {
            if !known.contains(&name.as_str()) {
                debug!("Ignoring unknown service in enabled list: {}", name);
            }
        }
        for name in known {
            if !enabled.iter().any(|e| e == name) {
                excluded.insert(name.to_string());
            }
        }
    }

    excluded
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: &[&str] = &["a", "b", "c"];

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_nothing_excluded_by_default() {
        assert!(resolve_excluded(KNOWN, &[], &[]).is_empty());
    }

    #[test]
    fn test_disabled_list() {
        let excluded = resolve_excluded(KNOWN, &names(&["b"]), &[]);
        assert_eq!(excluded.into_iter().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_enabled_list_is_allow_list() {
        let excluded = resolve_excluded(KNOWN, &[], &names(&["a"]));
        assert_eq!(excluded.into_iter().collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn test_enabled_list_and_disabled_list_combine() {
        let excluded = resolve_excluded(KNOWN, &names(&["a"]), &names(&["a", "b"]));
        assert_eq!(excluded.into_iter().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn test_unknown_names_are_ignored() {
        let excluded = resolve_excluded(KNOWN, &names(&["prometheos"]), &[]);
        assert!(excluded.is_empty());

        // an allow-list of only typos still excludes every known service
        let excluded = resolve_excluded(KNOWN, &[], &names(&["grafanna"]));
        assert_eq!(excluded.len(), 3);
    }

    #[test]
    fn test_idempotent() {
        let first = resolve_excluded(KNOWN, &names(&["c"]), &names(&["a", "c"]));
        let second = resolve_excluded(KNOWN, &names(&["c"]), &names(&["a", "c"]));
        assert_eq!(first, second);
    }
}
