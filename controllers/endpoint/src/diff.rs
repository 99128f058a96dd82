//! Two-way set difference for resource identifiers.
//!
//! The membership reconcilers diff "what the provider has" against "what the
//! spec wants" and act only on the delta, which is what makes retries
//! idempotent.

use std::collections::HashSet;

/// Compute `(to_create, to_delete)` between two unordered identifier
/// collections: `to_create = expected \ current`, `to_delete = current \
/// expected`. Duplicates collapse; output order is unspecified.
#[must_use]
pub fn string_set_diff(current: &[String], expected: &[String]) -> (Vec<String>, Vec<String>) {
    let current_set: HashSet<&str> = current.iter().map(String::as_str).collect();
    let expected_set: HashSet<&str> = expected.iter().map(String::as_str).collect();

    let to_create = expected_set
        .difference(&current_set)
        .map(|s| (*s).to_string())
        .collect();
    let to_delete = current_set
        .difference(&expected_set)
        .map(|s| (*s).to_string())
        .collect();
    (to_create, to_delete)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_disjoint_sets() {
        let (to_create, to_delete) = string_set_diff(&strings(&["a"]), &strings(&["b"]));
        assert_eq!(to_create, strings(&["b"]));
        assert_eq!(to_delete, strings(&["a"]));
    }

    #[test]
    fn test_equal_sets_are_a_no_op() {
        let (to_create, to_delete) =
            string_set_diff(&strings(&["a", "b"]), &strings(&["b", "a"]));
        assert!(to_create.is_empty());
        assert!(to_delete.is_empty());
    }

    #[test]
    fn test_duplicates_collapse() {
        let (to_create, to_delete) =
            string_set_diff(&strings(&["a", "a"]), &strings(&["a", "b", "b"]));
        assert_eq!(to_create, strings(&["b"]));
        assert!(to_delete.is_empty());
    }

    #[test]
    fn test_applying_the_diff_yields_expected() {
        let current = strings(&["a", "b", "c"]);
        let expected = strings(&["b", "d"]);
        let (to_create, to_delete) = string_set_diff(&current, &expected);

        let mut result: std::collections::HashSet<String> = current
            .into_iter()
            .filter(|s| !to_delete.contains(s))
            .collect();
        result.extend(to_create.clone());

        let expected_set: std::collections::HashSet<String> = expected.into_iter().collect();
        assert_eq!(result, expected_set);

        // created items were not already present, deleted items were not wanted
        assert!(to_create.iter().all(|s| s == "d"));
        assert!(to_delete.iter().all(|s| s == "a" || s == "c"));
    }

    #[test]
    fn test_empty_inputs() {
        let (to_create, to_delete) = string_set_diff(&[], &[]);
        assert!(to_create.is_empty());
        assert!(to_delete.is_empty());
    }
}
