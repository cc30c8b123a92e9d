//! Literal-token template finalization: `__name__` markers are replaced with
//! resolved values when a copied template file is materialized. Plain text
//! substitution, not syntax-aware, and order-independent across distinct
//! placeholder names.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"__([A-Za-z][A-Za-z0-9_]*?)__").expect("placeholder pattern is valid")
});

/// Placeholder name -> resolved replacement string.
pub type PlaceholderMap = HashMap<String, String>;

/// Replace every resolved `__name__` token in `text`. Unresolved placeholders
/// (no entry in the map) are left untouched.
pub fn substitute(text: &str, values: &PlaceholderMap) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| match values.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// List the distinct placeholder names remaining in `text`.
pub fn remaining_placeholders(text: &str) -> Vec<String> {
    let mut names: Vec<String> = PLACEHOLDER
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect();
    names.sort();
    names.dedup();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> PlaceholderMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_resolved_placeholder() {
        let values = map(&[("distFolder", "dist/out")]);
        let result = substitute("const dir = '__distFolder__/assets';", &values);
        assert_eq!(result, "const dir = 'dist/out/assets';");
    }

    #[test]
    fn reapplication_is_a_no_op() {
        let values = map(&[("distFolder", "dist/out")]);
        let once = substitute("const dir = '__distFolder__/assets';", &values);
        let twice = substitute(&once, &values);
        assert_eq!(once, twice);
        assert!(remaining_placeholders(&twice).is_empty());
    }

    #[test]
    fn unresolved_placeholders_are_left_untouched() {
        let values = map(&[("distFolder", "dist")]);
        let result = substitute("__distFolder__ and __browserDistFolder__", &values);
        assert_eq!(result, "dist and __browserDistFolder__");
        assert_eq!(remaining_placeholders(&result), vec!["browserDistFolder"]);
    }

    #[test]
    fn substitution_is_order_independent_across_names() {
        let ab = map(&[("a", "1"), ("b", "2")]);
        let a_only = map(&[("a", "1")]);
        let b_only = map(&[("b", "2")]);

        let text = "__a__:__b__";
        let joint = substitute(text, &ab);
        let a_then_b = substitute(&substitute(text, &a_only), &b_only);
        let b_then_a = substitute(&substitute(text, &b_only), &a_only);
        assert_eq!(joint, "1:2");
        assert_eq!(joint, a_then_b);
        assert_eq!(joint, b_then_a);
    }

    #[test]
    fn repeated_occurrences_all_replaced() {
        let values = map(&[("distFolder", "dist")]);
        let result = substitute("__distFolder__/a __distFolder__/b", &values);
        assert_eq!(result, "dist/a dist/b");
    }

    #[test]
    fn underscored_names_are_matched() {
        let values = map(&[("dist_folder", "dist")]);
        assert_eq!(substitute("__dist_folder__", &values), "dist");
    }
}
