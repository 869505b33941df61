//! Key-level diff between tracked progress entries and live content.

use std::collections::{BTreeMap, HashSet};

/// Three-way split of keys between a tracked map and the live key list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyDiff {
    /// Live keys with no tracked entry, in live order.
    pub missing: Vec<String>,
    /// Keys present on both sides, in live order.
    pub matching: Vec<String>,
    /// Tracked keys absent from the live list, in map order.
    pub extra: Vec<String>,
}

impl KeyDiff {
    /// Compares the keys of `tracked` against `live`.
    ///
    /// Duplicate live keys are counted once.
    #[must_use]
    pub fn compute<V>(tracked: &BTreeMap<String, V>, live: &[String]) -> Self {
        let mut seen: HashSet<&str> = HashSet::with_capacity(live.len());
        let mut diff = Self::default();

        for key in live {
            if !seen.insert(key.as_str()) {
                continue;
            }
            if tracked.contains_key(key) {
                diff.matching.push(key.clone());
            } else {
                diff.missing.push(key.clone());
            }
        }

        diff.extra = tracked
            .keys()
            .filter(|key| !seen.contains(key.as_str()))
            .cloned()
            .collect();

        diff
    }

    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

/// Inserts `make()` for every missing key and removes every extra key.
///
/// Entries under matching keys are left as they are.
pub fn apply_diff<V>(tracked: &mut BTreeMap<String, V>, diff: &KeyDiff, mut make: impl FnMut() -> V) {
    for key in &diff.missing {
        tracked.insert(key.clone(), make());
    }
    for key in &diff.extra {
        tracked.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn splits_missing_matching_extra() {
        let mut tracked = BTreeMap::new();
        tracked.insert("a".to_string(), 1);
        tracked.insert("b".to_string(), 2);

        let diff = KeyDiff::compute(&tracked, &keys(&["c", "a", "c"]));
        assert_eq!(diff.missing, keys(&["c"]));
        assert_eq!(diff.matching, keys(&["a"]));
        assert_eq!(diff.extra, keys(&["b"]));
        assert!(!diff.is_unchanged());
    }

    #[test]
    fn apply_keeps_matching_values() {
        let mut tracked = BTreeMap::new();
        tracked.insert("keep".to_string(), 7);
        tracked.insert("drop".to_string(), 3);

        let diff = KeyDiff::compute(&tracked, &keys(&["keep", "new"]));
        apply_diff(&mut tracked, &diff, || 0);

        assert_eq!(tracked.get("keep"), Some(&7));
        assert_eq!(tracked.get("new"), Some(&0));
        assert!(!tracked.contains_key("drop"));
    }

    #[test]
    fn identical_sides_are_unchanged() {
        let mut tracked = BTreeMap::new();
        tracked.insert("x".to_string(), ());
        let diff = KeyDiff::compute(&tracked, &keys(&["x"]));
        assert!(diff.is_unchanged());
    }
}
