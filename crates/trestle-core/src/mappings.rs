//! Mappings keyed by resource path patterns.
//!
//! `WebResourcePathMap` routes a request path to the first pattern that
//! matches it completely. `HereditaryWebResourcePathMap` maps a pattern
//! to its own path and every path below it, with the deepest mapped
//! ancestor winning; auth spaces and cross-origin affordances use it.

use std::collections::BTreeMap;

use regex::Regex;
use thiserror::Error;

/// A path pattern that does not compile.
#[derive(Debug, Error)]
#[error("invalid path pattern '{pattern}': {source}")]
pub struct InvalidPathPattern {
    pub pattern: String,
    #[source]
    source: regex::Error,
}

/// A pattern not already ending in the path separator gets an optional
/// trailing one, so `/users` also covers `/users/`.
fn normalize_pattern(pattern: &str) -> String {
    if pattern.ends_with('/') || pattern.ends_with("/?") {
        pattern.to_string()
    } else {
        format!("{pattern}/?")
    }
}

struct PathMapEntry<V> {
    pattern: String,
    full: Regex,
    value: V,
}

/// An ordered map from path patterns to values.
///
/// Patterns match complete paths, in insertion order. Inserting an equal
/// pattern replaces its value in place.
pub struct WebResourcePathMap<V> {
    entries: Vec<PathMapEntry<V>>,
}

impl<V> WebResourcePathMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Map a path pattern to a value.
    pub fn insert(&mut self, pattern: &str, value: V) -> Result<(), InvalidPathPattern> {
        let pattern = normalize_pattern(pattern);
        let full = Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
            InvalidPathPattern {
                pattern: pattern.clone(),
                source,
            }
        })?;
        if let Some(entry) = self.entries.iter_mut().find(|e| e.pattern == pattern) {
            entry.full = full;
            entry.value = value;
        } else {
            self.entries.push(PathMapEntry {
                pattern,
                full,
                value,
            });
        }
        Ok(())
    }

    /// The first mapped pattern fully matching the path, with the values
    /// of its named capture groups (the pathparts).
    pub fn resolve(&self, path: &str) -> Option<(&V, BTreeMap<String, String>)> {
        for entry in &self.entries {
            if let Some(caps) = entry.full.captures(path) {
                let mut pathparts = BTreeMap::new();
                for name in entry.full.capture_names().flatten() {
                    if let Some(m) = caps.name(name) {
                        pathparts.insert(name.to_string(), m.as_str().to_string());
                    }
                }
                return Some((&entry.value, pathparts));
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mapped patterns and values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|e| (e.pattern.as_str(), &e.value))
    }
}

impl<V> Default for WebResourcePathMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

struct HereditaryEntry<V> {
    pattern: String,
    ancestor: Regex,
    slashes: usize,
    value: V,
}

/// A map from path patterns to values where a pattern covers its own
/// path and all paths below it.
pub struct HereditaryWebResourcePathMap<V> {
    entries: Vec<HereditaryEntry<V>>,
}

impl<V> HereditaryWebResourcePathMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Map a path pattern, and everything below it, to a value.
    pub fn insert(&mut self, pattern: &str, value: V) -> Result<(), InvalidPathPattern> {
        let pattern = normalize_pattern(pattern);
        // A pattern ending in a path or argument separator already covers
        // descendants by prefix; anything else gets an explicit optional
        // descendant tail, anchored at the end.
        let ancestor_pattern = if pattern.ends_with(['/', ';', '&']) {
            format!("^(?:{pattern})")
        } else {
            format!("^(?:{pattern}(?:(?:/|;|&).+)?)$")
        };
        let ancestor = Regex::new(&ancestor_pattern).map_err(|source| InvalidPathPattern {
            pattern: pattern.clone(),
            source,
        })?;
        let slashes = pattern.matches('/').count();
        if let Some(entry) = self.entries.iter_mut().find(|e| e.pattern == pattern) {
            entry.ancestor = ancestor;
            entry.slashes = slashes;
            entry.value = value;
        } else {
            self.entries.push(HereditaryEntry {
                pattern,
                ancestor,
                slashes,
                value,
            });
        }
        Ok(())
    }

    /// Whether any mapped pattern is an ancestor of the location.
    pub fn covers(&self, loc: &str) -> bool {
        self.entries.iter().any(|e| e.ancestor.is_match(loc))
    }

    /// Every mapped ancestor of the location, shallowest first.
    pub fn lineage(&self, loc: &str) -> Vec<(&str, &V)> {
        let mut indices: Vec<usize> = (0..self.entries.len()).collect();
        indices.sort_by_key(|&i| (self.entries[i].slashes, self.entries[i].pattern.len(), i));
        indices
            .into_iter()
            .filter(|&i| self.entries[i].ancestor.is_match(loc))
            .map(|i| (self.entries[i].pattern.as_str(), &self.entries[i].value))
            .collect()
    }

    /// The value of the deepest mapped ancestor of the location.
    pub fn resolve(&self, loc: &str) -> Option<&V> {
        let mut best: Option<(usize, &V)> = None;
        for (pattern, value) in self.lineage(loc) {
            let slashes = pattern.matches('/').count();
            match &best {
                Some((depth, _)) if *depth >= slashes => {}
                _ => best = Some((slashes, value)),
            }
        }
        best.map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mapped patterns and values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|e| (e.pattern.as_str(), &e.value))
    }
}

impl<V> Default for HereditaryWebResourcePathMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_map_optional_trailing_separator() {
        let mut map = WebResourcePathMap::new();
        map.insert("/helloworld", 1).unwrap();
        assert!(map.resolve("/helloworld").is_some());
        assert!(map.resolve("/helloworld/").is_some());
        assert!(map.resolve("/helloworldx").is_none());
        assert!(map.resolve("/helloworld/deeper").is_none());
    }

    #[test]
    fn test_path_map_pathparts_from_named_groups() {
        let mut map = WebResourcePathMap::new();
        map.insert("/users/(?P<name>[^/]+)", ()).unwrap();
        let (_, pathparts) = map.resolve("/users/alice").unwrap();
        assert_eq!(pathparts.get("name").map(String::as_str), Some("alice"));
    }

    #[test]
    fn test_path_map_first_match_wins() {
        let mut map = WebResourcePathMap::new();
        map.insert("/a/(?P<x>.+)", 1).unwrap();
        map.insert("/a/b", 2).unwrap();
        let (value, _) = map.resolve("/a/b").unwrap();
        assert_eq!(*value, 1);
    }

    #[test]
    fn test_path_map_insert_replaces_equal_pattern() {
        let mut map = WebResourcePathMap::new();
        map.insert("/x", 1).unwrap();
        map.insert("/x", 2).unwrap();
        assert_eq!(map.len(), 1);
        let (value, _) = map.resolve("/x").unwrap();
        assert_eq!(*value, 2);
    }

    #[test]
    fn test_path_map_rejects_invalid_pattern() {
        let mut map: WebResourcePathMap<()> = WebResourcePathMap::new();
        let err = map.insert("/users/(?P<name>[^/]+", ()).unwrap_err();
        assert!(err.to_string().starts_with("invalid path pattern"));
    }

    #[test]
    fn test_hereditary_map_covers_descendants() {
        let mut map = HereditaryWebResourcePathMap::new();
        map.insert("/secrets", "space").unwrap();
        assert!(map.covers("/secrets"));
        assert!(map.covers("/secrets/"));
        assert!(map.covers("/secrets/inner"));
        assert!(map.covers("/secrets;key=1"));
        assert!(!map.covers("/secretsx"));
        assert!(!map.covers("/public"));
    }

    #[test]
    fn test_hereditary_map_deepest_ancestor_wins() {
        let mut map = HereditaryWebResourcePathMap::new();
        map.insert("/", "root").unwrap();
        map.insert("/secrets", "secrets").unwrap();
        map.insert("/secrets/inner", "inner").unwrap();
        assert_eq!(map.resolve("/public"), Some(&"root"));
        assert_eq!(map.resolve("/secrets/other"), Some(&"secrets"));
        assert_eq!(map.resolve("/secrets/inner/deep"), Some(&"inner"));
    }

    #[test]
    fn test_hereditary_map_lineage_shallowest_first() {
        let mut map = HereditaryWebResourcePathMap::new();
        map.insert("/secrets/inner", 3).unwrap();
        map.insert("/", 1).unwrap();
        map.insert("/secrets", 2).unwrap();
        let lineage: Vec<i32> = map
            .lineage("/secrets/inner/deep")
            .into_iter()
            .map(|(_, v)| *v)
            .collect();
        assert_eq!(lineage, vec![1, 2, 3]);
    }
}
