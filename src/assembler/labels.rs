//! The label table maps a label name and the scope it was declared in to a
//! word address.
//!
//! With label scoping enabled every `END` opens a new scope, so each
//! subroutine gets its own namespace. Labels declared on `START` are global
//! so that other subroutines can `CALL` them. A `START` with an operand does
//! not own an address itself; its label is bound to the operand instead.
//!
//! Lookups follow a fixed fallback chain:
//!
//! 1. a bind redirection for the name, if its target exists;
//! 2. the name in the caller's scope;
//! 3. the global name.
use std::collections::HashMap;

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Key {
    pub name:  String,
    /// None for global labels.
    pub scope: Option<usize>,
}

impl Key {
    pub fn scoped(name: &str, scope: usize) -> Self {
        Key{name: name.to_owned(), scope: Some(scope)}
    }

    pub fn global(name: &str) -> Self {
        Key{name: name.to_owned(), scope: None}
    }
}

/// A location in the source: line number plus byte span.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Location {
    pub line:  usize,
    pub start: usize,
    pub end:   usize,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Entry {
    pub address:    usize,
    /// The scope the label was declared in, even for global labels.
    pub scope:      usize,
    pub definition: Option<Location>,
    pub references: Vec<Location>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Bind {
    pub target:     Key,
    pub scope:      usize,
    pub definition: Option<Location>,
}

#[derive(Clone, Default, Debug)]
pub struct LabelMap {
    entries: HashMap<Key, Entry>,
    binds:   HashMap<String, Bind>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a label visible only inside `scope`.
    pub fn add(&mut self, name: &str, address: usize, scope: usize, definition: Option<Location>) {
        self.entries.insert(Key::scoped(name, scope), Entry{address, scope, definition, references: Vec::new()});
    }

    /// Declares a label visible from every scope.
    pub fn add_global(&mut self, name: &str, address: usize, scope: usize, definition: Option<Location>) {
        self.entries.insert(Key::global(name), Entry{address, scope, definition, references: Vec::new()});
    }

    /// Redirects every lookup of `name` to `target` as declared in `scope`.
    pub fn bind(&mut self, name: &str, target: &str, scope: usize, definition: Option<Location>) {
        self.binds.insert(name.to_owned(), Bind{target: Key::scoped(target, scope), scope, definition});
    }

    /// True if `name` was declared in `scope`, either locally, globally or
    /// as a bind.
    pub fn is_defined_in(&self, name: &str, scope: usize) -> bool {
        self.entries.contains_key(&Key::scoped(name, scope))
            || self.entries.get(&Key::global(name)).map_or(false, |e| e.scope == scope)
            || self.binds.get(name).map_or(false, |b| b.scope == scope)
    }

    /// True if `name` is visible from every scope.
    pub fn is_global(&self, name: &str) -> bool {
        self.entries.contains_key(&Key::global(name)) || self.binds.contains_key(name)
    }

    /// Finds the key `name` resolves to from inside `scope`.
    pub fn lookup(&self, name: &str, scope: usize) -> Option<&Key> {
        if let Some(bind) = self.binds.get(name) {
            if let Some((key, _)) = self.entries.get_key_value(&bind.target) {
                return Some(key);
            }
        }

        self.entries.get_key_value(&Key::scoped(name, scope))
            .or_else(|| self.entries.get_key_value(&Key::global(name)))
            .map(|(key, _)| key)
    }

    /// Word address of `name` as seen from `scope`.
    pub fn get(&self, name: &str, scope: usize) -> Option<usize> {
        self.lookup(name, scope).and_then(|key| self.entries.get(key)).map(|e| e.address)
    }

    pub fn entry(&self, key: &Key) -> Option<&Entry> {
        self.entries.get(key)
    }

    pub fn entry_mut(&mut self, key: &Key) -> Option<&mut Entry> {
        self.entries.get_mut(key)
    }

    /// Records a use of `name` from `scope`. Returns false if the name does
    /// not resolve.
    pub fn add_reference(&mut self, name: &str, scope: usize, at: Location) -> bool {
        let key = match self.lookup(name, scope) {
            Some(key) => key.clone(),
            None => return false,
        };
        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.references.push(at);
                true
            },
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Entry)> {
        self.entries.iter()
    }

    /// Bind redirections, keyed by the redirected name.
    pub fn binds(&self) -> impl Iterator<Item = (&str, &Bind)> {
        self.binds.iter().map(|(name, bind)| (name.as_str(), bind))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_lookup() {
        let mut labels = LabelMap::new();
        labels.add("LOOP", 4, 1, None);
        labels.add("LOOP", 20, 2, None);

        assert_eq!(labels.get("LOOP", 1), Some(4));
        assert_eq!(labels.get("LOOP", 2), Some(20));
        assert_eq!(labels.get("LOOP", 3), None);
        assert_eq!(labels.get("NOPE", 1), None);
    }

    #[test]
    fn test_global_fallback() {
        let mut labels = LabelMap::new();
        labels.add_global("SUB", 16, 2, None);
        labels.add("SUB", 2, 1, None);

        // The scoped entry shadows the global one.
        assert_eq!(labels.get("SUB", 1), Some(2));
        assert_eq!(labels.get("SUB", 3), Some(16));
        assert_eq!(labels.lookup("SUB", 3), Some(&Key::global("SUB")));
    }

    #[test]
    fn test_bind_takes_precedence() {
        let mut labels = LabelMap::new();
        labels.add("BEGIN", 6, 2, None);
        labels.add("MAIN", 0, 1, None);
        labels.bind("MAIN", "BEGIN", 2, None);

        assert_eq!(labels.get("MAIN", 1), Some(6));
        assert_eq!(labels.get("MAIN", 5), Some(6));
        assert!(labels.is_global("MAIN"));
    }

    #[test]
    fn test_binds() {
        let mut labels = LabelMap::new();
        let at = Location{line: 0, start: 0, end: 4};
        labels.bind("MAIN", "BEGIN", 1, Some(at));

        let binds: Vec<(&str, &Bind)> = labels.binds().collect();
        assert_eq!(binds.len(), 1);
        assert_eq!(binds[0].0, "MAIN");
        assert_eq!(binds[0].1.target, Key::scoped("BEGIN", 1));
        assert_eq!(binds[0].1.definition, Some(at));
        // Binds own no address, so they are not entries.
        assert!(labels.is_empty());
    }

    #[test]
    fn test_dangling_bind_falls_through() {
        let mut labels = LabelMap::new();
        labels.bind("MAIN", "NOWHERE", 1, None);

        assert_eq!(labels.get("MAIN", 1), None);
        assert!(labels.is_global("MAIN"));
    }

    #[test]
    fn test_is_defined_in() {
        let mut labels = LabelMap::new();
        labels.add("A", 0, 1, None);
        labels.add_global("B", 2, 1, None);
        labels.bind("C", "A", 2, None);

        assert!(labels.is_defined_in("A", 1));
        assert!(!labels.is_defined_in("A", 2));
        assert!(labels.is_defined_in("B", 1));
        assert!(!labels.is_defined_in("B", 2));
        assert!(labels.is_defined_in("C", 2));
        assert!(!labels.is_defined_in("C", 1));
    }

    #[test]
    fn test_lookup_round_trip() {
        let mut labels = LabelMap::new();
        labels.add("DATA", 42, 3, None);
        let first = labels.get("DATA", 3);
        let second = labels.get("DATA", 3);
        assert_eq!(first, Some(42));
        assert_eq!(first, second);
    }

    #[test]
    fn test_references() {
        let mut labels = LabelMap::new();
        labels.add("X", 8, 1, Some(Location{line: 3, start: 0, end: 1}));

        assert!(labels.add_reference("X", 1, Location{line: 1, start: 9, end: 10}));
        assert!(!labels.add_reference("Y", 1, Location{line: 1, start: 9, end: 10}));

        let entry = labels.entry(&Key::scoped("X", 1)).unwrap();
        assert_eq!(entry.references, vec![Location{line: 1, start: 9, end: 10}]);
        assert_eq!(entry.definition.map(|d| d.line), Some(3));
    }
}
