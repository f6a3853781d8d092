//! String interning.
//!
//! Identifiers and file names are deduplicated by content and referred to
//! by [`Name`] handles, so comparing two interned strings is an integer
//! comparison. Strings are never removed; the pool lives as long as the
//! [`Module`](crate::Module) that owns it.

use std::collections::HashMap;
use std::fmt;

/// A handle to an interned string.
///
/// Two `Name`s are equal exactly when the strings they intern are
/// byte-for-byte equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(u32);

impl Name {
    /// Returns the zero-based index of this name in its pool.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A deduplicating string pool.
#[derive(Clone, Debug, Default)]
pub struct Interner {
    data: Vec<Box<str>>,
    map: HashMap<Box<str>, u32>,
}

impl Interner {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a string, returning the existing handle if the content is
    /// already present.
    pub fn intern(&mut self, s: &str) -> Name {
        if let Some(&index) = self.map.get(s) {
            return Name(index);
        }
        let index = u32::try_from(self.data.len())
            .unwrap_or_else(|_| panic!("interner overflow: {} strings", self.data.len()));
        let owned: Box<str> = s.into();
        self.map.insert(owned.clone(), index);
        self.data.push(owned);
        Name(index)
    }

    /// Interns the result of a formatting operation.
    pub fn intern_fmt(&mut self, args: fmt::Arguments<'_>) -> Name {
        self.intern(&args.to_string())
    }

    /// Returns the string for a handle.
    pub fn get(&self, name: Name) -> &str {
        &self.data[name.index()]
    }

    /// Returns `true` if the content is already interned.
    pub fn contains(&self, s: &str) -> bool {
        self.map.contains_key(s)
    }

    /// Returns the number of distinct strings in the pool.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_dedups_by_content() {
        let mut pool = Interner::new();
        let a = pool.intern("worldViewProj");
        let b = pool.intern("color");
        let c = pool.intern(&"worldViewProj".to_string());
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn intern_round_trip() {
        let mut pool = Interner::new();
        let name = pool.intern("uv");
        assert_eq!(pool.get(name), "uv");
    }

    #[test]
    fn contains_reflects_interned_content() {
        let mut pool = Interner::new();
        assert!(!pool.contains("clip"));
        pool.intern("clip");
        assert!(pool.contains("clip"));
        assert!(!pool.contains("clip1"));
    }

    #[test]
    fn intern_fmt_matches_plain_intern() {
        let mut pool = Interner::new();
        let a = pool.intern("tex3");
        let b = pool.intern_fmt(format_args!("tex{}", 3));
        assert_eq!(a, b);
    }
}
