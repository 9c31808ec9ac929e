//! # Symbol Pool
//!
//! The fixed, ordered set of reaction emoji used to tag jokes in a poll. The
//! pool order is the assignment order: the first pending joke always gets the
//! first symbol. The pool size is also the per-cycle joke cap.

use std::collections::HashSet;

use thiserror::Error;

use super::model::Entry;

/// Default pool, in assignment order. Caps a cycle at 14 jokes.
pub const DEFAULT_SYMBOLS: [&str; 14] = [
    "😆", "😍", "😎", "😡", "😑", "🤢", "🥵", "🥶", "💩", "🤡", "🤩", "😈", "🤠", "🥳",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SymbolPoolError {
    #[error("symbol pool must contain at least one symbol")]
    Empty,

    #[error("symbol {0:?} appears more than once in the pool")]
    Duplicate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolPool {
    symbols: Vec<String>,
}

impl Default for SymbolPool {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SymbolPool {
    /// Builds a pool from an explicit ordered list. Blank symbols are
    /// rejected as empty, repeated symbols as duplicates.
    pub fn new<I, S>(symbols: I) -> Result<Self, SymbolPoolError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for symbol in symbols {
            let symbol: String = symbol.into();
            let symbol = symbol.trim().to_string();
            if symbol.is_empty() {
                continue;
            }
            if !seen.insert(symbol.clone()) {
                return Err(SymbolPoolError::Duplicate(symbol));
            }
            ordered.push(symbol);
        }
        if ordered.is_empty() {
            return Err(SymbolPoolError::Empty);
        }
        Ok(Self { symbols: ordered })
    }

    /// Parses a comma separated list, e.g. `"😆,😍,😎"`.
    pub fn parse(list: &str) -> Result<Self, SymbolPoolError> {
        Self::new(list.split(','))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.symbols.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(String::as_str)
    }

    /// Pairs each entry with the pool symbol at the same position.
    ///
    /// Entries beyond the pool size are never produced by the registry; if a
    /// caller passes more anyway they are returned untouched in the second
    /// half of the tuple instead of being silently dropped.
    pub fn assign(&self, entries: Vec<Entry>) -> (Vec<(String, Entry)>, Vec<Entry>) {
        let mut assigned = Vec::with_capacity(entries.len().min(self.len()));
        let mut overflow = Vec::new();
        for (i, entry) in entries.into_iter().enumerate() {
            match self.symbols.get(i) {
                Some(symbol) => assigned.push((symbol.clone(), entry)),
                None => overflow.push(entry),
            }
        }
        (assigned, overflow)
    }
}
