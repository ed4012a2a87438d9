//! Hashed symbol tables.
//!
//! Fixed bucket count, 31-multiplier byte hash, and per-bucket chains of
//! arena indices. The arena keeps every inserted symbol at a stable index
//! for the life of the table, which is what lets a pointer atom refer to a
//! global variable by slot. Emptiness is explicit (an empty chain), and
//! chains append at the tail so collision order is insertion order.

use qc_util::{symbol_hash, ErrorKind};

use crate::function::Function;
use crate::variable::Variable;

/// Bucket count for every symbol table. Prime, for spread.
pub const BUCKETS: usize = 71;

/// Anything a symbol table can hold.
pub trait Named {
    fn name(&self) -> &str;
}

impl Named for Variable {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Function {
    fn name(&self) -> &str {
        &self.name
    }
}

/// A fixed-bucket symbol table over an arena of `T`.
#[derive(Debug)]
pub struct SymTable<T> {
    buckets: Vec<Vec<usize>>,
    slots: Vec<(u64, T)>,
}

impl<T: Named> SymTable<T> {
    pub fn new() -> Self {
        Self {
            buckets: vec![Vec::new(); BUCKETS],
            slots: Vec::new(),
        }
    }

    /// Inserts a symbol, failing when the name is already declared in
    /// this table.
    pub fn insert(&mut self, item: T) -> Result<usize, ErrorKind> {
        if self.find(item.name()).is_some() {
            return Err(ErrorKind::NamesMatch);
        }
        let h = symbol_hash(item.name());
        let idx = self.slots.len();
        self.slots.push((h, item));
        self.buckets[(h % BUCKETS as u64) as usize].push(idx);
        Ok(idx)
    }

    /// Finds a symbol's arena slot by name: hash first, then the name.
    pub fn find(&self, name: &str) -> Option<usize> {
        let h = symbol_hash(name);
        self.buckets[(h % BUCKETS as u64) as usize]
            .iter()
            .copied()
            .find(|&i| self.slots[i].0 == h && self.slots[i].1.name() == name)
    }

    pub fn get(&self, slot: usize) -> Option<&T> {
        self.slots.get(slot).map(|(_, t)| t)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut T> {
        self.slots.get_mut(slot).map(|(_, t)| t)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().map(|(_, t)| t)
    }

    pub fn clear(&mut self) {
        for b in &mut self.buckets {
            b.clear();
        }
        self.slots.clear();
    }
}

impl<T: Named> Default for SymTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qc_lex::token::{id, Token};

    fn var(name: &str) -> Variable {
        Variable::scalar(name, Token::of(id::INT))
    }

    #[test]
    fn test_insert_and_find() {
        let mut t = SymTable::new();
        let slot = t.insert(var("alpha")).unwrap();
        assert_eq!(t.find("alpha"), Some(slot));
        assert_eq!(t.find("beta"), None);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut t = SymTable::new();
        t.insert(var("x")).unwrap();
        assert_eq!(t.insert(var("x")).unwrap_err(), ErrorKind::NamesMatch);
    }

    #[test]
    fn test_slots_are_stable() {
        let mut t = SymTable::new();
        let a = t.insert(var("a")).unwrap();
        let b = t.insert(var("b")).unwrap();
        let c = t.insert(var("c")).unwrap();
        assert_eq!(t.get(a).unwrap().name, "a");
        assert_eq!(t.get(b).unwrap().name, "b");
        assert_eq!(t.get(c).unwrap().name, "c");
    }

    #[test]
    fn test_collisions_resolve_by_name() {
        // Many symbols guarantee bucket collisions with only 71 buckets.
        let mut t = SymTable::new();
        let names: Vec<String> = (0..200).map(|i| format!("sym{i}")).collect();
        for n in &names {
            t.insert(var(n)).unwrap();
        }
        for n in &names {
            let slot = t.find(n).expect("symbol must be found");
            assert_eq!(t.get(slot).unwrap().name, *n);
        }
        assert_eq!(t.len(), 200);
    }

    #[test]
    fn test_clear_resets_to_empty() {
        let mut t = SymTable::new();
        t.insert(var("x")).unwrap();
        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.find("x"), None);
        // Reinsertion after clear behaves like a fresh table.
        let slot = t.insert(var("x")).unwrap();
        assert_eq!(slot, 0);
    }

    #[test]
    fn test_reinsert_from_clean_state_is_identical() {
        // Registering the same set twice from a clean state yields the
        // same slot assignments, which is what makes a prescan
        // repeatable.
        let names = ["main", "helper", "counter", "table"];
        let mut first = Vec::new();
        let mut t = SymTable::new();
        for n in names {
            first.push(t.insert(var(n)).unwrap());
        }
        t.clear();
        for (i, n) in names.into_iter().enumerate() {
            assert_eq!(t.insert(var(n)).unwrap(), first[i]);
        }
    }
}
