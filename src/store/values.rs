//! values.rs
//! Per-run value storage: identifier -> finite number or absent.

use serde::{Serialize, Serializer};
use std::collections::btree_map::{self, BTreeMap};
use std::collections::{HashMap, HashSet};

/// Raw inputs as supplied by the host for one analysis run.
pub type RawInputs = HashMap<String, Option<f64>>;

/// The value set of one run.
///
/// Ordered by identifier so two runs over the same data serialize and compare
/// identically. Unknown identifiers read as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueStore {
    values: BTreeMap<String, Option<f64>>,
    // Identifiers written by the calculator during this run.
    written: HashSet<String>,
}

impl Serialize for ValueStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.serialize(serializer)
    }
}

impl ValueStore {
    pub fn new() -> Self { Self::default() }

    /// Builds a store from raw inputs. Non-finite numbers are stored as absent.
    pub fn from_inputs(inputs: &RawInputs) -> Self {
        let mut store = Self::new();
        for (id, value) in inputs {
            store.seed(id, *value);
        }
        store
    }

    /// Records an identifier without overwriting an existing entry.
    pub fn seed(&mut self, id: &str, value: Option<f64>) {
        let value = value.filter(|v| {
            if !v.is_finite() {
                tracing::warn!(metric = %id, "Non-finite raw value treated as absent.");
            }
            v.is_finite()
        });
        self.values.entry(id.to_string()).or_insert(value);
    }

    /// Writes the result for one identifier. Each identifier is written at most
    /// once per run; a second write is ignored and reported as `false`.
    pub fn write_once(&mut self, id: &str, value: Option<f64>) -> bool {
        if !self.written.insert(id.to_string()) {
            return false;
        }
        self.values.insert(id.to_string(), value.filter(|v| v.is_finite()));
        true
    }

    /// Drops an entry entirely. Used to discard raw values supplied for calculated metrics.
    pub(crate) fn discard(&mut self, id: &str) -> Option<Option<f64>> {
        self.values.remove(id)
    }

    #[inline(always)]
    pub fn get(&self, id: &str) -> Option<f64> {
        self.values.get(id).copied().flatten()
    }

    pub fn is_present(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// True when the identifier is known to this store, present or not.
    pub fn contains(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    pub fn len(&self) -> usize { self.values.len() }

    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Option<f64>> {
        self.values.iter()
    }
}

impl FromIterator<(String, Option<f64>)> for ValueStore {
    fn from_iter<T: IntoIterator<Item = (String, Option<f64>)>>(iter: T) -> Self {
        let mut store = Self::new();
        for (id, value) in iter {
            store.seed(&id, value);
        }
        store
    }
}

impl<'a> FromIterator<(&'a str, f64)> for ValueStore {
    fn from_iter<T: IntoIterator<Item = (&'a str, f64)>>(iter: T) -> Self {
        iter.into_iter().map(|(id, v)| (id.to_string(), Some(v))).collect()
    }
}
