use std::collections::HashMap;

use crate::TensorProto;
use crate::proto_adapter::tensor_name;

/// Name-keyed view over a graph's initializers that keeps insertion order
///
/// A repeated name replaces the earlier tensor but keeps the position where
/// the name was first seen, like an ordered dictionary. Nameless tensors are
/// keyed by the empty string.
#[derive(Debug, Default)]
pub struct TensorCatalog<'a> {
    entries: Vec<(&'a str, &'a TensorProto)>,
    index: HashMap<&'a str, usize>,
}

impl<'a> TensorCatalog<'a> {
    pub fn from_initializers(initializers: &'a [TensorProto]) -> Self {
        let mut catalog = TensorCatalog {
            entries: Vec::with_capacity(initializers.len()),
            index: HashMap::with_capacity(initializers.len()),
        };

        for tensor in initializers {
            let name = tensor_name(tensor);
            match catalog.index.get(name) {
                Some(&pos) => catalog.entries[pos].1 = tensor,
                None => {
                    catalog.index.insert(name, catalog.entries.len());
                    catalog.entries.push((name, tensor));
                }
            }
        }

        catalog
    }

    /// Latest tensor registered under `name`
    pub fn get(&self, name: &str) -> Option<&'a TensorProto> {
        self.index.get(name).map(|&pos| self.entries[pos].1)
    }

    /// Whether any initializer used `name`
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a TensorProto)> + '_ {
        self.entries.iter().copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }
}
