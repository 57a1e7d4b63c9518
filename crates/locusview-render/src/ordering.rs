//! Dense draw/stack orderings (`z_index` for layers, `y_index` for panels).

use serde::{Deserialize, Serialize};

/// Ids in ascending order index. The position of an id in the list is its index, so the
/// assigned indexes are always a permutation of `[0, n)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderedIds(Vec<String>);

impl OrderedIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `id` and returns the index it received.
    ///
    /// With no requested index (or an empty list) the id is appended. A requested index shifts
    /// every id at or after it up by one; negative values count from the end and are normalized
    /// to `max(n + index, 0)`. Indexes past the end append.
    pub fn insert(&mut self, id: impl Into<String>, requested: Option<i64>) -> usize {
        let id = id.into();
        let n = self.0.len();
        let at = match requested {
            Some(index) if n > 0 => {
                let index = if index < 0 {
                    (n as i64 + index).max(0)
                } else {
                    index
                };
                (index as usize).min(n)
            }
            _ => n,
        };
        self.0.insert(at, id);
        at
    }

    /// Removes `id`, closing the gap. Returns the index it held.
    pub fn remove(&mut self, id: &str) -> Option<usize> {
        let at = self.index_of(id)?;
        self.0.remove(at);
        Some(at)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.0.iter().position(|candidate| candidate == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_of(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `(id, index)` pairs in order, for writing indexes back into layouts.
    pub fn indexed(&self) -> impl Iterator<Item = (&str, usize)> {
        self.iter().enumerate().map(|(idx, id)| (id, idx))
    }
}
