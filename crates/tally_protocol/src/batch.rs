//! Batches returned by the hub.

/// The answer to a hub request for work.
///
/// `Empty` is the "nothing left" signal that ends a sync loop. It is a
/// normal outcome, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Batch<T> {
    /// A non-empty batch of items.
    Items(Vec<T>),
    /// The hub has no more work of this kind.
    Empty,
}

impl<T> Batch<T> {
    /// Wraps a decoded vector, mapping an empty one to `Empty`.
    pub fn from_vec(items: Vec<T>) -> Self {
        if items.is_empty() {
            Batch::Empty
        } else {
            Batch::Items(items)
        }
    }

    /// Returns true for the `Empty` sentinel.
    pub fn is_empty(&self) -> bool {
        matches!(self, Batch::Empty)
    }

    /// Number of items in the batch.
    pub fn len(&self) -> usize {
        match self {
            Batch::Items(items) => items.len(),
            Batch::Empty => 0,
        }
    }

    /// Returns the items, or `None` for the sentinel.
    pub fn into_items(self) -> Option<Vec<T>> {
        match self {
            Batch::Items(items) => Some(items),
            Batch::Empty => None,
        }
    }
}

impl<T> From<Vec<T>> for Batch<T> {
    fn from(items: Vec<T>) -> Self {
        Self::from_vec(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_vec_is_sentinel() {
        let batch: Batch<u8> = Batch::from_vec(vec![]);
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
        assert_eq!(batch.into_items(), None);
    }

    #[test]
    fn items_are_kept_in_order() {
        let batch = Batch::from(vec![3, 1, 2]);
        assert!(!batch.is_empty());
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.into_items(), Some(vec![3, 1, 2]));
    }
}
