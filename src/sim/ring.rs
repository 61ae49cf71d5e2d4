//! Fixed-capacity history ring for multistep time integration.

/// A circular buffer of `s + 1` field snapshots with O(1) rotation.
///
/// Index 0 is the newest slot. [`Ring::rotate`] recycles the oldest slot into
/// position 0 by adjusting an offset; no element is moved or copied.
#[derive(Debug, Clone)]
pub struct Ring<T> {
    slots: Vec<T>,
    head: usize,
}

impl<T> Ring<T> {
    /// # Panics
    ///
    /// Panics if `slots` is empty.
    pub fn new(slots: Vec<T>) -> Self {
        assert!(!slots.is_empty(), "ring capacity must be positive");
        Self { slots, head: 0 }
    }

    pub fn with(capacity: usize, mut init: impl FnMut() -> T) -> Self {
        Self::new((0..capacity).map(|_| init()).collect())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Makes the oldest slot the new index 0 (overwrite target).
    pub fn rotate(&mut self) {
        self.head = (self.head + self.slots.len() - 1) % self.slots.len();
    }

    #[inline]
    fn slot(&self, i: usize) -> usize {
        debug_assert!(i < self.slots.len(), "ring index out of range");
        (self.head + i) % self.slots.len()
    }

    pub fn newest(&self) -> &T {
        &self.slots[self.slot(0)]
    }

    pub fn newest_mut(&mut self) -> &mut T {
        let s = self.slot(0);
        &mut self.slots[s]
    }

    pub fn oldest(&self) -> &T {
        &self.slots[self.slot(self.slots.len() - 1)]
    }
}

impl<T> std::ops::Index<usize> for Ring<T> {
    type Output = T;

    fn index(&self, i: usize) -> &T {
        &self.slots[self.slot(i)]
    }
}

impl<T> std::ops::IndexMut<usize> for Ring<T> {
    fn index_mut(&mut self, i: usize) -> &mut T {
        let s = self.slot(i);
        &mut self.slots[s]
    }
}
