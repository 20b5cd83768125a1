//! Typed selection heap for top-N / bottom-N functions
//!
//! Elements are `(index, key)` pairs; `index` points back into the caller's
//! series list. NaN keys always rank after every real key, whichever
//! direction is requested.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// One heap element
#[derive(Debug, Clone, Copy)]
pub struct HeapElement {
    /// Position of the series in the input list
    pub index: usize,
    /// Ranking key
    pub key: f64,
}

/// Which end of the key range is popped first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Smallest key first
    Lowest,
    /// Largest key first
    Highest,
}

#[derive(Debug, Clone, Copy)]
struct Ranked {
    elem: HeapElement,
    direction: Direction,
}

impl Ranked {
    /// Priority: the element popped first compares greatest
    fn priority(&self, other: &Self) -> Ordering {
        let (a, b) = (self.elem.key, other.elem.key);
        let by_key = match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => match self.direction {
                Direction::Lowest => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
                Direction::Highest => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            },
        };
        // equal keys pop in input order
        by_key.then_with(|| other.elem.index.cmp(&self.elem.index))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.priority(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority(other)
    }
}

/// Binary heap over `(index, key)` pairs
#[derive(Debug, Clone)]
pub struct SelectionHeap {
    heap: BinaryHeap<Ranked>,
    direction: Direction,
}

impl SelectionHeap {
    /// Create an empty heap
    pub fn new(direction: Direction) -> Self {
        Self {
            heap: BinaryHeap::new(),
            direction,
        }
    }

    /// Create an empty heap with capacity
    pub fn with_capacity(direction: Direction, capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
            direction,
        }
    }

    /// Insert an element
    pub fn push(&mut self, index: usize, key: f64) {
        self.heap.push(Ranked {
            elem: HeapElement { index, key },
            direction: self.direction,
        });
    }

    /// Remove the next element in rank order
    pub fn pop(&mut self) -> Option<HeapElement> {
        self.heap.pop().map(|r| r.elem)
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// True when empty
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Indices of the `n` items ranked first by `key`, in rank order
///
/// When fewer than `n` items exist, every index is returned in input order
/// without ranking.
pub fn select_n<T, F>(items: &[T], n: usize, direction: Direction, key: F) -> Vec<usize>
where
    F: Fn(&T) -> f64,
{
    if items.len() < n {
        return (0..items.len()).collect();
    }

    let mut heap = SelectionHeap::with_capacity(direction, items.len());
    for (i, item) in items.iter().enumerate() {
        heap.push(i, key(item));
    }

    let mut result = Vec::with_capacity(n);
    while result.len() < n {
        match heap.pop() {
            Some(e) => result.push(e.index),
            None => break,
        }
    }
    result
}
