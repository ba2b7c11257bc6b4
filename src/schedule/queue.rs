//! Deduplicating min-priority work queue.
//!
//! Rebuilt from store state on every scheduling run; holds no cross-run
//! identity. Dedup key is (id, operation, year). First insertion wins: a
//! later duplicate with a better priority does not replace the queued item.
//! That is an intentional simplicity trade-off — builders enqueue the most
//! urgent source of a task first — and changing it to lowest-priority-wins
//! would shift scheduling fairness.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use crate::record::SENTINEL_ID;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    RefreshProfile,
    RefreshMatchYear,
    RefreshAllMatches,
    RefreshPromotion,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Operation::RefreshProfile => "refresh_profile",
            Operation::RefreshMatchYear => "refresh_matches",
            Operation::RefreshAllMatches => "refresh_all_matches",
            Operation::RefreshPromotion => "refresh_promotion",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub priority: i32,
    /// Wrestler id or promotion id, depending on the operation.
    pub id: i64,
    pub operation: Operation,
    pub year: Option<i32>,
}

/// Heap entry ordered by priority, then insertion order for determinism.
#[derive(PartialEq, Eq)]
struct Entry {
    priority: i32,
    seq: u64,
    item: WorkItem,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.priority, self.seq).cmp(&(other.priority, other.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
pub struct WorkQueue {
    heap: BinaryHeap<Reverse<Entry>>,
    seen: HashSet<(i64, Operation, Option<i32>)>,
    next_seq: u64,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the (id, operation, year) key is already queued.
    /// Sentinel ids are silently rejected.
    pub fn enqueue(&mut self, item: WorkItem) {
        if item.id == SENTINEL_ID {
            return;
        }
        let key = (item.id, item.operation, item.year);
        if self.seen.insert(key) {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.heap.push(Reverse(Entry {
                priority: item.priority,
                seq,
                item,
            }));
        }
    }

    /// Pop the most urgent item, or `None` when drained.
    pub fn dequeue(&mut self) -> Option<WorkItem> {
        self.heap.pop().map(|Reverse(entry)| entry.item)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain into a sorted list without executing; used by dry runs and stats.
    pub fn into_sorted_items(mut self) -> Vec<WorkItem> {
        let mut items = Vec::with_capacity(self.len());
        while let Some(item) = self.dequeue() {
            items.push(item);
        }
        items
    }
}
