use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rand::{Rng, RngCore};

use super::MergeMap;

/// A pending merge of the symbol at `pos` with its right neighbour.
#[derive(Debug, Eq)]
struct Merge {
    pos: usize,
    rank: u32,
    new_id: u32,
    /// Insertion order, breaks ties between equal ranks.
    seq: usize,
}

impl PartialEq for Merge {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank && self.seq == other.seq
    }
}

impl PartialOrd for Merge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Merge {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: reverse so the lowest rank, then the
        // earliest inserted, is popped first.
        other
            .rank
            .cmp(&self.rank)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct MergeQueue {
    heap: BinaryHeap<Merge>,
    seq: usize,
}

impl MergeQueue {
    fn push(&mut self, pos: usize, rank: u32, new_id: u32) {
        self.heap.push(Merge {
            pos,
            rank,
            new_id,
            seq: self.seq,
        });
        self.seq += 1;
    }

    fn requeue(&mut self, merge: Merge) {
        self.heap.push(merge);
    }

    fn pop(&mut self) -> Option<Merge> {
        self.heap.pop()
    }
}

/// One symbol of a word; `prev` and `next` are indices, `-1` for none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Symbol {
    pub(crate) c: u32,
    pub(crate) prev: isize,
    pub(crate) next: isize,
    /// Byte length of the text this symbol covers.
    pub(crate) len: usize,
}

impl Symbol {
    fn merge_with(&mut self, other: &Symbol, new_c: u32) {
        self.c = new_c;
        self.len += other.len;
        self.next = other.next;
    }
}

/// A fragment being merged, as a doubly linked list laid out in a `Vec`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Word {
    symbols: Vec<Symbol>,
}

impl Word {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            symbols: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn add(&mut self, c: u32, byte_len: usize) {
        let len = self.symbols.len() as isize;
        let prev = match self.symbols.last_mut() {
            Some(last) => {
                last.next = len;
                len - 1
            }
            None => -1,
        };
        self.symbols.push(Symbol {
            c,
            prev,
            next: -1,
            len: byte_len,
        });
    }

    /// Apply every possible merge, lowest rank first.
    pub(crate) fn merge_all(&mut self, merges: &MergeMap) {
        self.merge_impl(merges, None);
    }

    /// Apply merges, skipping each candidate with probability `dropout`.
    pub(crate) fn merge_all_with_dropout<R: Rng>(
        &mut self,
        merges: &MergeMap,
        dropout: f32,
        rng: &mut R,
    ) {
        let rng: &mut dyn RngCore = rng;
        self.merge_impl(merges, Some((dropout, rng)));
    }

    fn merge_impl(&mut self, merges: &MergeMap, mut dropout: Option<(f32, &mut dyn RngCore)>) {
        let mut queue = MergeQueue::default();
        for (i, pair) in self.symbols.windows(2).enumerate() {
            if let Some(&(rank, new_id)) = merges.get(&(pair[0].c, pair[1].c)) {
                queue.push(i, rank, new_id);
            }
        }

        let mut skipped = Vec::new();
        while let Some(top) = queue.pop() {
            if let Some((p, rng)) = dropout.as_mut() {
                if rng.random::<f32>() < *p {
                    skipped.push(top);
                    continue;
                }
            }
            // A merge changes the word, so skipped candidates may apply again.
            for merge in skipped.drain(..) {
                queue.requeue(merge);
            }

            let left = self.symbols[top.pos];
            if left.len == 0 || left.next == -1 {
                continue;
            }
            let right_pos = left.next as usize;
            let right = self.symbols[right_pos];

            // Stale if the pair at `pos` is no longer the one queued.
            if !matches!(merges.get(&(left.c, right.c)), Some(&(_, new_id)) if new_id == top.new_id) {
                continue;
            }

            self.symbols[top.pos].merge_with(&right, top.new_id);
            self.symbols[right_pos].len = 0;
            if right.next > -1 {
                if let Some(after) = self.symbols.get_mut(right.next as usize) {
                    after.prev = top.pos as isize;
                }
            }

            let merged = self.symbols[top.pos];
            if merged.prev >= 0 {
                let prev = merged.prev as usize;
                if let Some(&(rank, new_id)) = merges.get(&(self.symbols[prev].c, merged.c)) {
                    queue.push(prev, rank, new_id);
                }
            }
            if merged.next >= 0 {
                let next = merged.next as usize;
                if let Some(&(rank, new_id)) = merges.get(&(merged.c, self.symbols[next].c)) {
                    queue.push(top.pos, rank, new_id);
                }
            }
        }

        self.symbols.retain(|s| s.len != 0);
    }

    #[cfg(test)]
    pub(crate) fn get_chars(&self) -> Vec<u32> {
        self.symbols.iter().map(|s| s.c).collect()
    }

    pub(crate) fn get_chars_iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.symbols.iter().map(|s| s.c)
    }

    /// Byte offsets of every symbol within the fragment.
    pub(crate) fn get_offsets_iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let mut pos = 0;
        self.symbols.iter().map(move |s| {
            let offsets = (pos, pos + s.len);
            pos += s.len;
            offsets
        })
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.symbols.len()
    }
}
