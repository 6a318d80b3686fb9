//! Binary max-heap whose entries keep a fixed identity, so that their priority can be changed
//! after insertion.
//!
//! Entry `i` always refers to the `i`-th priority given to [`IndexedPQueue::new`]; the heap
//! only reorders an index table.

/// Max-heap over `T` with addressable entries.
#[derive(Debug, Clone)]
pub struct IndexedPQueue<T> {
    pri: Vec<T>,
    /// heap slot → entry
    heap: Vec<usize>,
    /// entry → heap slot
    slot: Vec<usize>,
}

impl<T: PartialOrd + Copy> IndexedPQueue<T> {
    /// Build the queue from the initial priorities of all entries.
    pub fn new(pri: Vec<T>) -> Self {
        let n = pri.len();
        let mut queue = IndexedPQueue {
            pri,
            heap: (0..n).collect(),
            slot: (0..n).collect(),
        };
        for i in (0..n / 2).rev() {
            queue.sift_down(i);
        }
        queue
    }

    pub fn len(&self) -> usize {
        self.pri.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pri.is_empty()
    }

    /// Priority of entry `i`.
    pub fn priority(&self, i: usize) -> T {
        self.pri[i]
    }

    /// Entry with the largest priority.
    pub fn top(&self) -> Option<usize> {
        self.heap.first().copied()
    }

    pub fn top_priority(&self) -> Option<T> {
        self.top().map(|i| self.pri[i])
    }

    /// Change the priority of entry `i` and restore the heap order.
    pub fn set_priority(&mut self, i: usize, new: T) {
        let old = self.pri[i];
        self.pri[i] = new;
        if old < new {
            self.sift_up(self.slot[i]);
        } else {
            self.sift_down(self.slot[i]);
        }
    }

    #[inline]
    fn place(&mut self, pos: usize, entry: usize) {
        self.heap[pos] = entry;
        self.slot[entry] = pos;
    }

    fn sift_up(&mut self, mut pos: usize) {
        let moving = self.heap[pos];
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !(self.pri[self.heap[parent]] < self.pri[moving]) {
                break;
            }
            self.place(pos, self.heap[parent]);
            pos = parent;
        }
        self.place(pos, moving);
    }

    fn sift_down(&mut self, mut pos: usize) {
        let moving = self.heap[pos];
        let n = self.heap.len();
        loop {
            let mut child = 2 * pos + 1;
            if child >= n {
                break;
            }
            if child + 1 < n && self.pri[self.heap[child]] < self.pri[self.heap[child + 1]] {
                child += 1;
            }
            if !(self.pri[moving] < self.pri[self.heap[child]]) {
                break;
            }
            self.place(pos, self.heap[child]);
            pos = child;
        }
        self.place(pos, moving);
    }
}

#[cfg(test)]
mod pqueue_test {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn test_top_and_updates() {
        let mut q = IndexedPQueue::new(vec![3.0, 9.0, 1.0, 7.0]);
        assert_eq!(q.len(), 4);
        assert_eq!(q.top(), Some(1));
        assert_eq!(q.top_priority(), Some(9.0));

        q.set_priority(1, 0.0);
        assert_eq!(q.top(), Some(3));
        q.set_priority(2, 10.0);
        assert_eq!(q.top(), Some(2));
        assert_eq!(q.priority(1), 0.0);

        assert!(IndexedPQueue::<f64>::new(vec![]).top().is_none());
    }

    #[test]
    fn test_random_updates_keep_max_on_top() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut pri: Vec<f64> = (0..200).map(|_| rng.random_range(0.0..100.0)).collect();
        let mut q = IndexedPQueue::new(pri.clone());

        for _ in 0..1000 {
            let i = rng.random_range(0..pri.len());
            let p = rng.random_range(0.0..100.0);
            pri[i] = p;
            q.set_priority(i, p);

            let max = pri.iter().copied().fold(f64::MIN, f64::max);
            assert_eq!(q.top_priority(), Some(max));
        }
    }
}
