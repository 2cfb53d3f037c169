//! LRU Queue Module
//!
//! Index-linked LRU queues threaded through the shard's slot slab.

// == Link ==
/// Neighbour pointers stored inside each slot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Link {
    prev: Option<usize>,
    next: Option<usize>,
}

/// Anything that carries a [`Link`] and can sit in an [`LruQueue`].
pub(crate) trait Linked {
    fn link(&self) -> &Link;
    fn link_mut(&mut self) -> &mut Link;
}

// == LRU Queue ==
/// A doubly linked list over slab indices.
///
/// - Front = Least recently used
/// - Back = Most recently used
///
/// The queue stores no nodes of its own; every operation takes the slab the
/// indices point into. An index must be in at most one queue at a time.
#[derive(Debug, Default)]
pub(crate) struct LruQueue {
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl LruQueue {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Push Back ==
    /// Appends `idx` at the most recently used end.
    pub fn push_back<T: Linked>(&mut self, slab: &mut [T], idx: usize) {
        *slab[idx].link_mut() = Link {
            prev: self.tail,
            next: None,
        };
        match self.tail {
            Some(tail) => slab[tail].link_mut().next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        self.len += 1;
    }

    // == Remove ==
    /// Unlinks `idx` from the queue.
    pub fn remove<T: Linked>(&mut self, slab: &mut [T], idx: usize) {
        let Link { prev, next } = *slab[idx].link();
        match prev {
            Some(prev) => slab[prev].link_mut().next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => slab[next].link_mut().prev = prev,
            None => self.tail = prev,
        }
        *slab[idx].link_mut() = Link::default();
        self.len -= 1;
    }

    // == Touch ==
    /// Moves `idx` to the most recently used end.
    pub fn touch<T: Linked>(&mut self, slab: &mut [T], idx: usize) {
        if self.tail == Some(idx) {
            return;
        }
        self.remove(slab, idx);
        self.push_back(slab, idx);
    }

    // == Pop Front ==
    /// Removes and returns the least recently used index.
    pub fn pop_front<T: Linked>(&mut self, slab: &mut [T]) -> Option<usize> {
        let head = self.head?;
        self.remove(slab, head);
        Some(head)
    }

    // == Peek Front ==
    /// Returns the least recently used index without removing it.
    pub fn front(&self) -> Option<usize> {
        self.head
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Node {
        link: Link,
    }

    impl Linked for Node {
        fn link(&self) -> &Link {
            &self.link
        }

        fn link_mut(&mut self) -> &mut Link {
            &mut self.link
        }
    }

    fn slab(n: usize) -> Vec<Node> {
        (0..n).map(|_| Node::default()).collect()
    }

    fn drain(queue: &mut LruQueue, slab: &mut [Node]) -> Vec<usize> {
        std::iter::from_fn(|| queue.pop_front(slab)).collect()
    }

    #[test]
    fn test_lru_new() {
        let queue = LruQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.front(), None);
    }

    #[test]
    fn test_push_back_keeps_insertion_order() {
        let mut nodes = slab(3);
        let mut queue = LruQueue::new();
        queue.push_back(&mut nodes, 0);
        queue.push_back(&mut nodes, 1);
        queue.push_back(&mut nodes, 2);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.front(), Some(0));
        assert_eq!(drain(&mut queue, &mut nodes), vec![0, 1, 2]);
    }

    #[test]
    fn test_touch_moves_to_back() {
        let mut nodes = slab(3);
        let mut queue = LruQueue::new();
        for idx in 0..3 {
            queue.push_back(&mut nodes, idx);
        }

        queue.touch(&mut nodes, 0);
        assert_eq!(queue.front(), Some(1));
        assert_eq!(drain(&mut queue, &mut nodes), vec![1, 2, 0]);
    }

    #[test]
    fn test_touch_tail_is_noop() {
        let mut nodes = slab(2);
        let mut queue = LruQueue::new();
        queue.push_back(&mut nodes, 0);
        queue.push_back(&mut nodes, 1);
        queue.touch(&mut nodes, 1);
        assert_eq!(queue.len(), 2);
        assert_eq!(drain(&mut queue, &mut nodes), vec![0, 1]);
    }

    #[test]
    fn test_remove_middle_head_and_tail() {
        let mut nodes = slab(5);
        let mut queue = LruQueue::new();
        for idx in 0..5 {
            queue.push_back(&mut nodes, idx);
        }

        queue.remove(&mut nodes, 2);
        queue.remove(&mut nodes, 0);
        queue.remove(&mut nodes, 4);

        assert_eq!(queue.len(), 2);
        assert_eq!(drain(&mut queue, &mut nodes), vec![1, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pop_empty() {
        let mut nodes = slab(1);
        let mut queue = LruQueue::new();
        assert_eq!(queue.pop_front(&mut nodes), None);
    }

    #[test]
    fn test_order_after_multiple_touches() {
        let mut nodes = slab(3);
        let mut queue = LruQueue::new();
        for idx in 0..3 {
            queue.push_back(&mut nodes, idx);
        }

        // a=0, b=1, c=2 touched in order a, c, b
        queue.touch(&mut nodes, 0);
        queue.touch(&mut nodes, 2);
        queue.touch(&mut nodes, 1);

        assert_eq!(drain(&mut queue, &mut nodes), vec![0, 2, 1]);
    }

    #[test]
    fn test_reinsert_after_pop() {
        let mut nodes = slab(2);
        let mut queue = LruQueue::new();
        queue.push_back(&mut nodes, 0);
        queue.push_back(&mut nodes, 1);
        let idx = queue.pop_front(&mut nodes).unwrap();
        queue.push_back(&mut nodes, idx);
        assert_eq!(drain(&mut queue, &mut nodes), vec![1, 0]);
    }
}
