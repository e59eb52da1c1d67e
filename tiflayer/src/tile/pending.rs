//! Buffer for tile requests that arrive before the first surface.
//!
//! The queue is filled while a source resolves and decodes, then drained
//! exactly once, in arrival order, when the first surface is published.
//! After that, requests are served directly and the queue refuses pushes
//! until it is [`reset`](PendingTileQueue::reset) for a new source.

use std::collections::VecDeque;

use thiserror::Error;

/// Errors from [`PendingTileQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue was already drained for this source.
    #[error("Pending tile queue was already drained")]
    AlreadyDrained,
}

/// FIFO of pending requests, drained once.
#[derive(Debug)]
pub struct PendingTileQueue<T> {
    items: VecDeque<T>,
    drained: bool,
}

impl<T> Default for PendingTileQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PendingTileQueue<T> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
            drained: false,
        }
    }

    /// Queue a request.
    ///
    /// # Errors
    ///
    /// `AlreadyDrained` once the queue has been drained. The rejected item
    /// is handed back so the caller can serve it directly.
    pub fn push(&mut self, item: T) -> Result<(), (QueueError, T)> {
        if self.drained {
            return Err((QueueError::AlreadyDrained, item));
        }
        self.items.push_back(item);
        Ok(())
    }

    /// Hand every queued request to `f` in arrival order and mark the queue
    /// drained.
    ///
    /// Returns the number of requests drained.
    pub fn drain_into<F>(&mut self, f: F) -> Result<usize, QueueError>
    where
        F: FnMut(T),
    {
        if self.drained {
            return Err(QueueError::AlreadyDrained);
        }
        self.drained = true;
        let count = self.items.len();
        self.items.drain(..).for_each(f);
        Ok(count)
    }

    /// Empty the queue and accept pushes again.
    ///
    /// Queued requests are dropped.
    pub fn reset(&mut self) {
        self.items.clear();
        self.drained = false;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_drained(&self) -> bool {
        self.drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_drain_is_fifo() {
        let mut queue = PendingTileQueue::new();
        for i in 0..5 {
            queue.push(i).unwrap();
        }
        assert_eq!(queue.len(), 5);

        let mut seen = Vec::new();
        let count = queue.drain_into(|i| seen.push(i)).unwrap();
        assert_eq!(count, 5);
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
        assert!(queue.is_drained());
    }

    #[test]
    fn test_push_after_drain_is_rejected() {
        let mut queue = PendingTileQueue::new();
        queue.drain_into(|_: u32| {}).unwrap();
        assert_eq!(queue.push(7), Err((QueueError::AlreadyDrained, 7)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_second_drain_is_rejected() {
        let mut queue = PendingTileQueue::new();
        queue.push(1).unwrap();
        queue.drain_into(|_| {}).unwrap();
        assert_eq!(queue.drain_into(|_| {}), Err(QueueError::AlreadyDrained));
    }

    #[test]
    fn test_reset_reopens() {
        let mut queue = PendingTileQueue::new();
        queue.push(1).unwrap();
        queue.drain_into(|_| {}).unwrap();
        queue.reset();
        assert!(!queue.is_drained());
        queue.push(2).unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_reset_drops_queued_items() {
        let mut queue = PendingTileQueue::new();
        queue.push("a").unwrap();
        queue.push("b").unwrap();
        queue.reset();
        let mut seen = Vec::new();
        queue.drain_into(|s| seen.push(s)).unwrap();
        assert!(seen.is_empty());
    }

    proptest! {
        #[test]
        fn prop_drain_preserves_order(items in proptest::collection::vec(any::<u32>(), 0..64)) {
            let mut queue = PendingTileQueue::new();
            for item in &items {
                queue.push(*item).unwrap();
            }
            let mut seen = Vec::new();
            queue.drain_into(|i| seen.push(i)).unwrap();
            prop_assert_eq!(seen, items);
        }
    }
}
