/*!

A queue of items that become due a whole number of days from now.

Storage is a ring of per-day `VecDeque`s, so releasing a day's items is a single swap no matter
how many items wait on later days. The ring grows whenever an item is pushed further out than
the current horizon.

*/

use std::collections::VecDeque;

const DEFAULT_HORIZON: usize = 8;

#[derive(Clone, Debug)]
pub struct DelayQueue<T> {
    slots: Vec<VecDeque<T>>,
    /// Slot holding items due today.
    today: usize,
    len: usize,
}

impl<T> Default for DelayQueue<T> {
    fn default() -> Self {
        DelayQueue::new(DEFAULT_HORIZON)
    }
}

impl<T> DelayQueue<T> {
    #[must_use]
    pub fn new(horizon: usize) -> Self {
        let horizon = horizon.max(1);
        DelayQueue {
            slots: (0..horizon).map(|_| VecDeque::new()).collect(),
            today: 0,
            len: 0,
        }
    }

    /// Number of days that can be addressed without growing.
    #[must_use]
    pub fn horizon(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Adds an item that falls due `days` from today. Items with `days == 0` come out of the
    /// next call to `advance` ahead of that day's own items.
    pub fn push(&mut self, days: usize, item: T) {
        if days >= self.slots.len() {
            self.grow(days + 1);
        }
        let slot = (self.today + days) % self.slots.len();
        self.slots[slot].push_back(item);
        self.len += 1;
    }

    /// Moves to the next day and returns everything due on it, in the order pushed.
    pub fn advance(&mut self) -> VecDeque<T> {
        let mut due = std::mem::take(&mut self.slots[self.today]);
        self.today = (self.today + 1) % self.slots.len();
        due.append(&mut self.slots[self.today]);
        self.len -= due.len();
        due
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.clear();
        }
        self.today = 0;
        self.len = 0;
    }

    /// Items in due order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let n = self.slots.len();
        (0..n).flat_map(move |offset| self.slots[(self.today + offset) % n].iter())
    }

    fn grow(&mut self, at_least: usize) {
        let new_len = at_least.max(self.slots.len() * 2);
        // Put today at slot 0 so that offsets stay valid after the resize.
        self.slots.rotate_left(self.today);
        self.today = 0;
        self.slots.resize_with(new_len, VecDeque::new);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_come_out_on_their_day() {
        let mut queue = DelayQueue::new(4);
        queue.push(1, "a");
        queue.push(3, "c");
        queue.push(1, "b");
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.advance(), VecDeque::from(vec!["a", "b"]));
        assert!(queue.advance().is_empty());
        assert_eq!(queue.advance(), VecDeque::from(vec!["c"]));
        assert!(queue.is_empty());
    }

    #[test]
    fn zero_delay_items_are_not_lost() {
        let mut queue = DelayQueue::new(2);
        queue.push(1, 2);
        queue.push(0, 1);
        assert_eq!(queue.advance(), VecDeque::from(vec![1, 2]));
    }

    #[test]
    fn grows_past_horizon_after_wrapping() {
        let mut queue = DelayQueue::new(3);
        queue.push(2, 'x');
        assert!(queue.advance().is_empty());
        // today now sits at slot 1
        queue.push(10, 'z');
        assert!(queue.horizon() >= 11);
        assert_eq!(queue.advance(), VecDeque::from(vec!['x']));
        for _ in 0..8 {
            assert!(queue.advance().is_empty());
        }
        assert_eq!(queue.advance(), VecDeque::from(vec!['z']));
    }

    #[test]
    fn iter_is_in_due_order() {
        let mut queue = DelayQueue::new(4);
        queue.advance();
        queue.push(3, 3);
        queue.push(1, 1);
        queue.push(2, 2);
        assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        queue.clear();
        assert!(queue.is_empty());
    }
}
