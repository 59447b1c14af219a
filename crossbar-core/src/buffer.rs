//! Fixed-capacity containers used by channels and endpoints.

use std::collections::VecDeque;

/// The discipline a bounded buffer hands elements back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// First in, first out. Consumers observe pushes in push order.
    Fifo,
    /// Last in, first out. Consumers observe the most recent push first.
    Lifo,
}

/// A bounded FIFO or LIFO buffer.
///
/// The length never exceeds the capacity fixed at construction. `push` fails
/// on a full buffer; `force_push` makes room by discarding the element that
/// would be consumed last to be useful (the oldest for [`Order::Fifo`], the
/// top for [`Order::Lifo`]).
#[derive(Debug)]
pub struct Bounded<T> {
    buf: VecDeque<T>,
    cap: usize,
    order: Order,
}

impl<T> Bounded<T> {
    pub fn new(cap: usize, order: Order) -> Self {
        assert!(cap >= 1, "capacity must be at least 1");
        Self { buf: VecDeque::with_capacity(cap), cap, order }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() == self.cap
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn order(&self) -> Order {
        self.order
    }

    /// Append `v`, or hand it back if the buffer is full.
    pub fn push(&mut self, v: T) -> Result<(), T> {
        if self.is_full() {
            return Err(v);
        }
        self.buf.push_back(v);
        Ok(())
    }

    /// Append `v`, discarding one element first if the buffer is full.
    ///
    /// Never fails and never blocks. The discarded element is dropped.
    pub fn force_push(&mut self, v: T) {
        if self.is_full() {
            match self.order {
                Order::Fifo => drop(self.buf.pop_front()),
                Order::Lifo => drop(self.buf.pop_back()),
            }
        }
        self.buf.push_back(v)
    }

    pub fn pop(&mut self) -> Option<T> {
        match self.order {
            Order::Fifo => self.buf.pop_front(),
            Order::Lifo => self.buf.pop_back(),
        }
    }
}
