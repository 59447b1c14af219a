//! Value-condition cells for task rendezvous.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A typed cell tasks can block on until it holds a particular value.
///
/// `update` notifies waiters only when the value actually changes. A waiter
/// already blocked when the value flips wakes; a waiter arriving after the
/// value is set returns immediately. The cell is not edge triggered.
pub struct SyncCell<T> {
    val: Mutex<T>,
    changed: Condvar,
}

impl<T: PartialEq> SyncCell<T> {
    pub fn new(init: T) -> Self {
        SyncCell { val: Mutex::new(init), changed: Condvar::new() }
    }

    pub fn update(&self, v: T) {
        let mut cur = self.val.lock();
        if *cur != v {
            *cur = v;
            self.changed.notify_all();
        }
    }

    /// Block until the cell holds `v`.
    pub fn wait(&self, v: &T) {
        let mut cur = self.val.lock();
        while *cur != *v {
            self.changed.wait(&mut cur);
        }
    }

    /// Block until the cell holds `v` or `timeout` elapses. Returns whether
    /// the value was observed.
    pub fn wait_timeout(&self, v: &T, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut cur = self.val.lock();
        while *cur != *v {
            if self.changed.wait_until(&mut cur, deadline).timed_out() {
                return *cur == *v;
            }
        }
        true
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.val.lock().clone()
    }
}
