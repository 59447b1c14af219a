//! Named, bounded, typed pub/sub channels.
//!
//! A channel is lossy by design: pushing into a full buffer discards the
//! element that would otherwise linger and enqueues the new one, so
//! publishers never block and memory stays bounded. Appropriate for
//! control and telemetry topics where freshness beats completeness.

use crate::{
    buffer::{Bounded, Order},
    registry::Handle,
};
use arcstr::ArcStr;
use fxhash::FxHashMap;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

/// How elements are fanned out to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// One shared buffer. Each element is consumed by exactly one of the
    /// attached subscribers; which one is non-deterministic.
    SingleConsumer,
    /// One buffer per attached subscriber. Every subscriber sees every push
    /// that happens between its attach and detach, subject to overwrites in
    /// its own buffer. A slow subscriber cannot starve a fast one.
    MultiConsumer,
}

/// Construction-time parameters of a channel.
#[derive(Debug, Clone, Copy)]
pub struct ChannelCfg {
    pub capacity: usize,
    pub order: Order,
    pub delivery: Delivery,
}

impl Default for ChannelCfg {
    fn default() -> Self {
        Self { capacity: 1, order: Order::Fifo, delivery: Delivery::MultiConsumer }
    }
}

impl ChannelCfg {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RecvError {
    #[error("timed out waiting for a message")]
    Timeout,
    #[error("every publisher has detached")]
    NoPublishers,
}

enum Buffers<T> {
    Shared(Bounded<T>),
    PerSubscriber { next_slot: u64, bufs: FxHashMap<u64, Bounded<T>> },
}

struct State<T> {
    publishers: usize,
    subscribers: usize,
    bufs: Buffers<T>,
}

impl<T> State<T> {
    fn take(&mut self, slot: Option<u64>) -> Option<T> {
        match &mut self.bufs {
            Buffers::Shared(b) => b.pop(),
            Buffers::PerSubscriber { bufs, .. } => {
                let slot = slot.expect("multi-consumer pop without a slot");
                bufs.get_mut(&slot).expect("pop after detach").pop()
            }
        }
    }
}

/// The registry object behind publishers and subscribers.
///
/// Element type, capacity, order and delivery are fixed at construction;
/// the registry knows the object only by kind and name.
pub struct Channel<T> {
    capacity: usize,
    order: Order,
    delivery: Delivery,
    state: Mutex<State<T>>,
    readable: Condvar,
}

impl<T: Send + 'static> Channel<T> {
    pub fn new(cfg: ChannelCfg) -> Self {
        let bufs = match cfg.delivery {
            Delivery::SingleConsumer => Buffers::Shared(Bounded::new(cfg.capacity, cfg.order)),
            Delivery::MultiConsumer => {
                Buffers::PerSubscriber { next_slot: 0, bufs: FxHashMap::default() }
            }
        };
        Channel {
            capacity: cfg.capacity,
            order: cfg.order,
            delivery: cfg.delivery,
            state: Mutex::new(State { publishers: 0, subscribers: 0, bufs }),
            readable: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn order(&self) -> Order {
        self.order
    }

    pub fn delivery(&self) -> Delivery {
        self.delivery
    }

    /// Advisory snapshot; stale the moment the lock is released.
    pub fn publisher_count(&self) -> usize {
        self.state.lock().publishers
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers
    }

    fn attach_publisher(&self) {
        self.state.lock().publishers += 1;
    }

    fn detach_publisher(&self) {
        let mut st = self.state.lock();
        st.publishers -= 1;
        if st.publishers == 0 {
            // wake every blocked subscriber so none hangs on a dead topic
            self.readable.notify_all();
        }
    }

    fn attach_subscriber(&self) -> Option<u64> {
        let mut st = self.state.lock();
        st.subscribers += 1;
        match &mut st.bufs {
            Buffers::Shared(_) => None,
            Buffers::PerSubscriber { next_slot, bufs } => {
                let slot = *next_slot;
                *next_slot += 1;
                bufs.insert(slot, Bounded::new(self.capacity, self.order));
                Some(slot)
            }
        }
    }

    fn detach_subscriber(&self, slot: Option<u64>) {
        let mut st = self.state.lock();
        st.subscribers -= 1;
        if let (Buffers::PerSubscriber { bufs, .. }, Some(slot)) = (&mut st.bufs, slot) {
            bufs.remove(&slot);
        }
    }

    fn push(&self, v: T)
    where
        T: Clone,
    {
        let mut st = self.state.lock();
        match &mut st.bufs {
            Buffers::Shared(b) => {
                b.force_push(v);
                self.readable.notify_one();
            }
            Buffers::PerSubscriber { bufs, .. } => {
                for b in bufs.values_mut() {
                    b.force_push(v.clone());
                }
                self.readable.notify_all();
            }
        }
    }

    fn pop(&self, slot: Option<u64>, timeout: Option<Duration>) -> Result<T, RecvError> {
        let deadline = timeout.map(|dt| Instant::now() + dt);
        let mut st = self.state.lock();
        loop {
            if let Some(v) = st.take(slot) {
                return Ok(v);
            }
            if st.publishers == 0 {
                return Err(RecvError::NoPublishers);
            }
            match deadline {
                None => self.readable.wait(&mut st),
                Some(d) => {
                    if self.readable.wait_until(&mut st, d).timed_out() {
                        // drain once more so a push racing the deadline wins
                        return match st.take(slot) {
                            Some(v) => Ok(v),
                            None if st.publishers == 0 => Err(RecvError::NoPublishers),
                            None => Err(RecvError::Timeout),
                        };
                    }
                }
            }
        }
    }
}

/// The producing side of a channel. Attaches on construction, detaches on
/// drop; dropping the last publisher wakes every blocked subscriber.
pub struct Publisher<T: Send + 'static> {
    chan: Handle<Channel<T>>,
}

impl<T: Send + 'static> Publisher<T> {
    pub(crate) fn new(chan: Handle<Channel<T>>) -> Self {
        chan.attach_publisher();
        Publisher { chan }
    }

    /// Enqueue `v` for delivery. Never blocks; on a full buffer the stalest
    /// element is overwritten.
    pub fn push(&self, v: T)
    where
        T: Clone,
    {
        self.chan.push(v)
    }

    pub fn topic(&self) -> &ArcStr {
        self.chan.name()
    }

    pub fn publisher_count(&self) -> usize {
        self.chan.publisher_count()
    }

    pub fn subscriber_count(&self) -> usize {
        self.chan.subscriber_count()
    }
}

impl<T: Send + 'static> Drop for Publisher<T> {
    fn drop(&mut self) {
        self.chan.detach_publisher()
    }
}

/// The consuming side of a channel.
pub struct Subscriber<T: Send + 'static> {
    chan: Handle<Channel<T>>,
    slot: Option<u64>,
}

impl<T: Send + 'static> Subscriber<T> {
    pub(crate) fn new(chan: Handle<Channel<T>>) -> Self {
        let slot = chan.attach_subscriber();
        Subscriber { chan, slot }
    }

    /// Wait for the next element.
    ///
    /// Blocks until an element is available, the deadline passes
    /// ([`RecvError::Timeout`]), or the channel has no publishers left and
    /// nothing buffered ([`RecvError::NoPublishers`]). `timeout: None`
    /// waits indefinitely.
    pub fn pop(&self, timeout: Option<Duration>) -> Result<T, RecvError> {
        self.chan.pop(self.slot, timeout)
    }

    pub fn topic(&self) -> &ArcStr {
        self.chan.name()
    }

    pub fn publisher_count(&self) -> usize {
        self.chan.publisher_count()
    }

    pub fn subscriber_count(&self) -> usize {
        self.chan.subscriber_count()
    }
}

impl<T: Send + 'static> Drop for Subscriber<T> {
    fn drop(&mut self) {
        self.chan.detach_subscriber(self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Handle, ObjectKind, OpenMode};
    use std::{thread, time::Duration};

    fn open<T: Send + 'static>(name: &str, cfg: ChannelCfg) -> Handle<Channel<T>> {
        Handle::open(ObjectKind::Message, OpenMode::FindOrCreate, name, || Channel::new(cfg))
            .unwrap()
    }

    #[test]
    fn roundtrip_one_slot() {
        let chan = open::<u32>("chan-roundtrip", ChannelCfg::default());
        let p = Publisher::new(chan.clone());
        let s = Subscriber::new(chan);
        p.push(7);
        assert_eq!(s.pop(Some(Duration::from_secs(2))), Ok(7));
    }

    #[test]
    fn overwrite_keeps_newest() {
        let chan = open::<u32>("chan-overwrite", ChannelCfg::default());
        let p = Publisher::new(chan.clone());
        let s = Subscriber::new(chan);
        for i in 0..10 {
            p.push(i);
        }
        assert_eq!(s.pop(Some(Duration::from_secs(2))), Ok(9));
    }

    #[test]
    fn zero_timeout_times_out() {
        let chan = open::<u32>("chan-zero", ChannelCfg::default());
        let _p = Publisher::new(chan.clone());
        let s = Subscriber::new(chan);
        assert_eq!(s.pop(Some(Duration::ZERO)), Err(RecvError::Timeout));
    }

    #[test]
    fn no_publishers_reported_immediately() {
        let chan = open::<u32>("chan-nopub", ChannelCfg::default());
        let s = Subscriber::new(chan);
        assert_eq!(s.pop(Some(Duration::from_secs(2))), Err(RecvError::NoPublishers));
    }

    #[test]
    fn buffered_data_wins_over_no_publishers() {
        let chan = open::<u32>("chan-drain", ChannelCfg::default());
        let s = Subscriber::new(chan.clone());
        let p = Publisher::new(chan);
        p.push(3);
        drop(p);
        assert_eq!(s.pop(Some(Duration::from_secs(2))), Ok(3));
        assert_eq!(s.pop(Some(Duration::from_secs(2))), Err(RecvError::NoPublishers));
    }

    #[test]
    fn last_detach_wakes_blocked_subscribers() {
        let chan = open::<u32>("chan-wake", ChannelCfg::default());
        let p = Publisher::new(chan.clone());
        let popper = {
            let s = Subscriber::new(chan);
            thread::spawn(move || s.pop(None))
        };
        thread::sleep(Duration::from_millis(100));
        drop(p);
        assert_eq!(popper.join().unwrap(), Err(RecvError::NoPublishers));
    }

    #[test]
    fn multi_consumer_fans_out() {
        let chan = open::<u32>("chan-fanout", ChannelCfg::default().capacity(4));
        let p = Publisher::new(chan.clone());
        let a = Subscriber::new(chan.clone());
        let b = Subscriber::new(chan);
        p.push(1);
        p.push(2);
        assert_eq!(a.pop(Some(Duration::from_secs(2))), Ok(1));
        assert_eq!(b.pop(Some(Duration::from_secs(2))), Ok(1));
        assert_eq!(a.pop(Some(Duration::from_secs(2))), Ok(2));
        assert_eq!(b.pop(Some(Duration::from_secs(2))), Ok(2));
    }

    #[test]
    fn multi_consumer_misses_pushes_before_attach() {
        let chan = open::<u32>("chan-late", ChannelCfg::default().capacity(4));
        let p = Publisher::new(chan.clone());
        p.push(1);
        let s = Subscriber::new(chan);
        p.push(2);
        assert_eq!(s.pop(Some(Duration::from_secs(2))), Ok(2));
    }

    #[test]
    fn single_consumer_partitions_elements() {
        let cfg = ChannelCfg::default().capacity(8).delivery(Delivery::SingleConsumer);
        let chan = open::<u32>("chan-single", cfg);
        let p = Publisher::new(chan.clone());
        let a = Subscriber::new(chan.clone());
        let b = Subscriber::new(chan);
        for i in 0..4 {
            p.push(i);
        }
        let mut got = vec![];
        for _ in 0..2 {
            got.push(a.pop(Some(Duration::from_secs(2))).unwrap());
            got.push(b.pop(Some(Duration::from_secs(2))).unwrap());
        }
        got.sort_unstable();
        assert_eq!(got, vec![0, 1, 2, 3]);
    }

    #[test]
    fn lifo_pops_newest_first() {
        let cfg = ChannelCfg::default().capacity(4).order(Order::Lifo);
        let chan = open::<u32>("chan-lifo", cfg);
        let p = Publisher::new(chan.clone());
        let s = Subscriber::new(chan);
        p.push(1);
        p.push(2);
        p.push(3);
        assert_eq!(s.pop(Some(Duration::from_secs(2))), Ok(3));
        assert_eq!(s.pop(Some(Duration::from_secs(2))), Ok(2));
    }

    #[test]
    fn counters_track_attachments() {
        let chan = open::<u32>("chan-counts", ChannelCfg::default());
        let p = Publisher::new(chan.clone());
        assert_eq!(p.publisher_count(), 1);
        assert_eq!(p.subscriber_count(), 0);
        {
            let s = Subscriber::new(chan.clone());
            assert_eq!(s.subscriber_count(), 1);
        }
        assert_eq!(p.subscriber_count(), 0);
    }
}
