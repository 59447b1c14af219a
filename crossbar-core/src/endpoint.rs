//! Named, bounded, typed request/response endpoints.
//!
//! A request carries its payload together with the write side of a one-shot
//! cell; the client keeps the read side. Like channels, the queue is lossy:
//! a push into a full endpoint evicts the oldest pending request, whose
//! client then observes [`ResponseError::Lost`] instead of a value.

use crate::{
    buffer::{Bounded, Order},
    registry::Handle,
};
use arcstr::ArcStr;
use parking_lot::{Condvar, Mutex};
use std::{
    mem,
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;

/// Construction-time parameters of an endpoint.
#[derive(Debug, Clone, Copy)]
pub struct EndpointCfg {
    pub capacity: usize,
    pub order: Order,
}

impl Default for EndpointCfg {
    fn default() -> Self {
        Self { capacity: 1, order: Order::Fifo }
    }
}

impl EndpointCfg {
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
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ResponseError {
    /// The request was evicted, or its server side went away, before a
    /// response was produced. Retry or give up.
    #[error("the request was dropped before a response was sent")]
    Lost,
    #[error("timed out waiting for a response")]
    Timeout,
}

enum CellState<B> {
    Pending,
    Ready(B),
    Lost,
}

struct Cell<B> {
    state: Mutex<CellState<B>>,
    ready: Condvar,
}

fn oneshot<B>() -> (Responder<B>, Response<B>) {
    let cell =
        Arc::new(Cell { state: Mutex::new(CellState::Pending), ready: Condvar::new() });
    (Responder { cell: cell.clone(), done: false }, Response { cell })
}

/// The write side of a one-shot response.
///
/// Dropping a responder without sending resolves the paired [`Response`] to
/// [`ResponseError::Lost`]; a response observes exactly one outcome.
pub struct Responder<B> {
    cell: Arc<Cell<B>>,
    done: bool,
}

impl<B> Responder<B> {
    pub fn send(mut self, v: B) {
        *self.cell.state.lock() = CellState::Ready(v);
        self.cell.ready.notify_all();
        self.done = true;
    }
}

impl<B> Drop for Responder<B> {
    fn drop(&mut self) {
        if !self.done {
            let mut st = self.cell.state.lock();
            if matches!(*st, CellState::Pending) {
                *st = CellState::Lost;
            }
            drop(st);
            self.cell.ready.notify_all();
        }
    }
}

/// The read side of a one-shot response.
pub struct Response<B> {
    cell: Arc<Cell<B>>,
}

impl<B> Response<B> {
    fn resolve(st: &mut CellState<B>) -> Result<B, ResponseError> {
        match mem::replace(st, CellState::Lost) {
            CellState::Ready(v) => Ok(v),
            CellState::Lost => Err(ResponseError::Lost),
            CellState::Pending => unreachable!("resolving a pending response"),
        }
    }

    /// Block until the server responds or the request is lost.
    pub fn wait(self) -> Result<B, ResponseError> {
        let mut st = self.cell.state.lock();
        loop {
            match &*st {
                CellState::Pending => self.cell.ready.wait(&mut st),
                _ => return Self::resolve(&mut st),
            }
        }
    }

    /// Like [`Response::wait`], but give up after `timeout`.
    pub fn wait_timeout(self, timeout: Duration) -> Result<B, ResponseError> {
        let deadline = Instant::now() + timeout;
        let mut st = self.cell.state.lock();
        loop {
            match &*st {
                CellState::Pending => {
                    if self.cell.ready.wait_until(&mut st, deadline).timed_out() {
                        return match &*st {
                            CellState::Pending => Err(ResponseError::Timeout),
                            _ => Self::resolve(&mut st),
                        };
                    }
                }
                _ => return Self::resolve(&mut st),
            }
        }
    }
}

struct EpState<S, B> {
    clients: usize,
    servers: usize,
    queue: Bounded<(S, Responder<B>)>,
}

/// The registry object behind clients and servers.
pub struct Endpoint<S, B> {
    capacity: usize,
    order: Order,
    state: Mutex<EpState<S, B>>,
    readable: Condvar,
}

impl<S: Send + 'static, B: Send + 'static> Endpoint<S, B> {
    pub fn new(cfg: EndpointCfg) -> Self {
        Endpoint {
            capacity: cfg.capacity,
            order: cfg.order,
            state: Mutex::new(EpState {
                clients: 0,
                servers: 0,
                queue: Bounded::new(cfg.capacity, cfg.order),
            }),
            readable: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn order(&self) -> Order {
        self.order
    }

    pub fn client_count(&self) -> usize {
        self.state.lock().clients
    }

    pub fn server_count(&self) -> usize {
        self.state.lock().servers
    }

    fn push(&self, s: S) -> Response<B> {
        let (tx, rx) = oneshot();
        let mut st = self.state.lock();
        // an evicted request drops its responder, resolving the client to Lost
        st.queue.force_push((s, tx));
        self.readable.notify_all();
        rx
    }

    fn pop(&self, timeout: Option<Duration>) -> Option<(S, Responder<B>)> {
        let deadline = timeout.map(|dt| Instant::now() + dt);
        let mut st = self.state.lock();
        loop {
            if let Some(req) = st.queue.pop() {
                return Some(req);
            }
            // servers idle while nobody is asking; no early exit on zero clients
            match deadline {
                None => self.readable.wait(&mut st),
                Some(d) => {
                    if self.readable.wait_until(&mut st, d).timed_out() {
                        return st.queue.pop();
                    }
                }
            }
        }
    }
}

/// The requesting side of an endpoint.
pub struct Client<S: Send + 'static, B: Send + 'static> {
    ep: Handle<Endpoint<S, B>>,
}

impl<S: Send + 'static, B: Send + 'static> Client<S, B> {
    pub(crate) fn new(ep: Handle<Endpoint<S, B>>) -> Self {
        ep.state.lock().clients += 1;
        Client { ep }
    }

    /// Enqueue a request and return the pending response. Never blocks; on
    /// a full queue the oldest pending request is evicted and lost.
    pub fn push(&self, s: S) -> Response<B> {
        self.ep.push(s)
    }

    pub fn endpoint(&self) -> &ArcStr {
        self.ep.name()
    }

    pub fn client_count(&self) -> usize {
        self.ep.client_count()
    }

    pub fn server_count(&self) -> usize {
        self.ep.server_count()
    }
}

impl<S: Send + 'static, B: Send + 'static> Drop for Client<S, B> {
    fn drop(&mut self) {
        self.ep.state.lock().clients -= 1;
    }
}

/// The serving side of an endpoint.
pub struct Server<S: Send + 'static, B: Send + 'static> {
    ep: Handle<Endpoint<S, B>>,
}

impl<S: Send + 'static, B: Send + 'static> Server<S, B> {
    pub(crate) fn new(ep: Handle<Endpoint<S, B>>) -> Self {
        ep.state.lock().servers += 1;
        Server { ep }
    }

    /// Wait for the next request; `None` on timeout. The server is expected
    /// to complete the returned [`Responder`].
    pub fn pop(&self, timeout: Option<Duration>) -> Option<(S, Responder<B>)> {
        self.ep.pop(timeout)
    }

    pub fn endpoint(&self) -> &ArcStr {
        self.ep.name()
    }

    pub fn client_count(&self) -> usize {
        self.ep.client_count()
    }

    pub fn server_count(&self) -> usize {
        self.ep.server_count()
    }
}

impl<S: Send + 'static, B: Send + 'static> Drop for Server<S, B> {
    fn drop(&mut self) {
        self.ep.state.lock().servers -= 1;
    }
}
