//! Task identity and the factory surface for every named primitive.

use crate::{
    channel::{Channel, ChannelCfg, Publisher, Subscriber},
    endpoint::{Client, Endpoint, EndpointCfg, Server},
    logger::NodeLogger,
    registry::{self, Handle, ObjectKind, OpenMode},
    sync::SyncCell,
};
use arcstr::ArcStr;
use std::{
    cell::RefCell,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};

thread_local! {
    static CURRENT: RefCell<Option<ArcStr>> = RefCell::new(None);
}

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// A logical task: a unique name, a cooperative-cancellation flag, and the
/// factories for publishers, subscribers, clients, servers, sync cells and
/// user objects. One node is bound to one thread; [`Node::current`] reads
/// the binding back anywhere on that thread.
pub struct Node {
    name: ArcStr,
    running: AtomicBool,
}

impl Node {
    /// Register a node named `"<entry>-<id>"` with a process-monotonic id
    /// and bind it to the calling thread.
    pub fn create(entry: &str) -> registry::Result<Handle<Node>> {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let name = ArcStr::from(format!("{entry}-{id}"));
        let handle = Handle::open(ObjectKind::Node, OpenMode::Create, &name, || Node {
            name: name.clone(),
            running: AtomicBool::new(true),
        })?;
        CURRENT.with(|c| *c.borrow_mut() = Some(name));
        Ok(handle)
    }

    /// The node bound to the calling thread, if any.
    pub fn current() -> Option<Handle<Node>> {
        let name = CURRENT.with(|c| c.borrow().clone())?;
        Handle::find(ObjectKind::Node, &name).ok()
    }

    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// Whether the node should keep going. Cleared by [`Node::stop`], e.g.
    /// from the shell's glob sweep; tasks poll it between waits.
    pub fn running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed)
    }

    pub fn publisher<T: Send + 'static>(
        &self,
        mode: OpenMode,
        topic: &str,
        cfg: ChannelCfg,
    ) -> registry::Result<Publisher<T>> {
        let chan = Handle::open(ObjectKind::Message, mode, topic, || Channel::new(cfg))?;
        Ok(Publisher::new(chan))
    }

    pub fn subscriber<T: Send + 'static>(
        &self,
        mode: OpenMode,
        topic: &str,
        cfg: ChannelCfg,
    ) -> registry::Result<Subscriber<T>> {
        let chan = Handle::open(ObjectKind::Message, mode, topic, || Channel::new(cfg))?;
        Ok(Subscriber::new(chan))
    }

    pub fn client<S: Send + 'static, B: Send + 'static>(
        &self,
        mode: OpenMode,
        endpoint: &str,
        cfg: EndpointCfg,
    ) -> registry::Result<Client<S, B>> {
        let ep = Handle::open(ObjectKind::Request, mode, endpoint, || Endpoint::new(cfg))?;
        Ok(Client::new(ep))
    }

    pub fn server<S: Send + 'static, B: Send + 'static>(
        &self,
        mode: OpenMode,
        endpoint: &str,
        cfg: EndpointCfg,
    ) -> registry::Result<Server<S, B>> {
        let ep = Handle::open(ObjectKind::Request, mode, endpoint, || Endpoint::new(cfg))?;
        Ok(Server::new(ep))
    }

    pub fn sync_cell<T: Send + PartialEq + 'static>(
        &self,
        mode: OpenMode,
        name: &str,
        init: T,
    ) -> registry::Result<Handle<SyncCell<T>>> {
        Handle::open(ObjectKind::UserObject, mode, name, || SyncCell::new(init))
    }

    pub fn object<T: Send + Sync + 'static>(
        &self,
        mode: OpenMode,
        name: &str,
        init: impl FnOnce() -> T,
    ) -> registry::Result<Handle<T>> {
        Handle::open(ObjectKind::UserObject, mode, name, init)
    }

    /// The node's logger, shared across all call sites keyed by node name.
    pub fn logger(&self) -> Handle<NodeLogger> {
        Handle::open(ObjectKind::Logger, OpenMode::FindOrCreate, &self.name, || {
            NodeLogger::new(self.name.clone())
        })
        .expect("logger entries are always NodeLogger")
    }
}
