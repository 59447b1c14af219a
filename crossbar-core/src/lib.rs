//! An in-process broker for cooperative tasks.
//!
//! Many tasks in one address space communicate through named, typed,
//! reference-counted objects: lossy bounded pub/sub [`Channel`]s,
//! request/response [`Endpoint`]s, and value-condition [`SyncCell`]s. Each
//! task runs as a [`Node`] with its own logger and a cooperative
//! cancellation flag. Objects live in a process-wide registry partitioned
//! by [`ObjectKind`]; the last [`Handle`] drop destroys the object.
//!
//! The broker makes a deliberate trade: producers never block and memory
//! stays bounded, at the cost of reliable delivery. Pushing into a full
//! buffer overwrites the stalest element, and an evicted request resolves
//! its client's pending response to an explicit lost outcome.

pub mod buffer;
pub mod channel;
pub mod endpoint;
pub mod logger;
pub mod node;
pub mod registry;
pub mod sync;

pub use buffer::{Bounded, Order};
pub use channel::{Channel, ChannelCfg, Delivery, Publisher, RecvError, Subscriber};
pub use endpoint::{
    Client, Endpoint, EndpointCfg, Responder, Response, ResponseError, Server,
};
pub use logger::{LogLevel, NodeLogger, global_level, set_global_level};
pub use node::Node;
pub use registry::{Handle, ObjectKind, OpenMode};
pub use sync::SyncCell;
