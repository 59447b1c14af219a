//! The process-wide named-object registry.
//!
//! Every shared object lives in exactly one map, chosen by its
//! [`ObjectKind`]; names collide only within a kind. Objects are reference
//! counted by the [`Handle`]s pointing at them, not by the map itself: when
//! the last handle drops, the entry is erased and the object destroyed.
//! Objects are stored type-erased and recovered by downcast, so opening a
//! name with a different element type than it was created with fails with
//! [`Error::TypeMismatch`] instead of aliasing memory.

use arcstr::ArcStr;
use fxhash::FxHashMap;
use log::debug;
use parking_lot::Mutex;
use std::{
    any::Any,
    fmt, ops,
    sync::{Arc, LazyLock},
};
use thiserror::Error;

/// The namespace an object is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Message,
    Request,
    Node,
    Logger,
    UserObject,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 5] = [
        ObjectKind::Message,
        ObjectKind::Request,
        ObjectKind::Node,
        ObjectKind::Logger,
        ObjectKind::UserObject,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ObjectKind::Message => "MESSAGE",
            ObjectKind::Request => "REQUEST",
            ObjectKind::Node => "NODE",
            ObjectKind::Logger => "LOGGER",
            ObjectKind::UserObject => "USR_OBJ",
        }
    }

    fn index(self) -> usize {
        match self {
            ObjectKind::Message => 0,
            ObjectKind::Request => 1,
            ObjectKind::Node => 2,
            ObjectKind::Logger => 3,
            ObjectKind::UserObject => 4,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a name lookup does when the name is, or is not, already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Return the existing object or fail with [`Error::NotFound`].
    Find,
    /// Construct a new object or fail with [`Error::AlreadyExists`].
    Create,
    /// Return the existing object if present, else construct it. The
    /// constructor is ignored when the entry already exists; callers must
    /// not rely on their arguments being applied in that case.
    FindOrCreate,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("no {kind} object named {name:?}")]
    NotFound { kind: ObjectKind, name: ArcStr },
    #[error("{kind} object {name:?} already exists")]
    AlreadyExists { kind: ObjectKind, name: ArcStr },
    #[error("{kind} object {name:?} was created with a different type")]
    TypeMismatch { kind: ObjectKind, name: ArcStr },
}

pub type Result<T> = std::result::Result<T, Error>;

struct Entry {
    obj: Arc<dyn Any + Send + Sync>,
    refs: usize,
}

type Shard = Mutex<FxHashMap<ArcStr, Entry>>;

static MAPS: LazyLock<[Shard; 5]> = LazyLock::new(|| Default::default());

fn shard(kind: ObjectKind) -> &'static Shard {
    &MAPS[kind.index()]
}

/// A counted reference to a registry entry.
///
/// Constructing or cloning a handle increments the entry's refcount under
/// the kind mutex; dropping decrements it, and the last drop erases the
/// entry and destroys the object. Handles deref to the object.
pub struct Handle<T: Send + Sync + 'static> {
    kind: ObjectKind,
    name: ArcStr,
    obj: Arc<T>,
}

impl<T: Send + Sync + 'static> Handle<T> {
    /// Open `(kind, name)` under `mode`, constructing the object with
    /// `init` when the mode allows it. Construction runs with the kind
    /// mutex held, so no thread ever observes a half-installed name.
    pub fn open(
        kind: ObjectKind,
        mode: OpenMode,
        name: &str,
        init: impl FnOnce() -> T,
    ) -> Result<Handle<T>> {
        let name = ArcStr::from(name);
        let mut map = shard(kind).lock();
        match map.get_mut(&name) {
            Some(entry) => match mode {
                OpenMode::Create => Err(Error::AlreadyExists { kind, name }),
                OpenMode::Find | OpenMode::FindOrCreate => {
                    let obj = entry
                        .obj
                        .clone()
                        .downcast::<T>()
                        .map_err(|_| Error::TypeMismatch { kind, name: name.clone() })?;
                    entry.refs += 1;
                    Ok(Handle { kind, name, obj })
                }
            },
            None => match mode {
                OpenMode::Find => Err(Error::NotFound { kind, name }),
                OpenMode::Create | OpenMode::FindOrCreate => {
                    let obj = Arc::new(init());
                    let erased: Arc<dyn Any + Send + Sync> = obj.clone();
                    map.insert(name.clone(), Entry { obj: erased, refs: 1 });
                    debug!("created {kind} object {name:?}");
                    Ok(Handle { kind, name, obj })
                }
            },
        }
    }

    /// Open an existing `(kind, name)` entry.
    pub fn find(kind: ObjectKind, name: &str) -> Result<Handle<T>> {
        Self::open(kind, OpenMode::Find, name, || unreachable!())
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn name(&self) -> &ArcStr {
        &self.name
    }
}

impl<T: Send + Sync + 'static> ops::Deref for Handle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.obj
    }
}

impl<T: Send + Sync + 'static> Clone for Handle<T> {
    fn clone(&self) -> Self {
        let mut map = shard(self.kind).lock();
        let entry = map.get_mut(&self.name).expect("live handle without a registry entry");
        entry.refs += 1;
        Handle { kind: self.kind, name: self.name.clone(), obj: self.obj.clone() }
    }
}

impl<T: Send + Sync + 'static> Drop for Handle<T> {
    fn drop(&mut self) {
        let mut map = shard(self.kind).lock();
        if let Some(entry) = map.get_mut(&self.name) {
            entry.refs -= 1;
            if entry.refs == 0 {
                map.remove(&self.name);
                debug!("destroyed {} object {:?}", self.kind, self.name);
            }
        }
    }
}

impl<T: Send + Sync + 'static> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Snapshot of every live object: `(kind, name, refcount)`.
pub fn objects() -> Vec<(ObjectKind, ArcStr, usize)> {
    let mut out = vec![];
    for kind in ObjectKind::ALL {
        let map = shard(kind).lock();
        for (name, entry) in map.iter() {
            out.push((kind, name.clone(), entry.refs));
        }
    }
    out
}

/// Run `f` over every object of `kind` that is a `T`, skipping entries of
/// other types. The kind mutex is held for the duration of the sweep; `f`
/// must not touch the registry.
pub fn visit<T: Send + Sync + 'static>(kind: ObjectKind, mut f: impl FnMut(&ArcStr, &T)) {
    let map = shard(kind).lock();
    for (name, entry) in map.iter() {
        if let Some(obj) = entry.obj.downcast_ref::<T>() {
            f(name, obj)
        }
    }
}
