//! Pooled result materialization.
//!
//! While resolvers run, the value tree of a response is held in reusable
//! buffer-backed containers: a [`ResponseObject`] per composite value and a
//! [`ResponseList`] per list value. Containers are rented from a process
//! wide [`ResultPool`] through a per-response [`ResponseDataStore`], which
//! doubles as the arena giving every container a stable handle, and as the
//! scoped owner returning all of them to the pool when the response is
//! released.
//!
//! Errors, extensions and non-null violations produced while resolvers run
//! are reported into a shared [`ResultCollector`]. Once every resolver for
//! the response unit has returned, [`ResultCollector::build`] reconciles
//! the recorded violations against the tree and assembles the final
//! [`Response`](crate::Response) envelope.
//!
//! [`ResponseObject`]: object::ResponseObject
//! [`ResponseList`]: list::ResponseList
//! [`ResultPool`]: pool::ResultPool
//! [`ResponseDataStore`]: store::ResponseDataStore
//! [`ResultCollector`]: collector::ResultCollector

pub mod collector;
pub mod list;
pub mod object;
pub mod pool;
pub mod store;

mod build;

use serde::Deserialize;
use serde::Serialize;

use crate::json_ext::Path;
use crate::json_ext::Value;

/// Stable identity of a field selection, assigned by the execution driver.
///
/// Two resolvers reporting about the same selection carry the same id, which
/// is what makes error deduplication work. The result core never inspects
/// the value.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SelectionId(pub u64);

/// Handle to a [`ResponseObject`](object::ResponseObject) in a store.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ObjectId(pub(crate) u32);

/// Handle to a [`ResponseList`](list::ResponseList) of raw values.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ListId(pub(crate) u32);

/// Handle to a [`ResponseList`](list::ResponseList) of object containers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ObjectListId(pub(crate) u32);

/// Handle to any container in a store.
///
/// Containers keep one of these as a non-owning link to their parent so the
/// non-null propagation pass can walk upward; ownership always flows top
/// down from the root object.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContainerId {
    Object(ObjectId),
    List(ListId),
    ObjectList(ObjectListId),
}

impl From<ObjectId> for ContainerId {
    fn from(id: ObjectId) -> Self {
        ContainerId::Object(id)
    }
}

impl From<ListId> for ContainerId {
    fn from(id: ListId) -> Self {
        ContainerId::List(id)
    }
}

impl From<ObjectListId> for ContainerId {
    fn from(id: ObjectListId) -> Self {
        ContainerId::ObjectList(id)
    }
}

/// A value held by a field slot: either raw JSON or a handle to a nested
/// pooled container.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseValue {
    /// A leaf value, including explicit null and inline arrays of leaves.
    Value(Value),
    Object(ObjectId),
    List(ListId),
    ObjectList(ObjectListId),
}

impl ResponseValue {
    pub fn null() -> Self {
        ResponseValue::Value(Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ResponseValue::Value(Value::Null))
    }
}

impl From<Value> for ResponseValue {
    fn from(value: Value) -> Self {
        ResponseValue::Value(value)
    }
}

impl From<ObjectId> for ResponseValue {
    fn from(id: ObjectId) -> Self {
        ResponseValue::Object(id)
    }
}

impl From<ListId> for ResponseValue {
    fn from(id: ListId) -> Self {
        ResponseValue::List(id)
    }
}

impl From<ObjectListId> for ResponseValue {
    fn from(id: ObjectListId) -> Self {
        ResponseValue::ObjectList(id)
    }
}

/// A required field or element that resolved to null or failed.
///
/// Recorded by resolvers the moment the violation is observed, resolved all
/// at once by [`ResultCollector::build`](collector::ResultCollector::build).
#[derive(Clone, Debug)]
pub struct NonNullViolation {
    /// The selection that produced the violating value.
    pub selection: SelectionId,

    /// The response path of the violating field or element.
    pub path: Path,

    /// The container owning the violating slot. Starting point of the
    /// upward propagation walk.
    pub container: ContainerId,
}
