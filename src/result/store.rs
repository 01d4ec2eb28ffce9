//! Scoped ownership of one response's containers.

use std::sync::Arc;

use crate::json_ext::Value;

use super::list::ResponseList;
use super::object::ResponseObject;
use super::pool::ResultPool;
use super::ContainerId;
use super::ListId;
use super::ObjectId;
use super::ObjectListId;

/// Arena and memory owner for the containers of one response unit.
///
/// Every container rented while building one response (or one incremental
/// payload) goes through a store, which does three jobs at once:
///
/// * it tracks the rented containers so [`dispose`](ResponseDataStore::dispose)
///   can return all of them to the pool exactly once,
/// * it gives each container a stable handle, which is how containers refer
///   to their parent without owning it,
/// * it hands out disjoint `&mut` borrows when sibling resolvers write in
///   parallel.
///
/// Dropping an undisposed store disposes it, so containers find their way
/// back to the pool on every exit path, including cancellation mid-flight.
#[derive(Debug)]
pub struct ResponseDataStore {
    pool: Arc<ResultPool>,
    objects: Vec<ResponseObject>,
    lists: Vec<ResponseList<Value>>,
    object_lists: Vec<ResponseList<ObjectId>>,
    disposed: bool,
}

impl ResponseDataStore {
    pub fn new(pool: Arc<ResultPool>) -> Self {
        Self {
            pool,
            objects: Vec::new(),
            lists: Vec::new(),
            object_lists: Vec::new(),
            disposed: false,
        }
    }

    pub fn rent_object(&mut self) -> ObjectId {
        if self.disposed {
            failfast_error!("container rented from a disposed response store");
        }
        self.objects.push(self.pool.rent_object());
        ObjectId(self.objects.len() as u32 - 1)
    }

    pub fn rent_list(&mut self, nullable: bool) -> ListId {
        if self.disposed {
            failfast_error!("container rented from a disposed response store");
        }
        let mut list = self.pool.rent_list();
        list.set_nullable(nullable);
        self.lists.push(list);
        ListId(self.lists.len() as u32 - 1)
    }

    pub fn rent_object_list(&mut self, nullable: bool) -> ObjectListId {
        if self.disposed {
            failfast_error!("container rented from a disposed response store");
        }
        let mut list = self.pool.rent_object_list();
        list.set_nullable(nullable);
        self.object_lists.push(list);
        ObjectListId(self.object_lists.len() as u32 - 1)
    }

    pub fn object(&self, id: ObjectId) -> &ResponseObject {
        &self.objects[id.0 as usize]
    }

    pub fn object_mut(&mut self, id: ObjectId) -> &mut ResponseObject {
        &mut self.objects[id.0 as usize]
    }

    pub fn list(&self, id: ListId) -> &ResponseList<Value> {
        &self.lists[id.0 as usize]
    }

    pub fn list_mut(&mut self, id: ListId) -> &mut ResponseList<Value> {
        &mut self.lists[id.0 as usize]
    }

    pub fn object_list(&self, id: ObjectListId) -> &ResponseList<ObjectId> {
        &self.object_lists[id.0 as usize]
    }

    pub fn object_list_mut(&mut self, id: ObjectListId) -> &mut ResponseList<ObjectId> {
        &mut self.object_lists[id.0 as usize]
    }

    /// Records the upward link the non-null propagation walk follows.
    ///
    /// The driver calls this when it writes a child container's handle into
    /// its parent; a container without a parent link is treated as the
    /// document root.
    pub fn set_parent(&mut self, child: impl Into<ContainerId>, parent: impl Into<ContainerId>) {
        let parent = parent.into();
        match child.into() {
            ContainerId::Object(id) => self.object_mut(id).set_parent(Some(parent)),
            ContainerId::List(id) => self.list_mut(id).set_parent(Some(parent)),
            ContainerId::ObjectList(id) => self.object_list_mut(id).set_parent(Some(parent)),
        }
    }

    pub fn parent_of(&self, container: ContainerId) -> Option<ContainerId> {
        match container {
            ContainerId::Object(id) => self.object(id).parent(),
            ContainerId::List(id) => self.list(id).parent(),
            ContainerId::ObjectList(id) => self.object_list(id).parent(),
        }
    }

    /// Disjoint mutable borrows of several objects, for dispatching sibling
    /// resolvers onto parallel threads. Handles must be in rent order and
    /// distinct; exclusivity of each borrow is then a compile-time fact and
    /// the writes need no synchronization.
    pub fn objects_split_mut(&mut self, ids: &[ObjectId]) -> Vec<&mut ResponseObject> {
        debug_assert!(
            ids.windows(2).all(|pair| pair[0].0 < pair[1].0),
            "handles must be distinct and in rent order"
        );
        let mut split = Vec::with_capacity(ids.len());
        let mut rest: &mut [ResponseObject] = self.objects.as_mut_slice();
        let mut offset = 0usize;
        for id in ids {
            let index = id.0 as usize - offset;
            let (_, tail) = std::mem::take(&mut rest).split_at_mut(index);
            let (object, tail) = tail.split_first_mut().expect("handle out of range");
            split.push(object);
            rest = tail;
            offset = id.0 as usize + 1;
        }
        split
    }

    /// Number of containers currently tracked.
    pub fn tracked(&self) -> usize {
        self.objects.len() + self.lists.len() + self.object_lists.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Returns every tracked container to the pool.
    ///
    /// Each container is returned exactly once no matter how often this is
    /// called; the store drains as it returns. Handles into the store are
    /// dangling afterwards.
    pub fn dispose(&mut self) {
        for object in self.objects.drain(..) {
            self.pool.return_object(object);
        }
        for list in self.lists.drain(..) {
            self.pool.return_list(list);
        }
        for list in self.object_lists.drain(..) {
            self.pool.return_object_list(list);
        }
        self.disposed = true;
    }
}

impl Drop for ResponseDataStore {
    fn drop(&mut self) {
        self.dispose();
    }
}
