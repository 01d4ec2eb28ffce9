//! Process wide recycling of result containers.

use parking_lot::Mutex;
use serde::Deserialize;
use serde::Serialize;

use crate::json_ext::Value;

use super::list::ResponseList;
use super::object::ResponseObject;
use super::ObjectId;

/// Pool tuning.
///
/// `max_idle_per_kind` bounds how many idle containers of each kind the pool
/// retains; returned containers beyond the bound are dropped so that one
/// pathologically large response cannot pin its buffers for the rest of the
/// process lifetime.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PoolConfig {
    pub max_idle_per_kind: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_kind: 128,
        }
    }
}

/// Concurrency safe source of recyclable result containers, keyed by
/// container kind.
///
/// One pool is created at service start and passed explicitly
/// (`Arc<ResultPool>`) to everything that builds responses; it is the only
/// structure shared between otherwise unrelated in-flight responses. Renting
/// returns an idle instance when one is available and allocates otherwise,
/// so the pool never blocks a response on another one.
#[derive(Debug)]
pub struct ResultPool {
    objects: Mutex<Vec<ResponseObject>>,
    lists: Mutex<Vec<ResponseList<Value>>>,
    object_lists: Mutex<Vec<ResponseList<ObjectId>>>,
    max_idle: usize,
}

impl Default for ResultPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl ResultPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            objects: Mutex::new(Vec::new()),
            lists: Mutex::new(Vec::new()),
            object_lists: Mutex::new(Vec::new()),
            max_idle: config.max_idle_per_kind,
        }
    }

    pub fn rent_object(&self) -> ResponseObject {
        self.objects.lock().pop().unwrap_or_default()
    }

    pub fn rent_list(&self) -> ResponseList<Value> {
        self.lists.lock().pop().unwrap_or_default()
    }

    pub fn rent_object_list(&self) -> ResponseList<ObjectId> {
        self.object_lists.lock().pop().unwrap_or_default()
    }

    /// Resets the container and makes it available again, unless the idle
    /// bound is reached, in which case the container is dropped.
    pub fn return_object(&self, mut object: ResponseObject) {
        object.reset();
        let mut idle = self.objects.lock();
        if idle.len() < self.max_idle {
            idle.push(object);
        }
    }

    pub fn return_list(&self, mut list: ResponseList<Value>) {
        list.reset();
        let mut idle = self.lists.lock();
        if idle.len() < self.max_idle {
            idle.push(list);
        }
    }

    pub fn return_object_list(&self, mut list: ResponseList<ObjectId>) {
        list.reset();
        let mut idle = self.object_lists.lock();
        if idle.len() < self.max_idle {
            idle.push(list);
        }
    }

    /// Idle counts per kind: `(objects, lists, object lists)`.
    pub fn idle(&self) -> (usize, usize, usize) {
        (
            self.objects.lock().len(),
            self.lists.lock().len(),
            self.object_lists.lock().len(),
        )
    }
}
