//! Buffer-backed container for the fields of one composite value.

use serde_json_bytes::ByteString;

use super::ContainerId;
use super::ResponseValue;

/// A single named value cell of a [`ResponseObject`].
///
/// Slot identity is positional: the buffer index a slot was reserved at,
/// not its name. Names may repeat across different scopes of one response.
#[derive(Clone, Debug)]
pub struct FieldSlot {
    name: ByteString,
    value: Option<ResponseValue>,
    nullable: bool,
}

impl Default for FieldSlot {
    fn default() -> Self {
        Self {
            name: ByteString::from(String::new()),
            value: None,
            nullable: false,
        }
    }
}

impl FieldSlot {
    pub fn name(&self) -> &ByteString {
        &self.name
    }

    /// The slot value, or `None` while the slot is uninitialized.
    pub fn value(&self) -> Option<&ResponseValue> {
        self.value.as_ref()
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Whether a resolver has written this slot. A removed slot reads as
    /// uninitialized again.
    pub fn is_initialized(&self) -> bool {
        self.value.is_some()
    }

    pub fn write(&mut self, name: impl Into<ByteString>, value: impl Into<ResponseValue>, nullable: bool) {
        self.name = name.into();
        self.value = Some(value.into());
        self.nullable = nullable;
    }

    pub(crate) fn set_null(&mut self) {
        self.value = Some(ResponseValue::null());
    }

    fn clear(&mut self) {
        // Dropping the name releases its share of the source payload;
        // pooled buffers must not pin request data alive.
        self.name = ByteString::from(String::new());
        self.value = None;
        self.nullable = false;
    }
}

/// Pooled container holding the field slots of one object value.
///
/// Only indices in `[0, capacity)` are meaningful; the backing buffer may be
/// larger after reuse and anything beyond capacity is stale. Writers get
/// their slot indices reserved by the execution driver before they are
/// dispatched, so no two of them ever touch the same slot.
#[derive(Debug, Default)]
pub struct ResponseObject {
    slots: Vec<FieldSlot>,
    capacity: usize,
    parent: Option<ContainerId>,
}

impl ResponseObject {
    /// Makes the container ready for `capacity` fields.
    ///
    /// Resets any previous use first, then grows the backing buffer if it is
    /// too small. Growth doubles the buffer, with the requested capacity as
    /// the floor, and never shrinks it back: the whole point of pooling is
    /// that the same allocation serves many requests.
    pub fn ensure_capacity(&mut self, capacity: usize) {
        self.reset();
        if self.slots.len() < capacity {
            let target = (self.slots.len() * 2).max(capacity);
            self.slots.resize_with(target, FieldSlot::default);
        }
        self.capacity = capacity;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Writes the slot at `index`.
    ///
    /// The caller guarantees `index < capacity`; slot reservation happens
    /// before resolvers are dispatched, so this is engine-internal and skips
    /// revalidation.
    pub fn set(
        &mut self,
        index: usize,
        name: impl Into<ByteString>,
        value: impl Into<ResponseValue>,
        nullable: bool,
    ) {
        debug_assert!(index < self.capacity, "slot {index} was never reserved");
        self.slots[index].write(name, value, nullable);
    }

    pub fn slot(&self, index: usize) -> &FieldSlot {
        debug_assert!(index < self.capacity, "slot {index} was never reserved");
        &self.slots[index]
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> &mut FieldSlot {
        debug_assert!(index < self.capacity, "slot {index} was never reserved");
        &mut self.slots[index]
    }

    /// Finds the first slot whose name matches, scanning `[0, capacity)`.
    ///
    /// Object field counts are small in practice, so an ordinal linear scan
    /// beats paying hashing overhead on every lookup.
    pub fn find(&self, name: &str) -> Option<(usize, &FieldSlot)> {
        self.slots[..self.capacity]
            .iter()
            .enumerate()
            .find(|(_, slot)| slot.is_initialized() && slot.name.as_str() == name)
    }

    pub(crate) fn find_index(&self, name: &str) -> Option<usize> {
        self.find(name).map(|(index, _)| index)
    }

    /// Clears the slot at `index` back to uninitialized without shifting its
    /// siblings. The hole is observable through [`FieldSlot::is_initialized`]
    /// and skipped during serialization.
    pub fn remove(&mut self, index: usize) {
        debug_assert!(index < self.capacity, "slot {index} was never reserved");
        self.slots[index].clear();
    }

    /// Clears all materialized slots and zeroes the capacity, keeping the
    /// backing buffer for the next use.
    pub fn reset(&mut self) {
        for slot in &mut self.slots[..self.capacity] {
            slot.clear();
        }
        self.capacity = 0;
        self.parent = None;
    }

    /// The meaningful slots, `[0, capacity)`.
    pub fn slots(&self) -> &[FieldSlot] {
        &self.slots[..self.capacity]
    }

    /// Mutable access to the meaningful slots.
    ///
    /// The driver splits this into disjoint `&mut` cells when sibling
    /// resolvers of one object run in parallel.
    pub fn slots_mut(&mut self) -> &mut [FieldSlot] {
        &mut self.slots[..self.capacity]
    }

    pub fn parent(&self) -> Option<ContainerId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ContainerId>) {
        self.parent = parent;
    }
}
