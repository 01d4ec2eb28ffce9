//! Buffer-backed container for the elements of one list value.

use std::fmt;

use crate::json_ext::Value;

use super::ContainerId;
use super::ObjectId;

/// One element position of a [`ResponseList`].
///
/// `Unset` and `Null` are distinct: `Unset` is a reserved position no
/// resolver has written yet, `Null` is an element that resolved to null or
/// was nulled by propagation.
#[derive(Clone, Debug, PartialEq)]
pub enum ListEntry<T> {
    Unset,
    Null,
    Item(T),
}

impl<T> ListEntry<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, ListEntry::Unset)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ListEntry::Null)
    }

    pub fn item(&self) -> Option<&T> {
        match self {
            ListEntry::Item(item) => Some(item),
            _ => None,
        }
    }
}

mod private {
    pub trait Sealed {}
    impl Sealed for crate::json_ext::Value {}
    impl Sealed for crate::result::ObjectId {}
}

/// The element kinds a [`ResponseList`] can be parametrized over: raw leaf
/// values, or handles to nested object containers. One generic container
/// covers both instead of a specialization hierarchy.
pub trait ListItem: private::Sealed + fmt::Debug {}

impl ListItem for Value {}

impl ListItem for ObjectId {}

/// Pooled container holding the elements of one list value.
///
/// `nullable` describes the declared nullability of the *elements*: it is
/// what decides whether a violating element can be nulled in place or has to
/// take the whole list down with it. Capacity is reserved up front by the
/// driver when element count is known (siblings then write disjoint indices
/// through [`set`](ResponseList::set)); append-order production goes through
/// [`push`](ResponseList::push) instead.
#[derive(Debug)]
pub struct ResponseList<T: ListItem> {
    entries: Vec<ListEntry<T>>,
    capacity: usize,
    count: usize,
    nullable: bool,
    parent: Option<ContainerId>,
}

impl<T: ListItem> Default for ResponseList<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            capacity: 0,
            count: 0,
            nullable: false,
            parent: None,
        }
    }
}

impl<T: ListItem> ResponseList<T> {
    /// Makes the container ready for `capacity` elements, resetting any
    /// previous use. Same growth rule as object containers: double the
    /// backing buffer with the request as the floor, never shrink.
    pub fn ensure_capacity(&mut self, capacity: usize) {
        self.reset();
        if self.entries.len() < capacity {
            let target = (self.entries.len() * 2).max(capacity);
            self.entries.resize_with(target, || ListEntry::Unset);
        }
        self.capacity = capacity;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of elements appended through [`push`](ResponseList::push).
    pub fn count(&self) -> usize {
        self.count
    }

    /// The logical element count: reserved capacity for pre-sized lists,
    /// append count otherwise.
    pub fn len(&self) -> usize {
        self.count.max(self.capacity)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends the next element in order. The caller guarantees capacity was
    /// reserved for it.
    pub fn push(&mut self, item: T) {
        debug_assert!(self.count < self.capacity, "list capacity exhausted");
        self.entries[self.count] = ListEntry::Item(item);
        self.count += 1;
    }

    /// Writes the element at a pre-reserved index.
    pub fn set(&mut self, index: usize, entry: ListEntry<T>) {
        debug_assert!(index < self.capacity, "element {index} was never reserved");
        self.entries[index] = entry;
    }

    pub(crate) fn set_null(&mut self, index: usize) {
        debug_assert!(index < self.len(), "element {index} was never reserved");
        self.entries[index] = ListEntry::Null;
    }

    pub fn entry(&self, index: usize) -> &ListEntry<T> {
        debug_assert!(index < self.len(), "element {index} was never reserved");
        &self.entries[index]
    }

    /// The meaningful entries, `[0, len)`.
    pub fn entries(&self) -> &[ListEntry<T>] {
        &self.entries[..self.len()]
    }

    /// Mutable access to the meaningful entries, for disjoint parallel
    /// writers.
    pub fn entries_mut(&mut self) -> &mut [ListEntry<T>] {
        let len = self.len();
        &mut self.entries[..len]
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub(crate) fn set_nullable(&mut self, nullable: bool) {
        self.nullable = nullable;
    }

    /// Clears all materialized entries and zeroes capacity and count,
    /// keeping the backing buffer for the next use.
    pub fn reset(&mut self) {
        let used = self.len();
        for entry in &mut self.entries[..used] {
            *entry = ListEntry::Unset;
        }
        self.capacity = 0;
        self.count = 0;
        self.nullable = false;
        self.parent = None;
    }

    pub fn parent(&self) -> Option<ContainerId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ContainerId>) {
        self.parent = parent;
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn ensure_capacity_resets_and_grows() {
        let mut list: ResponseList<Value> = ResponseList::default();
        list.ensure_capacity(2);
        list.push(json!(1));
        list.push(json!(2));
        assert_eq!(list.count(), 2);

        list.ensure_capacity(5);
        assert_eq!(list.capacity(), 5);
        assert_eq!(list.count(), 0);
        assert!(list.entries().iter().all(ListEntry::is_unset));
    }

    #[test]
    fn push_and_set_respect_reserved_indices() {
        let mut list: ResponseList<Value> = ResponseList::default();
        list.ensure_capacity(3);
        list.set(1, ListEntry::Item(json!("b")));
        list.set(0, ListEntry::Item(json!("a")));
        list.set(2, ListEntry::Null);

        assert_eq!(list.entry(0).item(), Some(&json!("a")));
        assert_eq!(list.entry(1).item(), Some(&json!("b")));
        assert!(list.entry(2).is_null());
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn reset_clears_entries_but_keeps_buffer() {
        let mut list: ResponseList<Value> = ResponseList::default();
        list.ensure_capacity(4);
        for i in 0..4 {
            list.push(json!(i));
        }
        list.reset();

        assert_eq!(list.capacity(), 0);
        assert_eq!(list.count(), 0);
        assert!(list.is_empty());

        list.ensure_capacity(4);
        assert!(list.entries().iter().all(ListEntry::is_unset));
    }

    #[test]
    fn nullable_flag_follows_use_not_buffer() {
        let mut list: ResponseList<Value> = ResponseList::default();
        list.set_nullable(true);
        assert!(list.is_nullable());
        list.reset();
        assert!(!list.is_nullable());
    }
}
