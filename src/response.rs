//! The serialization-ready response envelope.

use std::fmt;

use serde::ser::SerializeMap;
use serde::ser::SerializeSeq;
use serde::Deserialize;
use serde::Serialize;
use serde::Serializer;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;

use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;
use crate::result::store::ResponseDataStore;
use crate::result::ListId;
use crate::result::ObjectId;
use crate::result::ObjectListId;
use crate::result::ResponseValue;

/// The error location
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// The line number
    pub line: u32,
    /// The column number
    pub column: u32,
}

/// A [GraphQL error](https://spec.graphql.org/October2021/#sec-Errors)
/// as may be found in the `errors` field of a GraphQL [`Response`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[non_exhaustive]
pub struct Error {
    /// The error message.
    pub message: String,

    /// The locations of the error in the GraphQL document of the originating request.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,

    /// If this is a field error, the response path to that field in [`Response::data`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Path>,

    /// The optional GraphQL extensions for this error.
    #[serde(skip_serializing_if = "Object::is_empty")]
    pub extensions: Object,
}

#[buildstructor::buildstructor]
impl Error {
    /// Returns a builder that builds a GraphQL [`Error`] from its components.
    ///
    /// Builder methods:
    ///
    /// * `.message(impl Into<`[`String`]`>)`
    ///   Required.
    ///
    /// * `.location(impl Into<`[`Location`]`>)`
    ///   Optional, may be called multiple times.
    ///
    /// * `.path(impl Into<`[`Path`]`>)`
    ///   Optional.
    ///
    /// * `.extension_code(impl Into<`[`String`]`>)`
    ///   Optional.
    ///   Sets the "code" in the extension map unless the map already carries
    ///   one.
    ///
    /// * `.extension(impl Into<`[`ByteString`]`>, impl Into<`[`Value`]`>)`
    ///   Optional, may be called multiple times.
    ///
    /// * `.build()`
    #[builder(visibility = "pub")]
    fn new(
        message: String,
        locations: Vec<Location>,
        path: Option<Path>,
        extension_code: Option<String>,
        // Skip the `Object` type alias in order to use buildstructor's map special-casing
        mut extensions: JsonMap<ByteString, Value>,
    ) -> Self {
        if let Some(code) = extension_code {
            extensions
                .entry("code")
                .or_insert(Value::String(ByteString::from(code)));
        }
        Self {
            message,
            locations,
            path,
            extensions,
        }
    }

    /// Extract the error code from [`Error::extensions`] as a String if it is set.
    pub fn extension_code(&self) -> Option<String> {
        self.extensions.get("code").and_then(|code| match code {
            Value::String(s) => Some(s.as_str().to_owned()),
            Value::Number(n) => Some(n.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) | Value::Bool(_) => None,
        })
    }
}

/// Displays (only) the error message.
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.message.fmt(f)
    }
}

/// A string-keyed response mapping, stored flat for the common cases.
///
/// Almost every response carries zero or one extension entry, so the
/// representation keeps those out of a general map: `Empty` and `Single`
/// allocate nothing beyond the entry itself, and only a second distinct key
/// upgrades the value to a real map.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Extensions {
    #[default]
    Empty,
    Single(ByteString, Value),
    Map(Object),
}

impl Extensions {
    pub fn is_empty(&self) -> bool {
        matches!(self, Extensions::Empty)
    }

    pub fn len(&self) -> usize {
        match self {
            Extensions::Empty => 0,
            Extensions::Single(..) => 1,
            Extensions::Map(map) => map.len(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Extensions::Empty => None,
            Extensions::Single(k, v) => (k.as_str() == key).then_some(v),
            Extensions::Map(map) => map.get(key),
        }
    }

    pub fn insert(&mut self, key: impl Into<ByteString>, value: Value) {
        let key = key.into();
        match self {
            Extensions::Empty => *self = Extensions::Single(key, value),
            Extensions::Single(existing, _) if existing.as_str() == key.as_str() => {
                *self = Extensions::Single(key, value);
            }
            Extensions::Single(..) => {
                let Extensions::Single(k, v) = std::mem::take(self) else {
                    unreachable!()
                };
                let mut map = Object::default();
                map.insert(k, v);
                map.insert(key, value);
                *self = Extensions::Map(map);
            }
            Extensions::Map(map) => {
                map.insert(key, value);
            }
        }
    }
}

impl From<Object> for Extensions {
    fn from(map: Object) -> Self {
        match map.len() {
            0 => Extensions::Empty,
            1 => {
                let (key, value) = map.into_iter().next().expect("length checked");
                Extensions::Single(key, value)
            }
            _ => Extensions::Map(map),
        }
    }
}

impl Serialize for Extensions {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Extensions::Empty => serializer.serialize_map(Some(0))?.end(),
            Extensions::Single(key, value) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(key, value)?;
                map.end()
            }
            Extensions::Map(entries) => entries.serialize(serializer),
        }
    }
}

/// The data of a [`Response`]: a materialized value tree backed by pooled
/// containers, or the null that non-null propagation collapsed it to.
///
/// The `Data` form owns the store renting its containers; dropping it (or
/// calling [`release`](ResponseData::release) once serialization is done)
/// returns every container to the pool. The `Null` form carries nothing,
/// its containers were already released when the root was nulled.
#[derive(Debug)]
pub enum ResponseData {
    Null,
    Data {
        store: ResponseDataStore,
        root: ObjectId,
    },
}

impl ResponseData {
    pub(crate) fn new(store: ResponseDataStore, root: ObjectId) -> Self {
        ResponseData::Data { store, root }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ResponseData::Null)
    }

    /// Returns the backing containers to the pool. Idempotent; dropping the
    /// value does the same.
    pub fn release(&mut self) {
        if let ResponseData::Data { store, .. } = self {
            store.dispose();
        }
    }

    /// Renders the tree into an owned [`Value`].
    ///
    /// Serialization does not need this (it walks the containers directly);
    /// it exists for consumers that inspect or merge data before encoding,
    /// and for assertions in tests.
    pub fn to_value(&self) -> Value {
        match self {
            ResponseData::Null => Value::Null,
            ResponseData::Data { store, root } => render_object(store, *root),
        }
    }
}

impl Serialize for ResponseData {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ResponseData::Null => serializer.serialize_unit(),
            ResponseData::Data { store, root } => ObjectView { store, id: *root }.serialize(serializer),
        }
    }
}

struct ObjectView<'a> {
    store: &'a ResponseDataStore,
    id: ObjectId,
}

impl Serialize for ObjectView<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let object = self.store.object(self.id);
        let fields = object
            .slots()
            .iter()
            .filter(|slot| slot.is_initialized())
            .count();
        let mut map = serializer.serialize_map(Some(fields))?;
        for slot in object.slots() {
            // Removed slots are holes: propagation dropped the field and an
            // ancestor absorbed the violation.
            if let Some(value) = slot.value() {
                map.serialize_entry(
                    slot.name(),
                    &ValueView {
                        store: self.store,
                        value,
                    },
                )?;
            }
        }
        map.end()
    }
}

struct ValueView<'a> {
    store: &'a ResponseDataStore,
    value: &'a ResponseValue,
}

impl Serialize for ValueView<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.value {
            ResponseValue::Value(value) => value.serialize(serializer),
            ResponseValue::Object(id) => ObjectView {
                store: self.store,
                id: *id,
            }
            .serialize(serializer),
            ResponseValue::List(id) => ListView {
                store: self.store,
                id: *id,
            }
            .serialize(serializer),
            ResponseValue::ObjectList(id) => ObjectListView {
                store: self.store,
                id: *id,
            }
            .serialize(serializer),
        }
    }
}

struct ListView<'a> {
    store: &'a ResponseDataStore,
    id: ListId,
}

impl Serialize for ListView<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let list = self.store.list(self.id);
        let mut seq = serializer.serialize_seq(Some(list.len()))?;
        for entry in list.entries() {
            match entry.item() {
                Some(value) => seq.serialize_element(value)?,
                None => seq.serialize_element(&Value::Null)?,
            }
        }
        seq.end()
    }
}

struct ObjectListView<'a> {
    store: &'a ResponseDataStore,
    id: ObjectListId,
}

impl Serialize for ObjectListView<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let list = self.store.object_list(self.id);
        let mut seq = serializer.serialize_seq(Some(list.len()))?;
        for entry in list.entries() {
            match entry.item() {
                Some(id) => seq.serialize_element(&ObjectView {
                    store: self.store,
                    id: *id,
                })?,
                None => seq.serialize_element(&Value::Null)?,
            }
        }
        seq.end()
    }
}

fn render_object(store: &ResponseDataStore, id: ObjectId) -> Value {
    let object = store.object(id);
    let mut map = Object::default();
    for slot in object.slots() {
        if let Some(value) = slot.value() {
            map.insert(slot.name().clone(), render_value(store, value));
        }
    }
    Value::Object(map)
}

fn render_value(store: &ResponseDataStore, value: &ResponseValue) -> Value {
    match value {
        ResponseValue::Value(value) => value.clone(),
        ResponseValue::Object(id) => render_object(store, *id),
        ResponseValue::List(id) => Value::Array(
            store
                .list(*id)
                .entries()
                .iter()
                .map(|entry| entry.item().cloned().unwrap_or(Value::Null))
                .collect(),
        ),
        ResponseValue::ObjectList(id) => Value::Array(
            store
                .object_list(*id)
                .entries()
                .iter()
                .map(|entry| match entry.item() {
                    Some(id) => render_object(store, *id),
                    None => Value::Null,
                })
                .collect(),
        ),
    }
}

/// A GraphQL response.
///
/// One envelope per payload: the primary response and every deferred or
/// streamed fragment each get their own, with `label`, `path` and
/// `has_next` identifying the incremental ones.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Response {
    /// The label that was passed to the defer or stream directive for this patch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// The response data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,

    /// The path that the data should be merged at.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Path>,

    /// The optional graphql errors encountered.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Error>,

    /// The optional graphql extensions.
    #[serde(skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,

    /// Per-response data carried to in-process consumers, never serialized
    /// to clients.
    #[serde(skip)]
    pub context_data: Extensions,

    /// Whether more incremental payloads follow this one. `None` for
    /// non-incremental responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_next: Option<bool>,
}

#[buildstructor::buildstructor]
impl Response {
    /// Constructor
    #[builder(visibility = "pub")]
    fn new(
        label: Option<String>,
        data: Option<ResponseData>,
        path: Option<Path>,
        errors: Vec<Error>,
        // Skip the `Object` type alias in order to use buildstructor's map special-casing
        extensions: JsonMap<ByteString, Value>,
        context_data: Option<Extensions>,
        has_next: Option<bool>,
    ) -> Self {
        Self {
            label,
            data,
            path,
            errors,
            extensions: extensions.into(),
            context_data: context_data.unwrap_or_default(),
            has_next,
        }
    }

    /// If path is None, this is a primary response.
    pub fn is_primary(&self) -> bool {
        self.path.is_none()
    }

    /// Releases the pooled containers backing [`Response::data`].
    ///
    /// Transport calls this once the envelope is serialized; dropping the
    /// response has the same effect.
    pub fn release(&mut self) {
        if let Some(data) = &mut self.data {
            data.release();
        }
    }
}
