//! Thread safe aggregation of everything resolvers report while they run.

use std::collections::HashSet;

use parking_lot::Mutex;
use serde_json_bytes::ByteString;

use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;
use crate::response::Error;

use super::ContainerId;
use super::NonNullViolation;
use super::ObjectId;
use super::SelectionId;

/// Collects errors, extensions and non-null violations from concurrently
/// running resolvers, then reconciles them into the final response.
///
/// The accumulation points are independently lockable on purpose: an
/// error-heavy resolver branch and a metadata-heavy one must not serialize
/// on each other. Violations share the errors lock because the build phase
/// observes the two together.
///
/// The response-level metadata setters take `&mut self`: they belong to the
/// coordinating driver, which has exclusive access before resolvers are
/// dispatched and again after they have joined.
#[derive(Debug, Default)]
pub struct ResultCollector {
    errors: Mutex<ErrorAggregate>,
    extensions: Mutex<ExtensionAggregate>,
    pub(crate) data: Option<ObjectId>,
    pub(crate) path: Option<Path>,
    pub(crate) label: Option<String>,
    pub(crate) has_next: Option<bool>,
}

#[derive(Debug, Default)]
pub(crate) struct ErrorAggregate {
    pub(crate) errors: Vec<Error>,
    pub(crate) reported: HashSet<SelectionId>,
    pub(crate) violations: Vec<NonNullViolation>,
}

#[derive(Debug, Default)]
pub(crate) struct ExtensionAggregate {
    pub(crate) extensions: Object,
    pub(crate) context_data: Object,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an error.
    ///
    /// When `selection` is given, the field is marked as having reported:
    /// later errors for the same selection, including the synthesized
    /// non-null violation error, are dropped instead of duplicating it.
    pub fn add_error(&self, error: Error, selection: Option<SelectionId>) {
        let mut aggregate = self.errors.lock();
        if let Some(selection) = selection {
            if !aggregate.reported.insert(selection) {
                tracing::trace!(?selection, "dropping duplicate error for selection");
                return;
            }
        }
        aggregate.errors.push(error);
    }

    /// Appends several errors attributed to one selection.
    pub fn add_errors(
        &self,
        errors: impl IntoIterator<Item = Error>,
        selection: Option<SelectionId>,
    ) {
        let mut aggregate = self.errors.lock();
        if let Some(selection) = selection {
            if !aggregate.reported.insert(selection) {
                tracing::trace!(?selection, "dropping duplicate errors for selection");
                return;
            }
        }
        aggregate.errors.extend(errors);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.lock().errors.is_empty()
    }

    /// Records a required field or element that produced null or failed.
    /// Resolution is deferred to [`build`](ResultCollector::build).
    pub fn add_non_null_violation(
        &self,
        selection: SelectionId,
        path: Path,
        container: impl Into<ContainerId>,
    ) {
        self.errors.lock().violations.push(NonNullViolation {
            selection,
            path,
            container: container.into(),
        });
    }

    /// Upserts a response extension.
    pub fn set_extension(&self, key: impl Into<ByteString>, value: Value) {
        self.extensions.lock().extensions.insert(key.into(), value);
    }

    /// Upserts a context entry. Context data travels with the response
    /// inside the process and is never serialized to clients.
    pub fn set_context_data(&self, key: impl Into<ByteString>, value: Value) {
        self.extensions
            .lock()
            .context_data
            .insert(key.into(), value);
    }

    /// Sets the root object of the response data.
    pub fn set_data(&mut self, root: ObjectId) {
        self.data = Some(root);
    }

    /// Sets the path this payload is merged at. `None` (the default)
    /// identifies the primary response.
    pub fn set_path(&mut self, path: Path) {
        self.path = Some(path);
    }

    /// Sets the `@defer`/`@stream` label of this payload.
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    /// Signals whether more incremental payloads follow this one. Stays
    /// unset for non-incremental responses.
    pub fn set_has_next(&mut self, has_next: bool) {
        self.has_next = Some(has_next);
    }

    pub(crate) fn into_parts(self) -> (ErrorAggregate, ExtensionAggregate, ResponseMeta) {
        (
            self.errors.into_inner(),
            self.extensions.into_inner(),
            ResponseMeta {
                data: self.data,
                path: self.path,
                label: self.label,
                has_next: self.has_next,
            },
        )
    }
}

#[derive(Debug)]
pub(crate) struct ResponseMeta {
    pub(crate) data: Option<ObjectId>,
    pub(crate) path: Option<Path>,
    pub(crate) label: Option<String>,
    pub(crate) has_next: Option<bool>,
}
