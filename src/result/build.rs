//! Reconciliation of recorded non-null violations against the value tree.

use crate::error::ResultError;
use crate::json_ext::PathElement;
use crate::response::Error;
use crate::response::Response;
use crate::response::ResponseData;

use super::collector::ResultCollector;
use super::store::ResponseDataStore;
use super::ContainerId;
use super::NonNullViolation;

impl ResultCollector {
    /// Reconciles everything resolvers reported and assembles the response
    /// envelope.
    ///
    /// Runs strictly single-threaded, after the driver has joined every
    /// resolver of the response unit: consuming the collector makes an
    /// early call a compile error rather than a race.
    ///
    /// Violations are resolved in LIFO order. Each one that is not already
    /// covered by a reported error gets a synthesized non-null violation
    /// error, then propagates upward until a nullable field or element
    /// absorbs it. A violation that unwinds past the document root nulls
    /// the entire response data and releases the backing containers on the
    /// spot; any violations still on the stack are then moot.
    ///
    /// A driver that completes without data, without errors and without
    /// explicitly signalling `has_next == false` has broken its contract:
    /// that is reported loudly as [`ResultError::InvalidResultState`], never
    /// as a silently empty response.
    pub fn build(self, mut store: ResponseDataStore) -> Result<Response, ResultError> {
        let (mut error_aggregate, extension_aggregate, meta) = self.into_parts();
        let mut data = meta.data;

        while data.is_some() {
            let Some(violation) = error_aggregate.violations.pop() else {
                break;
            };
            if error_aggregate.reported.insert(violation.selection) {
                error_aggregate.errors.push(non_null_violation_error(&violation));
            }
            if !contain_violation(&mut store, &violation) {
                tracing::debug!(
                    path = %violation.path,
                    "non-null violation reached the document root"
                );
                data = None;
                store.dispose();
            }
        }

        if data.is_none() && error_aggregate.errors.is_empty() && meta.has_next != Some(false) {
            return Err(ResultError::InvalidResultState {
                reason: "a response must carry either data or at least one error".to_string(),
            });
        }

        let data = match data {
            Some(root) => Some(ResponseData::new(store, root)),
            None => {
                // Either propagation already released the containers, or the
                // driver produced an error-only response; both ways nothing
                // rented may outlive the build.
                store.dispose();
                meta.data.is_some().then_some(ResponseData::Null)
            }
        };

        Ok(Response {
            label: meta.label,
            data,
            path: meta.path,
            errors: error_aggregate.errors,
            extensions: extension_aggregate.extensions.into(),
            context_data: extension_aggregate.context_data.into(),
            has_next: meta.has_next,
        })
    }
}

/// Walks upward from the violating slot until a nullable field or element
/// absorbs the null.
///
/// Returns `false` when the walk unwinds past the document root, meaning the
/// whole response data has to become null.
fn contain_violation(store: &mut ResponseDataStore, violation: &NonNullViolation) -> bool {
    let mut path = violation.path.clone();
    let mut current = Some(violation.container);
    loop {
        let Some(container) = current else {
            return false;
        };
        let Some(segment) = path.last().cloned() else {
            failfast_debug!("non-null propagation ran out of path segments before the root");
            return true;
        };
        match (container, segment) {
            (ContainerId::Object(id), PathElement::Key(name)) => {
                let object = store.object_mut(id);
                match object.find_index(name.as_str()) {
                    Some(index) if object.slot(index).is_nullable() => {
                        object.slot_mut(index).set_null();
                        return true;
                    }
                    Some(index) => {
                        object.remove(index);
                        current = object.parent();
                        path.pop();
                    }
                    None => {
                        // An earlier violation already unwound through this
                        // slot and detached the subtree we came from.
                        tracing::trace!(
                            field = name.as_str(),
                            "slot already removed, stopping propagation"
                        );
                        return true;
                    }
                }
            }
            (ContainerId::List(id), PathElement::Index(index)) => {
                let list = store.list_mut(id);
                if list.is_nullable() {
                    list.set_null(index);
                    return true;
                }
                current = list.parent();
                path.pop();
            }
            (ContainerId::ObjectList(id), PathElement::Index(index)) => {
                let list = store.object_list_mut(id);
                if list.is_nullable() {
                    list.set_null(index);
                    return true;
                }
                current = list.parent();
                path.pop();
            }
            (container, segment) => {
                failfast_debug!(
                    ?container,
                    ?segment,
                    "mismatched container and path segment, stopping propagation"
                );
                return true;
            }
        }
    }
}

fn non_null_violation_error(violation: &NonNullViolation) -> Error {
    let message = match violation.path.last() {
        Some(PathElement::Key(name)) => {
            format!(
                "Cannot return null for non-nullable field {}",
                name.as_str()
            )
        }
        Some(PathElement::Index(index)) => {
            format!("Cannot return null for non-nullable array element at index {index}")
        }
        None => "Cannot return null for non-nullable field".to_string(),
    };
    Error::builder()
        .message(message)
        .path(violation.path.clone())
        .extension_code("NON_NULL_VIOLATION")
        .build()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json_bytes::json;
    use serde_json_bytes::Value;

    use crate::json_ext::Path;
    use crate::result::list::ListEntry;
    use crate::result::pool::ResultPool;
    use crate::result::ObjectId;
    use crate::result::SelectionId;

    use super::*;

    fn store_with_pool() -> (Arc<ResultPool>, ResponseDataStore) {
        let pool = Arc::new(ResultPool::default());
        let store = ResponseDataStore::new(Arc::clone(&pool));
        (pool, store)
    }

    fn data_value(response: &Response) -> Value {
        response
            .data
            .as_ref()
            .map(ResponseData::to_value)
            .unwrap_or_else(|| panic!("response has no data"))
    }

    #[test]
    fn violation_at_nullable_field_is_contained_in_place() {
        let (_, mut store) = store_with_pool();
        let root = store.rent_object();
        let object = store.object_mut(root);
        object.ensure_capacity(2);
        object.set(0, "a", json!("was here"), true);
        object.set(1, "b", json!("untouched"), true);

        let mut collector = ResultCollector::new();
        collector.set_data(root);
        collector.add_non_null_violation(SelectionId(1), Path::from("a"), root);

        let response = collector.build(store).expect("valid result");
        assert_eq!(
            data_value(&response),
            json!({"a": null, "b": "untouched"})
        );
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].path, Some(Path::from("a")));
    }

    #[test]
    fn scenario_a_non_null_root_field_nulls_the_whole_data() {
        // { a: NonNull(String), b: String } with a violation at ["a"]: the
        // root has no nullable ancestor, so data collapses to null.
        let (pool, mut store) = store_with_pool();
        let root = store.rent_object();
        let object = store.object_mut(root);
        object.ensure_capacity(2);
        object.set(0, "a", json!(null), false);
        object.set(1, "b", json!("ok"), true);

        let mut collector = ResultCollector::new();
        collector.set_data(root);
        collector.add_non_null_violation(SelectionId(1), Path::from("a"), root);

        let response = collector.build(store).expect("valid result");
        assert!(response.data.as_ref().expect("data present").is_null());
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].path, Some(Path::from("a")));
        assert!(response.errors[0]
            .message
            .starts_with("Cannot return null for non-nullable field"));

        // The backing containers were released the moment the root fell.
        assert_eq!(pool.idle().0, 1);
    }

    #[test]
    fn scenario_b_nullable_parent_absorbs_the_violation() {
        // { p: { a: String, b: NonNull(String) } } with p nullable and a
        // violation at ["p", "b"]: p becomes null, sibling a goes with it.
        let (_, mut store) = store_with_pool();
        let root = store.rent_object();
        let p = store.rent_object();
        store.set_parent(p, root);

        let object = store.object_mut(root);
        object.ensure_capacity(1);
        object.set(0, "p", p, true);
        let object = store.object_mut(p);
        object.ensure_capacity(2);
        object.set(0, "a", json!("sibling"), true);
        object.set(1, "b", json!(null), false);

        let mut collector = ResultCollector::new();
        collector.set_data(root);
        collector.add_non_null_violation(SelectionId(1), Path::from("p/b"), p);

        let response = collector.build(store).expect("valid result");
        assert_eq!(data_value(&response), json!({"p": null}));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].path, Some(Path::from("p/b")));
    }

    #[test]
    fn scenario_c_non_null_elements_take_the_list_down() {
        // { list: [NonNull(Int)] } with the list itself nullable and a
        // violation at index 2: the whole list becomes null.
        let (_, mut store) = store_with_pool();
        let root = store.rent_object();
        let list = store.rent_list(false);
        store.set_parent(list, root);

        let object = store.object_mut(root);
        object.ensure_capacity(1);
        object.set(0, "list", list, true);
        let elements = store.list_mut(list);
        elements.ensure_capacity(3);
        elements.set(0, ListEntry::Item(json!(1)));
        elements.set(1, ListEntry::Item(json!(2)));
        elements.set(2, ListEntry::Null);

        let mut collector = ResultCollector::new();
        collector.set_data(root);
        collector.add_non_null_violation(SelectionId(1), Path::from("list/2"), list);

        let response = collector.build(store).expect("valid result");
        assert_eq!(data_value(&response), json!({"list": null}));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].path, Some(Path::from("list/2")));
    }

    #[test]
    fn scenario_d_reported_error_suppresses_the_synthesized_one() {
        // Two errors reported for the same selection before its violation is
        // recorded: the final list carries exactly one error.
        let (_, mut store) = store_with_pool();
        let root = store.rent_object();
        let x = store.rent_object();
        store.set_parent(x, root);

        let object = store.object_mut(root);
        object.ensure_capacity(1);
        object.set(0, "x", x, true);
        let object = store.object_mut(x);
        object.ensure_capacity(1);
        object.set(0, "b", json!(null), false);

        let selection = SelectionId(9);
        let mut collector = ResultCollector::new();
        collector.add_error(
            Error::builder()
                .message("upstream timed out")
                .path(Path::from("x/b"))
                .build(),
            Some(selection),
        );
        collector.add_error(
            Error::builder().message("retry also failed").build(),
            Some(selection),
        );
        collector.set_data(root);
        collector.add_non_null_violation(selection, Path::from("x/b"), x);

        let response = collector.build(store).expect("valid result");
        assert_eq!(data_value(&response), json!({"x": null}));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "upstream timed out");
    }

    #[test]
    fn nullable_elements_contain_violations_per_element() {
        // { heroes: [Hero] } with nullable elements: a violation inside one
        // element nulls that element only.
        let (_, mut store) = store_with_pool();
        let root = store.rent_object();
        let heroes = store.rent_object_list(true);
        let first = store.rent_object();
        let second = store.rent_object();
        store.set_parent(heroes, root);
        store.set_parent(first, heroes);
        store.set_parent(second, heroes);

        let object = store.object_mut(root);
        object.ensure_capacity(1);
        object.set(0, "heroes", heroes, false);
        let object = store.object_mut(first);
        object.ensure_capacity(1);
        object.set(0, "name", json!("Luke"), false);
        let object = store.object_mut(second);
        object.ensure_capacity(1);
        object.set(0, "name", json!(null), false);
        let list = store.object_list_mut(heroes);
        list.ensure_capacity(2);
        list.set(0, ListEntry::Item(first));
        list.set(1, ListEntry::Item(second));

        let mut collector = ResultCollector::new();
        collector.set_data(root);
        collector.add_non_null_violation(SelectionId(1), Path::from("heroes/1/name"), second);

        let response = collector.build(store).expect("valid result");
        assert_eq!(
            data_value(&response),
            json!({"heroes": [{"name": "Luke"}, null]})
        );
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].path, Some(Path::from("heroes/1/name")));
    }

    /// Builds `{ x: { a: NonNull }, y: { b: NonNull }, z: { c: NonNull } }`
    /// with x, y and z nullable, records the three violations in the given
    /// order and returns the rendered data.
    fn divergent_branches(order: [usize; 3]) -> Value {
        let (_, mut store) = store_with_pool();
        let root = store.rent_object();
        let branches: Vec<ObjectId> = (0..3).map(|_| store.rent_object()).collect();

        let object = store.object_mut(root);
        object.ensure_capacity(3);
        for (index, (name, branch)) in ["x", "y", "z"].iter().zip(&branches).enumerate() {
            object.set(index, *name, *branch, true);
        }
        let fields = ["a", "b", "c"];
        for (index, branch) in branches.iter().enumerate() {
            store.set_parent(*branch, root);
            let object = store.object_mut(*branch);
            object.ensure_capacity(1);
            object.set(0, fields[index], json!(null), false);
        }

        let mut collector = ResultCollector::new();
        collector.set_data(root);
        let paths = ["x/a", "y/b", "z/c"];
        for branch in order {
            collector.add_non_null_violation(
                SelectionId(branch as u64),
                Path::from(paths[branch]),
                branches[branch],
            );
        }
        let response = collector.build(store).expect("valid result");
        assert_eq!(response.errors.len(), 3);
        data_value(&response)
    }

    #[test]
    fn violation_order_does_not_change_the_result() {
        const ORDERS: [[usize; 3]; 6] = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        let expected = json!({"x": null, "y": null, "z": null});
        for order in ORDERS {
            assert_eq!(divergent_branches(order), expected, "order {order:?}");
        }
    }

    #[test]
    fn violations_left_after_the_root_fell_are_moot() {
        // Both fields of the non-nullable root violate. The first processed
        // violation nulls the data; the second produces neither error nor
        // walk.
        let (pool, mut store) = store_with_pool();
        let root = store.rent_object();
        let object = store.object_mut(root);
        object.ensure_capacity(2);
        object.set(0, "a", json!(null), false);
        object.set(1, "b", json!(null), false);

        let mut collector = ResultCollector::new();
        collector.set_data(root);
        collector.add_non_null_violation(SelectionId(1), Path::from("a"), root);
        collector.add_non_null_violation(SelectionId(2), Path::from("b"), root);

        let response = collector.build(store).expect("valid result");
        assert!(response.data.as_ref().expect("data present").is_null());
        // LIFO: the violation for `b` was processed, the one for `a` became
        // moot when the root fell.
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].path, Some(Path::from("b")));
        assert_eq!(pool.idle().0, 1);
    }

    #[test]
    fn error_only_response_passes_and_releases_containers() {
        let (pool, mut store) = store_with_pool();
        // The driver rented a container but gave up before attaching data.
        store.rent_object();

        let collector = ResultCollector::new();
        collector.add_error(Error::builder().message("request failed").build(), None);

        let response = collector.build(store).expect("valid result");
        assert!(response.data.is_none());
        assert_eq!(response.errors.len(), 1);
        assert_eq!(pool.idle().0, 1);
    }

    #[test]
    fn empty_terminal_incremental_payload_is_valid() {
        let (_, store) = store_with_pool();
        let mut collector = ResultCollector::new();
        collector.set_has_next(false);

        let response = collector.build(store).expect("valid result");
        assert!(response.data.is_none());
        assert!(response.errors.is_empty());
        assert_eq!(response.has_next, Some(false));
        assert_eq!(
            serde_json_bytes::to_value(&response).expect("serializes"),
            json!({"hasNext": false})
        );
    }

    #[test]
    fn missing_data_and_errors_is_a_contract_breach() {
        let (pool, store) = store_with_pool();
        let collector = ResultCollector::new();
        let error = collector.build(store).expect_err("invalid result state");
        assert!(matches!(error, ResultError::InvalidResultState { .. }));

        // has_next = true promises more payloads but explains nothing about
        // this one; still a breach.
        let store = ResponseDataStore::new(Arc::clone(&pool));
        let mut collector = ResultCollector::new();
        collector.set_has_next(true);
        let error = collector.build(store).expect_err("invalid result state");
        assert!(matches!(error, ResultError::InvalidResultState { .. }));
    }

    #[test]
    fn extensions_and_metadata_travel_into_the_envelope() {
        let (_, mut store) = store_with_pool();
        let root = store.rent_object();
        store.object_mut(root).ensure_capacity(1);
        store.object_mut(root).set(0, "ok", json!(true), true);

        let mut collector = ResultCollector::new();
        collector.set_data(root);
        collector.set_path(Path::from("deferred/0"));
        collector.set_label("slow-fields");
        collector.set_has_next(true);
        collector.set_extension("traceId", json!("abc"));
        collector.set_context_data("cost", json!(3));

        let response = collector.build(store).expect("valid result");
        assert_eq!(response.label.as_deref(), Some("slow-fields"));
        assert_eq!(response.path, Some(Path::from("deferred/0")));
        assert_eq!(response.has_next, Some(true));
        assert!(!response.is_primary());
        // Single-entry mappings stay in their flat representation.
        assert!(matches!(response.extensions, crate::response::Extensions::Single(..)));
        assert_eq!(response.context_data.get("cost"), Some(&json!(3)));
    }
}
