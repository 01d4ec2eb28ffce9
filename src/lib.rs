//! Result materialization for a GraphQL execution engine.
//!
//! This crate owns the data structures that sit between resolver execution
//! and response serialization: pooled, buffer-backed containers for object
//! fields and list elements, a thread-safe collector that resolvers report
//! errors and metadata into, and the non-null propagation pass that
//! reconciles a completed value tree against the rules of the GraphQL
//! response specification before the final [`Response`] is assembled.
//!
//! The crate deliberately does not know about schemas, query documents,
//! resolver scheduling or transports. The execution driver hands it stable
//! field identities, response paths and type-checked resolver output, and
//! receives a serialization-ready envelope back.
#![cfg_attr(feature = "failfast", allow(unreachable_code))]

macro_rules! failfast_debug {
    ($($tokens:tt)+) => {{
        tracing::debug!($($tokens)+);
        #[cfg(feature = "failfast")]
        panic!(
            "failfast triggered. \
            Please remove the feature failfast if you don't want to see these panics"
        );
    }};
}

macro_rules! failfast_error {
    ($($tokens:tt)+) => {{
        tracing::error!($($tokens)+);
        #[cfg(feature = "failfast")]
        panic!(
            "failfast triggered. \
            Please remove the feature failfast if you don't want to see these panics"
        );
    }};
}

mod error;
pub mod json_ext;
mod response;
pub mod result;

pub use error::ResultError;
pub use json_ext::Object;
pub use json_ext::Path;
pub use json_ext::PathElement;
pub use json_ext::Value;
pub use response::Error;
pub use response::Extensions;
pub use response::Location;
pub use response::Response;
pub use response::ResponseData;
pub use result::collector::ResultCollector;
pub use result::pool::PoolConfig;
pub use result::pool::ResultPool;
pub use result::store::ResponseDataStore;
pub use result::SelectionId;
