//! Result core errors.
use displaydoc::Display;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Error types for result assembly.
///
/// Note that these describe contract breaches between the execution driver
/// and the result core. They are never surfaced to clients as GraphQL
/// errors: a driver receiving one has a bug to fix, not a response to send.
#[derive(Error, Display, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[non_exhaustive]
pub enum ResultError {
    /// result has neither data nor errors: {reason}
    InvalidResultState {
        /// Why the result state is unusable.
        reason: String,
    },
}
