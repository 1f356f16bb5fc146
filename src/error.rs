//! `MeshForgeError`: unified error type for mesh-forge public APIs
//!
//! Every fallible operation in the engine returns this error. Variants are
//! grouped by the failure taxonomy callers care about: input validation
//! (state untouched), algorithmic failures on valid input, and unexpected
//! internal conditions. [`CallStatus`] projects a `Result` onto the
//! three-valued status code exposed at the session boundary; the error
//! message always travels inside the error value, so there is no shared
//! last-error slot to race on.

use thiserror::Error;

/// Unified error type for mesh-forge operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshForgeError {
    /// No session is registered under the given handle.
    #[error("unknown session `{0}`")]
    UnknownSession(u64),
    /// Attempted to construct a SessionId from the reserved zero value.
    #[error("SessionId must be non-zero (0 is reserved as invalid/sentinel)")]
    InvalidSessionId,
    /// A node index was negative or past the end of the node array.
    #[error("node index {index} out of range (mesh has {count} nodes)")]
    NodeIndexOutOfRange { index: i64, count: usize },
    /// An edge index was negative or past the end of the edge array.
    #[error("edge index {index} out of range (mesh has {count} edges)")]
    EdgeIndexOutOfRange { index: i64, count: usize },
    /// An edge was given the same node for both endpoints.
    #[error("edge endpoints must be distinct (both are node {0})")]
    DegenerateEdge(usize),
    /// Coordinate arrays of a geometry list differ in length.
    #[error("coordinate length mismatch: {x_len} x-coordinates vs {y_len} y-coordinates")]
    CoordinateLengthMismatch { x_len: usize, y_len: usize },
    /// The values array of a geometry list is neither empty nor coordinate-sized.
    #[error("values length mismatch: {values_len} values for {coordinate_len} coordinates")]
    ValuesLengthMismatch {
        values_len: usize,
        coordinate_len: usize,
    },
    /// An operation requiring a closed polygon received an open polyline.
    #[error("polygon is not closed")]
    PolygonNotClosed,
    /// A geometry part has too few points for the requested operation.
    #[error("geometry part needs at least {needed} points, got {got}")]
    TooFewPoints { needed: usize, got: usize },
    /// A numeric parameter is outside its admissible range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: &'static str,
    },
    /// The operation needs mesh state that has not been set for this session.
    #[error("operation requires a non-empty {0}")]
    EmptyState(&'static str),
    /// An algorithm produced or encountered geometry it cannot proceed with.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    /// Unexpected internal failure with a descriptive message.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Three-valued status of a single engine call, as exposed across the
/// session boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum CallStatus {
    /// The call completed and state was updated/read as requested.
    Success = 0,
    /// The call failed on bad input or an internal condition.
    Exception = 1,
    /// The call failed because the algorithm hit degenerate geometry.
    InvalidGeometry = 2,
}

impl CallStatus {
    /// Project a call result onto the tri-state status code.
    pub fn of<T>(result: &Result<T, MeshForgeError>) -> Self {
        match result {
            Ok(_) => CallStatus::Success,
            Err(MeshForgeError::InvalidGeometry(_)) => CallStatus::InvalidGeometry,
            Err(_) => CallStatus::Exception,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_of_ok_is_success() {
        let r: Result<(), MeshForgeError> = Ok(());
        assert_eq!(CallStatus::of(&r), CallStatus::Success);
    }

    #[test]
    fn status_distinguishes_geometry_failures() {
        let r: Result<(), MeshForgeError> =
            Err(MeshForgeError::InvalidGeometry("collapsed cell".into()));
        assert_eq!(CallStatus::of(&r), CallStatus::InvalidGeometry);

        let r: Result<(), MeshForgeError> = Err(MeshForgeError::NodeIndexOutOfRange {
            index: -1,
            count: 4,
        });
        assert_eq!(CallStatus::of(&r), CallStatus::Exception);
    }

    #[test]
    fn messages_carry_context() {
        let err = MeshForgeError::CoordinateLengthMismatch { x_len: 3, y_len: 2 };
        assert!(err.to_string().contains("3 x-coordinates"));
    }
}
