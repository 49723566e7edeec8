//! Observable state exposed by the hooks.

use crate::framework::QueryError;

/// Lifecycle of a query or mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Nothing requested yet (disabled query, unused mutation).
    Idle,
    /// Waiting for the first result for the current key.
    Pending,
    Success,
    Error,
}

/// State of a [`UseQuery`](super::UseQuery).
///
/// `data` belongs to the current key: when the payload changes, data and error
/// are cleared and the status returns to [`Status::Pending`]. A failed refetch
/// keeps the data from the last success.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub status: Status,
    pub data: Option<T>,
    pub error: Option<QueryError>,
    /// A fetch for the current key is running.
    pub is_fetching: bool,
}

impl<T> QueryState<T> {
    pub(crate) fn idle() -> Self {
        Self {
            status: Status::Idle,
            data: None,
            error: None,
            is_fetching: false,
        }
    }

    pub(crate) fn pending() -> Self {
        Self {
            status: Status::Pending,
            is_fetching: true,
            ..Self::idle()
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == Status::Pending
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }

    /// No fetch running and no first result outstanding.
    pub fn is_settled(&self) -> bool {
        !self.is_fetching && self.status != Status::Pending
    }
}

/// State of a [`UseMutation`](super::UseMutation). Reflects the most recent call.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationState<T, P> {
    pub status: Status,
    pub data: Option<T>,
    pub error: Option<QueryError>,
    /// Payload of the most recent call.
    pub variables: Option<P>,
    /// Calls made so far.
    pub submitted: u64,
}

impl<T, P> Default for MutationState<T, P> {
    fn default() -> Self {
        Self {
            status: Status::Idle,
            data: None,
            error: None,
            variables: None,
            submitted: 0,
        }
    }
}

impl<T, P> MutationState<T, P> {
    pub fn is_pending(&self) -> bool {
        self.status == Status::Pending
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }
}
