//! Error types for the radbill engine.
//!
//! Every lifecycle operation returns [`Result<T>`]. Errors fall into four
//! classes (see [`ErrorKind`]):
//!
//! - **Not found** ([`EngineError::SubscriberNotFound`], [`EngineError::PlanNotFound`],
//!   [`EngineError::PlanDisabled`]; a disabled plan cannot be purchased, so it
//!   is reported like a missing one)
//! - **Conflict** ([`EngineError::DuplicateName`], [`EngineError::PendingBookingExists`])
//! - **Invalid** ([`EngineError::InvalidInput`], [`EngineError::ConfigError`])
//! - **Unavailable** ([`EngineError::StoreUnavailable`])
//!
//! A rejected operation never leaves partial writes behind: the transaction it
//! ran in is dropped without commit.
//!
//! # Examples
//!
//! ```
//! use radbill_engine::error::{EngineError, ErrorKind, Result};
//!
//! fn check_units(units: u32) -> Result<u32> {
//!     if units == 0 {
//!         return Err(EngineError::InvalidInput("unit count must be at least 1".into()));
//!     }
//!     Ok(units)
//! }
//!
//! let err = check_units(0).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::Invalid);
//! assert!(!err.is_retryable());
//! ```

use thiserror::Error;

use crate::subscriptions::models::{PlanId, SubscriberId};

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Coarse classification of [`EngineError`] used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced subscriber or plan does not exist.
    NotFound,
    /// The request collides with existing state.
    Conflict,
    /// The request itself is malformed or not allowed.
    Invalid,
    /// The backing store failed; safe to retry.
    Unavailable,
}

/// Errors that can occur in the subscription engine.
///
/// # Error Recovery
///
/// - **Business-rule rejections** (everything except
///   [`StoreUnavailable`](Self::StoreUnavailable)): do not retry, the same
///   request will be rejected again
/// - **Store failures** ([`StoreUnavailable`](Self::StoreUnavailable)): retry the
///   whole operation, nothing from the failed attempt was persisted
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum EngineError {
    /// The subscriber does not exist.
    #[error("subscriber not found: {0}")]
    SubscriberNotFound(SubscriberId),

    /// The plan does not exist in the catalog.
    #[error("plan not found: {0}")]
    PlanNotFound(PlanId),

    /// The plan exists but is disabled for new purchases.
    #[error("plan is disabled: {0}")]
    PlanDisabled(PlanId),

    /// Another subscriber already uses this name.
    #[error("subscriber name already taken: {0}")]
    DuplicateName(String),

    /// The subscriber already has a booked plan change waiting for promotion.
    ///
    /// # Recovery
    ///
    /// Wait until the pending booking is promoted to `Using` by the expiry
    /// process before booking another change.
    #[error("subscriber {0} already has a booked plan change pending")]
    PendingBookingExists(SubscriberId),

    /// Malformed request fields.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Engine configuration failed validation or parsing.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The store aborted the transaction or could not be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl EngineError {
    /// Returns the error class for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::SubscriberNotFound(_) | Self::PlanNotFound(_) | Self::PlanDisabled(_) => {
                ErrorKind::NotFound
            }
            Self::DuplicateName(_) | Self::PendingBookingExists(_) => ErrorKind::Conflict,
            Self::InvalidInput(_) | Self::ConfigError(_) => ErrorKind::Invalid,
            Self::StoreUnavailable(_) => ErrorKind::Unavailable,
        }
    }

    /// Whether the caller may retry the same request unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = EngineError::PlanNotFound(PlanId::new(7));
        assert_eq!(error.to_string(), "plan not found: 7");
    }

    #[test]
    fn test_pending_booking_display() {
        let error = EngineError::PendingBookingExists(SubscriberId::new(3));
        assert!(error.to_string().contains("already has a booked plan change"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(EngineError::SubscriberNotFound(SubscriberId::new(1)).kind(), ErrorKind::NotFound);
        assert_eq!(EngineError::DuplicateName("alice".into()).kind(), ErrorKind::Conflict);
        assert_eq!(EngineError::PlanDisabled(PlanId::new(1)).kind(), ErrorKind::NotFound);
        assert_eq!(EngineError::InvalidInput("units".into()).kind(), ErrorKind::Invalid);
        assert_eq!(EngineError::StoreUnavailable("down".into()).kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn test_only_store_failures_are_retryable() {
        assert!(EngineError::StoreUnavailable("timeout".into()).is_retryable());
        assert!(!EngineError::PendingBookingExists(SubscriberId::new(1)).is_retryable());
        assert!(!EngineError::DuplicateName("bob".into()).is_retryable());
    }
}
