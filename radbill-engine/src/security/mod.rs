//! Security controls around subscriber data.
//!
//! # Credentials
//!
//! Passwords never reach the store in plaintext; the lifecycle engine runs them
//! through a [`CredentialHasher`] first:
//!
//! ```rust
//! use radbill_engine::security::{CredentialHasher, SaltedSha256};
//!
//! let hasher = SaltedSha256::new("site-salt");
//! let stored = hasher.hash("correct horse");
//! assert!(hasher.verify("correct horse", &stored));
//! ```
//!
//! # Audit Logging
//!
//! Lifecycle decisions are logged under the `audit` tracing target:
//!
//! ```rust
//! use radbill_engine::{
//!     audit,
//!     security::audit::AuditEventType,
//!     subscriptions::models::{OperatorId, SubscriberId},
//! };
//! use uuid::Uuid;
//!
//! audit!(
//!     AuditEventType::SubscriberDeleted,
//!     OperatorId::new(1),
//!     Uuid::new_v4(),
//!     with_subscriber(SubscriberId::new(42))
//! );
//! ```

pub mod audit;
pub mod credentials;

pub use audit::{AuditDetails, AuditEvent, AuditEventType, audit_log, redact_subscriber_name};
pub use credentials::{CredentialHasher, SaltedSha256};

/// Builds and logs an audit event in one expression.
///
/// Extra arguments are builder calls on [`AuditEvent`].
#[macro_export]
macro_rules! audit {
    ($event_type:expr, $operator_id:expr, $request_id:expr) => {
        $crate::security::audit::audit_log(
            &$crate::security::audit::AuditEvent::new($event_type, $operator_id, $request_id)
        )
    };
    ($event_type:expr, $operator_id:expr, $request_id:expr, $($method:ident($arg:expr)),+ $(,)?) => {
        $crate::security::audit::audit_log(
            &$crate::security::audit::AuditEvent::new($event_type, $operator_id, $request_id)
                $(.$method($arg))+
        )
    };
}
