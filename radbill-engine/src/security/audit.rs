//! Audit logging for subscription lifecycle decisions.
//!
//! Every committed provisioning, renewal, booking, update, and deletion emits
//! one event, and so does every rejection. Events carry the authorizing
//! operator and a correlation id shared with the operation's tracing span.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::subscriptions::models::{OperatorId, OrderId, PlanId, SubscriberId};

/// Types of auditable events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// New subscriber provisioned on a plan.
    SubscriberProvisioned,
    /// Lapsed subscriber switched to a plan immediately.
    PlanApplied,
    /// Same plan renewed in place.
    PlanRenewed,
    /// Plan change booked for promotion after the current plan lapses.
    PlanChangeBooked,
    /// Subscriber fields overwritten.
    SubscriberUpdated,
    /// Subscriber paused.
    SubscriberPaused,
    /// Paused subscriber resumed with expiry compensation.
    SubscriberResumed,
    /// Subscriber soft-deleted.
    SubscriberDeleted,
    /// Operation rejected; nothing was written.
    OperationRejected,
}

/// Contextual fields of an audit event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditDetails {
    /// Affected subscriber.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriber_id: Option<SubscriberId>,
    /// Subscriber login name, partially redacted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriber_name: Option<String>,
    /// Plan involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<PlanId>,
    /// Order appended by the operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    /// Expiration after the operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<NaiveDateTime>,
    /// Rejection reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Audit log entry.
///
/// # Examples
///
/// ```
/// use radbill_engine::{
///     security::audit::{AuditEvent, AuditEventType, audit_log},
///     subscriptions::models::{OperatorId, PlanId, SubscriberId},
/// };
/// use uuid::Uuid;
///
/// let event = AuditEvent::new(AuditEventType::PlanRenewed, OperatorId::new(2), Uuid::new_v4())
///     .with_subscriber(SubscriberId::new(17))
///     .with_plan(PlanId::new(3));
///
/// audit_log(&event);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// What happened.
    pub event_type: AuditEventType,
    /// Who authorized it.
    pub operator_id: OperatorId,
    /// Correlation id of the operation.
    pub request_id: Uuid,
    /// Contextual information.
    pub details: AuditDetails,
}

impl AuditEvent {
    /// Creates a new audit event with empty details.
    #[must_use]
    pub fn new(event_type: AuditEventType, operator_id: OperatorId, request_id: Uuid) -> Self {
        Self { event_type, operator_id, request_id, details: AuditDetails::default() }
    }

    /// Adds the affected subscriber.
    #[must_use]
    pub const fn with_subscriber(mut self, id: SubscriberId) -> Self {
        self.details.subscriber_id = Some(id);
        self
    }

    /// Adds the subscriber's login name, redacted with [`redact_subscriber_name`].
    #[must_use]
    pub fn with_subscriber_name(mut self, name: &str) -> Self {
        self.details.subscriber_name = Some(redact_subscriber_name(name));
        self
    }

    /// Adds the plan involved.
    #[must_use]
    pub const fn with_plan(mut self, id: PlanId) -> Self {
        self.details.plan_id = Some(id);
        self
    }

    /// Adds the appended order.
    #[must_use]
    pub const fn with_order(mut self, id: OrderId) -> Self {
        self.details.order_id = Some(id);
        self
    }

    /// Adds the resulting expiration.
    #[must_use]
    pub const fn with_expire_at(mut self, expire_at: Option<NaiveDateTime>) -> Self {
        self.details.expire_at = expire_at;
        self
    }

    /// Adds a rejection reason.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.details.error = Some(error.into());
        self
    }
}

/// Logs an audit event to tracing with target "audit".
pub fn audit_log(event: &AuditEvent) {
    tracing::info!(
        target: "audit",
        event_type = ?event.event_type,
        operator_id = %event.operator_id,
        request_id = %event.request_id,
        details = ?event.details,
        "AUDIT"
    );
}

/// Redacts a login name to its last four characters.
///
/// # Examples
///
/// ```
/// use radbill_engine::security::audit::redact_subscriber_name;
///
/// assert_eq!(redact_subscriber_name("zhang.wei.2031"), "**********2031");
/// assert_eq!(redact_subscriber_name("abc"), "abc");
/// ```
#[must_use]
pub fn redact_subscriber_name(name: &str) -> String {
    let len = name.chars().count();
    if len <= 4 {
        return name.to_owned();
    }
    let visible: String = name.chars().skip(len - 4).collect();
    format!("{}{visible}", "*".repeat(len - 4))
}
