//! Subscription lifecycle engine.
//!
//! Every write operation runs inside one store transaction: the subscriber row
//! is locked first, business rules are checked, the subscriber and the order
//! ledger are written, and the transaction is committed. Any error returned
//! before the commit drops the transaction, so a rejected call never leaves a
//! trace in the store.
//!
//! # Renewal branches
//!
//! [`LifecycleEngine::renew_or_change_plan`] picks one of three outcomes:
//!
//! | current plan | target        | effect                                        | order  |
//! |--------------|---------------|-----------------------------------------------|--------|
//! | lapsed       | any           | target applied now as a continuation          | Using  |
//! | active       | same plan     | expiry extended from its prior value          | Using  |
//! | active       | another plan  | nothing; change deferred to the promoter      | Booked |

use std::sync::Arc;

use chrono::{NaiveDateTime, TimeDelta};
use rust_decimal::Decimal;
use tracing::{Span, field, info, instrument, warn};
use uuid::Uuid;

use super::{
    application::{PurchaseContext, add_months_clamped, apply},
    ledger,
    models::{
        FAR_FUTURE, NewOrder, NewSubscriber, OperatorId, OrderRecord, OrderStatus, Plan, PlanId,
        Quota, Subscriber, SubscriberId, SubscriberStatus, SubscriberUpdate,
    },
};
use crate::{
    audit,
    catalog::PlanCatalog,
    clock::{Clock, SystemClock},
    config::EngineConfig,
    error::{EngineError, Result},
    expiry::{ExpiryEvaluator, StandardExpiry},
    security::{
        audit::{AuditEvent, AuditEventType, audit_log},
        credentials::{CredentialHasher, SaltedSha256},
    },
    store::{Store, SubscriberPage, SubscriberQuery},
};

/// Longest accepted login name, in characters.
pub const MAX_NAME_LEN: usize = 64;

/// Orchestrates provisioning, renewal, plan changes, and subscriber updates.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use radbill_engine::{
///     catalog::InMemoryCatalog,
///     store::MemoryStore,
///     subscriptions::{
///         LifecycleEngine,
///         models::{NewSubscriber, OperatorId, Plan, PlanId, PlanKind, VolumeReset},
///     },
/// };
/// use rust_decimal::Decimal;
///
/// # async fn example() -> radbill_engine::error::Result<()> {
/// let plan = Plan {
///     id: PlanId::new(1),
///     name: "Prepaid 100h".into(),
///     kind: PlanKind::Duration,
///     enabled: true,
///     bind_mac: false,
///     bind_vlan: false,
///     concurrent_sessions: 1,
///     service_months: 0,
///     duration_secs: 360_000,
///     volume_kb: 0,
///     volume_reset: VolumeReset::Unlimited,
///     price: Decimal::new(5000, 2),
///     upstream_kbps: 0,
///     downstream_kbps: 0,
///     description: String::new(),
/// };
/// let engine = LifecycleEngine::new(
///     Arc::new(MemoryStore::new()),
///     Arc::new(InMemoryCatalog::new([plan])?),
/// );
///
/// let id = engine
///     .provision_subscription(
///         NewSubscriber { name: "alice".into(), password: "s3cret".into(), ..Default::default() },
///         PlanId::new(1),
///         OperatorId::new(7),
///     )
///     .await?;
/// assert_eq!(engine.subscriber(id).await?.quota.time_budget_secs, 360_000);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LifecycleEngine {
    store: Arc<dyn Store>,
    catalog: Arc<dyn PlanCatalog>,
    expiry: Arc<dyn ExpiryEvaluator>,
    hasher: Arc<dyn CredentialHasher>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for LifecycleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleEngine").finish_non_exhaustive()
    }
}

impl LifecycleEngine {
    /// Creates an engine with the standard lapse rules, the default password
    /// salt, and a UTC system clock.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, catalog: Arc<dyn PlanCatalog>) -> Self {
        Self {
            store,
            catalog,
            expiry: Arc::new(StandardExpiry),
            hasher: Arc::new(SaltedSha256::default()),
            clock: Arc::new(SystemClock::utc()),
        }
    }

    /// Creates an engine from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ConfigError`] if the configuration is invalid.
    pub fn from_config(config: &EngineConfig, store: Arc<dyn Store>) -> Result<Self> {
        config.validate()?;
        let catalog = config.catalog()?;
        Ok(Self::new(store, Arc::new(catalog))
            .with_clock(Arc::new(SystemClock::new(config.utc_offset()?)))
            .with_hasher(Arc::new(SaltedSha256::new(config.credentials.salt.clone()))))
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the lapse rules.
    #[must_use]
    pub fn with_expiry(mut self, expiry: Arc<dyn ExpiryEvaluator>) -> Self {
        self.expiry = expiry;
        self
    }

    /// Replaces the password hasher.
    #[must_use]
    pub fn with_hasher(mut self, hasher: Arc<dyn CredentialHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    // ========================================================================
    // Write operations
    // ========================================================================

    /// Creates an active subscriber on `plan_id` and records the purchase.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidInput`] for a malformed name or empty password
    /// - [`EngineError::DuplicateName`] if the login name is taken
    /// - [`EngineError::PlanNotFound`] / [`EngineError::PlanDisabled`] for an unusable plan
    /// - [`EngineError::StoreUnavailable`] on store failure
    #[instrument(
        skip_all,
        fields(name = %new_subscriber.name, plan_id = %plan_id, operator_id = %operator_id, request_id = field::Empty)
    )]
    pub async fn provision_subscription(
        &self,
        new_subscriber: NewSubscriber,
        plan_id: PlanId,
        operator_id: OperatorId,
    ) -> Result<SubscriberId> {
        let request_id = start_request();
        let name = new_subscriber.name.clone();

        let result = self.provision(new_subscriber, plan_id, operator_id, request_id).await;
        if let Err(ref err) = result {
            rejected(
                err,
                AuditEvent::new(AuditEventType::OperationRejected, operator_id, request_id)
                    .with_subscriber_name(&name)
                    .with_plan(plan_id),
            );
        }
        result
    }

    async fn provision(
        &self,
        new_subscriber: NewSubscriber,
        plan_id: PlanId,
        operator_id: OperatorId,
        request_id: Uuid,
    ) -> Result<SubscriberId> {
        validate_name(&new_subscriber.name)?;
        if new_subscriber.password.is_empty() {
            return Err(EngineError::InvalidInput("password must not be empty".into()));
        }

        let mut tx = self.store.begin().await?;
        if tx.name_in_use(&new_subscriber.name, None).await? {
            return Err(EngineError::DuplicateName(new_subscriber.name));
        }
        let plan = self.usable_plan(plan_id)?;
        let now = self.clock.now();

        let mut subscriber = Subscriber {
            id: SubscriberId::new(0),
            password_hash: self.hasher.hash(&new_subscriber.password),
            name: new_subscriber.name,
            real_name: new_subscriber.real_name,
            plan_id: plan.id,
            status: SubscriberStatus::Active,
            quota: Quota::default(),
            expire_at: new_subscriber.expire_at,
            paused_at: None,
            mac_addr: new_subscriber.mac_addr,
            vlan_id: new_subscriber.vlan_id,
            vlan_id2: new_subscriber.vlan_id2,
            framed_ip: new_subscriber.framed_ip,
            installed_addr: new_subscriber.installed_addr,
            description: new_subscriber.description,
            created_at: now,
            updated_at: None,
        };
        subscriber.assign(apply(subscriber.expire_at, &plan, PurchaseContext::FreshPurchase, now));

        let subscriber = tx.insert_subscriber(subscriber).await?;
        let order = ledger::record(
            tx.as_mut(),
            NewOrder {
                subscriber_id: subscriber.id,
                plan_id: plan.id,
                operator_id,
                price: plan.price,
                ordered_at: now,
                units: 1,
                status: OrderStatus::Using,
                end_date: subscriber.expire_at,
            },
        )
        .await?;
        tx.commit().await?;

        info!(subscriber_id = %subscriber.id, order_id = %order.id, "subscriber provisioned");
        audit!(
            AuditEventType::SubscriberProvisioned,
            operator_id,
            request_id,
            with_subscriber(subscriber.id),
            with_subscriber_name(&subscriber.name),
            with_plan(plan.id),
            with_order(order.id),
            with_expire_at(subscriber.expire_at),
        );
        Ok(subscriber.id)
    }

    /// Renews the current plan, switches a lapsed subscriber to a new plan, or
    /// books a deferred plan change.
    ///
    /// Exactly one order is appended on success.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidInput`] for a zero unit count or a deleted subscriber
    /// - [`EngineError::SubscriberNotFound`] if the subscriber does not exist
    /// - [`EngineError::PendingBookingExists`] if a booked change is already waiting
    /// - [`EngineError::PlanNotFound`] / [`EngineError::PlanDisabled`] for an unusable target
    /// - [`EngineError::StoreUnavailable`] on store failure
    #[instrument(
        skip_all,
        fields(subscriber_id = %subscriber_id, plan_id = %target_plan_id, units = units, operator_id = %operator_id, request_id = field::Empty)
    )]
    pub async fn renew_or_change_plan(
        &self,
        subscriber_id: SubscriberId,
        target_plan_id: PlanId,
        units: u32,
        operator_id: OperatorId,
    ) -> Result<OrderRecord> {
        let request_id = start_request();

        let result = self.renew(subscriber_id, target_plan_id, units, operator_id, request_id).await;
        if let Err(ref err) = result {
            rejected(
                err,
                AuditEvent::new(AuditEventType::OperationRejected, operator_id, request_id)
                    .with_subscriber(subscriber_id)
                    .with_plan(target_plan_id),
            );
        }
        result
    }

    async fn renew(
        &self,
        subscriber_id: SubscriberId,
        target_plan_id: PlanId,
        units: u32,
        operator_id: OperatorId,
        request_id: Uuid,
    ) -> Result<OrderRecord> {
        if units == 0 {
            return Err(EngineError::InvalidInput("unit count must be at least 1".into()));
        }

        let mut tx = self.store.begin().await?;
        let mut subscriber = tx
            .lock_subscriber(subscriber_id)
            .await?
            .ok_or(EngineError::SubscriberNotFound(subscriber_id))?;
        ensure_not_deleted(&subscriber)?;
        ledger::ensure_no_pending_booking(tx.as_mut(), subscriber_id).await?;

        let target = self.usable_plan(target_plan_id)?;
        let now = self.clock.now();
        let lapsed = self.has_lapsed(&subscriber, now);

        let (status, end_date, event_type) = if lapsed {
            subscriber.assign(apply(
                subscriber.expire_at,
                &target,
                PurchaseContext::Continuation { units },
                now,
            ));
            subscriber.updated_at = Some(now);
            tx.update_subscriber(&subscriber).await?;
            (OrderStatus::Using, subscriber.expire_at, AuditEventType::PlanApplied)
        } else if target.id == subscriber.plan_id {
            let base = subscriber.expire_at.unwrap_or(now);
            let months = target.service_months.saturating_mul(units);
            subscriber.expire_at = Some(add_months_clamped(base, months));
            subscriber.updated_at = Some(now);
            tx.update_subscriber(&subscriber).await?;
            (OrderStatus::Using, subscriber.expire_at, AuditEventType::PlanRenewed)
        } else {
            (OrderStatus::Booked, Some(FAR_FUTURE), AuditEventType::PlanChangeBooked)
        };

        let order = ledger::record(
            tx.as_mut(),
            NewOrder {
                subscriber_id,
                plan_id: target.id,
                operator_id,
                price: target.price * Decimal::from(units),
                ordered_at: now,
                units,
                status,
                end_date,
            },
        )
        .await?;
        tx.commit().await?;

        info!(order_id = %order.id, status = ?order.status, lapsed, "plan order recorded");
        audit!(
            event_type,
            operator_id,
            request_id,
            with_subscriber(subscriber_id),
            with_plan(target.id),
            with_order(order.id),
            with_expire_at(order.end_date),
        );
        Ok(order)
    }

    /// Overwrites a subscriber's editable fields.
    ///
    /// Resuming a paused subscriber pushes the expiry back by the whole days
    /// spent paused. Pausing stamps the pause time when none is given, and
    /// edits while paused keep the stored stamp. An empty password keeps the
    /// current hash.
    ///
    /// # Errors
    ///
    /// - [`EngineError::SubscriberNotFound`] if the subscriber does not exist
    /// - [`EngineError::InvalidInput`] for a malformed name, a deleted subscriber,
    ///   or a request to set the deleted status
    /// - [`EngineError::DuplicateName`] if another subscriber has the name
    /// - [`EngineError::StoreUnavailable`] on store failure
    #[instrument(
        skip_all,
        fields(subscriber_id = %subscriber_id, status = ?update.status, operator_id = %operator_id, request_id = field::Empty)
    )]
    pub async fn update_subscriber(
        &self,
        subscriber_id: SubscriberId,
        update: SubscriberUpdate,
        operator_id: OperatorId,
    ) -> Result<()> {
        let request_id = start_request();

        let result = self.update(subscriber_id, update, operator_id, request_id).await;
        if let Err(ref err) = result {
            rejected(
                err,
                AuditEvent::new(AuditEventType::OperationRejected, operator_id, request_id)
                    .with_subscriber(subscriber_id),
            );
        }
        result
    }

    async fn update(
        &self,
        subscriber_id: SubscriberId,
        update: SubscriberUpdate,
        operator_id: OperatorId,
        request_id: Uuid,
    ) -> Result<()> {
        validate_name(&update.name)?;
        if update.status == SubscriberStatus::Deleted {
            return Err(EngineError::InvalidInput(
                "subscribers are deleted through delete_subscriber".into(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let mut subscriber = tx
            .lock_subscriber(subscriber_id)
            .await?
            .ok_or(EngineError::SubscriberNotFound(subscriber_id))?;
        ensure_not_deleted(&subscriber)?;
        if tx.name_in_use(&update.name, Some(subscriber_id)).await? {
            return Err(EngineError::DuplicateName(update.name));
        }

        let now = self.clock.now();
        let mut expire_at = update.expire_at;
        let mut paused_at = update.paused_at;
        let event_type = match (subscriber.status, update.status) {
            (SubscriberStatus::Paused, SubscriberStatus::Active) => {
                let credit = subscriber
                    .paused_at
                    .or(update.paused_at)
                    .map_or(0, |since| paused_days(since, now));
                expire_at = expire_at.map(|expiry| extend_days(expiry, credit));
                paused_at = None;
                info!(credit_days = credit, "resuming paused subscriber");
                AuditEventType::SubscriberResumed
            }
            (SubscriberStatus::Active, SubscriberStatus::Paused) => {
                paused_at = paused_at.or(Some(now));
                AuditEventType::SubscriberPaused
            }
            (SubscriberStatus::Paused, SubscriberStatus::Paused) => {
                paused_at = paused_at.or(subscriber.paused_at);
                AuditEventType::SubscriberUpdated
            }
            _ => AuditEventType::SubscriberUpdated,
        };

        if !update.password.is_empty() {
            subscriber.password_hash = self.hasher.hash(&update.password);
        }
        subscriber.name = update.name;
        subscriber.real_name = update.real_name;
        subscriber.status = update.status;
        subscriber.expire_at = expire_at;
        subscriber.paused_at = paused_at;
        subscriber.mac_addr = update.mac_addr;
        subscriber.vlan_id = update.vlan_id;
        subscriber.vlan_id2 = update.vlan_id2;
        subscriber.framed_ip = update.framed_ip;
        subscriber.installed_addr = update.installed_addr;
        subscriber.description = update.description;
        subscriber.updated_at = Some(now);

        tx.update_subscriber(&subscriber).await?;
        tx.commit().await?;

        info!(status = ?subscriber.status, "subscriber updated");
        audit!(
            event_type,
            operator_id,
            request_id,
            with_subscriber(subscriber_id),
            with_subscriber_name(&subscriber.name),
            with_expire_at(subscriber.expire_at),
        );
        Ok(())
    }

    /// Soft-deletes a subscriber. Deleting twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SubscriberNotFound`] if the subscriber does not
    /// exist, or [`EngineError::StoreUnavailable`] on store failure.
    #[instrument(
        skip_all,
        fields(subscriber_id = %subscriber_id, operator_id = %operator_id, request_id = field::Empty)
    )]
    pub async fn delete_subscriber(
        &self,
        subscriber_id: SubscriberId,
        operator_id: OperatorId,
    ) -> Result<()> {
        let request_id = start_request();

        let result = self.delete(subscriber_id, operator_id, request_id).await;
        if let Err(ref err) = result {
            rejected(
                err,
                AuditEvent::new(AuditEventType::OperationRejected, operator_id, request_id)
                    .with_subscriber(subscriber_id),
            );
        }
        result
    }

    async fn delete(
        &self,
        subscriber_id: SubscriberId,
        operator_id: OperatorId,
        request_id: Uuid,
    ) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let mut subscriber = tx
            .lock_subscriber(subscriber_id)
            .await?
            .ok_or(EngineError::SubscriberNotFound(subscriber_id))?;
        if subscriber.is_deleted() {
            return Ok(());
        }

        subscriber.status = SubscriberStatus::Deleted;
        subscriber.updated_at = Some(self.clock.now());
        tx.update_subscriber(&subscriber).await?;
        tx.commit().await?;

        info!("subscriber deleted");
        audit!(AuditEventType::SubscriberDeleted, operator_id, request_id, with_subscriber(subscriber_id));
        Ok(())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Fetches a subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SubscriberNotFound`] if it does not exist.
    pub async fn subscriber(&self, subscriber_id: SubscriberId) -> Result<Subscriber> {
        let mut tx = self.store.begin().await?;
        tx.subscriber(subscriber_id).await?.ok_or(EngineError::SubscriberNotFound(subscriber_id))
    }

    /// Every order of a subscriber, booked first, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SubscriberNotFound`] if the subscriber does not exist.
    pub async fn order_history(&self, subscriber_id: SubscriberId) -> Result<Vec<OrderRecord>> {
        let mut tx = self.store.begin().await?;
        if tx.subscriber(subscriber_id).await?.is_none() {
            return Err(EngineError::SubscriberNotFound(subscriber_id));
        }
        ledger::history(tx.as_mut(), subscriber_id).await
    }

    /// Evaluates a listing query.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] for out-of-range paging.
    #[instrument(skip_all, fields(predicates = query.predicates.len(), page = query.page))]
    pub async fn list_subscribers(&self, query: &SubscriberQuery) -> Result<SubscriberPage> {
        query.validate()?;
        let mut tx = self.store.begin().await?;
        tx.find_subscribers(query).await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn usable_plan(&self, plan_id: PlanId) -> Result<Plan> {
        let plan = self.catalog.plan(plan_id).ok_or(EngineError::PlanNotFound(plan_id))?;
        if !plan.enabled {
            return Err(EngineError::PlanDisabled(plan_id));
        }
        Ok(plan)
    }

    /// A subscriber whose current plan vanished from the catalog counts as lapsed.
    fn has_lapsed(&self, subscriber: &Subscriber, now: NaiveDateTime) -> bool {
        self.catalog
            .plan(subscriber.plan_id)
            .is_none_or(|current| self.expiry.has_expired(subscriber, &current, now))
    }
}

fn start_request() -> Uuid {
    let request_id = Uuid::new_v4();
    Span::current().record("request_id", field::display(request_id));
    request_id
}

fn rejected(err: &EngineError, event: AuditEvent) {
    warn!(error = %err, kind = ?err.kind(), "operation rejected");
    audit_log(&event.with_error(err.to_string()));
}

/// Checks a login name.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] if the name is empty, longer than
/// [`MAX_NAME_LEN`] characters, or contains whitespace or control characters.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(EngineError::InvalidInput("name must not be empty".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(EngineError::InvalidInput(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(EngineError::InvalidInput(
            "name must not contain whitespace or control characters".into(),
        ));
    }
    Ok(())
}

fn ensure_not_deleted(subscriber: &Subscriber) -> Result<()> {
    if subscriber.is_deleted() {
        return Err(EngineError::InvalidInput(format!("subscriber {} is deleted", subscriber.id)));
    }
    Ok(())
}

/// Whole days between `since` and `now`; partial days are dropped.
fn paused_days(since: NaiveDateTime, now: NaiveDateTime) -> i64 {
    (now - since).num_days().max(0)
}

fn extend_days(expiry: NaiveDateTime, days: i64) -> NaiveDateTime {
    TimeDelta::try_days(days)
        .and_then(|delta| expiry.checked_add_signed(delta))
        .unwrap_or(NaiveDateTime::MAX)
}
