//! Plan application: recomputes quota and expiration when a plan is assigned.
//!
//! Everything here is pure. "Now" is passed in, so results are reproducible.

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::models::{END_OF_DAY, FAR_FUTURE, Plan, PlanId, PlanKind, Quota, Subscriber, VolumeReset};

/// Months in the fixed usage period of [`VolumeReset::FixedPeriodEnd`] plans.
const FIXED_PERIOD_MONTHS: u32 = 12;

/// Why a plan is being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PurchaseContext {
    /// First assignment of a plan to a new subscriber.
    FreshPurchase,
    /// Renewal or replacement on an existing subscriber.
    Continuation {
        /// Billing units purchased.
        units: u32,
    },
}

impl PurchaseContext {
    /// Whether this purchase continues an existing subscription.
    #[must_use]
    pub const fn is_continuation(self) -> bool {
        matches!(self, Self::Continuation { .. })
    }

    /// Billing units purchased (one for a fresh purchase).
    #[must_use]
    pub const fn units(self) -> u32 {
        match self {
            Self::FreshPurchase => 1,
            Self::Continuation { units } => units,
        }
    }
}

/// Subscriber state produced by applying a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanApplication {
    /// Plan that was applied.
    pub plan_id: PlanId,
    /// Quota copied from the plan.
    pub quota: Quota,
    /// New expiration.
    pub expire_at: Option<NaiveDateTime>,
}

/// Computes the quota and expiration that result from assigning `plan`.
///
/// # Arguments
///
/// * `current_expiry` - The subscriber's expiration before the purchase
/// * `plan` - The plan being assigned
/// * `context` - Fresh purchase or continuation (with unit count)
/// * `now` - Local wall-clock time of the purchase
///
/// # Rules
///
/// - **Monthly**: on continuation, `service_months * units` months from `now`,
///   clamped to the last valid day of the target month, at 23:59:59. A fresh
///   purchase keeps the current expiration.
/// - **Duration**: far-future sentinel when unset or on continuation.
/// - **Volume**: by reset policy. Unlimited gives the sentinel, Daily the end of
///   today, Monthly the end of this month, `FixedPeriodEnd` one year from now
///   at day end (only when unset or on continuation).
///
/// Quota fields are always overwritten from the plan.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use radbill_engine::subscriptions::{
///     application::{PurchaseContext, apply},
///     models::{Plan, PlanId, PlanKind, VolumeReset},
/// };
/// use rust_decimal::Decimal;
///
/// let plan = Plan {
///     id: PlanId::new(1),
///     name: "Home 1M".into(),
///     kind: PlanKind::Monthly,
///     enabled: true,
///     bind_mac: false,
///     bind_vlan: false,
///     concurrent_sessions: 1,
///     service_months: 1,
///     duration_secs: 0,
///     volume_kb: 0,
///     volume_reset: VolumeReset::Unlimited,
///     price: Decimal::new(3000, 2),
///     upstream_kbps: 0,
///     downstream_kbps: 0,
///     description: String::new(),
/// };
/// let now = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap().and_hms_opt(23, 59, 59).unwrap();
///
/// let result = apply(None, &plan, PurchaseContext::Continuation { units: 1 }, now);
/// assert_eq!(result.expire_at.unwrap().to_string(), "2024-02-29 23:59:59");
/// ```
#[must_use]
pub fn apply(
    current_expiry: Option<NaiveDateTime>,
    plan: &Plan,
    context: PurchaseContext,
    now: NaiveDateTime,
) -> PlanApplication {
    let unset_or_continuation = current_expiry.is_none() || context.is_continuation();

    let expire_at = match plan.kind {
        PlanKind::Monthly => match context {
            PurchaseContext::Continuation { units } => {
                let months = plan.service_months.saturating_mul(units);
                Some(add_months_clamped(now, months).date().and_time(END_OF_DAY))
            }
            PurchaseContext::FreshPurchase => current_expiry,
        },
        PlanKind::Duration if unset_or_continuation => Some(FAR_FUTURE),
        PlanKind::Duration => current_expiry,
        PlanKind::Volume => match plan.volume_reset {
            VolumeReset::Unlimited => Some(FAR_FUTURE),
            VolumeReset::Daily => Some(end_of_day(now.date())),
            VolumeReset::Monthly => Some(end_of_month(now.date())),
            VolumeReset::FixedPeriodEnd if unset_or_continuation => {
                Some(add_months_clamped(now, FIXED_PERIOD_MONTHS).date().and_time(END_OF_DAY))
            }
            VolumeReset::FixedPeriodEnd => current_expiry,
        },
    };

    PlanApplication { plan_id: plan.id, quota: Quota::from(plan), expire_at }
}

impl Subscriber {
    /// Writes a [`PlanApplication`] onto this subscriber.
    pub fn assign(&mut self, application: PlanApplication) {
        self.plan_id = application.plan_id;
        self.quota = application.quota;
        self.expire_at = application.expire_at;
    }
}

/// Adds calendar months, clamping the day to the target month's length.
///
/// Saturates at [`NaiveDateTime::MAX`] instead of overflowing.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use radbill_engine::subscriptions::application::add_months_clamped;
///
/// let jan_31 = NaiveDate::from_ymd_opt(2023, 1, 31).unwrap().and_hms_opt(8, 0, 0).unwrap();
/// assert_eq!(add_months_clamped(jan_31, 1).to_string(), "2023-02-28 08:00:00");
/// ```
#[must_use]
pub fn add_months_clamped(from: NaiveDateTime, months: u32) -> NaiveDateTime {
    from.checked_add_months(Months::new(months)).unwrap_or(NaiveDateTime::MAX)
}

/// 23:59:59 on `date`.
#[must_use]
pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(END_OF_DAY)
}

/// 23:59:59 on the last day of `date`'s month.
#[must_use]
pub fn end_of_month(date: NaiveDate) -> NaiveDateTime {
    let last_day = date
        .with_day(1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next_first| next_first.pred_opt())
        .unwrap_or(date);
    end_of_day(last_day)
}
