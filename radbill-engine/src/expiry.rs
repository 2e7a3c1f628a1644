//! Lapse detection for a subscriber's current plan.
//!
//! The accounting side decrements time and volume budgets as sessions are
//! billed; this module only decides whether what is left still grants access.

use chrono::NaiveDateTime;

use crate::subscriptions::models::{Plan, PlanKind, Subscriber};

/// Decides whether a subscriber's current plan has run out.
pub trait ExpiryEvaluator: Send + Sync {
    /// Returns `true` when `subscriber` can no longer use `plan` at `now`.
    fn has_expired(&self, subscriber: &Subscriber, plan: &Plan, now: NaiveDateTime) -> bool;
}

/// Default lapse rules.
///
/// A plan has lapsed when any of these hold:
///
/// - the expiration is set and not after `now`
/// - a monthly plan has no expiration at all
/// - a duration plan's time budget is used up
/// - a volume plan's volume budget is used up
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardExpiry;

impl ExpiryEvaluator for StandardExpiry {
    fn has_expired(&self, subscriber: &Subscriber, plan: &Plan, now: NaiveDateTime) -> bool {
        if subscriber.expire_at.is_some_and(|expire| expire <= now) {
            return true;
        }
        match plan.kind {
            PlanKind::Monthly => subscriber.expire_at.is_none(),
            PlanKind::Duration => subscriber.quota.time_budget_secs == 0,
            PlanKind::Volume => subscriber.quota.volume_budget_kb == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeDelta};
    use rust_decimal::Decimal;

    use super::*;
    use crate::subscriptions::models::{
        FAR_FUTURE, PlanId, Quota, SubscriberId, SubscriberStatus, VolumeReset,
    };

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    fn plan(kind: PlanKind) -> Plan {
        Plan {
            id: PlanId::new(1),
            name: "p".into(),
            kind,
            enabled: true,
            bind_mac: false,
            bind_vlan: false,
            concurrent_sessions: 1,
            service_months: 1,
            duration_secs: 3600,
            volume_kb: 1024,
            volume_reset: VolumeReset::Unlimited,
            price: Decimal::ONE,
            upstream_kbps: 0,
            downstream_kbps: 0,
            description: String::new(),
        }
    }

    fn subscriber(expire_at: Option<NaiveDateTime>, quota: Quota) -> Subscriber {
        Subscriber {
            id: SubscriberId::new(1),
            name: "bob".into(),
            real_name: String::new(),
            password_hash: String::new(),
            plan_id: PlanId::new(1),
            status: SubscriberStatus::Active,
            quota,
            expire_at,
            paused_at: None,
            mac_addr: None,
            vlan_id: None,
            vlan_id2: None,
            framed_ip: None,
            installed_addr: String::new(),
            description: String::new(),
            created_at: now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_monthly_past_expiry_lapsed() {
        let sub = subscriber(Some(now() - TimeDelta::seconds(1)), Quota::default());
        assert!(StandardExpiry.has_expired(&sub, &plan(PlanKind::Monthly), now()));
    }

    #[test]
    fn test_monthly_expiry_exactly_now_lapsed() {
        let sub = subscriber(Some(now()), Quota::default());
        assert!(StandardExpiry.has_expired(&sub, &plan(PlanKind::Monthly), now()));
    }

    #[test]
    fn test_monthly_future_expiry_active() {
        let sub = subscriber(Some(now() + TimeDelta::days(3)), Quota::default());
        assert!(!StandardExpiry.has_expired(&sub, &plan(PlanKind::Monthly), now()));
    }

    #[test]
    fn test_monthly_without_expiry_lapsed() {
        let sub = subscriber(None, Quota::default());
        assert!(StandardExpiry.has_expired(&sub, &plan(PlanKind::Monthly), now()));
    }

    #[test]
    fn test_duration_budget_exhausted() {
        let sub = subscriber(Some(FAR_FUTURE), Quota { time_budget_secs: 0, ..Quota::default() });
        assert!(StandardExpiry.has_expired(&sub, &plan(PlanKind::Duration), now()));

        let sub = subscriber(Some(FAR_FUTURE), Quota { time_budget_secs: 60, ..Quota::default() });
        assert!(!StandardExpiry.has_expired(&sub, &plan(PlanKind::Duration), now()));
    }

    #[test]
    fn test_volume_budget_exhausted() {
        let sub = subscriber(Some(FAR_FUTURE), Quota { volume_budget_kb: 0, ..Quota::default() });
        assert!(StandardExpiry.has_expired(&sub, &plan(PlanKind::Volume), now()));

        let sub = subscriber(Some(FAR_FUTURE), Quota { volume_budget_kb: 10, ..Quota::default() });
        assert!(!StandardExpiry.has_expired(&sub, &plan(PlanKind::Volume), now()));
    }
}
