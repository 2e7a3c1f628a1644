//! Subscriber, plan, and order data models.
//!
//! Quota fields on [`Subscriber`] mirror the plan that was last applied and are
//! only written by the lifecycle engine.

use std::{fmt, net::Ipv4Addr};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Last second of a calendar day.
pub const END_OF_DAY: NaiveTime = match NaiveTime::from_hms_opt(23, 59, 59) {
    Some(time) => time,
    None => panic!("23:59:59 is a valid time"),
};

/// Expiration used when a plan has no wall-clock expiry.
///
/// Also the end date of a booked order waiting for promotion.
pub const FAR_FUTURE: NaiveDateTime = match NaiveDate::from_ymd_opt(2099, 12, 31) {
    Some(date) => NaiveDateTime::new(date, END_OF_DAY),
    None => panic!("2099-12-31 is a valid date"),
};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw store identifier.
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the raw identifier.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Store-assigned subscriber identifier.
    SubscriberId
);
numeric_id!(
    /// Plan catalog identifier.
    PlanId
);
numeric_id!(
    /// Order ledger identifier.
    OrderId
);
numeric_id!(
    /// Back-office operator who authorized an operation.
    OperatorId
);

// ============================================================================
// Plans
// ============================================================================

/// How a plan limits access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    /// Calendar-month service; expiry is a wall-clock date.
    Monthly,
    /// Prepaid online time; exhaustion is governed by the time budget.
    Duration,
    /// Prepaid data volume; expiry follows the volume-reset policy.
    Volume,
}

/// When a volume plan's usage window closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeReset {
    /// Never resets; no wall-clock expiry.
    #[default]
    Unlimited,
    /// Window closes at the end of the current day.
    Daily,
    /// Window closes at the end of the current month.
    Monthly,
    /// Window runs one year from purchase.
    FixedPeriodEnd,
}

/// Purchasable bundle of access allowances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Catalog identifier.
    pub id: PlanId,
    /// Display name.
    pub name: String,
    /// Plan type.
    pub kind: PlanKind,
    /// Whether the plan can be purchased.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Whether sessions must come from the registered MAC address.
    #[serde(default)]
    pub bind_mac: bool,
    /// Whether sessions must come from the registered VLAN.
    #[serde(default)]
    pub bind_vlan: bool,
    /// Maximum simultaneous sessions.
    #[serde(default = "default_sessions")]
    pub concurrent_sessions: u32,
    /// Months of service per purchased unit.
    #[serde(default)]
    pub service_months: u32,
    /// Online-time allowance in seconds.
    #[serde(default)]
    pub duration_secs: u64,
    /// Data-volume allowance in kilobytes.
    #[serde(default)]
    pub volume_kb: u64,
    /// Volume-reset policy (meaningful for [`PlanKind::Volume`]).
    #[serde(default)]
    pub volume_reset: VolumeReset,
    /// Price of one billing unit.
    pub price: Decimal,
    /// Upstream rate limit in kbit/s (0 = unlimited).
    #[serde(default)]
    pub upstream_kbps: u32,
    /// Downstream rate limit in kbit/s (0 = unlimited).
    #[serde(default)]
    pub downstream_kbps: u32,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
}

const fn default_enabled() -> bool {
    true
}

const fn default_sessions() -> u32 {
    1
}

/// Quota fields copied from a plan onto a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Quota {
    /// MAC binding required.
    pub bind_mac: bool,
    /// VLAN binding required.
    pub bind_vlan: bool,
    /// Session limit.
    pub concurrent_sessions: u32,
    /// Remaining online time in seconds.
    pub time_budget_secs: u64,
    /// Remaining data volume in kilobytes.
    pub volume_budget_kb: u64,
}

impl From<&Plan> for Quota {
    fn from(plan: &Plan) -> Self {
        Self {
            bind_mac: plan.bind_mac,
            bind_vlan: plan.bind_vlan,
            concurrent_sessions: plan.concurrent_sessions,
            time_budget_secs: plan.duration_secs,
            volume_budget_kb: plan.volume_kb,
        }
    }
}

// ============================================================================
// Subscribers
// ============================================================================

/// Subscriber lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberStatus {
    /// Allowed to authenticate.
    Active,
    /// Service suspended; expiry is extended on resume.
    Paused,
    /// Soft-deleted.
    Deleted,
}

/// End-user account bound to a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    /// Store identifier.
    pub id: SubscriberId,
    /// Unique login name.
    pub name: String,
    /// Legal name.
    pub real_name: String,
    /// One-way hash of the password. Never serialized.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Plan the quota was last applied from.
    pub plan_id: PlanId,
    /// Lifecycle status.
    pub status: SubscriberStatus,
    /// Quota in effect.
    pub quota: Quota,
    /// Expiration; `None` when never set.
    pub expire_at: Option<NaiveDateTime>,
    /// When the subscriber was paused.
    pub paused_at: Option<NaiveDateTime>,
    /// Registered MAC address.
    pub mac_addr: Option<String>,
    /// Outer VLAN id.
    pub vlan_id: Option<u16>,
    /// Inner VLAN id.
    pub vlan_id2: Option<u16>,
    /// Static address handed out in `Framed-IP-Address`.
    pub framed_ip: Option<Ipv4Addr>,
    /// Installation address.
    pub installed_addr: String,
    /// Free-form notes.
    pub description: String,
    /// Creation time.
    pub created_at: NaiveDateTime,
    /// Last modification time.
    pub updated_at: Option<NaiveDateTime>,
}

impl Subscriber {
    /// Whether the subscriber has been soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.status == SubscriberStatus::Deleted
    }
}

/// Caller-supplied fields for provisioning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSubscriber {
    /// Unique login name.
    pub name: String,
    /// Legal name.
    #[serde(default)]
    pub real_name: String,
    /// Plaintext password; hashed before storage.
    #[serde(default)]
    pub password: String,
    /// Initial expiration (used by monthly plans on first assignment).
    #[serde(default)]
    pub expire_at: Option<NaiveDateTime>,
    /// Registered MAC address.
    #[serde(default)]
    pub mac_addr: Option<String>,
    /// Outer VLAN id.
    #[serde(default)]
    pub vlan_id: Option<u16>,
    /// Inner VLAN id.
    #[serde(default)]
    pub vlan_id2: Option<u16>,
    /// Static framed address.
    #[serde(default)]
    pub framed_ip: Option<Ipv4Addr>,
    /// Installation address.
    #[serde(default)]
    pub installed_addr: String,
    /// Free-form notes.
    #[serde(default)]
    pub description: String,
}

/// Replacement values for an existing subscriber.
///
/// Quota fields and plan are absent on purpose: only plan application writes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberUpdate {
    /// Unique login name.
    pub name: String,
    /// Legal name.
    #[serde(default)]
    pub real_name: String,
    /// New plaintext password; empty keeps the current one.
    #[serde(default)]
    pub password: String,
    /// Requested status.
    pub status: SubscriberStatus,
    /// Expiration.
    #[serde(default)]
    pub expire_at: Option<NaiveDateTime>,
    /// Pause timestamp; stamped by the engine when pausing without one.
    #[serde(default)]
    pub paused_at: Option<NaiveDateTime>,
    /// Registered MAC address.
    #[serde(default)]
    pub mac_addr: Option<String>,
    /// Outer VLAN id.
    #[serde(default)]
    pub vlan_id: Option<u16>,
    /// Inner VLAN id.
    #[serde(default)]
    pub vlan_id2: Option<u16>,
    /// Static framed address.
    #[serde(default)]
    pub framed_ip: Option<Ipv4Addr>,
    /// Installation address.
    #[serde(default)]
    pub installed_addr: String,
    /// Free-form notes.
    #[serde(default)]
    pub description: String,
}

impl SubscriberUpdate {
    /// Starts an update pre-filled with the subscriber's current values.
    #[must_use]
    pub fn from_current(subscriber: &Subscriber) -> Self {
        Self {
            name: subscriber.name.clone(),
            real_name: subscriber.real_name.clone(),
            password: String::new(),
            status: subscriber.status,
            expire_at: subscriber.expire_at,
            paused_at: subscriber.paused_at,
            mac_addr: subscriber.mac_addr.clone(),
            vlan_id: subscriber.vlan_id,
            vlan_id2: subscriber.vlan_id2,
            framed_ip: subscriber.framed_ip,
            installed_addr: subscriber.installed_addr.clone(),
            description: subscriber.description.clone(),
        }
    }
}

// ============================================================================
// Orders
// ============================================================================

/// Order record state.
///
/// `Booked -> Using` is the only transition, performed by the external
/// promotion process. `Using` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Plan change deferred until the current plan lapses.
    Booked,
    /// Fulfilled order.
    Using,
}

/// One purchase or renewal decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Ledger identifier.
    pub id: OrderId,
    /// Purchasing subscriber.
    pub subscriber_id: SubscriberId,
    /// Purchased plan.
    pub plan_id: PlanId,
    /// Operator who authorized the order.
    pub operator_id: OperatorId,
    /// Amount charged.
    pub price: Decimal,
    /// When the order was placed.
    pub ordered_at: NaiveDateTime,
    /// Billing units purchased.
    pub units: u32,
    /// Order state.
    pub status: OrderStatus,
    /// Resulting expiration, or [`FAR_FUTURE`] for bookings.
    pub end_date: Option<NaiveDateTime>,
}

/// Order fields before the ledger assigns an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    /// Purchasing subscriber.
    pub subscriber_id: SubscriberId,
    /// Purchased plan.
    pub plan_id: PlanId,
    /// Authorizing operator.
    pub operator_id: OperatorId,
    /// Amount charged.
    pub price: Decimal,
    /// When the order was placed.
    pub ordered_at: NaiveDateTime,
    /// Billing units purchased.
    pub units: u32,
    /// Order state.
    pub status: OrderStatus,
    /// Resulting expiration.
    pub end_date: Option<NaiveDateTime>,
}

impl NewOrder {
    /// Attaches the ledger identifier.
    #[must_use]
    pub fn into_record(self, id: OrderId) -> OrderRecord {
        OrderRecord {
            id,
            subscriber_id: self.subscriber_id,
            plan_id: self.plan_id,
            operator_id: self.operator_id,
            price: self.price,
            ordered_at: self.ordered_at,
            units: self.units,
            status: self.status,
            end_date: self.end_date,
        }
    }
}
