//! Subscriptions: data model, plan application, order ledger, and the
//! lifecycle engine that ties them to a transactional store.

pub mod application;
pub mod ledger;
pub mod lifecycle;
pub mod models;

pub use application::{PlanApplication, PurchaseContext, apply};
pub use lifecycle::LifecycleEngine;
pub use models::{
    FAR_FUTURE, NewSubscriber, OperatorId, OrderRecord, OrderStatus, Plan, PlanId, PlanKind,
    Subscriber, SubscriberId, SubscriberStatus, SubscriberUpdate, VolumeReset,
};
