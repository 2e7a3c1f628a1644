//! Radbill Engine: subscription lifecycle and billing core
//!
//! The back office of a network-access billing platform provisions subscriber
//! accounts, attaches them to service plans, and renews or replaces those plans
//! over time. This crate is the part of it where money and access meet: it
//! decides how a subscriber's quota and expiration change when a plan is
//! purchased, renewed, swapped, paused, or resumed, and it keeps the order
//! ledger consistent with those decisions.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────┐
//! │  Back-office API  │  HTTP handlers, batch jobs, radbill-admin
//! └─────────┬─────────┘
//!           │ provision / renew / update / delete (explicit operator id)
//! ┌─────────▼─────────────────────────────────────────┐
//! │                 LifecycleEngine                   │
//! │  plan application   order ledger    audit log     │
//! │  (pure, clocked)    (one booking)   (tracing)     │
//! └─────────┬─────────────────────────────────────────┘
//!           │
//!   Store · PlanCatalog · ExpiryEvaluator · CredentialHasher · Clock
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use radbill_engine::{
//!     config::EngineConfig,
//!     store::MemoryStore,
//!     subscriptions::{LifecycleEngine, NewSubscriber, OperatorId, OrderStatus, PlanId},
//! };
//!
//! # async fn example() -> radbill_engine::Result<()> {
//! let config = EngineConfig::from_toml(
//!     r#"
//!     [[plans]]
//!     id = 1
//!     name = "Home 1M"
//!     kind = "monthly"
//!     service_months = 1
//!     price = "30.00"
//!     "#,
//! )?;
//! let engine = LifecycleEngine::from_config(&config, Arc::new(MemoryStore::new()))?;
//! let operator = OperatorId::new(1);
//!
//! let id = engine
//!     .provision_subscription(
//!         NewSubscriber { name: "alice".into(), password: "s3cret".into(), ..Default::default() },
//!         PlanId::new(1),
//!         operator,
//!     )
//!     .await?;
//!
//! // A monthly plan without an expiry has lapsed, so this applies at once.
//! let order = engine.renew_or_change_plan(id, PlanId::new(1), 3, operator).await?;
//! assert_eq!(order.status, OrderStatus::Using);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`Result<T, EngineError>`](error::Result). Business-rule
//! rejections are never retryable; store failures are:
//!
//! ```rust
//! use radbill_engine::{EngineError, error::ErrorKind};
//!
//! fn should_retry(err: &EngineError) -> bool {
//!     match err.kind() {
//!         ErrorKind::Unavailable => true,
//!         ErrorKind::NotFound | ErrorKind::Conflict | ErrorKind::Invalid => false,
//!     }
//! }
//! # assert!(!should_retry(&EngineError::InvalidInput("units".into())));
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod expiry;
pub mod security;
pub mod store;
pub mod subscriptions;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use subscriptions::LifecycleEngine;
