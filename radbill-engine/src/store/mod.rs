//! Transactional persistence seam.
//!
//! The engine performs each lifecycle operation inside one [`Transaction`]:
//! it reads, writes, and then calls [`Transaction::commit`]. Dropping a
//! transaction without committing rolls it back, so any early return through
//! `?` leaves the store untouched.
//!
//! # Isolation
//!
//! Implementations must make [`Transaction::lock_subscriber`] exclusive: no
//! other transaction may read-for-update or write the same subscriber or its
//! orders until this one ends. This is what keeps the "at most one booked
//! order" check and the booking insert atomic. Name uniqueness must be
//! enforced by the store itself on insert and update; the engine's own check
//! only fails fast.

mod memory;
pub mod query;

use async_trait::async_trait;

pub use memory::MemoryStore;
pub use query::{Predicate, SubscriberPage, SubscriberQuery};

use crate::{
    error::Result,
    subscriptions::models::{NewOrder, OrderRecord, OrderStatus, Subscriber, SubscriberId},
};

/// Opens transactions.
#[async_trait]
pub trait Store: Send + Sync {
    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StoreUnavailable`](crate::error::EngineError::StoreUnavailable)
    /// if the store cannot be reached.
    async fn begin(&self) -> Result<Box<dyn Transaction>>;
}

/// One atomic unit of work.
///
/// All methods return
/// [`EngineError::StoreUnavailable`](crate::error::EngineError::StoreUnavailable)
/// on backend failure.
#[async_trait]
pub trait Transaction: Send {
    /// Reads a subscriber without locking it.
    async fn subscriber(&mut self, id: SubscriberId) -> Result<Option<Subscriber>>;

    /// Reads a subscriber and locks it and its orders for the rest of the transaction.
    async fn lock_subscriber(&mut self, id: SubscriberId) -> Result<Option<Subscriber>>;

    /// Whether any subscriber other than `excluding` uses `name`.
    async fn name_in_use(&mut self, name: &str, excluding: Option<SubscriberId>) -> Result<bool>;

    /// Inserts a subscriber. The store assigns the id; the one on `subscriber` is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DuplicateName`](crate::error::EngineError::DuplicateName)
    /// if the name is taken.
    async fn insert_subscriber(&mut self, subscriber: Subscriber) -> Result<Subscriber>;

    /// Overwrites a subscriber row.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SubscriberNotFound`](crate::error::EngineError::SubscriberNotFound)
    /// if the row does not exist, or
    /// [`EngineError::DuplicateName`](crate::error::EngineError::DuplicateName) if the new
    /// name collides with another subscriber.
    async fn update_subscriber(&mut self, subscriber: &Subscriber) -> Result<()>;

    /// Every order of a subscriber, in insertion order.
    async fn orders(&mut self, subscriber_id: SubscriberId) -> Result<Vec<OrderRecord>>;

    /// Number of the subscriber's orders in `status`.
    async fn count_orders(&mut self, subscriber_id: SubscriberId, status: OrderStatus)
    -> Result<usize>;

    /// Appends an order; the store assigns the id.
    async fn append_order(&mut self, order: NewOrder) -> Result<OrderRecord>;

    /// Evaluates a listing query.
    async fn find_subscribers(&mut self, query: &SubscriberQuery) -> Result<SubscriberPage>;

    /// Makes every write of this transaction visible.
    async fn commit(self: Box<Self>) -> Result<()>;
}
