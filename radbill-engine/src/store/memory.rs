//! In-process [`Store`] implementation.
//!
//! Transactions are fully serialized: `begin` takes an owned lock on the
//! tables and works on a private copy that replaces the tables on commit.

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::{Store, SubscriberPage, SubscriberQuery, Transaction};
use crate::{
    error::{EngineError, Result},
    subscriptions::models::{
        NewOrder, OrderId, OrderRecord, OrderStatus, Subscriber, SubscriberId,
    },
};

#[derive(Debug, Clone, Default)]
struct Tables {
    subscribers: BTreeMap<SubscriberId, Subscriber>,
    orders: Vec<OrderRecord>,
    last_subscriber_id: u64,
    last_order_id: u64,
}

impl Tables {
    fn name_taken(&self, name: &str, excluding: Option<SubscriberId>) -> bool {
        self.subscribers.values().any(|s| s.name == name && Some(s.id) != excluding)
    }
}

/// Serialized in-memory store.
///
/// Clones share the same tables, so a test can keep a handle for inspection
/// while the engine owns another.
///
/// # Examples
///
/// ```
/// use radbill_engine::store::{MemoryStore, Store};
///
/// # async fn example() -> radbill_engine::error::Result<()> {
/// let store = MemoryStore::new();
/// let tx = store.begin().await?;
/// // ... reads and writes ...
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next commit fail with [`EngineError::StoreUnavailable`].
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Committed subscribers, ordered by id.
    pub async fn subscribers(&self) -> Vec<Subscriber> {
        self.tables.lock().await.subscribers.values().cloned().collect()
    }

    /// Committed orders, in insertion order.
    pub async fn all_orders(&self) -> Vec<OrderRecord> {
        self.tables.lock().await.orders.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let committed = Arc::clone(&self.tables).lock_owned().await;
        let working = committed.clone();
        Ok(Box::new(MemoryTransaction {
            committed,
            working,
            fail_commit: Arc::clone(&self.fail_next_commit),
        }))
    }
}

#[derive(Debug)]
struct MemoryTransaction {
    committed: OwnedMutexGuard<Tables>,
    working: Tables,
    fail_commit: Arc<AtomicBool>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn subscriber(&mut self, id: SubscriberId) -> Result<Option<Subscriber>> {
        Ok(self.working.subscribers.get(&id).cloned())
    }

    async fn lock_subscriber(&mut self, id: SubscriberId) -> Result<Option<Subscriber>> {
        // The whole store is already held exclusively by this transaction.
        self.subscriber(id).await
    }

    async fn name_in_use(&mut self, name: &str, excluding: Option<SubscriberId>) -> Result<bool> {
        Ok(self.working.name_taken(name, excluding))
    }

    async fn insert_subscriber(&mut self, mut subscriber: Subscriber) -> Result<Subscriber> {
        if self.working.name_taken(&subscriber.name, None) {
            return Err(EngineError::DuplicateName(subscriber.name));
        }
        self.working.last_subscriber_id += 1;
        subscriber.id = SubscriberId::new(self.working.last_subscriber_id);
        self.working.subscribers.insert(subscriber.id, subscriber.clone());
        Ok(subscriber)
    }

    async fn update_subscriber(&mut self, subscriber: &Subscriber) -> Result<()> {
        if !self.working.subscribers.contains_key(&subscriber.id) {
            return Err(EngineError::SubscriberNotFound(subscriber.id));
        }
        if self.working.name_taken(&subscriber.name, Some(subscriber.id)) {
            return Err(EngineError::DuplicateName(subscriber.name.clone()));
        }
        self.working.subscribers.insert(subscriber.id, subscriber.clone());
        Ok(())
    }

    async fn orders(&mut self, subscriber_id: SubscriberId) -> Result<Vec<OrderRecord>> {
        Ok(self
            .working
            .orders
            .iter()
            .filter(|order| order.subscriber_id == subscriber_id)
            .cloned()
            .collect())
    }

    async fn count_orders(
        &mut self,
        subscriber_id: SubscriberId,
        status: OrderStatus,
    ) -> Result<usize> {
        Ok(self
            .working
            .orders
            .iter()
            .filter(|order| order.subscriber_id == subscriber_id && order.status == status)
            .count())
    }

    async fn append_order(&mut self, order: NewOrder) -> Result<OrderRecord> {
        self.working.last_order_id += 1;
        let record = order.into_record(OrderId::new(self.working.last_order_id));
        self.working.orders.push(record.clone());
        Ok(record)
    }

    async fn find_subscribers(&mut self, query: &SubscriberQuery) -> Result<SubscriberPage> {
        let matching: Vec<&Subscriber> =
            self.working.subscribers.values().filter(|s| query.matches(s)).collect();
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(query.offset())
            .take(query.page_size as usize)
            .cloned()
            .collect();
        Ok(SubscriberPage { items, total, page: query.page, page_size: query.page_size })
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self { mut committed, working, fail_commit } = *self;
        if fail_commit.swap(false, Ordering::SeqCst) {
            debug!("injected commit failure, rolling back");
            return Err(EngineError::StoreUnavailable("commit aborted by store".into()));
        }
        *committed = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use rust_decimal::Decimal;

    use super::*;
    use crate::subscriptions::models::{OperatorId, PlanId, Quota, SubscriberStatus};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn draft(name: &str) -> Subscriber {
        Subscriber {
            id: SubscriberId::new(0),
            name: name.into(),
            real_name: String::new(),
            password_hash: String::new(),
            plan_id: PlanId::new(1),
            status: SubscriberStatus::Active,
            quota: Quota::default(),
            expire_at: None,
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

    fn order(subscriber_id: SubscriberId, status: OrderStatus) -> NewOrder {
        NewOrder {
            subscriber_id,
            plan_id: PlanId::new(1),
            operator_id: OperatorId::new(1),
            price: Decimal::TEN,
            ordered_at: now(),
            units: 1,
            status,
            end_date: None,
        }
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let inserted = tx.insert_subscriber(draft("alice")).await.unwrap();
        assert_eq!(inserted.id, SubscriberId::new(1));
        tx.commit().await.unwrap();

        let subscribers = store.subscribers().await;
        assert_eq!(subscribers.len(), 1);
        assert_eq!(subscribers[0].name, "alice");
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            let sub = tx.insert_subscriber(draft("alice")).await.unwrap();
            tx.append_order(order(sub.id, OrderStatus::Using)).await.unwrap();
        }
        assert!(store.subscribers().await.is_empty());
        assert!(store.all_orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_injected_commit_failure_rolls_back() {
        let store = MemoryStore::new();
        store.fail_next_commit();
        let mut tx = store.begin().await.unwrap();
        tx.insert_subscriber(draft("alice")).await.unwrap();
        let result = tx.commit().await;
        assert!(matches!(result, Err(EngineError::StoreUnavailable(_))));
        assert!(store.subscribers().await.is_empty());

        // Only the next commit fails.
        let mut tx = store.begin().await.unwrap();
        tx.insert_subscriber(draft("alice")).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.subscribers().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unique_name_enforced_by_store() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let alice = tx.insert_subscriber(draft("alice")).await.unwrap();
        let dup = tx.insert_subscriber(draft("alice")).await;
        assert!(matches!(dup, Err(EngineError::DuplicateName(_))));

        let mut bob = tx.insert_subscriber(draft("bob")).await.unwrap();
        bob.name = "alice".into();
        let rename = tx.update_subscriber(&bob).await;
        assert!(matches!(rename, Err(EngineError::DuplicateName(_))));

        assert!(tx.name_in_use("alice", None).await.unwrap());
        assert!(!tx.name_in_use("alice", Some(alice.id)).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_missing_subscriber() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let mut ghost = draft("ghost");
        ghost.id = SubscriberId::new(99);
        let result = tx.update_subscriber(&ghost).await;
        assert!(matches!(result, Err(EngineError::SubscriberNotFound(_))));
    }

    #[tokio::test]
    async fn test_order_counts_by_status() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let sub = tx.insert_subscriber(draft("carol")).await.unwrap();
        tx.append_order(order(sub.id, OrderStatus::Using)).await.unwrap();
        tx.append_order(order(sub.id, OrderStatus::Using)).await.unwrap();
        let booked = tx.append_order(order(sub.id, OrderStatus::Booked)).await.unwrap();

        assert_eq!(booked.id, OrderId::new(3));
        assert_eq!(tx.count_orders(sub.id, OrderStatus::Using).await.unwrap(), 2);
        assert_eq!(tx.count_orders(sub.id, OrderStatus::Booked).await.unwrap(), 1);
        assert_eq!(tx.count_orders(SubscriberId::new(42), OrderStatus::Using).await.unwrap(), 0);
        assert_eq!(tx.orders(sub.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_find_subscribers_pages() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        for i in 0..5 {
            tx.insert_subscriber(draft(&format!("user{i}"))).await.unwrap();
        }
        tx.insert_subscriber(draft("other")).await.unwrap();

        let query = SubscriberQuery::new().name_contains("user").page(2, 2);
        let page = tx.find_subscribers(&query).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages(), 3);
        let names: Vec<_> = page.items.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["user2", "user3"]);
    }

    #[tokio::test]
    async fn test_transactions_are_serialized() {
        let store = MemoryStore::new();
        let tx = store.begin().await.unwrap();

        let other = store.clone();
        let waiter = tokio::spawn(async move {
            let mut tx = other.begin().await.unwrap();
            tx.name_in_use("alice", None).await.unwrap()
        });

        // Give the spawned task a chance to block on the lock.
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        let mut tx = tx;
        tx.insert_subscriber(draft("alice")).await.unwrap();
        tx.commit().await.unwrap();

        assert!(waiter.await.unwrap());
    }
}
