//! Order ledger: append-only purchase history.
//!
//! The ledger is where the "at most one booked order per subscriber" rule is
//! enforced. Both the check and the append run on the caller's transaction,
//! after the subscriber row has been locked, so two concurrent bookings for
//! the same subscriber cannot both pass.

use std::cmp::Reverse;

use tracing::warn;

use super::models::{NewOrder, OrderRecord, OrderStatus, SubscriberId};
use crate::{
    error::{EngineError, Result},
    store::Transaction,
};

/// Rejects the operation if the subscriber has a booked order pending.
///
/// # Errors
///
/// Returns [`EngineError::PendingBookingExists`] when a booking is pending.
pub async fn ensure_no_pending_booking(
    tx: &mut dyn Transaction,
    subscriber_id: SubscriberId,
) -> Result<()> {
    let booked = tx.count_orders(subscriber_id, OrderStatus::Booked).await?;
    if booked > 0 {
        warn!(subscriber_id = %subscriber_id, booked, "booked plan change already pending");
        return Err(EngineError::PendingBookingExists(subscriber_id));
    }
    Ok(())
}

/// Appends an order to the ledger.
///
/// Booked orders re-check the pending-booking rule first, so the invariant
/// holds no matter which code path records the booking.
///
/// # Errors
///
/// Returns [`EngineError::PendingBookingExists`] for a second booking, or
/// [`EngineError::InvalidInput`] for a zero unit count.
pub async fn record(tx: &mut dyn Transaction, order: NewOrder) -> Result<OrderRecord> {
    if order.units == 0 {
        return Err(EngineError::InvalidInput("order unit count must be at least 1".into()));
    }
    if order.status == OrderStatus::Booked {
        ensure_no_pending_booking(tx, order.subscriber_id).await?;
    }
    tx.append_order(order).await
}

/// Full order history of a subscriber.
///
/// Booked orders come first, then fulfilled ones; newest first within each group.
///
/// # Errors
///
/// Propagates store failures.
pub async fn history(tx: &mut dyn Transaction, subscriber_id: SubscriberId) -> Result<Vec<OrderRecord>> {
    let mut orders = tx.orders(subscriber_id).await?;
    orders.sort_by_key(|order| (order.status, Reverse(order.ordered_at), Reverse(order.id)));
    Ok(orders)
}
