//! Back-office command batch.
//!
//! A batch is a JSON array of commands, each tagged with `op`:
//!
//! ```json
//! [
//!   {"op": "provision", "operator_id": 1, "plan_id": 1,
//!    "subscriber": {"name": "alice", "password": "s3cret"}},
//!   {"op": "renew", "operator_id": 1, "subscriber_id": 1, "plan_id": 1, "units": 3},
//!   {"op": "history", "subscriber_id": 1}
//! ]
//! ```
//!
//! Every command produces one [`Outcome`] line.

use radbill_engine::{
    EngineError, LifecycleEngine,
    error::ErrorKind,
    store::SubscriberQuery,
    subscriptions::{NewSubscriber, OperatorId, PlanId, SubscriberId, SubscriberUpdate},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// One back-office request.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    /// Create a subscriber on a plan.
    Provision {
        /// Authorizing operator.
        operator_id: OperatorId,
        /// Plan to assign.
        plan_id: PlanId,
        /// Subscriber fields.
        subscriber: NewSubscriber,
    },
    /// Renew, switch, or book a plan change.
    Renew {
        /// Authorizing operator.
        operator_id: OperatorId,
        /// Target subscriber.
        subscriber_id: SubscriberId,
        /// Target plan.
        plan_id: PlanId,
        /// Billing units.
        #[serde(default = "one_unit")]
        units: u32,
    },
    /// Overwrite editable subscriber fields.
    Update {
        /// Authorizing operator.
        operator_id: OperatorId,
        /// Target subscriber.
        subscriber_id: SubscriberId,
        /// Replacement values.
        update: SubscriberUpdate,
    },
    /// Soft-delete a subscriber.
    Delete {
        /// Authorizing operator.
        operator_id: OperatorId,
        /// Target subscriber.
        subscriber_id: SubscriberId,
    },
    /// Fetch a subscriber.
    Get {
        /// Target subscriber.
        subscriber_id: SubscriberId,
    },
    /// Fetch a subscriber's orders.
    History {
        /// Target subscriber.
        subscriber_id: SubscriberId,
    },
    /// Search subscribers.
    List {
        /// Filters and paging.
        #[serde(default)]
        query: SubscriberQuery,
    },
}

const fn one_unit() -> u32 {
    1
}

impl Command {
    /// Wire name of the command.
    #[must_use]
    pub const fn op(&self) -> &'static str {
        match self {
            Self::Provision { .. } => "provision",
            Self::Renew { .. } => "renew",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Get { .. } => "get",
            Self::History { .. } => "history",
            Self::List { .. } => "list",
        }
    }
}

/// Result line printed for one command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    /// Position of the command in the batch.
    pub index: usize,
    /// Command name.
    pub op: &'static str,
    /// Whether the command succeeded.
    pub ok: bool,
    /// Command output on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Failure>,
}

/// Serialized form of an [`EngineError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// Error class.
    pub kind: &'static str,
    /// Whether retrying the same command may succeed.
    pub retryable: bool,
    /// Human-readable message.
    pub message: String,
}

impl From<&EngineError> for Failure {
    fn from(err: &EngineError) -> Self {
        let kind = match err.kind() {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Invalid => "invalid",
            ErrorKind::Unavailable => "unavailable",
        };
        Self { kind, retryable: err.is_retryable(), message: err.to_string() }
    }
}

/// Runs one command against the engine.
pub async fn execute(engine: &LifecycleEngine, index: usize, command: Command) -> Outcome {
    let op = command.op();
    match run(engine, command).await {
        Ok(result) => Outcome { index, op, ok: true, result: Some(result), error: None },
        Err(err) => Outcome { index, op, ok: false, result: None, error: Some(Failure::from(&err)) },
    }
}

async fn run(engine: &LifecycleEngine, command: Command) -> radbill_engine::Result<Value> {
    let value = match command {
        Command::Provision { operator_id, plan_id, subscriber } => {
            let id = engine.provision_subscription(subscriber, plan_id, operator_id).await?;
            json!({ "subscriber_id": id })
        }
        Command::Renew { operator_id, subscriber_id, plan_id, units } => {
            to_value(&engine.renew_or_change_plan(subscriber_id, plan_id, units, operator_id).await?)?
        }
        Command::Update { operator_id, subscriber_id, update } => {
            engine.update_subscriber(subscriber_id, update, operator_id).await?;
            json!({ "subscriber_id": subscriber_id })
        }
        Command::Delete { operator_id, subscriber_id } => {
            engine.delete_subscriber(subscriber_id, operator_id).await?;
            json!({ "subscriber_id": subscriber_id })
        }
        Command::Get { subscriber_id } => to_value(&engine.subscriber(subscriber_id).await?)?,
        Command::History { subscriber_id } => {
            to_value(&engine.order_history(subscriber_id).await?)?
        }
        Command::List { query } => to_value(&engine.list_subscribers(&query).await?)?,
    };
    Ok(value)
}

fn to_value<T: Serialize>(value: &T) -> radbill_engine::Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| EngineError::InvalidInput(format!("unserializable result: {e}")))
}
