//! Plan catalog lookup.

use std::collections::HashMap;

use crate::{
    error::{EngineError, Result},
    subscriptions::models::{Plan, PlanId},
};

/// Read-only source of plan definitions.
pub trait PlanCatalog: Send + Sync {
    /// Looks up a plan by id.
    fn plan(&self, id: PlanId) -> Option<Plan>;
}

/// Catalog held in memory, typically seeded from [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    plans: HashMap<PlanId, Plan>,
}

impl InMemoryCatalog {
    /// Builds a catalog from plan definitions.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ConfigError`] if two plans share an id.
    pub fn new<I>(plans: I) -> Result<Self>
    where
        I: IntoIterator<Item = Plan>,
    {
        let mut catalog = Self::default();
        for plan in plans {
            let id = plan.id;
            if catalog.plans.insert(id, plan).is_some() {
                return Err(EngineError::ConfigError(format!("duplicate plan id {id}")));
            }
        }
        Ok(catalog)
    }

    /// Number of plans.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    /// Whether the catalog has no plans.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

impl PlanCatalog for InMemoryCatalog {
    fn plan(&self, id: PlanId) -> Option<Plan> {
        self.plans.get(&id).cloned()
    }
}
