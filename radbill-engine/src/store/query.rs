//! Structured subscriber listing queries.
//!
//! Filters are typed predicates evaluated by the store, never SQL fragments
//! glued together from user input.

use serde::{Deserialize, Serialize};

use crate::{
    error::{EngineError, Result},
    subscriptions::models::{PlanId, Subscriber, SubscriberStatus},
};

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Page size used when none is given.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// One filter condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum Predicate {
    /// Login name contains the text (case-insensitive).
    NameContains(String),
    /// Real name contains the text (case-insensitive).
    RealNameContains(String),
    /// Status equals.
    Status(SubscriberStatus),
    /// Assigned plan equals.
    Plan(PlanId),
}

impl Predicate {
    /// Evaluates the predicate against a subscriber.
    #[must_use]
    pub fn matches(&self, subscriber: &Subscriber) -> bool {
        match self {
            Self::NameContains(text) => contains_ignore_case(&subscriber.name, text),
            Self::RealNameContains(text) => contains_ignore_case(&subscriber.real_name, text),
            Self::Status(status) => subscriber.status == *status,
            Self::Plan(plan_id) => subscriber.plan_id == *plan_id,
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Conjunction of predicates plus paging.
///
/// # Examples
///
/// ```
/// use radbill_engine::{store::SubscriberQuery, subscriptions::models::SubscriberStatus};
///
/// let query = SubscriberQuery::new()
///     .name_contains("wang")
///     .status(SubscriberStatus::Active)
///     .page(2, 50);
/// assert_eq!(query.offset(), 50);
/// assert!(query.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberQuery {
    /// All must hold.
    #[serde(default)]
    pub predicates: Vec<Predicate>,
    /// 1-based page number.
    #[serde(default = "first_page")]
    pub page: u32,
    /// Rows per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

const fn first_page() -> u32 {
    1
}

const fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for SubscriberQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriberQuery {
    /// Matches every subscriber; first page.
    #[must_use]
    pub const fn new() -> Self {
        Self { predicates: Vec::new(), page: 1, page_size: DEFAULT_PAGE_SIZE }
    }

    /// Adds a predicate.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Login name contains `text`. Empty text is ignored.
    #[must_use]
    pub fn name_contains(self, text: &str) -> Self {
        if text.is_empty() { self } else { self.filter(Predicate::NameContains(text.to_owned())) }
    }

    /// Real name contains `text`. Empty text is ignored.
    #[must_use]
    pub fn real_name_contains(self, text: &str) -> Self {
        if text.is_empty() {
            self
        } else {
            self.filter(Predicate::RealNameContains(text.to_owned()))
        }
    }

    /// Status equals `status`.
    #[must_use]
    pub fn status(self, status: SubscriberStatus) -> Self {
        self.filter(Predicate::Status(status))
    }

    /// Assigned plan equals `plan_id`.
    #[must_use]
    pub fn plan(self, plan_id: PlanId) -> Self {
        self.filter(Predicate::Plan(plan_id))
    }

    /// Selects a page.
    #[must_use]
    pub const fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    /// Whether every predicate holds for `subscriber`.
    #[must_use]
    pub fn matches(&self, subscriber: &Subscriber) -> bool {
        self.predicates.iter().all(|predicate| predicate.matches(subscriber))
    }

    /// Rows to skip.
    #[must_use]
    pub fn offset(&self) -> usize {
        let skipped = u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size);
        usize::try_from(skipped).unwrap_or(usize::MAX)
    }

    /// Checks paging bounds.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] if the page is 0 or the page size is
    /// 0 or above [`MAX_PAGE_SIZE`].
    pub fn validate(&self) -> Result<()> {
        if self.page == 0 {
            return Err(EngineError::InvalidInput("page numbers start at 1".into()));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(EngineError::InvalidInput(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }
}

/// One page of listing results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberPage {
    /// Subscribers on this page, ordered by id.
    pub items: Vec<Subscriber>,
    /// Matches across all pages.
    pub total: u64,
    /// 1-based page number.
    pub page: u32,
    /// Rows per page.
    pub page_size: u32,
}

impl SubscriberPage {
    /// Number of pages needed for `total` matches.
    #[must_use]
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 { 0 } else { self.total.div_ceil(u64::from(self.page_size)) }
    }
}
