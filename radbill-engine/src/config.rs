//! Engine configuration.
//!
//! This module defines the TOML-deserializable settings the engine is built
//! from: the local wall-clock offset, the credential salt, and the plan catalog.

use std::collections::HashSet;

use chrono::FixedOffset;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    catalog::InMemoryCatalog,
    error::{EngineError, Result},
    security::credentials::DEFAULT_SALT,
    subscriptions::models::{Plan, PlanKind},
};

/// Largest accepted UTC offset, in seconds (exclusive of a full day).
const MAX_OFFSET_SECS: i32 = 86_399;

/// Root engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    /// Wall-clock settings.
    #[serde(default)]
    pub clock: ClockConfig,

    /// Password hashing settings.
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Plan catalog.
    #[serde(default)]
    pub plans: Vec<Plan>,
}

/// Wall-clock settings.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ClockConfig {
    /// Offset from UTC used for day and month boundaries.
    #[serde(default)]
    pub utc_offset_seconds: i32,
}

/// Password hashing settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    /// Salt mixed into every password hash.
    #[serde(default = "default_salt")]
    pub salt: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self { salt: default_salt() }
    }
}

fn default_salt() -> String {
    DEFAULT_SALT.to_owned()
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ConfigError`] if the document is malformed or
    /// fails [`EngineConfig::validate`].
    ///
    /// # Examples
    ///
    /// ```
    /// use radbill_engine::config::EngineConfig;
    ///
    /// let config = EngineConfig::from_toml(
    ///     r#"
    ///     [clock]
    ///     utc_offset_seconds = 28800
    ///
    ///     [[plans]]
    ///     id = 1
    ///     name = "Home 1M"
    ///     kind = "monthly"
    ///     service_months = 1
    ///     price = "30.00"
    ///     "#,
    /// )
    /// .unwrap();
    /// assert_eq!(config.plans.len(), 1);
    /// ```
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| EngineError::ConfigError(format!("invalid engine config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// This method checks for:
    /// - UTC offset strictly within one day
    /// - Non-empty credential salt
    /// - Unique plan ids and non-empty plan names
    /// - Non-negative plan prices
    /// - Monthly plans granting at least one month per unit
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ConfigError`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.clock.utc_offset_seconds.abs() > MAX_OFFSET_SECS {
            return Err(EngineError::ConfigError(format!(
                "clock.utc_offset_seconds must be within +/-{MAX_OFFSET_SECS}, got {}",
                self.clock.utc_offset_seconds
            )));
        }

        if self.credentials.salt.is_empty() {
            return Err(EngineError::ConfigError("credentials.salt must not be empty".into()));
        }

        let mut seen = HashSet::new();
        for plan in &self.plans {
            if !seen.insert(plan.id) {
                return Err(EngineError::ConfigError(format!("duplicate plan id {}", plan.id)));
            }
            validate_plan(plan)?;
        }

        Ok(())
    }

    /// Wall-clock offset.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ConfigError`] if the offset is out of range.
    pub fn utc_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.clock.utc_offset_seconds).ok_or_else(|| {
            EngineError::ConfigError(format!(
                "invalid utc offset: {}",
                self.clock.utc_offset_seconds
            ))
        })
    }

    /// Builds the plan catalog.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ConfigError`] on duplicate plan ids.
    pub fn catalog(&self) -> Result<InMemoryCatalog> {
        InMemoryCatalog::new(self.plans.iter().cloned())
    }
}

fn validate_plan(plan: &Plan) -> Result<()> {
    if plan.name.trim().is_empty() {
        return Err(EngineError::ConfigError(format!("plan {} has an empty name", plan.id)));
    }
    if plan.price < Decimal::ZERO {
        return Err(EngineError::ConfigError(format!(
            "plan {} has a negative price: {}",
            plan.id, plan.price
        )));
    }
    if plan.kind == PlanKind::Monthly && plan.service_months == 0 {
        return Err(EngineError::ConfigError(format!(
            "monthly plan {} must grant at least one service month",
            plan.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{catalog::PlanCatalog, subscriptions::models::PlanId};

    const SAMPLE: &str = r#"
        [clock]
        utc_offset_seconds = 28800

        [credentials]
        salt = "site-salt"

        [[plans]]
        id = 1
        name = "Home 1M"
        kind = "monthly"
        service_months = 1
        price = "30.00"

        [[plans]]
        id = 2
        name = "Daily 1G"
        kind = "volume"
        volume_reset = "daily"
        volume_kb = 1048576
        price = "2.50"
        enabled = false
    "#;

    #[test]
    fn test_parse_sample() {
        let config = EngineConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.clock.utc_offset_seconds, 28_800);
        assert_eq!(config.credentials.salt, "site-salt");
        assert_eq!(config.plans.len(), 2);
        assert!(!config.plans[1].enabled);
        assert_eq!(config.utc_offset().unwrap().local_minus_utc(), 28_800);
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = EngineConfig::from_toml("").unwrap();
        assert_eq!(config.clock.utc_offset_seconds, 0);
        assert_eq!(config.credentials.salt, DEFAULT_SALT);
        assert!(config.plans.is_empty());
    }

    #[test]
    fn test_catalog_from_config() {
        let config = EngineConfig::from_toml(SAMPLE).unwrap();
        let catalog = config.catalog().unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.plan(PlanId::new(1)).unwrap().name, "Home 1M");
    }

    #[test]
    fn test_offset_out_of_range() {
        let result = EngineConfig::from_toml("[clock]\nutc_offset_seconds = 90000\n");
        assert!(matches!(result, Err(EngineError::ConfigError(_))));
    }

    #[test]
    fn test_empty_salt_rejected() {
        let result = EngineConfig::from_toml("[credentials]\nsalt = \"\"\n");
        assert!(matches!(result, Err(EngineError::ConfigError(_))));
    }

    #[test]
    fn test_duplicate_plan_ids_rejected() {
        let toml = r#"
            [[plans]]
            id = 1
            name = "a"
            kind = "duration"
            price = "1"

            [[plans]]
            id = 1
            name = "b"
            kind = "duration"
            price = "1"
        "#;
        let err = EngineConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("duplicate plan id 1"));
    }

    #[test]
    fn test_monthly_plan_needs_service_months() {
        let toml = r#"
            [[plans]]
            id = 1
            name = "broken"
            kind = "monthly"
            price = "30"
        "#;
        assert!(EngineConfig::from_toml(toml).is_err());
    }

    #[test]
    fn test_negative_price_rejected() {
        let toml = r#"
            [[plans]]
            id = 3
            name = "refund"
            kind = "duration"
            price = "-1.00"
        "#;
        assert!(EngineConfig::from_toml(toml).is_err());
    }

    #[test]
    fn test_malformed_toml() {
        let result = EngineConfig::from_toml("[clock\n");
        assert!(matches!(result, Err(EngineError::ConfigError(_))));
    }
}
