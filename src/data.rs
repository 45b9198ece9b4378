//! Shared bot state
//!
//! Immutable moderation configuration plus the constructed coordinator,
//! wrapped for cheap cloning into every command and event handler.

use std::{collections::HashSet, ops::Deref, sync::Arc, time::Duration};

use poise::serenity_prelude as serenity;
use serde::{Deserialize, Serialize};
use serenity::prelude::TypeMapKey;
use tracing::info;

use crate::moderation::{
    ContentFilter, EscalationPolicy, EscalationTier, ModerationCoordinator, ModerationResult,
    WarningLedger, escalation::default_tiers,
};

/// Where the immutable moderation settings live
pub const CONFIG_FILE: &str = "data/moderation.yaml";
/// The warning ledger's journal
pub const WARNINGS_FILE: &str = "data/warnings.yaml";

/// Moderation configuration, loaded once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Deny-list for the automod, first match wins
    pub denied_terms: Vec<String>,
    /// Role names exempt from the automod
    pub bypass_roles: HashSet<String>,
    /// Active-warning-count → timeout ladder
    pub escalation_tiers: Vec<EscalationTier>,
    /// Lifetime of the in-channel fallback notice
    pub automod_notice_ttl_seconds: u64,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            denied_terms: vec!["nigger".to_string(), "faggot".to_string()],
            bypass_roles: HashSet::from([
                "Moderator".to_string(),
                "Admin".to_string(),
                "Staff".to_string(),
            ]),
            escalation_tiers: default_tiers(),
            automod_notice_ttl_seconds: 10,
        }
    }
}

impl ModerationConfig {
    /// Read the config file, falling back to defaults when it is absent
    pub async fn load() -> Self {
        match tokio::fs::read_to_string(CONFIG_FILE).await {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(error = %e, "Bad moderation config, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}

/// Centralized data structure for the bot
#[derive(Clone)]
pub struct Data(pub Arc<DataInner>);

pub struct DataInner {
    pub config: ModerationConfig,
    pub coordinator: ModerationCoordinator,
}

impl TypeMapKey for Data {
    type Value = Data;
}

impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Deref for Data {
    type Target = DataInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Data {
    /// Assemble the engine from a config and an already-opened ledger
    ///
    /// # Errors
    /// `Validation` when the configured escalation tiers are inconsistent.
    pub fn assemble(config: ModerationConfig, ledger: WarningLedger) -> ModerationResult<Self> {
        let policy = EscalationPolicy::new(config.escalation_tiers.clone())?;
        let filter = ContentFilter::new(config.denied_terms.clone(), config.bypass_roles.clone());
        let coordinator = ModerationCoordinator::new(
            ledger,
            policy,
            filter,
            Duration::from_secs(config.automod_notice_ttl_seconds),
        );
        Ok(Self(Arc::new(DataInner {
            config,
            coordinator,
        })))
    }

    /// Production startup path: config file + journal-backed ledger
    ///
    /// # Errors
    /// Propagates journal read failures and config validation errors.
    pub async fn load() -> ModerationResult<Self> {
        let config = ModerationConfig::load().await;
        let ledger = WarningLedger::load(WARNINGS_FILE).await?;
        info!(
            denied_terms = config.denied_terms.len(),
            bypass_roles = config.bypass_roles.len(),
            tiers = config.escalation_tiers.len(),
            "Moderation engine assembled"
        );
        Self::assemble(config, ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_internally_consistent() {
        let config = ModerationConfig::default();
        assert!(!config.denied_terms.is_empty());
        assert!(config.bypass_roles.contains("Moderator"));
        assert_eq!(config.escalation_tiers.len(), 6);
        assert_eq!(config.escalation_tiers[0].min_warnings, 3);
        assert_eq!(config.automod_notice_ttl_seconds, 10);
    }

    #[test]
    fn test_config_round_trips_through_yaml() {
        let config = ModerationConfig {
            denied_terms: vec!["slur".to_string()],
            bypass_roles: HashSet::from(["Staff".to_string()]),
            escalation_tiers: vec![EscalationTier {
                min_warnings: 2,
                duration_minutes: 5,
            }],
            automod_notice_ttl_seconds: 30,
        };

        let yaml = serde_yaml::to_string(&config).expect("serializes");
        assert!(yaml.contains("denied_terms"));
        assert!(yaml.contains("slur"));

        let back: ModerationConfig = serde_yaml::from_str(&yaml).expect("deserializes");
        assert_eq!(back.denied_terms, config.denied_terms);
        assert_eq!(back.escalation_tiers, config.escalation_tiers);
        assert_eq!(back.automod_notice_ttl_seconds, 30);
    }

    #[test]
    fn test_assemble_rejects_bad_tiers() {
        let config = ModerationConfig {
            escalation_tiers: vec![
                EscalationTier {
                    min_warnings: 3,
                    duration_minutes: 10,
                },
                EscalationTier {
                    min_warnings: 3,
                    duration_minutes: 20,
                },
            ],
            ..Default::default()
        };
        assert!(Data::assemble(config, WarningLedger::in_memory()).is_err());
    }

    #[test]
    fn test_assemble_default_succeeds() {
        let data = Data::assemble(ModerationConfig::default(), WarningLedger::in_memory());
        assert!(data.is_ok());
        let data = data.unwrap();
        assert!(format!("{data:?}").contains("config"));
    }
}
