//! Runtime settings for the session workflow.
//!
//! Values come from built-in defaults, overridden by `PREP__*` environment
//! variables (a local `.env` file is read first when present), e.g.
//! `PREP__STORE_TIMEOUT_MS=2000` or `PREP__ANSWER_POLICY=match_option`.

use std::collections::HashMap;
use std::time::Duration;

use prep_core::model::AnswerPolicy;
use serde::Deserialize;

use crate::error::ConfigError;

const ENV_PREFIX: &str = "PREP";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    pub store_timeout_ms: u64,
    pub scoring_timeout_ms: u64,
    /// Persist every this many timer ticks while nothing else changes.
    pub checkpoint_every_secs: u32,
    pub answer_policy: AnswerPolicy,
    /// When set, scoring goes to this endpoint instead of the local grader.
    #[serde(default)]
    pub scoring_url: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: 5_000,
            scoring_timeout_ms: 10_000,
            checkpoint_every_secs: 15,
            answer_policy: AnswerPolicy::Permissive,
            scoring_url: None,
        }
    }
}

impl SessionConfig {
    /// Load from `.env` and the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable cannot be parsed or a value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::build(None)
    }

    /// Load from an explicit variable map instead of the process environment.
    ///
    /// # Errors
    ///
    /// Same as [`SessionConfig::load`].
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::build(Some(vars))
    }

    fn build(vars: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .set_default("store_timeout_ms", 5_000_i64)?
            .set_default("scoring_timeout_ms", 10_000_i64)?
            .set_default("checkpoint_every_secs", 15_i64)?
            .set_default("answer_policy", "permissive")?
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .source(vars),
            )
            .build()?;

        let loaded: Self = settings.try_deserialize()?;
        loaded.validate()
    }

    fn validate(mut self) -> Result<Self, ConfigError> {
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "store_timeout_ms",
                reason: "must be positive",
            });
        }
        if self.scoring_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "scoring_timeout_ms",
                reason: "must be positive",
            });
        }
        if self.checkpoint_every_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "checkpoint_every_secs",
                reason: "must be positive",
            });
        }
        self.scoring_url = self
            .scoring_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());
        Ok(self)
    }

    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    #[must_use]
    pub fn scoring_timeout(&self) -> Duration {
        Duration::from_millis(self.scoring_timeout_ms)
    }
}
