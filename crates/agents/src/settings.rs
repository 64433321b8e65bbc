use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::Duration;
use lyra_core::{ChartMode, UsagePolicy};

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub session_ttl: Duration,
    pub chart_mode: ChartMode,
    /// `None` seeds the generator from OS entropy.
    pub rng_seed: Option<u64>,
    pub templates_path: Option<PathBuf>,
    pub intent_rules_path: Option<PathBuf>,
    pub usage_policy: UsagePolicy,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            session_ttl: Duration::hours(24),
            chart_mode: ChartMode::default(),
            rng_seed: None,
            templates_path: None,
            intent_rules_path: None,
            usage_policy: UsagePolicy::default(),
        }
    }
}

impl AgentSettings {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let chart_mode = match env::var("LYRA_CHART_MODE") {
            Ok(raw) => raw
                .parse::<ChartMode>()
                .map_err(anyhow::Error::msg)
                .context("invalid LYRA_CHART_MODE")?,
            Err(_) => defaults.chart_mode,
        };

        let session_ttl = env_parse::<i64>("LYRA_SESSION_TTL_HOURS")
            .filter(|hours| *hours > 0)
            .map(Duration::hours)
            .unwrap_or(defaults.session_ttl);

        let usage_policy = UsagePolicy {
            chat_daily_limit: env_parse("LYRA_CHAT_DAILY_LIMIT")
                .unwrap_or(defaults.usage_policy.chat_daily_limit),
            ..defaults.usage_policy
        };

        Ok(Self {
            session_ttl,
            chart_mode,
            rng_seed: env_parse("LYRA_RNG_SEED"),
            templates_path: env_path("LYRA_TEMPLATES_PATH"),
            intent_rules_path: env_path("LYRA_INTENT_RULES_PATH"),
            usage_policy,
        })
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}
