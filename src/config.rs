use crate::broker::DEFAULT_SUBSCRIBER_BUFFER;
use crate::error::{VoteError, VoteResult};
use std::env;
use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "sqlite:live_tally.db";
const DEFAULT_WATCH_INTERVAL_SECS: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    /// Payloads a subscriber may have waiting before newer ones are dropped.
    pub subscriber_buffer: usize,
    pub watch_interval: Duration,
}

impl Config {
    /// Read settings from the environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> VoteResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> VoteResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let subscriber_buffer =
            positive(&lookup, "SUBSCRIBER_BUFFER", DEFAULT_SUBSCRIBER_BUFFER as u64)? as usize;
        let watch_interval = Duration::from_secs(positive(
            &lookup,
            "WATCH_INTERVAL_SECS",
            DEFAULT_WATCH_INTERVAL_SECS,
        )?);

        Ok(Self {
            database_url,
            subscriber_buffer,
            watch_interval,
        })
    }
}

fn positive<F>(lookup: &F, key: &str, default: u64) -> VoteResult<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(VoteError::Config(format!(
            "{} must be a positive integer, got {:?}",
            key, raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.database_url, "sqlite:live_tally.db");
        assert_eq!(config.subscriber_buffer, DEFAULT_SUBSCRIBER_BUFFER);
        assert_eq!(config.watch_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("SUBSCRIBER_BUFFER", "64"),
            ("WATCH_INTERVAL_SECS", " 5 "),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.subscriber_buffer, 64);
        assert_eq!(config.watch_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_rejects_zero_and_garbage() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("SUBSCRIBER_BUFFER", "0")])),
            Err(VoteError::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("WATCH_INTERVAL_SECS", "soon")])),
            Err(VoteError::Config(_))
        ));
    }
}
