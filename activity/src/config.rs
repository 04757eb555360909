use std::net::SocketAddr;
use std::num::{NonZeroU32, NonZeroUsize};

use anyhow::{anyhow, bail};
use envconfig::Envconfig;

// One year
pub const MAX_WINDOW_HOURS: u32 = 24 * 366;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "0.0.0.0:5000")]
    pub address: SocketAddr,

    #[envconfig(default = "https://api.github.com")]
    pub feed_base_url: String,

    // Used when a poll request names no repo, and by the background poller
    #[envconfig(default = "torvalds/linux")]
    pub default_repo: String,

    pub github_token: Option<String>,

    #[envconfig(default = "activity-dashboard")]
    pub user_agent: String,

    #[envconfig(default = "200")]
    pub max_capacity: NonZeroUsize,

    #[envconfig(default = "24")]
    pub window_hours: NonZeroU32,

    #[envconfig(default = "1024")]
    pub payload_excerpt_bytes: usize,

    #[envconfig(default = "5")]
    pub sample_size: usize,

    // 0 disables background polling, ingestion then only happens on request
    #[envconfig(default = "0")]
    pub poll_interval_secs: u64,

    #[envconfig(default = "10")]
    pub fetch_timeout_secs: u64,

    #[envconfig(default = "1000000")]
    pub max_webhook_body_bytes: usize,

    #[envconfig(default = "64")]
    pub webhook_concurrency_limit: usize,

    #[envconfig(default = "true")]
    pub export_prometheus: bool,
}

impl Config {
    /// Trailing window applied to reads, bounded so `now - window` stays
    /// representable.
    pub fn window(&self) -> anyhow::Result<time::Duration> {
        let hours = self.window_hours.get();
        if hours > MAX_WINDOW_HOURS {
            bail!(
                "WINDOW_HOURS must be at most {}, got {}",
                MAX_WINDOW_HOURS,
                hours
            );
        }
        Ok(time::Duration::hours(hours.into()))
    }

    /// How long the background poller may go without a healthy report:
    /// one missed cycle plus a fetch timeout.
    pub fn poller_deadline(&self) -> anyhow::Result<time::Duration> {
        let seconds = self
            .poll_interval_secs
            .checked_mul(2)
            .and_then(|twice| twice.checked_add(self.fetch_timeout_secs))
            .and_then(|total| i64::try_from(total).ok())
            .ok_or_else(|| {
                anyhow!(
                    "POLL_INTERVAL_SECS={} and FETCH_TIMEOUT_SECS={} overflow the poller deadline",
                    self.poll_interval_secs,
                    self.fetch_timeout_secs
                )
            })?;
        Ok(time::Duration::seconds(seconds))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use envconfig::Envconfig;

    use super::Config;

    #[test]
    fn defaults() {
        let config = Config::init_from_hashmap(&HashMap::new()).unwrap();

        assert_eq!(config.address.port(), 5000);
        assert_eq!(config.default_repo, "torvalds/linux");
        assert_eq!(config.max_capacity.get(), 200);
        assert_eq!(config.window_hours.get(), 24);
        assert_eq!(config.window().unwrap(), time::Duration::hours(24));
        assert_eq!(config.poll_interval_secs, 0);
        assert!(config.github_token.is_none());
    }

    #[test]
    fn rejects_zero_capacity() {
        let env = HashMap::from([("MAX_CAPACITY".to_string(), "0".to_string())]);
        assert!(Config::init_from_hashmap(&env).is_err());
    }

    #[test]
    fn overrides() {
        let env = HashMap::from([
            ("MAX_CAPACITY".to_string(), "100".to_string()),
            ("GITHUB_TOKEN".to_string(), "s3cr3t".to_string()),
            ("POLL_INTERVAL_SECS".to_string(), "30".to_string()),
        ]);
        let config = Config::init_from_hashmap(&env).unwrap();

        assert_eq!(config.max_capacity.get(), 100);
        assert_eq!(config.github_token.as_deref(), Some("s3cr3t"));
        assert_eq!(config.poll_interval_secs, 30);
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn rejects_non_positive_window() {
        for hours in ["0", "-5", "abc"] {
            let env = vars(&[("WINDOW_HOURS", hours)]);
            assert!(Config::init_from_hashmap(&env).is_err(), "{}", hours);
        }
    }

    #[test]
    fn rejects_oversized_window() {
        let env = vars(&[("WINDOW_HOURS", "1000000000")]);
        let config = Config::init_from_hashmap(&env).unwrap();
        assert!(config.window().is_err());

        let env = vars(&[("WINDOW_HOURS", "8784")]);
        let config = Config::init_from_hashmap(&env).unwrap();
        assert_eq!(config.window().unwrap(), time::Duration::hours(8784));
    }

    #[test]
    fn poller_deadline_allows_one_missed_cycle() {
        let env = vars(&[("POLL_INTERVAL_SECS", "30"), ("FETCH_TIMEOUT_SECS", "10")]);
        let config = Config::init_from_hashmap(&env).unwrap();
        assert_eq!(config.poller_deadline().unwrap(), time::Duration::seconds(70));
    }

    #[test]
    fn poller_deadline_overflow_is_an_error() {
        let env = vars(&[("POLL_INTERVAL_SECS", u64::MAX.to_string().as_str())]);
        let config = Config::init_from_hashmap(&env).unwrap();
        assert!(config.poller_deadline().is_err());

        // Fits in u64 but not in i64
        let env = vars(&[("POLL_INTERVAL_SECS", (u64::MAX / 4).to_string().as_str())]);
        let config = Config::init_from_hashmap(&env).unwrap();
        assert!(config.poller_deadline().is_err());
    }
}
