//! Runtime configuration for the message bus.
//!
//! Grounded on the teacher's `message_router::config::RouterConfig`
//! (validated nutype fields, `for_testing`/builder presets) and
//! `database::DatabaseConfig::validate`.

use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::BusError;

/// Lease duration in seconds. Also acts as the implicit timeout consumers
/// must heartbeat within one third of (spec §5).
#[nutype(
    validate(greater = 0),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, Default, TryFrom, Into),
    default = 60
)]
pub struct LeaseDurationSecs(u64);

impl LeaseDurationSecs {
    /// Converts to a `Duration`.
    #[must_use]
    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.into_inner())
    }
}

/// Maximum delivery attempts before a message is dead-lettered.
#[nutype(
    validate(greater = 0),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, Default, TryFrom, Into),
    default = 5
)]
pub struct MaxAttempts(u32);

/// Milliseconds the orchestrator sleeps between idle polls of one consumer.
#[nutype(
    validate(greater = 0),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, Default, TryFrom, Into),
    default = 50
)]
pub struct PollIntervalMs(u64);

impl PollIntervalMs {
    /// Converts to a `Duration`.
    #[must_use]
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.into_inner())
    }
}

/// Bounded depth for replan cycles before the caller must escalate to the
/// user (spec §4.7).
#[nutype(
    validate(greater = 0),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, Default, TryFrom, Into),
    default = 3
)]
pub struct ReplanMaxDepth(u32);

/// Complete bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Lease duration new leases are granted for.
    pub lease_duration: LeaseDurationSecs,
    /// Max delivery attempts before dead-lettering.
    pub max_attempts: MaxAttempts,
    /// Idle poll interval for the orchestrator's consumer loops.
    pub poll_interval_ms: PollIntervalMs,
    /// Poll interval `collect_response` uses while waiting on the router
    /// queue.
    pub collect_poll_interval_ms: PollIntervalMs,
    /// Total time `collect_response` waits before giving up.
    pub collect_timeout_s: u64,
    /// Poll interval the consult manager uses while waiting on the runtime
    /// queue.
    pub consult_poll_interval_ms: PollIntervalMs,
    /// Total time the consult manager waits before giving up.
    pub consult_timeout_s: u64,
    /// Bound on replan recursion depth.
    pub replan_max_depth: ReplanMaxDepth,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("conduit-bus.db"),
            lease_duration: LeaseDurationSecs::default(),
            max_attempts: MaxAttempts::default(),
            poll_interval_ms: PollIntervalMs::default(),
            collect_poll_interval_ms: PollIntervalMs::try_new(100).unwrap_or_default(),
            collect_timeout_s: 120,
            consult_poll_interval_ms: PollIntervalMs::try_new(500).unwrap_or_default(),
            consult_timeout_s: 90,
            replan_max_depth: ReplanMaxDepth::default(),
        }
    }
}

/// Partial TOML configuration file, every field optional so a file only
/// needs to override the defaults it cares about. Field names match
/// `BusConfig`'s, flattened (no `[section]` tables), the way a small
/// single-process service's config file tends to stay flat.
#[derive(Debug, Default, Deserialize)]
struct PartialBusConfig {
    db_path: Option<PathBuf>,
    lease_duration_secs: Option<u64>,
    max_attempts: Option<u32>,
    poll_interval_ms: Option<u64>,
    collect_poll_interval_ms: Option<u64>,
    collect_timeout_s: Option<u64>,
    consult_poll_interval_ms: Option<u64>,
    consult_timeout_s: Option<u64>,
    replan_max_depth: Option<u32>,
}

impl BusConfig {
    /// Loads configuration the way the standalone server does: defaults,
    /// then a TOML file if one is named by `CONDUIT_CONFIG_FILE` (or the
    /// default `conduit-bus.toml` if that env var is unset and the file
    /// exists), then `CONDUIT_*` environment variables — each layer
    /// overriding only the fields it sets.
    ///
    /// # Errors
    ///
    /// Returns an error if the named file can't be read, its contents
    /// don't parse as TOML, or any layer sets a value that fails its
    /// field's validation.
    pub fn load() -> Result<Self, BusError> {
        let mut config = Self::default();

        let file_path = std::env::var("CONDUIT_CONFIG_FILE")
            .map(PathBuf::from)
            .ok()
            .or_else(|| Some(PathBuf::from("conduit-bus.toml")).filter(|p| p.exists()));

        if let Some(path) = file_path {
            let content = std::fs::read_to_string(&path).map_err(|e| BusError::Configuration {
                field: "config_file".to_string(),
                reason: format!("could not read {}: {e}", path.display()),
            })?;
            config.apply_toml(&content)?;
        }

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from `CONDUIT_*` environment variables layered
    /// over [`BusConfig::default`]. Unset variables keep the default.
    ///
    /// # Errors
    ///
    /// Returns an error if a set variable fails to parse into its field's
    /// type.
    pub fn from_env() -> Result<Self, BusError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Parses `content` as a [`PartialBusConfig`] TOML document and applies
    /// every field it sets onto `self`, validating each as it's applied.
    ///
    /// # Errors
    ///
    /// Returns an error if `content` doesn't parse as TOML or a set field
    /// fails validation.
    fn apply_toml(&mut self, content: &str) -> Result<(), BusError> {
        let partial: PartialBusConfig = toml::from_str(content).map_err(|e| BusError::Configuration {
            field: "config_file".to_string(),
            reason: format!("invalid TOML: {e}"),
        })?;

        if let Some(v) = partial.db_path {
            self.db_path = v;
        }
        if let Some(v) = partial.lease_duration_secs {
            self.lease_duration = LeaseDurationSecs::try_new(v).map_err(|e| BusError::Configuration {
                field: "lease_duration_secs".to_string(),
                reason: e.to_string(),
            })?;
        }
        if let Some(v) = partial.max_attempts {
            self.max_attempts = MaxAttempts::try_new(v).map_err(|e| BusError::Configuration {
                field: "max_attempts".to_string(),
                reason: e.to_string(),
            })?;
        }
        if let Some(v) = partial.poll_interval_ms {
            self.poll_interval_ms = PollIntervalMs::try_new(v).map_err(|e| BusError::Configuration {
                field: "poll_interval_ms".to_string(),
                reason: e.to_string(),
            })?;
        }
        if let Some(v) = partial.collect_poll_interval_ms {
            self.collect_poll_interval_ms =
                PollIntervalMs::try_new(v).map_err(|e| BusError::Configuration {
                    field: "collect_poll_interval_ms".to_string(),
                    reason: e.to_string(),
                })?;
        }
        if let Some(v) = partial.collect_timeout_s {
            self.collect_timeout_s = v;
        }
        if let Some(v) = partial.consult_poll_interval_ms {
            self.consult_poll_interval_ms =
                PollIntervalMs::try_new(v).map_err(|e| BusError::Configuration {
                    field: "consult_poll_interval_ms".to_string(),
                    reason: e.to_string(),
                })?;
        }
        if let Some(v) = partial.consult_timeout_s {
            self.consult_timeout_s = v;
        }
        if let Some(v) = partial.replan_max_depth {
            self.replan_max_depth = ReplanMaxDepth::try_new(v).map_err(|e| BusError::Configuration {
                field: "replan_max_depth".to_string(),
                reason: e.to_string(),
            })?;
        }

        Ok(())
    }

    /// Applies `CONDUIT_*` environment variable overrides onto `self`.
    fn apply_env(&mut self) -> Result<(), BusError> {
        let config = self;
        if let Ok(v) = std::env::var("CONDUIT_DB_PATH") {
            config.db_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("CONDUIT_LEASE_DURATION_SECS") {
            let raw: u64 = parse_field(&v, "lease_duration_secs")?;
            config.lease_duration = LeaseDurationSecs::try_new(raw).map_err(|e| BusError::Configuration {
                field: "lease_duration_secs".to_string(),
                reason: e.to_string(),
            })?;
        }
        if let Ok(v) = std::env::var("CONDUIT_MAX_ATTEMPTS") {
            let raw: u32 = parse_field(&v, "max_attempts")?;
            config.max_attempts = MaxAttempts::try_new(raw).map_err(|e| BusError::Configuration {
                field: "max_attempts".to_string(),
                reason: e.to_string(),
            })?;
        }
        if let Ok(v) = std::env::var("CONDUIT_REPLAN_MAX_DEPTH") {
            let raw: u32 = parse_field(&v, "replan_max_depth")?;
            config.replan_max_depth = ReplanMaxDepth::try_new(raw).map_err(|e| BusError::Configuration {
                field: "replan_max_depth".to_string(),
                reason: e.to_string(),
            })?;
        }

        Ok(())
    }

    /// A config suitable for unit/integration tests: a throwaway path is
    /// expected to be overwritten by the caller, short timeouts so test
    /// failures don't hang the suite.
    #[must_use]
    pub fn for_testing(db_path: PathBuf) -> Self {
        Self {
            db_path,
            collect_timeout_s: 5,
            consult_timeout_s: 5,
            ..Self::default()
        }
    }

    /// Validates cross-field invariants beyond what the nutype field
    /// validators already enforce.
    ///
    /// # Errors
    ///
    /// Returns an error if `db_path` is empty.
    pub fn validate(&self) -> Result<(), BusError> {
        if self.db_path.as_os_str().is_empty() {
            return Err(BusError::Configuration {
                field: "db_path".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_field<T>(raw: &str, field: &'static str) -> Result<T, BusError>
where
    T: std::str::FromStr,
{
    raw.parse().map_err(|_| BusError::Configuration {
        field: field.to_string(),
        reason: format!("could not parse {raw:?}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(BusConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_db_path_fails_validation() {
        let config = BusConfig {
            db_path: PathBuf::new(),
            ..BusConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn lease_duration_rejects_zero() {
        assert!(LeaseDurationSecs::try_new(0).is_err());
    }

    #[test]
    fn toml_overrides_only_the_fields_it_sets() {
        let mut config = BusConfig::default();
        config
            .apply_toml("max_attempts = 9\ndb_path = \"/tmp/custom.db\"\n")
            .unwrap();

        assert_eq!(config.max_attempts.into_inner(), 9);
        assert_eq!(config.db_path, PathBuf::from("/tmp/custom.db"));
        // Untouched fields keep their default.
        assert_eq!(config.lease_duration, LeaseDurationSecs::default());
    }

    #[test]
    fn toml_rejects_invalid_syntax() {
        let mut config = BusConfig::default();
        assert!(config.apply_toml("not valid toml {{{").is_err());
    }

    #[test]
    fn toml_rejects_a_field_that_fails_validation() {
        let mut config = BusConfig::default();
        assert!(config.apply_toml("max_attempts = 0\n").is_err());
    }
}
