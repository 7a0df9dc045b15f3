//! Engine configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use crate::CoreError;

/// Default execution ceiling per activeflow
pub const DEFAULT_MAX_EXECUTE_COUNT: u64 = 100;

/// Default bound on one synchronous advance loop
pub const DEFAULT_MAX_NEXT_ACTION_LOOP: usize = 1000;

/// Default nesting limit for pushed stacks
pub const DEFAULT_MAX_STACK_DEPTH: usize = 32;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Advances allowed per activeflow before it is forcibly ended
    pub max_execute_count: u64,
    /// Iterations of one synchronous advance loop before the flow is stopped
    pub max_next_action_loop: usize,
    /// Maximum nesting of pushed stacks (the main stack counts as depth 1)
    pub max_stack_depth: usize,
    /// Lease duration of the per-activeflow lock
    pub lock_ttl: Duration,
    /// How many times a busy lock is retried before giving up
    pub lock_retry_count: u32,
    /// Pause between lock retries
    pub lock_retry_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_execute_count: DEFAULT_MAX_EXECUTE_COUNT,
            max_next_action_loop: DEFAULT_MAX_NEXT_ACTION_LOOP,
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            lock_ttl: Duration::from_millis(10_000),
            lock_retry_count: 5,
            lock_retry_interval: Duration::from_millis(100),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `ACTIVEFLOW_MAX_EXECUTE_COUNT` (default: 100)
    /// - `ACTIVEFLOW_MAX_NEXT_ACTION_LOOP` (default: 1000)
    /// - `ACTIVEFLOW_MAX_STACK_DEPTH` (default: 32)
    /// - `ACTIVEFLOW_LOCK_TTL_MS` (default: 10000)
    /// - `ACTIVEFLOW_LOCK_RETRY_COUNT` (default: 5)
    /// - `ACTIVEFLOW_LOCK_RETRY_INTERVAL_MS` (default: 100)
    pub fn from_env() -> Result<Self, CoreError> {
        let defaults = Self::default();

        let max_stack_depth: usize =
            env_or("ACTIVEFLOW_MAX_STACK_DEPTH", defaults.max_stack_depth)?;
        if max_stack_depth == 0 {
            return Err(CoreError::ConfigurationError(
                "ACTIVEFLOW_MAX_STACK_DEPTH must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            max_execute_count: env_or("ACTIVEFLOW_MAX_EXECUTE_COUNT", defaults.max_execute_count)?,
            max_next_action_loop: env_or(
                "ACTIVEFLOW_MAX_NEXT_ACTION_LOOP",
                defaults.max_next_action_loop,
            )?,
            max_stack_depth,
            lock_ttl: Duration::from_millis(env_or("ACTIVEFLOW_LOCK_TTL_MS", 10_000u64)?),
            lock_retry_count: env_or("ACTIVEFLOW_LOCK_RETRY_COUNT", defaults.lock_retry_count)?,
            lock_retry_interval: Duration::from_millis(env_or(
                "ACTIVEFLOW_LOCK_RETRY_INTERVAL_MS",
                100u64,
            )?),
        })
    }
}

fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, CoreError> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            CoreError::ConfigurationError(format!("invalid value for {}: {}", key, raw))
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Serializes tests that touch the process environment
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            Self { vars: Vec::new() }
        }

        fn set(&mut self, key: &str, value: &str) {
            self.vars.push((key.to_string(), env::var(key).ok()));
            env::set_var(key, value);
        }

        fn remove(&mut self, key: &str) {
            self.vars.push((key.to_string(), env::var(key).ok()));
            env::remove_var(key);
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.drain(..).rev() {
                match value {
                    Some(v) => env::set_var(&key, v),
                    None => env::remove_var(&key),
                }
            }
        }
    }

    const KEYS: [&str; 6] = [
        "ACTIVEFLOW_MAX_EXECUTE_COUNT",
        "ACTIVEFLOW_MAX_NEXT_ACTION_LOOP",
        "ACTIVEFLOW_MAX_STACK_DEPTH",
        "ACTIVEFLOW_LOCK_TTL_MS",
        "ACTIVEFLOW_LOCK_RETRY_COUNT",
        "ACTIVEFLOW_LOCK_RETRY_INTERVAL_MS",
    ];

    #[test]
    fn test_config_from_env_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        for key in KEYS {
            guard.remove(key);
        }

        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_execute_count, 100);
    }

    #[test]
    fn test_config_from_env_all_custom() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        guard.set("ACTIVEFLOW_MAX_EXECUTE_COUNT", "250");
        guard.set("ACTIVEFLOW_MAX_NEXT_ACTION_LOOP", "50");
        guard.set("ACTIVEFLOW_MAX_STACK_DEPTH", "8");
        guard.set("ACTIVEFLOW_LOCK_TTL_MS", "3000");
        guard.set("ACTIVEFLOW_LOCK_RETRY_COUNT", "0");
        guard.set("ACTIVEFLOW_LOCK_RETRY_INTERVAL_MS", "20");

        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.max_execute_count, 250);
        assert_eq!(config.max_next_action_loop, 50);
        assert_eq!(config.max_stack_depth, 8);
        assert_eq!(config.lock_ttl, Duration::from_secs(3));
        assert_eq!(config.lock_retry_count, 0);
        assert_eq!(config.lock_retry_interval, Duration::from_millis(20));
    }

    #[test]
    fn test_config_invalid_number() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        for key in KEYS {
            guard.remove(key);
        }
        guard.set("ACTIVEFLOW_MAX_EXECUTE_COUNT", "lots");

        let err = EngineConfig::from_env().unwrap_err();
        assert!(matches!(err, CoreError::ConfigurationError(_)));
        assert!(err.to_string().contains("ACTIVEFLOW_MAX_EXECUTE_COUNT"));
    }

    #[test]
    fn test_config_rejects_zero_stack_depth() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        for key in KEYS {
            guard.remove(key);
        }
        guard.set("ACTIVEFLOW_MAX_STACK_DEPTH", "0");

        assert!(EngineConfig::from_env().is_err());
    }
}
