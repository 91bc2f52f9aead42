//! Worker configuration read from the environment.

use std::time::Duration;

use crm_core::handler::RetryPolicy;
use crm_core::policy::DispatchPolicy;
use crm_dispatch::dispatcher::DispatcherConfig;

use crate::error::AppError;

/// Revision of a denylist given through `EVENT_BUFFER_DENYLIST`.
const CONFIGURED_DENYLIST_VERSION: u32 = 2;

/// Settings of the worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Address to bind the HTTP server to.
    pub host: String,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Upper bound on pooled database connections.
    pub database_max_connections: u32,
    /// Time between two event-buffer drains.
    pub event_buffer_tick: Duration,
    /// Attempts per command on optimistic-lock conflicts.
    pub retries_on_optimistic_lock: u32,
    /// Replaces the default dispatch denylist when set.
    pub event_buffer_denylist: Option<Vec<String>>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            host: "0.0.0.0".to_owned(),
            port: 3000,
            database_max_connections: 10,
            event_buffer_tick: Duration::from_secs(30),
            retries_on_optimistic_lock: 5,
            event_buffer_denylist: None,
        }
    }
}

impl WorkerConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or a numeric
    /// variable does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`; unset variables take their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or a numeric
    /// variable does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                AppError::Config("DATABASE_URL environment variable must be set".to_owned())
            })?;
        let event_buffer_denylist = lookup("EVENT_BUFFER_DENYLIST").map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|event_type| !event_type.is_empty())
                .map(str::to_owned)
                .collect()
        });
        Ok(Self {
            database_url,
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse(&lookup, "PORT", defaults.port)?,
            database_max_connections: parse(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            event_buffer_tick: Duration::from_secs(parse(
                &lookup,
                "EVENT_BUFFER_TICK_SECS",
                defaults.event_buffer_tick.as_secs(),
            )?),
            retries_on_optimistic_lock: parse(
                &lookup,
                "RETRIES_ON_OPTIMISTIC_LOCK",
                defaults.retries_on_optimistic_lock,
            )?,
            event_buffer_denylist,
        })
    }

    /// Retry policy for command handlers.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_attempts(self.retries_on_optimistic_lock)
    }

    /// Settings of the event-buffer dispatcher.
    #[must_use]
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        let policy = match &self.event_buffer_denylist {
            Some(denylist) => {
                DispatchPolicy::with_denylist(CONFIGURED_DENYLIST_VERSION, denylist.iter().cloned())
            }
            None => DispatchPolicy::default(),
        };
        DispatcherConfig {
            interval: self.event_buffer_tick,
            policy,
        }
    }
}

fn parse<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} must be a valid number: {e}"))),
        None => Ok(default),
    }
}
