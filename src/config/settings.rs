//! Daemon configuration, loaded from a TOML file.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::DispatchError;

/// Logging configuration (`[logging]` table).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    /// `tracing` level filter directive, e.g. `"info"` or `"debug"`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional additional `EnvFilter` directive string, merged with `level`.
    pub filter: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            filter: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Daemon configuration, loaded from a TOML file with
/// `#[serde(deny_unknown_fields)]` so a typo'd key fails loudly at startup
/// rather than being silently ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Queue broker host.
    pub queue_host: String,
    /// Queue broker port.
    pub queue_port: u16,
    /// Queue broker space/namespace.
    pub queue_space: u32,
    /// Queue broker tube, used when `input_queue_tube`/`output_queue_tube`
    /// are not overridden.
    pub queue_tube: String,
    /// Inbound host override, for the URL-check worker. The input and
    /// output tubes may live on entirely independent broker instances.
    pub input_queue_host: Option<String>,
    /// Inbound port override, for the URL-check worker.
    pub input_queue_port: Option<u16>,
    /// Inbound space override, for the URL-check worker.
    pub input_queue_space: Option<u32>,
    /// Inbound tube override, for the URL-check worker.
    pub input_queue_tube: Option<String>,
    /// Outbound host override, for the URL-check worker.
    pub output_queue_host: Option<String>,
    /// Outbound port override, for the URL-check worker.
    pub output_queue_port: Option<u16>,
    /// Outbound space override, for the URL-check worker.
    pub output_queue_space: Option<u32>,
    /// Outbound tube override, for the URL-check worker.
    pub output_queue_tube: Option<String>,
    /// Per-`take` lease-wait, in seconds.
    pub queue_take_timeout: u64,
    /// Worker pool capacity (`WORKER_POOL_SIZE`).
    pub worker_pool_size: usize,
    /// Inter-iteration sleep, in seconds, on a clean dispatch loop iteration.
    pub sleep: u64,
    /// Supervisor cooldown, in seconds, after a dispatch loop crash.
    pub sleep_on_fail: u64,
    /// HTTP connect timeout, in seconds.
    pub http_connection_timeout: u64,
    /// HTTP total request timeout, in seconds.
    pub http_timeout: u64,
    /// Whether to verify TLS certificates on the notification callback.
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
    /// Maximum redirect hops the URL-check worker's analyzer will follow.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// `User-Agent` header sent by the URL-check worker's analyzer.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Delay, in seconds, before a recheck re-enqueue becomes ready.
    pub recheck_delay: u64,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// TLS verification default, matching the ground-truth system's observed
/// behavior: `original_source/source/tests/test_notification_pusher.py`'s
/// `test_add_worker` shows every delivery greenlet is spawned with
/// `verify=False` unconditionally, so the callback HTTP layer never
/// verifies certificates. `verify_tls` exists as a config knob an operator
/// can flip on, but it defaults to matching the original rather than to
/// the "more secure" alternative.
fn default_verify_tls() -> bool {
    false
}

fn default_max_redirects() -> usize {
    10
}

fn default_user_agent() -> String {
    "dispatchd/url-check-worker".to_string()
}

impl Settings {
    /// Load and validate settings from the TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Config`] if the file cannot be read, is not
    /// valid TOML, contains an unrecognized key, or fails validation.
    pub fn load(path: &Path) -> Result<Self, DispatchError> {
        let raw = fs::read_to_string(path).map_err(|e| DispatchError::Config(format!("{}: {e}", path.display())))?;
        let settings: Self = toml::from_str(&raw).map_err(|e| DispatchError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate field-level invariants `serde` cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Config`] on the first invalid field found.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.worker_pool_size == 0 {
            return Err(DispatchError::Config("worker_pool_size must be greater than 0".into()));
        }
        if self.queue_tube.is_empty() {
            return Err(DispatchError::Config("queue_tube must not be empty".into()));
        }
        Ok(())
    }

    /// Per-`take` lease-wait as a [`Duration`].
    #[must_use]
    pub fn take_timeout(&self) -> Duration {
        Duration::from_secs(self.queue_take_timeout)
    }

    /// Clean-iteration inter-loop sleep as a [`Duration`].
    #[must_use]
    pub fn sleep(&self) -> Duration {
        Duration::from_secs(self.sleep)
    }

    /// Post-crash supervisor cooldown as a [`Duration`].
    #[must_use]
    pub fn sleep_on_fail(&self) -> Duration {
        Duration::from_secs(self.sleep_on_fail)
    }

    /// HTTP connect timeout as a [`Duration`].
    #[must_use]
    pub fn http_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.http_connection_timeout)
    }

    /// HTTP total request timeout as a [`Duration`].
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout)
    }

    /// Recheck re-enqueue delay as a [`Duration`].
    #[must_use]
    pub fn recheck_delay(&self) -> Duration {
        Duration::from_secs(self.recheck_delay)
    }

    /// Resolved inbound host for the URL-check worker, falling back to
    /// `queue_host` when no override is set.
    #[must_use]
    pub fn resolved_input_host(&self) -> &str {
        self.input_queue_host.as_deref().unwrap_or(&self.queue_host)
    }

    /// Resolved inbound port for the URL-check worker, falling back to
    /// `queue_port` when no override is set.
    #[must_use]
    pub fn resolved_input_port(&self) -> u16 {
        self.input_queue_port.unwrap_or(self.queue_port)
    }

    /// Resolved inbound space for the URL-check worker, falling back to
    /// `queue_space` when no override is set.
    #[must_use]
    pub fn resolved_input_space(&self) -> u32 {
        self.input_queue_space.unwrap_or(self.queue_space)
    }

    /// Resolved inbound tube for the URL-check worker, falling back to
    /// `queue_tube` when no override is set.
    #[must_use]
    pub fn resolved_input_tube(&self) -> &str {
        self.input_queue_tube.as_deref().unwrap_or(&self.queue_tube)
    }

    /// Resolved outbound host for the URL-check worker, falling back to
    /// `queue_host` when no override is set.
    #[must_use]
    pub fn resolved_output_host(&self) -> &str {
        self.output_queue_host.as_deref().unwrap_or(&self.queue_host)
    }

    /// Resolved outbound port for the URL-check worker, falling back to
    /// `queue_port` when no override is set.
    #[must_use]
    pub fn resolved_output_port(&self) -> u16 {
        self.output_queue_port.unwrap_or(self.queue_port)
    }

    /// Resolved outbound space for the URL-check worker, falling back to
    /// `queue_space` when no override is set.
    #[must_use]
    pub fn resolved_output_space(&self) -> u32 {
        self.output_queue_space.unwrap_or(self.queue_space)
    }

    /// Resolved outbound tube for the URL-check worker, falling back to
    /// `queue_tube` when no override is set.
    #[must_use]
    pub fn resolved_output_tube(&self) -> &str {
        self.output_queue_tube.as_deref().unwrap_or(&self.queue_tube)
    }
}
