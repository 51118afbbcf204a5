//! Ingestion pipeline configuration.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::pool::{
    WorkerPoolConfig, DEFAULT_HANDLER_TIMEOUT_MS, DEFAULT_SHUTDOWN_TIMEOUT_MS,
    DEFAULT_THREAD_STACK_SIZE,
};
use crate::core::admission::{AdmissionPolicy, MAX_DATAGRAM_SIZE};
use crate::core::metrics::DEFAULT_LATENCY_SAMPLES;

/// Environment variable naming a JSON config file for [`IngestConfig::from_env`].
pub const CONFIG_FILE_VAR: &str = "INGEST_CONFIG_FILE";

/// Field count of the task-lifecycle category, category tag included.
pub const TASK_LIFECYCLE_FIELDS: usize = 11;

/// Global admission rate limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Whether admissions are limited.
    pub enabled: bool,
    /// Admissions allowed per minute when enabled.
    pub max_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_per_minute: 6_000,
        }
    }
}

/// Shape of one message category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Number of `;`-separated fields, category tag included.
    pub expected_fields: usize,
    /// Positions of identifier fields that get format-checked.
    #[serde(default)]
    pub identifier_fields: Vec<usize>,
}

impl CategoryConfig {
    /// Category with `expected_fields` fields and no identifier checks.
    #[must_use]
    pub const fn new(expected_fields: usize) -> Self {
        Self {
            expected_fields,
            identifier_fields: Vec::new(),
        }
    }

    /// Task lifecycle events: category; host; task name; app name; user;
    /// task ID; app ID; log timestamp; log level; execution ID; log message.
    #[must_use]
    pub fn task_lifecycle() -> Self {
        Self {
            expected_fields: TASK_LIFECYCLE_FIELDS,
            identifier_fields: vec![5, 6],
        }
    }
}

/// Root configuration for a `QueueManager`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum buffered messages before `QueueFull` drops.
    pub max_queue_size: usize,
    /// Number of workers, i.e. concurrent handler invocations.
    pub max_concurrent: usize,
    /// Maximum datagram length in bytes.
    pub max_datagram_size: usize,
    /// Fields longer than this (bytes, after trimming) are truncated.
    pub max_field_length: usize,
    /// Global admission rate limit.
    pub rate_limit: RateLimitConfig,
    /// Utilization fraction in `(0, 1]` at which backpressure is reported.
    pub backpressure_threshold: f64,
    /// Reject datagrams whose identifier fields are malformed.
    pub strict_identifiers: bool,
    /// Per-invocation handler timeout; `None` waits forever.
    pub handler_timeout_ms: Option<u64>,
    /// Bound on draining and joining workers during `stop`.
    pub shutdown_timeout_ms: u64,
    /// Latency samples kept for percentile estimation.
    pub latency_samples: usize,
    /// Known categories keyed by tag.
    pub categories: HashMap<String, CategoryConfig>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 1_000,
            max_concurrent: num_cpus::get().max(1),
            max_datagram_size: MAX_DATAGRAM_SIZE,
            max_field_length: 4_096,
            rate_limit: RateLimitConfig::default(),
            backpressure_threshold: 0.8,
            strict_identifiers: false,
            handler_timeout_ms: Some(DEFAULT_HANDLER_TIMEOUT_MS),
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
            latency_samples: DEFAULT_LATENCY_SAMPLES,
            categories: HashMap::new(),
        }
    }
}

impl IngestConfig {
    /// Default configuration with no categories.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the queue capacity.
    #[must_use]
    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    /// Set the worker count.
    #[must_use]
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// Set the maximum datagram size.
    #[must_use]
    pub fn with_max_datagram_size(mut self, max_datagram_size: usize) -> Self {
        self.max_datagram_size = max_datagram_size;
        self
    }

    /// Set the field truncation length.
    #[must_use]
    pub fn with_max_field_length(mut self, max_field_length: usize) -> Self {
        self.max_field_length = max_field_length;
        self
    }

    /// Enable the rate limit at `max_per_minute`, or disable it with `None`.
    #[must_use]
    pub fn with_rate_limit(mut self, max_per_minute: Option<u32>) -> Self {
        match max_per_minute {
            Some(max) => {
                self.rate_limit.enabled = true;
                self.rate_limit.max_per_minute = max;
            }
            None => self.rate_limit.enabled = false,
        }
        self
    }

    /// Set the backpressure threshold fraction.
    #[must_use]
    pub fn with_backpressure_threshold(mut self, threshold: f64) -> Self {
        self.backpressure_threshold = threshold;
        self
    }

    /// Toggle strict identifier checking.
    #[must_use]
    pub fn with_strict_identifiers(mut self, strict: bool) -> Self {
        self.strict_identifiers = strict;
        self
    }

    /// Set or clear the handler timeout.
    #[must_use]
    pub fn with_handler_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handler_timeout_ms = timeout.map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Set the shutdown wait.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the latency sample capacity.
    #[must_use]
    pub fn with_latency_samples(mut self, latency_samples: usize) -> Self {
        self.latency_samples = latency_samples;
        self
    }

    /// Register a category.
    #[must_use]
    pub fn with_category(mut self, tag: impl Into<String>, category: CategoryConfig) -> Self {
        self.categories.insert(tag.into(), category);
        self
    }

    /// Configured limit in admissions per minute, `None` when disabled.
    #[must_use]
    pub const fn rate_limit_per_minute(&self) -> Option<u32> {
        if self.rate_limit.enabled {
            Some(self.rate_limit.max_per_minute)
        } else {
            None
        }
    }

    /// Worker pool settings derived from this configuration.
    #[must_use]
    pub fn worker_pool(&self) -> WorkerPoolConfig {
        WorkerPoolConfig {
            worker_count: self.max_concurrent,
            handler_timeout_ms: self.handler_timeout_ms,
            shutdown_timeout_ms: self.shutdown_timeout_ms,
            thread_stack_size: DEFAULT_THREAD_STACK_SIZE,
        }
    }

    /// Admission gate limits derived from this configuration.
    #[must_use]
    pub const fn admission_policy(&self) -> AdmissionPolicy {
        AdmissionPolicy {
            max_datagram_size: self.max_datagram_size,
            max_field_length: self.max_field_length,
            strict_identifiers: self.strict_identifiers,
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_queue_size == 0 {
            return Err("max_queue_size must be greater than 0".into());
        }
        if self.max_datagram_size == 0 || self.max_datagram_size > MAX_DATAGRAM_SIZE {
            return Err(format!(
                "max_datagram_size must be in 1..={MAX_DATAGRAM_SIZE}"
            ));
        }
        if self.max_field_length == 0 {
            return Err("max_field_length must be greater than 0".into());
        }
        if !(self.backpressure_threshold > 0.0 && self.backpressure_threshold <= 1.0) {
            return Err("backpressure_threshold must be in (0, 1]".into());
        }
        if self.rate_limit.enabled && self.rate_limit.max_per_minute == 0 {
            return Err("rate_limit.max_per_minute must be greater than 0 when enabled".into());
        }
        if self.latency_samples == 0 {
            return Err("latency_samples must be greater than 0".into());
        }
        for (tag, category) in &self.categories {
            if tag.is_empty()
                || tag.trim() != tag
                || tag.contains(crate::core::admission::FIELD_DELIMITER)
            {
                return Err(format!("category tag `{tag}` is invalid"));
            }
            if tag.len() > self.max_field_length {
                return Err(format!(
                    "category tag `{tag}` is longer than max_field_length ({})",
                    self.max_field_length
                ));
            }
            if category.expected_fields == 0 {
                return Err(format!("category `{tag}` invalid: expected_fields must be greater than 0"));
            }
            if let Some(idx) = category
                .identifier_fields
                .iter()
                .find(|idx| **idx >= category.expected_fields)
            {
                return Err(format!(
                    "category `{tag}` invalid: identifier field {idx} out of range"
                ));
            }
        }
        self.worker_pool().validate()
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from the process environment.
    ///
    /// Reads `.env` if present, starts from the JSON file named by
    /// `INGEST_CONFIG_FILE` (or defaults), then applies `INGEST_*` overrides.
    ///
    /// # Errors
    ///
    /// Returns a read, parse or validation message.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        let mut cfg = match std::env::var(CONFIG_FILE_VAR) {
            Ok(path) => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| format!("cannot read {path}: {e}"))?;
                serde_json::from_str(&text).map_err(|e| format!("parse error in {path}: {e}"))?
            }
            Err(_) => Self::default(),
        };
        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `INGEST_*` overrides looked up through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first variable that fails to parse.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, String> {
            raw.trim()
                .parse()
                .map_err(|_| format!("{key}: cannot parse `{raw}`"))
        }

        if let Some(v) = lookup("INGEST_MAX_QUEUE_SIZE") {
            self.max_queue_size = parse("INGEST_MAX_QUEUE_SIZE", &v)?;
        }
        if let Some(v) = lookup("INGEST_MAX_CONCURRENT") {
            self.max_concurrent = parse("INGEST_MAX_CONCURRENT", &v)?;
        }
        if let Some(v) = lookup("INGEST_MAX_DATAGRAM_SIZE") {
            self.max_datagram_size = parse("INGEST_MAX_DATAGRAM_SIZE", &v)?;
        }
        if let Some(v) = lookup("INGEST_MAX_FIELD_LENGTH") {
            self.max_field_length = parse("INGEST_MAX_FIELD_LENGTH", &v)?;
        }
        if let Some(v) = lookup("INGEST_RATE_LIMIT_ENABLED") {
            self.rate_limit.enabled = parse("INGEST_RATE_LIMIT_ENABLED", &v)?;
        }
        if let Some(v) = lookup("INGEST_RATE_LIMIT_PER_MINUTE") {
            self.rate_limit.max_per_minute = parse("INGEST_RATE_LIMIT_PER_MINUTE", &v)?;
        }
        if let Some(v) = lookup("INGEST_BACKPRESSURE_THRESHOLD") {
            self.backpressure_threshold = parse("INGEST_BACKPRESSURE_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("INGEST_STRICT_IDENTIFIERS") {
            self.strict_identifiers = parse("INGEST_STRICT_IDENTIFIERS", &v)?;
        }
        if let Some(v) = lookup("INGEST_HANDLER_TIMEOUT_MS") {
            let ms: u64 = parse("INGEST_HANDLER_TIMEOUT_MS", &v)?;
            self.handler_timeout_ms = (ms > 0).then_some(ms);
        }
        if let Some(v) = lookup("INGEST_SHUTDOWN_TIMEOUT_MS") {
            self.shutdown_timeout_ms = parse("INGEST_SHUTDOWN_TIMEOUT_MS", &v)?;
        }
        Ok(())
    }
}
