//! Admission gate: size, encoding and shape checks for raw datagrams.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::metrics::MetricsAggregator;
use crate::util::clock::SharedClock;

/// Largest payload a UDP datagram can carry over IPv4.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Field separator in the wire format.
pub const FIELD_DELIMITER: char = ';';

/// Why a datagram was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Empty, or larger than the configured maximum.
    Oversized,
    /// Not valid UTF-8.
    MalformedEncoding,
    /// Wrong number of `;`-separated fields, or an unconfigured category.
    FieldCountMismatch,
    /// An identifier field failed its format check in strict mode.
    InvalidIdentifier,
    /// Rejected by the global rate limiter.
    RateLimited,
    /// The queue was at capacity.
    QueueFull,
}

impl DropReason {
    /// Stable label for logs and metric tags.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Oversized => "oversized",
            Self::MalformedEncoding => "malformed_encoding",
            Self::FieldCountMismatch => "field_count_mismatch",
            Self::InvalidIdentifier => "invalid_identifier",
            Self::RateLimited => "rate_limited",
            Self::QueueFull => "queue_full",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, sanitized datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    /// Category tag (field 0).
    pub category: String,
    /// Every field, including the category, trimmed and truncated.
    pub fields: Vec<String>,
    /// Arrival time (ms).
    pub received_at_ms: u64,
}

/// Result of [`AdmissionGate::admit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The datagram passed every check.
    Accepted(ParsedMessage),
    /// The datagram was discarded.
    Rejected(DropReason),
}

/// Expected layout of one category's datagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldShape<'a> {
    /// Number of fields, category tag included.
    pub expected_fields: usize,
    /// Positions of identifier fields to format-check.
    pub identifier_fields: &'a [usize],
}

/// Limits applied by the gate.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    /// Maximum datagram length in bytes.
    pub max_datagram_size: usize,
    /// Maximum length of one field in bytes after trimming.
    pub max_field_length: usize,
    /// Reject, rather than warn about, malformed identifier fields.
    pub strict_identifiers: bool,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            max_datagram_size: MAX_DATAGRAM_SIZE,
            max_field_length: 1024,
            strict_identifiers: false,
        }
    }
}

/// Stateless validator that records its rejections.
///
/// Accepted datagrams are not counted here; the caller records them together
/// with their downstream disposition so `received` moves in lockstep with
/// `queued` and the drop counters.
pub struct AdmissionGate {
    policy: AdmissionPolicy,
    metrics: Arc<MetricsAggregator>,
    clock: SharedClock,
}

impl AdmissionGate {
    /// Create a gate.
    pub fn new(policy: AdmissionPolicy, metrics: Arc<MetricsAggregator>, clock: SharedClock) -> Self {
        Self {
            policy,
            metrics,
            clock,
        }
    }

    /// Validate `raw` against a fixed field count, checking identifier shape
    /// at the given field positions.
    pub fn admit(&self, raw: &[u8], expected_fields: usize, identifier_fields: &[usize]) -> Admission {
        self.admit_with(raw, |_| {
            Some(FieldShape {
                expected_fields,
                identifier_fields,
            })
        })
    }

    /// Validate `raw`, resolving the expected shape from its category tag.
    ///
    /// A category for which `shape_of` returns `None` is rejected as
    /// `FieldCountMismatch`, after the size and encoding checks.
    pub fn admit_with<'a, F>(&self, raw: &[u8], shape_of: F) -> Admission
    where
        F: FnOnce(&str) -> Option<FieldShape<'a>>,
    {
        match self.check(raw, shape_of) {
            Ok(message) => Admission::Accepted(message),
            Err(reason) => {
                debug!(reason = %reason, len = raw.len(), "datagram rejected at admission");
                self.metrics.record_rejected(reason);
                Admission::Rejected(reason)
            }
        }
    }

    fn check<'a, F>(&self, raw: &[u8], shape_of: F) -> Result<ParsedMessage, DropReason>
    where
        F: FnOnce(&str) -> Option<FieldShape<'a>>,
    {
        if raw.is_empty() || raw.len() > self.policy.max_datagram_size {
            return Err(DropReason::Oversized);
        }
        let text = std::str::from_utf8(raw).map_err(|_| DropReason::MalformedEncoding)?;

        let category = text.split(FIELD_DELIMITER).next().unwrap_or_default().trim();
        let shape = shape_of(category).ok_or(DropReason::FieldCountMismatch)?;
        // count before allocating anything per field
        if text.matches(FIELD_DELIMITER).count() + 1 != shape.expected_fields {
            return Err(DropReason::FieldCountMismatch);
        }
        let fields: Vec<String> = text
            .split(FIELD_DELIMITER)
            .map(|f| truncate(f.trim(), self.policy.max_field_length).to_owned())
            .collect();

        for &idx in shape.identifier_fields {
            let Some(value) = fields.get(idx) else { continue };
            if !is_identifier(value) {
                if self.policy.strict_identifiers {
                    return Err(DropReason::InvalidIdentifier);
                }
                warn!(field = idx, value = %value, "identifier field has unexpected format");
            }
        }

        Ok(ParsedMessage {
            category: fields[0].clone(),
            fields,
            received_at_ms: self.clock.now_ms(),
        })
    }

    /// The gate's limits.
    #[must_use]
    pub const fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }
}

/// Cut `s` to at most `max` bytes on a char boundary.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Task and application identifiers: non-empty ASCII alphanumerics plus `-_.:`.
fn is_identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':'))
}
