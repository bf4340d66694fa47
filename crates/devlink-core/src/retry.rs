// ── Reconnect retry policy ──
//
// Pure decision logic: given the consecutive-failure count and the
// configured ceiling, reconnect or give up.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Maximum consecutive reconnect attempts before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCeiling", into = "i64")]
pub enum RetryCeiling {
    Limited(u32),
    Unlimited,
}

impl RetryCeiling {
    /// Raw configuration value meaning "retry forever".
    pub const UNLIMITED_SENTINEL: i64 = -1;

    pub fn from_raw(raw: i64) -> Result<Self, CoreError> {
        if raw == Self::UNLIMITED_SENTINEL {
            return Ok(Self::Unlimited);
        }
        u32::try_from(raw)
            .map(Self::Limited)
            .map_err(|_| CoreError::Config {
                message: format!("max_retry must be -1 (unlimited) or 0..={}, got {raw}", u32::MAX),
            })
    }
}

impl Default for RetryCeiling {
    fn default() -> Self {
        Self::Limited(5)
    }
}

impl fmt::Display for RetryCeiling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(n) => write!(f, "{n}"),
            Self::Unlimited => f.write_str("unlimited"),
        }
    }
}

/// Accepts either an integer (with the -1 sentinel) or the word `unlimited`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawCeiling {
    Number(i64),
    Word(String),
}

impl TryFrom<RawCeiling> for RetryCeiling {
    type Error = CoreError;

    fn try_from(raw: RawCeiling) -> Result<Self, Self::Error> {
        match raw {
            RawCeiling::Number(n) => Self::from_raw(n),
            RawCeiling::Word(word) if word.eq_ignore_ascii_case("unlimited") => {
                Ok(Self::Unlimited)
            }
            RawCeiling::Word(word) => word
                .trim()
                .parse::<i64>()
                .map_err(|_| CoreError::Config {
                    message: format!("max_retry must be an integer or `unlimited`, got `{word}`"),
                })
                .and_then(Self::from_raw),
        }
    }
}

impl From<RetryCeiling> for i64 {
    fn from(ceiling: RetryCeiling) -> Self {
        match ceiling {
            RetryCeiling::Limited(n) => i64::from(n),
            RetryCeiling::Unlimited => RetryCeiling::UNLIMITED_SENTINEL,
        }
    }
}

/// Whether another reconnect attempt is allowed.
///
/// `max_retries = Limited(0)` never retries.
pub fn should_retry(consecutive_failures: u32, max_retries: RetryCeiling) -> bool {
    match max_retries {
        RetryCeiling::Unlimited => true,
        RetryCeiling::Limited(max) => consecutive_failures < max,
    }
}
