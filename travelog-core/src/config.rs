//! Runtime tunables for the error log, notifications, sweeps and limits.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    DEFAULT_CONTEXT_VALUE_MAX_LEN, DEFAULT_ERROR_LOG_CAPACITY, DEFAULT_JSON_PREVIEW_LEN,
    DEFAULT_MEMO_MAX_LEN, DEFAULT_NOTIFICATION_TIMEOUT_MS, DEFAULT_SWEEP_INTERVAL_MS,
};

/// Errors raised when configuration invariants are violated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("configuration is not valid JSON: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelLogConfig {
    /// Ring capacity of the in-memory error log
    #[serde(default = "TravelLogConfig::default_error_log_capacity")]
    pub error_log_capacity: usize,
    /// How long a user-facing notification stays visible
    #[serde(default = "TravelLogConfig::default_notification_timeout_ms")]
    pub notification_timeout_ms: u32,
    /// Interval of the detached-target listener sweep
    #[serde(default = "TravelLogConfig::default_sweep_interval_ms")]
    pub sweep_interval_ms: u32,
    /// String context values longer than this are truncated
    #[serde(default = "TravelLogConfig::default_context_value_max_len")]
    pub context_value_max_len: usize,
    /// Characters of malformed JSON kept for diagnostics
    #[serde(default = "TravelLogConfig::default_json_preview_len")]
    pub json_preview_len: usize,
    #[serde(default = "TravelLogConfig::default_memo_max_len")]
    pub memo_max_len: usize,
}

impl TravelLogConfig {
    const fn default_error_log_capacity() -> usize {
        DEFAULT_ERROR_LOG_CAPACITY
    }

    const fn default_notification_timeout_ms() -> u32 {
        DEFAULT_NOTIFICATION_TIMEOUT_MS
    }

    const fn default_sweep_interval_ms() -> u32 {
        DEFAULT_SWEEP_INTERVAL_MS
    }

    const fn default_context_value_max_len() -> usize {
        DEFAULT_CONTEXT_VALUE_MAX_LEN
    }

    const fn default_json_preview_len() -> usize {
        DEFAULT_JSON_PREVIEW_LEN
    }

    const fn default_memo_max_len() -> usize {
        DEFAULT_MEMO_MAX_LEN
    }

    /// Parse and validate a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid JSON or a limit is zero.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self =
            serde_json::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check that every limit is usable.
    ///
    /// # Errors
    ///
    /// Returns the first field found to be zero.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.error_log_capacity == 0 {
            return Err(ConfigError::Zero {
                field: "errorLogCapacity",
            });
        }
        if self.notification_timeout_ms == 0 {
            return Err(ConfigError::Zero {
                field: "notificationTimeoutMs",
            });
        }
        if self.sweep_interval_ms == 0 {
            return Err(ConfigError::Zero {
                field: "sweepIntervalMs",
            });
        }
        if self.context_value_max_len == 0 {
            return Err(ConfigError::Zero {
                field: "contextValueMaxLen",
            });
        }
        if self.json_preview_len == 0 {
            return Err(ConfigError::Zero {
                field: "jsonPreviewLen",
            });
        }
        if self.memo_max_len == 0 {
            return Err(ConfigError::Zero {
                field: "memoMaxLen",
            });
        }
        Ok(())
    }
}

impl Default for TravelLogConfig {
    fn default() -> Self {
        Self {
            error_log_capacity: Self::default_error_log_capacity(),
            notification_timeout_ms: Self::default_notification_timeout_ms(),
            sweep_interval_ms: Self::default_sweep_interval_ms(),
            context_value_max_len: Self::default_context_value_max_len(),
            json_preview_len: Self::default_json_preview_len(),
            memo_max_len: Self::default_memo_max_len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = TravelLogConfig::from_json("{}").unwrap();
        assert_eq!(cfg, TravelLogConfig::default());
        assert_eq!(cfg.error_log_capacity, 100);
        assert_eq!(cfg.notification_timeout_ms, 5_000);
    }

    #[test]
    fn partial_document_overrides_named_fields() {
        let cfg = TravelLogConfig::from_json(r#"{"errorLogCapacity": 10, "memoMaxLen": 80}"#)
            .unwrap();
        assert_eq!(cfg.error_log_capacity, 10);
        assert_eq!(cfg.memo_max_len, 80);
        assert_eq!(cfg.sweep_interval_ms, 30_000);
    }

    #[test]
    fn zero_limits_are_rejected() {
        let err = TravelLogConfig::from_json(r#"{"sweepIntervalMs": 0}"#).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Zero {
                field: "sweepIntervalMs"
            }
        );
        assert!(matches!(
            TravelLogConfig::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
