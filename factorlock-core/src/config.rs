//! Controller configuration.

use serde::{Deserialize, Serialize};

use crate::error::FactorLockError;

/// Default location the page is sent to after an identity mismatch.
pub const DEFAULT_VIOLATION_REDIRECT: &str = "/?security_violation=true";

/// Timings used by the success sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceTiming {
    /// How long the car-door animation runs before the welcome presentation.
    pub door_duration_ms: u64,
    /// How long the welcome presentation stays up before it auto-dismisses.
    pub welcome_duration_ms: u64,
}

impl Default for SequenceTiming {
    fn default() -> Self {
        Self {
            door_duration_ms: 3000,
            welcome_duration_ms: 5000,
        }
    }
}

/// Configuration for a [`crate::ValidationController`].
///
/// Every field has a default; a JSON document only needs the fields it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Number of validated factors needed before the controller acts.
    pub min_factors: usize,
    /// Delay between the violation alert and the redirect.
    pub redirect_delay_ms: u64,
    /// Where to send the page after an identity mismatch.
    pub violation_redirect: String,
    /// Success sequence timings.
    pub sequence: SequenceTiming,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            min_factors: 2,
            redirect_delay_ms: 3000,
            violation_redirect: DEFAULT_VIOLATION_REDIRECT.to_string(),
            sequence: SequenceTiming::default(),
        }
    }
}

impl ControllerConfig {
    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`FactorLockError::InvalidInput`] if the document is malformed or
    /// asks for fewer than two factors.
    pub fn from_json(json: &str) -> Result<Self, FactorLockError> {
        let config: Self =
            serde_json::from_str(json).map_err(|err| FactorLockError::InvalidInput {
                attribute: "config".to_string(),
                reason: err.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`FactorLockError::InvalidInput`] when `min_factors < 2` or the
    /// redirect location is empty.
    pub fn validate(&self) -> Result<(), FactorLockError> {
        if self.min_factors < 2 {
            return Err(FactorLockError::InvalidInput {
                attribute: "min_factors".to_string(),
                reason: "at least two factors are needed for a same-user check"
                    .to_string(),
            });
        }
        if self.violation_redirect.trim().is_empty() {
            return Err(FactorLockError::InvalidInput {
                attribute: "violation_redirect".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.min_factors, 2);
        assert_eq!(config.redirect_delay_ms, 3000);
        assert_eq!(config.violation_redirect, "/?security_violation=true");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ControllerConfig::from_json(
            r#"{"redirect_delay_ms": 10, "sequence": {"door_duration_ms": 1}}"#,
        )
        .unwrap();
        assert_eq!(config.redirect_delay_ms, 10);
        assert_eq!(config.min_factors, 2);
        assert_eq!(config.sequence.door_duration_ms, 1);
        assert_eq!(config.sequence.welcome_duration_ms, 5000);
    }

    #[test]
    fn test_rejects_single_factor() {
        let err = ControllerConfig::from_json(r#"{"min_factors": 1}"#).unwrap_err();
        assert!(matches!(
            err,
            FactorLockError::InvalidInput { attribute, .. } if attribute == "min_factors"
        ));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(ControllerConfig::from_json("{").is_err());
    }
}
