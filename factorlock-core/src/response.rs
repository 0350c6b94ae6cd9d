//! Validation server payloads.
//!
//! Capture widgets post samples to `/biometrics/api/validate/<factor>` and
//! hand the JSON answer to [`crate::ValidationController::apply_server_response`].

use serde::{Deserialize, Serialize};

use crate::error::FactorLockError;
use crate::factor::{Factor, UserId};

/// Path of the validation endpoint for `factor`, relative to the server root.
#[must_use]
pub fn validate_path(factor: Factor) -> String {
    format!("/biometrics/api/validate/{factor}")
}

/// A user as described by the validation server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedUser {
    /// Server-side user id.
    pub id: UserId,
    /// Display name (full name, or username when no name is on file).
    #[serde(default)]
    pub name: Option<String>,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// Account creation date, `YYYY-MM-DD`.
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A vehicle registered to the validated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Server-side vehicle id.
    pub id: u64,
    /// Manufacturer.
    pub make: String,
    /// Model name.
    pub model: String,
    /// Model year.
    #[serde(default)]
    pub year: Option<u32>,
    /// Registration plate.
    #[serde(default)]
    pub license_plate: Option<String>,
    /// Vehicle identification number.
    #[serde(default)]
    pub vin: Option<String>,
    /// Paint color.
    #[serde(default)]
    pub color: Option<String>,
}

/// User and vehicles from the last accepted sample, cached for the success sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBundle {
    /// The validated user.
    pub user: ValidatedUser,
    /// Their vehicles, possibly empty.
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
}

impl UserBundle {
    /// Label shown by the welcome presentation.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.user
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map_or_else(|| format!("User {}", self.user.id), ToString::to_string)
    }
}

/// JSON answer of the validation endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationResponse {
    /// Whether the sample matched an enrolled user.
    pub success: bool,
    /// Match confidence in `[0, 1]`.
    pub confidence: Option<f64>,
    /// The matched user, on success.
    pub user: Option<ValidatedUser>,
    /// Echo of the factor the server validated.
    pub biometric_type: Option<String>,
    /// Vehicles of the matched user.
    pub vehicles: Vec<Vehicle>,
    /// Failure description.
    pub error: Option<String>,
    /// Set when the server refused the sample as belonging to another user.
    pub security_violation: bool,
    /// Where the server wants the page sent after a violation.
    pub redirect: Option<String>,
    /// User the session's earlier factors validated for, on a violation.
    pub previous_user_id: Option<UserId>,
    /// User the refused sample matched, on a violation.
    pub current_user_id: Option<UserId>,
}

impl ValidationResponse {
    /// Parses a server answer.
    ///
    /// # Errors
    ///
    /// Returns [`FactorLockError::SerializationError`] if `json` is not a response object.
    pub fn from_json(json: &str) -> Result<Self, FactorLockError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The user bundle carried by a successful answer.
    #[must_use]
    pub fn bundle(&self) -> Option<UserBundle> {
        self.user.as_ref().filter(|_| self.success).map(|user| UserBundle {
            user: user.clone(),
            vehicles: self.vehicles.clone(),
        })
    }
}

/// What the next capture request should tell the server about earlier validations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Id of the first validated factor's user.
    pub previous_user_id: Option<UserId>,
    /// Whether another factor is already validated.
    pub is_second_validation: bool,
}

/// Body of a validation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationRequest {
    /// Data URI of the captured sample (`data:image/...;base64,...` or audio).
    pub biometric_data: String,
    /// Id of the user earlier factors validated for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_user_id: Option<UserId>,
    /// Whether this is not the first factor of the session.
    pub is_second_validation: bool,
    /// Device identifiers for the proximity factor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proximity_info: Option<serde_json::Value>,
}

impl ValidationRequest {
    /// Creates a request for a captured sample.
    #[must_use]
    pub fn new(biometric_data: impl Into<String>, context: RequestContext) -> Self {
        Self {
            biometric_data: biometric_data.into(),
            previous_user_id: context.previous_user_id,
            is_second_validation: context.is_second_validation,
            proximity_info: None,
        }
    }

    /// Attaches proximity identifiers.
    #[must_use]
    pub fn with_proximity_info(mut self, info: serde_json::Value) -> Self {
        self.proximity_info = Some(info);
        self
    }
}
