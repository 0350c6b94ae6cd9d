use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};

/// A `Factor` is one biometric or proximity channel a user can validate with.
///
/// The set is closed: capture widgets can only report results for these four.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumString,
    Display,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Factor {
    /// Face image matched against enrolled face encodings.
    Face,
    /// Voice recording matched against enrolled voice features.
    Voice,
    /// Retina image matched against enrolled retina features.
    Retina,
    /// "Something you have": key fob, phone, Bluetooth or NFC tag in range.
    Proximity,
}

impl Factor {
    /// Every factor, in storage order.
    pub const ALL: [Self; 4] = [Self::Face, Self::Voice, Self::Retina, Self::Proximity];

    /// Parses a factor name as sent by capture widgets (`"face"`, `"Voice"`, ...).
    ///
    /// # Errors
    ///
    /// Returns [`crate::FactorLockError::UnknownFactor`] for anything outside the closed set.
    pub fn parse(name: &str) -> Result<Self, crate::FactorLockError> {
        name.trim()
            .parse()
            .map_err(|_| crate::FactorLockError::UnknownFactor(name.to_string()))
    }
}

/// Identity the server associated with an accepted sample.
///
/// The server sends numeric ids while pages often carry them around as strings.
/// Ids are kept in their string form so `7` and `"7"` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a user id from its string form.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct UserIdVisitor;

        impl de::Visitor<'_> for UserIdVisitor {
            type Value = UserId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a user id as a string or an integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(UserId::from(v))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(UserId::from(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(UserId::from(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(UserId::from(v))
            }
        }

        deserializer.deserialize_any(UserIdVisitor)
    }
}
