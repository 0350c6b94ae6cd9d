//! Same-user consistency checks over the persistent validation state.
//!
//! These are pure functions; recording a violation is the controller's job.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::factor::{Factor, UserId};
use crate::state::PersistentState;

/// What detected an identity mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Validated factors carry different user ids.
    UserMismatch,
    /// The state changed between the success trigger and rendering.
    RenderMismatch,
    /// The validation server itself refused the sample as another user's.
    ServerReported,
}

/// Diagnostic record of an identity mismatch, stored for the home page banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityViolation {
    /// What detected the mismatch.
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    /// The ids that were compared, in factor order.
    pub user_ids: Vec<UserId>,
}

impl SecurityViolation {
    /// Human-readable alert text.
    #[must_use]
    pub fn message(&self) -> String {
        let ids = self
            .user_ids
            .iter()
            .map(UserId::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        match self.kind {
            ViolationKind::UserMismatch | ViolationKind::RenderMismatch => format!(
                "Security alert: validated biometrics belong to different users ({ids}). All validations have been reset."
            ),
            ViolationKind::ServerReported => format!(
                "Security alert: the server matched this sample to a different user ({ids}). All validations have been reset."
            ),
        }
    }
}

/// Returns the mismatch among validated factors, if any.
///
/// Factors without an id are skipped. With fewer than two ids there is nothing
/// to compare and the state counts as consistent.
#[must_use]
pub fn find_mismatch(state: &PersistentState) -> Option<SecurityViolation> {
    let ids = state.validated_user_ids();
    let (_, first) = ids.first()?;
    if ids.iter().all(|(_, id)| id == first) {
        return None;
    }
    Some(SecurityViolation {
        kind: ViolationKind::UserMismatch,
        user_ids: ids.into_iter().map(|(_, id)| id.clone()).collect(),
    })
}

/// Whether every validated factor with an id belongs to the same user.
#[must_use]
pub fn users_match(state: &PersistentState) -> bool {
    find_mismatch(state).is_none()
}

/// First pair of validated factors whose ids differ.
#[must_use]
pub fn conflicting_pair(state: &PersistentState) -> Option<(Factor, Factor)> {
    let ids = state.validated_user_ids();
    ids.iter().enumerate().find_map(|(i, (left, left_id))| {
        ids[i + 1..]
            .iter()
            .find(|(_, right_id)| right_id != left_id)
            .map(|(right, _)| (*left, *right))
    })
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn state(entries: &[(Factor, Option<&str>)]) -> PersistentState {
        let mut state = PersistentState::default();
        for (factor, user_id) in entries {
            state.apply(*factor, true, user_id.map(UserId::from));
        }
        state
    }

    #[test_case(&[] ; "no factors")]
    #[test_case(&[(Factor::Face, Some("1"))] ; "one factor")]
    #[test_case(&[(Factor::Face, Some("1")), (Factor::Voice, None)] ; "second factor without id")]
    #[test_case(&[(Factor::Face, Some("3")), (Factor::Retina, Some("3")), (Factor::Proximity, Some("3"))] ; "all same")]
    fn test_consistent(entries: &[(Factor, Option<&str>)]) {
        let state = state(entries);
        assert!(users_match(&state));
        assert!(conflicting_pair(&state).is_none());
    }

    #[test]
    fn test_mismatch_lists_ids_in_factor_order() {
        let state = state(&[(Factor::Voice, Some("2")), (Factor::Face, Some("1"))]);
        let violation = find_mismatch(&state).unwrap();
        assert_eq!(violation.kind, ViolationKind::UserMismatch);
        assert_eq!(violation.user_ids, vec![UserId::from("1"), UserId::from("2")]);
        assert_eq!(conflicting_pair(&state), Some((Factor::Face, Factor::Voice)));
    }

    #[test]
    fn test_numeric_and_string_ids_match() {
        let mut state = PersistentState::default();
        state.apply(Factor::Face, true, Some(UserId::from(7_u64)));
        state.apply(Factor::Voice, true, Some(UserId::from("7")));
        assert!(users_match(&state));
    }

    #[test]
    fn test_invalidated_factor_is_ignored() {
        let mut state = state(&[(Factor::Face, Some("1")), (Factor::Voice, Some("2"))]);
        state.apply(Factor::Voice, false, None);
        assert!(users_match(&state));
    }

    #[test]
    fn test_violation_wire_format() {
        let violation = SecurityViolation {
            kind: ViolationKind::UserMismatch,
            user_ids: vec![UserId::from("1"), UserId::from("2")],
        };
        assert_eq!(
            serde_json::to_value(&violation).unwrap(),
            serde_json::json!({"type": "user_mismatch", "user_ids": ["1", "2"]})
        );
        assert!(violation.message().contains("1, 2"));
    }
}
