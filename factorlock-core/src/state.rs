//! Validation state held in the durable and session stores.
//!
//! Both maps are always written back whole. A map that fails to parse is
//! replaced by its all-false default; a store that cannot be read at all is
//! reported to the caller through `try_load`.

use log::warn;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::factor::{Factor, UserId};
use crate::storage::{durable_keys, session_keys, StateStore, StorageResult};

/// Validation status of one factor.
///
/// `user_id` is only ever `Some` while `validated` is true.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationRecord {
    validated: bool,
    user_id: Option<UserId>,
}

impl ValidationRecord {
    /// Whether the factor currently has an accepted sample.
    #[must_use]
    pub const fn is_validated(&self) -> bool {
        self.validated
    }

    /// Identity the server associated with the accepted sample.
    #[must_use]
    pub const fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }
}

/// Per-factor `T` in the layout the stores use on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
struct FactorMap<T> {
    face: T,
    voice: T,
    retina: T,
    proximity: T,
}

impl<T> FactorMap<T> {
    const fn get(&self, factor: Factor) -> &T {
        match factor {
            Factor::Face => &self.face,
            Factor::Voice => &self.voice,
            Factor::Retina => &self.retina,
            Factor::Proximity => &self.proximity,
        }
    }

    fn get_mut(&mut self, factor: Factor) -> &mut T {
        match factor {
            Factor::Face => &mut self.face,
            Factor::Voice => &mut self.voice,
            Factor::Retina => &mut self.retina,
            Factor::Proximity => &mut self.proximity,
        }
    }

    fn from_fn(mut f: impl FnMut(Factor) -> T) -> Self {
        Self {
            face: f(Factor::Face),
            voice: f(Factor::Voice),
            retina: f(Factor::Retina),
            proximity: f(Factor::Proximity),
        }
    }
}

/// Durable per-factor validation records, surviving reloads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistentState {
    records: FactorMap<ValidationRecord>,
}

impl PersistentState {
    /// Reads the state from `store`, defaulting anything absent, malformed or
    /// unreadable.
    pub fn load(store: &dyn StateStore) -> Self {
        Self::try_load(store).unwrap_or_else(|err| {
            warn!("failed to read validations, using defaults: {err}");
            Self::default()
        })
    }

    /// Reads the state from `store`, defaulting anything absent or malformed.
    ///
    /// # Errors
    ///
    /// Returns the store error when a read fails, so callers holding a
    /// previous snapshot can keep it.
    pub fn try_load(store: &dyn StateStore) -> StorageResult<Self> {
        let flags: FactorMap<bool> = read_value(store, durable_keys::VALIDATED_BIOMETRICS)?;
        let mut user_ids: FactorMap<Option<UserId>> =
            read_value(store, durable_keys::VALIDATED_USER_IDS)?;
        Ok(Self {
            records: FactorMap::from_fn(|factor| {
                let validated = *flags.get(factor);
                // An id left behind for an invalidated factor is stale.
                let user_id = user_ids.get_mut(factor).take().filter(|_| validated);
                ValidationRecord { validated, user_id }
            }),
        })
    }

    /// Writes both durable maps back to `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if either write fails.
    pub fn save(&self, store: &dyn StateStore) -> StorageResult<()> {
        let flags = FactorMap::from_fn(|factor| self.records.get(factor).validated);
        let user_ids = FactorMap::from_fn(|factor| self.records.get(factor).user_id.clone());
        store.set(
            durable_keys::VALIDATED_BIOMETRICS,
            &serde_json::to_vec(&flags)?,
        )?;
        store.set(
            durable_keys::VALIDATED_USER_IDS,
            &serde_json::to_vec(&user_ids)?,
        )
    }

    /// The record for `factor`.
    #[must_use]
    pub const fn record(&self, factor: Factor) -> &ValidationRecord {
        self.records.get(factor)
    }

    /// Applies a validation result for `factor`.
    ///
    /// A successful result keeps the previous id when none is given; a failed
    /// result always clears the id.
    pub fn apply(&mut self, factor: Factor, is_valid: bool, user_id: Option<UserId>) {
        let record = self.records.get_mut(factor);
        record.validated = is_valid;
        if is_valid {
            if let Some(user_id) = user_id {
                record.user_id = Some(user_id);
            }
        } else {
            record.user_id = None;
        }
    }

    /// Number of factors currently validated.
    #[must_use]
    pub fn valid_count(&self) -> usize {
        Factor::ALL
            .iter()
            .filter(|factor| self.records.get(**factor).validated)
            .count()
    }

    /// `(factor, id)` for every validated factor that carries an id, in
    /// [`Factor::ALL`] order.
    #[must_use]
    pub fn validated_user_ids(&self) -> Vec<(Factor, &UserId)> {
        Factor::ALL
            .iter()
            .filter_map(|factor| {
                let record = self.records.get(*factor);
                record
                    .user_id
                    .as_ref()
                    .filter(|_| record.validated)
                    .map(|user_id| (*factor, user_id))
            })
            .collect()
    }

    /// Resets every record to unvalidated with no id.
    pub fn clear(&mut self) {
        self.records = FactorMap::default();
    }
}

/// Session-scoped validation flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    validations: FactorMap<bool>,
    welcome_shown: bool,
}

impl SessionState {
    /// Reads the state from `store`, defaulting anything absent, malformed or
    /// unreadable.
    pub fn load(store: &dyn StateStore) -> Self {
        Self::try_load(store).unwrap_or_else(|err| {
            warn!("failed to read session validations, using defaults: {err}");
            Self::default()
        })
    }

    /// Reads the state from `store`, defaulting anything absent or malformed.
    ///
    /// # Errors
    ///
    /// Returns the store error when a read fails.
    pub fn try_load(store: &dyn StateStore) -> StorageResult<Self> {
        Ok(Self {
            validations: read_value(store, session_keys::SESSION_VALIDATIONS)?,
            welcome_shown: read_value(store, session_keys::WELCOME_SHOWN)?,
        })
    }

    /// Writes the session flags and the welcome marker back to `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if either write fails.
    pub fn save(&self, store: &dyn StateStore) -> StorageResult<()> {
        store.set(
            session_keys::SESSION_VALIDATIONS,
            &serde_json::to_vec(&self.validations)?,
        )?;
        if self.welcome_shown {
            store.set(session_keys::WELCOME_SHOWN, b"true")
        } else {
            store.remove(session_keys::WELCOME_SHOWN)
        }
    }

    /// Whether `factor` was validated at least once this session.
    #[must_use]
    pub const fn is_validated(&self, factor: Factor) -> bool {
        *self.validations.get(factor)
    }

    /// Marks `factor` as validated this session.
    pub fn mark_validated(&mut self, factor: Factor) {
        *self.validations.get_mut(factor) = true;
    }

    /// Number of factors validated this session.
    #[must_use]
    pub fn count(&self) -> usize {
        Factor::ALL
            .iter()
            .filter(|factor| *self.validations.get(**factor))
            .count()
    }

    /// Whether the welcome presentation already played this session.
    #[must_use]
    pub const fn welcome_shown(&self) -> bool {
        self.welcome_shown
    }

    /// Records that the welcome presentation played.
    pub fn set_welcome_shown(&mut self, shown: bool) {
        self.welcome_shown = shown;
    }

    /// Clears every session flag and the welcome marker.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Malformed values fall back to the default; read failures are returned.
fn read_value<T: DeserializeOwned + Default>(
    store: &dyn StateStore,
    key: &str,
) -> StorageResult<T> {
    Ok(store.get(key)?.map_or_else(T::default, |bytes| {
        serde_json::from_slice(&bytes).unwrap_or_else(|err| {
            warn!("discarding malformed `{key}` state: {err}");
            T::default()
        })
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_load_defaults_when_empty() {
        let store = MemoryStore::new();
        let state = PersistentState::load(&store);
        assert_eq!(state, PersistentState::default());
        assert_eq!(state.valid_count(), 0);
        assert_eq!(SessionState::load(&store), SessionState::default());
    }

    #[test]
    fn test_save_uses_documented_layout() {
        let store = MemoryStore::new();
        let mut state = PersistentState::default();
        state.apply(Factor::Face, true, Some(UserId::from(7_u64)));
        state.save(&store).unwrap();

        let flags: serde_json::Value = serde_json::from_str(
            &store
                .get_string(durable_keys::VALIDATED_BIOMETRICS)
                .unwrap()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(
            flags,
            serde_json::json!({"face": true, "voice": false, "retina": false, "proximity": false})
        );
        let ids: serde_json::Value = serde_json::from_str(
            &store
                .get_string(durable_keys::VALIDATED_USER_IDS)
                .unwrap()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(
            ids,
            serde_json::json!({"face": "7", "voice": null, "retina": null, "proximity": null})
        );
        assert_eq!(PersistentState::load(&store), state);
    }

    #[test]
    fn test_malformed_map_falls_back_to_default() {
        let store = MemoryStore::with_entries([
            (durable_keys::VALIDATED_BIOMETRICS, "{\"face\": tru"),
            (durable_keys::VALIDATED_USER_IDS, r#"{"face": "1"}"#),
            (session_keys::SESSION_VALIDATIONS, "[1, 2]"),
        ]);
        let state = PersistentState::load(&store);
        assert_eq!(state.valid_count(), 0);
        // The id has no validated flag to belong to.
        assert!(state.record(Factor::Face).user_id().is_none());
        assert_eq!(SessionState::load(&store).count(), 0);
    }

    #[test]
    fn test_invalidation_clears_user_id() {
        let mut state = PersistentState::default();
        state.apply(Factor::Retina, true, Some(UserId::from("9")));
        state.apply(Factor::Retina, true, None);
        assert_eq!(
            state.record(Factor::Retina).user_id(),
            Some(&UserId::from("9"))
        );
        state.apply(Factor::Retina, false, Some(UserId::from("9")));
        assert!(!state.record(Factor::Retina).is_validated());
        assert!(state.record(Factor::Retina).user_id().is_none());
    }

    #[test]
    fn test_session_welcome_marker_round_trip() {
        let store = MemoryStore::new();
        let mut session = SessionState::default();
        session.mark_validated(Factor::Voice);
        session.set_welcome_shown(true);
        session.save(&store).unwrap();
        assert_eq!(
            store.get_string(session_keys::WELCOME_SHOWN).unwrap().as_deref(),
            Some("true")
        );

        let loaded = SessionState::load(&store);
        assert!(loaded.is_validated(Factor::Voice));
        assert!(loaded.welcome_shown());

        let mut cleared = loaded;
        cleared.clear();
        cleared.save(&store).unwrap();
        assert!(store.get(session_keys::WELCOME_SHOWN).unwrap().is_none());
    }
}
