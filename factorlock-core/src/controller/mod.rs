//! The validation controller: the single owner of validation state.
//!
//! Capture widgets report results into it; it keeps the durable and session
//! stores in sync and decides when the success sequence or the
//! security-violation flow runs.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::config::ControllerConfig;
use crate::consistency::{conflicting_pair, find_mismatch, SecurityViolation, ViolationKind};
use crate::factor::{Factor, UserId};
use crate::response::{RequestContext, UserBundle, ValidationResponse};
use crate::sequencer::{AnimationSequencer, Navigator};
use crate::state::{PersistentState, SessionState};
use crate::storage::{session_keys, StateStore, StorageResult};

/// Smallest number of user ids that can disagree.
const COMPARABLE_FACTORS: usize = 2;

/// Status of one factor, as reported by [`ValidationController::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactorStatus {
    /// The factor.
    pub factor: Factor,
    /// Durable validation flag.
    pub validated: bool,
    /// User the factor validated for.
    pub user_id: Option<UserId>,
    /// Whether it validated during this session.
    pub session_validated: bool,
}

/// Point-in-time view of the controller state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationSnapshot {
    /// One entry per factor, in [`Factor::ALL`] order.
    pub factors: Vec<FactorStatus>,
    /// Factors validated durably.
    pub valid_count: usize,
    /// Factors validated this session.
    pub session_count: usize,
    /// Whether the welcome presentation already played this session.
    pub welcome_shown: bool,
    /// Whether the success overlay is on screen.
    pub animation_visible: bool,
}

#[derive(Debug, Default)]
struct ControllerState {
    persistent: PersistentState,
    session: SessionState,
    animation_visible: bool,
    bundle: Option<UserBundle>,
    /// The last durable write failed; the store is behind the in-memory map.
    durable_unsaved: bool,
    /// The last session write failed.
    session_unsaved: bool,
}

/// What a state change asks the collaborators to do once the lock is released.
#[derive(Debug)]
enum Outcome {
    Violation {
        violation: SecurityViolation,
        location: String,
    },
    Success {
        label: Option<String>,
    },
    Nothing,
}

/// Multi-factor validation state machine.
///
/// State mutations happen under one lock; collaborators are always invoked
/// after it is released, so a sequencer may call straight back in.
pub struct ValidationController {
    config: ControllerConfig,
    durable: Arc<dyn StateStore>,
    session: Arc<dyn StateStore>,
    sequencer: Arc<dyn AnimationSequencer>,
    navigator: Arc<dyn Navigator>,
    state: Mutex<ControllerState>,
}

impl std::fmt::Debug for ValidationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationController")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ValidationController {
    /// Loads state from both stores and replays the success sequence if this
    /// session already completed multi-factor validation before a reload.
    #[must_use]
    pub fn load(
        config: ControllerConfig,
        durable: Arc<dyn StateStore>,
        session: Arc<dyn StateStore>,
        sequencer: Arc<dyn AnimationSequencer>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let state = ControllerState {
            persistent: PersistentState::load(durable.as_ref()),
            session: SessionState::load(session.as_ref()),
            animation_visible: false,
            bundle: load_bundle(session.as_ref()),
            durable_unsaved: false,
            session_unsaved: false,
        };
        let controller = Self {
            config,
            durable,
            session,
            sequencer,
            navigator,
            state: Mutex::new(state),
        };
        controller.replay_on_load();
        controller
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Records a validation result for `factor` and acts on the new state.
    ///
    /// `user_id` only matters when `is_valid`; an invalidation always clears
    /// the factor's id.
    pub fn set_validated(&self, factor: Factor, is_valid: bool, user_id: Option<UserId>) {
        let outcome = {
            let mut state = self.lock_fresh();
            let is_new_session_validation = is_valid && !state.session.is_validated(factor);

            state.persistent.apply(factor, is_valid, user_id);
            if is_valid {
                state.session.mark_validated(factor);
            }
            self.persist(&mut state);

            let valid_count = state.persistent.valid_count();
            let session_count = state.session.count();
            let mismatch = find_mismatch(&state.persistent);
            if let Some(violation) = &mismatch {
                self.record_violation(violation);
            }
            debug!(
                "{factor} -> {is_valid}: valid_count={valid_count} session_count={session_count} users_match={}",
                mismatch.is_none()
            );

            match mismatch {
                Some(violation) if valid_count >= COMPARABLE_FACTORS => Outcome::Violation {
                    violation,
                    location: self.config.violation_redirect.clone(),
                },
                _ if valid_count >= self.config.min_factors
                    && !state.animation_visible
                    && is_new_session_validation
                    && session_count >= self.config.min_factors =>
                {
                    state.animation_visible = true;
                    Outcome::Success {
                        label: state.bundle.as_ref().map(UserBundle::display_name),
                    }
                }
                _ => {
                    if valid_count < self.config.min_factors {
                        debug!("not enough validated factors yet ({valid_count})");
                    } else if state.animation_visible {
                        debug!("success sequence already visible");
                    } else if !is_new_session_validation {
                        debug!("{factor} was already validated this session");
                    } else {
                        debug!("only {session_count} factors validated this session");
                    }
                    Outcome::Nothing
                }
            }
        };
        self.act(outcome);
    }

    /// Entry point for capture widgets reporting by factor name.
    ///
    /// Unknown factor names are logged and ignored.
    pub fn notify_factor_result(&self, factor: &str, success: bool, user_id: Option<UserId>) {
        match Factor::parse(factor) {
            Ok(factor) => self.set_validated(factor, success, user_id),
            Err(err) => error!("ignoring validation result: {err}"),
        }
    }

    /// Applies a validation server answer for `factor`.
    ///
    /// A server-reported violation runs the violation flow; a success caches
    /// the user bundle and validates the factor; anything else changes nothing.
    pub fn apply_server_response(&self, factor: Factor, response: &ValidationResponse) {
        if response.security_violation {
            let violation = SecurityViolation {
                kind: ViolationKind::ServerReported,
                user_ids: [&response.previous_user_id, &response.current_user_id]
                    .into_iter()
                    .flatten()
                    .cloned()
                    .collect(),
            };
            self.record_violation(&violation);
            let location = response
                .redirect
                .clone()
                .unwrap_or_else(|| self.config.violation_redirect.clone());
            self.act(Outcome::Violation {
                violation,
                location,
            });
            return;
        }

        let Some(bundle) = response.bundle() else {
            info!(
                "{factor} validation rejected: {}",
                response.error.as_deref().unwrap_or("no match")
            );
            return;
        };
        let user_id = bundle.user.id.clone();
        {
            let mut state = self.lock();
            if let Err(err) = save_bundle(self.session.as_ref(), &bundle) {
                error!("failed to cache user bundle: {err}");
            }
            state.bundle = Some(bundle);
        }
        self.set_validated(factor, true, Some(user_id));
    }

    /// Whether every validated factor belongs to the same user.
    ///
    /// A mismatch is recorded in the session store for the home page banner.
    #[must_use]
    pub fn do_validated_biometrics_match_same_user(&self) -> bool {
        let state = self.lock_fresh();
        find_mismatch(&state.persistent).map_or(true, |violation| {
            self.record_violation(&violation);
            false
        })
    }

    /// Render-time re-check, called by the sequencer right before drawing.
    ///
    /// Returns `true` when the sequence may render. On an identity mismatch the
    /// sequence is dropped, all state is reset and the page is redirected.
    #[must_use]
    pub fn confirm_render(&self) -> bool {
        let outcome = {
            let mut state = self.lock_fresh();
            let mismatch = find_mismatch(&state.persistent).or_else(|| {
                conflicting_pair(&state.persistent).map(|(left, right)| SecurityViolation {
                    kind: ViolationKind::RenderMismatch,
                    user_ids: [left, right]
                        .iter()
                        .filter_map(|factor| state.persistent.record(*factor).user_id().cloned())
                        .collect(),
                })
            });
            match mismatch {
                Some(mut violation) => {
                    violation.kind = ViolationKind::RenderMismatch;
                    self.record_violation(&violation);
                    state.animation_visible = false;
                    Outcome::Violation {
                        violation,
                        location: self.config.violation_redirect.clone(),
                    }
                }
                None if state.persistent.valid_count() < self.config.min_factors => {
                    info!("dropping success sequence: validations were withdrawn");
                    state.animation_visible = false;
                    return false;
                }
                None => Outcome::Nothing,
            }
        };
        let render = matches!(outcome, Outcome::Nothing);
        self.act(outcome);
        render
    }

    /// Claims the once-per-session welcome presentation.
    ///
    /// Returns `true` the first time it is called in a session.
    #[must_use]
    pub fn take_welcome(&self) -> bool {
        let mut state = self.lock_fresh();
        if state.session.welcome_shown() {
            return false;
        }
        state.session.set_welcome_shown(true);
        self.persist(&mut state);
        true
    }

    /// Tells the controller the success overlay left the screen.
    pub fn sequence_finished(&self) {
        self.lock().animation_visible = false;
    }

    /// Whether the success overlay is on screen.
    #[must_use]
    pub fn is_animation_visible(&self) -> bool {
        self.lock().animation_visible
    }

    /// Zeroes every validation, session flag, the welcome marker and the cached
    /// user bundle. Idempotent.
    ///
    /// A success overlay still on screen is dismissed through the sequencer.
    pub fn reset_all(&self) {
        let was_visible = {
            let mut state = self.lock();
            let was_visible = state.animation_visible;
            state.persistent.clear();
            state.session.clear();
            state.animation_visible = false;
            state.bundle = None;
            self.persist(&mut state);
            was_visible
        };
        if let Err(err) = self.session.remove(session_keys::USER_DATA) {
            error!("failed to drop cached user bundle: {err}");
        }
        info!("all biometric validations reset");
        if was_visible {
            self.sequencer.hide();
        }
    }

    /// Zeroes the session flags and the welcome marker, keeping durable validations.
    pub fn reset_session_only(&self) {
        let mut state = self.lock_fresh();
        state.session.clear();
        self.persist(&mut state);
        info!("session validations reset");
    }

    /// Current state of every factor.
    #[must_use]
    pub fn snapshot(&self) -> ValidationSnapshot {
        let state = self.lock_fresh();
        ValidationSnapshot {
            factors: Factor::ALL
                .iter()
                .map(|factor| {
                    let record = state.persistent.record(*factor);
                    FactorStatus {
                        factor: *factor,
                        validated: record.is_validated(),
                        user_id: record.user_id().cloned(),
                        session_validated: state.session.is_validated(*factor),
                    }
                })
                .collect(),
            valid_count: state.persistent.valid_count(),
            session_count: state.session.count(),
            welcome_shown: state.session.welcome_shown(),
            animation_visible: state.animation_visible,
        }
    }

    /// What the next capture request should tell the server.
    #[must_use]
    pub fn request_context(&self) -> RequestContext {
        let state = self.lock_fresh();
        RequestContext {
            previous_user_id: state
                .persistent
                .validated_user_ids()
                .first()
                .map(|(_, user_id)| (*user_id).clone()),
            is_second_validation: state.persistent.valid_count() > 0,
        }
    }

    /// The cached user bundle from the last accepted sample.
    #[must_use]
    pub fn user_bundle(&self) -> Option<UserBundle> {
        self.lock().bundle.clone()
    }

    /// The last recorded identity mismatch, if any.
    #[must_use]
    pub fn security_violation(&self) -> Option<SecurityViolation> {
        let flagged = matches!(
            self.session.get(session_keys::SECURITY_VIOLATION),
            Ok(Some(value)) if value == b"true"
        );
        if !flagged {
            return None;
        }
        match self.session.get(session_keys::SECURITY_VIOLATION_DETAILS) {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes)
                .map_err(|err| warn!("discarding malformed violation details: {err}"))
                .ok(),
            Ok(None) => None,
            Err(err) => {
                warn!("failed to read violation details: {err}");
                None
            }
        }
    }

    /// Removes the recorded identity mismatch once the banner was shown.
    pub fn clear_security_violation(&self) {
        let result = self
            .session
            .remove(session_keys::SECURITY_VIOLATION)
            .and_then(|()| self.session.remove(session_keys::SECURITY_VIOLATION_DETAILS));
        if let Err(err) = result {
            error!("failed to clear security violation marker: {err}");
        }
    }

    fn replay_on_load(&self) {
        let outcome = {
            let mut state = self.lock();
            let valid_count = state.persistent.valid_count();
            let session_count = state.session.count();
            if valid_count >= self.config.min_factors
                && session_count >= self.config.min_factors
                && !state.animation_visible
            {
                info!("replaying success sequence ({session_count} factors validated this session)");
                state.animation_visible = true;
                Outcome::Success {
                    label: state.bundle.as_ref().map(UserBundle::display_name),
                }
            } else {
                Outcome::Nothing
            }
        };
        self.act(outcome);
    }

    fn act(&self, outcome: Outcome) {
        match outcome {
            Outcome::Violation {
                violation,
                location,
            } => {
                warn!("security violation: {}", violation.message());
                self.sequencer.play_security_violation(&violation);
                self.reset_all();
                self.navigator
                    .redirect_after(&location, self.config.redirect_delay_ms);
            }
            Outcome::Success { label } => {
                info!("multi-factor validation complete, playing success sequence");
                self.sequencer.play_success_sequence(label);
            }
            Outcome::Nothing => {}
        }
    }

    fn persist(&self, state: &mut ControllerState) {
        let durable = state.persistent.save(self.durable.as_ref());
        if let Err(err) = &durable {
            error!("failed to persist validations: {err}");
        }
        state.durable_unsaved = durable.is_err();

        let session = state.session.save(self.session.as_ref());
        if let Err(err) = &session {
            error!("failed to persist session validations: {err}");
        }
        state.session_unsaved = session.is_err();
    }

    fn record_violation(&self, violation: &SecurityViolation) {
        let result = serde_json::to_vec(violation)
            .map_err(Into::into)
            .and_then(|details| {
                self.session.set(session_keys::SECURITY_VIOLATION, b"true")?;
                self.session
                    .set(session_keys::SECURITY_VIOLATION_DETAILS, &details)
            });
        if let Err(err) = result {
            error!("failed to record security violation: {err}");
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks and re-reads both maps, so writes from other tabs sharing the
    /// durable store are seen before the next read-modify-write.
    ///
    /// A map whose store cannot be read, or whose last write failed, keeps its
    /// in-memory value.
    fn lock_fresh(&self) -> MutexGuard<'_, ControllerState> {
        let mut state = self.lock();
        if !state.durable_unsaved {
            match PersistentState::try_load(self.durable.as_ref()) {
                Ok(persistent) => state.persistent = persistent,
                Err(err) => {
                    warn!("durable store unreadable, keeping in-memory validations: {err}");
                }
            }
        }
        if !state.session_unsaved {
            match SessionState::try_load(self.session.as_ref()) {
                Ok(session) => state.session = session,
                Err(err) => warn!("session store unreadable, keeping in-memory session: {err}"),
            }
        }
        state
    }
}

fn load_bundle(store: &dyn StateStore) -> Option<UserBundle> {
    match store.get(session_keys::USER_DATA) {
        Ok(Some(bytes)) => serde_json::from_slice(&bytes)
            .map_err(|err| warn!("discarding malformed cached user bundle: {err}"))
            .ok(),
        Ok(None) => None,
        Err(err) => {
            warn!("failed to read cached user bundle: {err}");
            None
        }
    }
}

fn save_bundle(store: &dyn StateStore, bundle: &UserBundle) -> StorageResult<()> {
    store.set(session_keys::USER_DATA, &serde_json::to_vec(bundle)?)
}
