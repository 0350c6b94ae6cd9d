//! Outbound collaborators of the controller and the success sequence timeline.
//!
//! The controller only issues commands. Rendering happens later, on the host's
//! schedule, and must be preceded by [`crate::ValidationController::confirm_render`].

use crate::config::SequenceTiming;
use crate::consistency::SecurityViolation;
use crate::storage::MaybeSendSync;

/// Plays the success and security-violation presentations.
///
/// Implementations must not block and must not redirect on their own.
pub trait AnimationSequencer: MaybeSendSync {
    /// Schedules the car-door sequence, labelled with the user's display name when known.
    ///
    /// Before anything is drawn the implementation calls
    /// [`crate::ValidationController::confirm_render`] and drops the sequence if it
    /// returns `false`.
    fn play_success_sequence(&self, user_label: Option<String>);

    /// Shows the identity-mismatch alert. The controller resets state and redirects.
    fn play_security_violation(&self, violation: &SecurityViolation);

    /// Force-dismisses whatever is showing. Safe to call when nothing is.
    fn hide(&self);
}

/// Moves the page elsewhere.
pub trait Navigator: MaybeSendSync {
    /// Navigates to `location` once `delay_ms` has elapsed. Must not block the caller.
    fn redirect_after(&self, location: &str, delay_ms: u64);
}

/// Phase of the success sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencePhase {
    /// Nothing on screen.
    Idle,
    /// Doors are opening; ends at `until_ms`.
    DoorOpening {
        /// Clock value at which the doors finish.
        until_ms: u64,
    },
    /// Welcome presentation is up; auto-dismisses at `until_ms`.
    Welcome {
        /// Clock value at which the welcome auto-dismisses.
        until_ms: u64,
    },
}

/// Observable transitions of a [`SequencePlayer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceEvent {
    /// The door animation started.
    DoorsOpening,
    /// The welcome presentation appeared.
    Welcome {
        /// Name to greet, if known.
        label: Option<String>,
    },
    /// The sequence left the screen.
    Dismissed,
}

/// Clock-driven timeline of the success sequence.
///
/// The player holds no timers. The host feeds it the current time in
/// milliseconds and reacts to the returned events. The welcome phase runs at
/// most once per session: the host passes a gate (normally
/// [`crate::ValidationController::take_welcome`]) that decides whether it runs.
#[derive(Debug, Clone)]
pub struct SequencePlayer {
    timing: SequenceTiming,
    phase: SequencePhase,
    label: Option<String>,
}

impl SequencePlayer {
    /// Creates an idle player.
    #[must_use]
    pub const fn new(timing: SequenceTiming) -> Self {
        Self {
            timing,
            phase: SequencePhase::Idle,
            label: None,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> &SequencePhase {
        &self.phase
    }

    /// Whether anything is on screen.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        !matches!(self.phase, SequencePhase::Idle)
    }

    /// Starts the door animation. Restarting while visible starts over.
    pub fn start(&mut self, now_ms: u64, label: Option<String>) -> SequenceEvent {
        self.label = label;
        self.phase = SequencePhase::DoorOpening {
            until_ms: now_ms.saturating_add(self.timing.door_duration_ms),
        };
        SequenceEvent::DoorsOpening
    }

    /// Advances the timeline to `now_ms`.
    ///
    /// When the doors finish, `take_welcome` is asked whether the welcome may
    /// run; if not, the sequence ends right there.
    pub fn advance(
        &mut self,
        now_ms: u64,
        take_welcome: impl FnOnce() -> bool,
    ) -> Option<SequenceEvent> {
        match self.phase {
            SequencePhase::DoorOpening { until_ms } if now_ms >= until_ms => {
                if take_welcome() {
                    self.phase = SequencePhase::Welcome {
                        until_ms: until_ms.saturating_add(self.timing.welcome_duration_ms),
                    };
                    Some(SequenceEvent::Welcome {
                        label: self.label.clone(),
                    })
                } else {
                    Some(self.finish())
                }
            }
            SequencePhase::Welcome { until_ms } if now_ms >= until_ms => Some(self.finish()),
            _ => None,
        }
    }

    /// Explicit user dismissal. Only the welcome phase can be dismissed.
    pub fn dismiss(&mut self) -> Option<SequenceEvent> {
        matches!(self.phase, SequencePhase::Welcome { .. }).then(|| self.finish())
    }

    /// Force-dismisses from any phase.
    pub fn hide(&mut self) -> Option<SequenceEvent> {
        self.is_visible().then(|| self.finish())
    }

    /// Clock value of the next transition, if one is pending.
    #[must_use]
    pub const fn next_deadline(&self) -> Option<u64> {
        match self.phase {
            SequencePhase::Idle => None,
            SequencePhase::DoorOpening { until_ms } | SequencePhase::Welcome { until_ms } => {
                Some(until_ms)
            }
        }
    }

    fn finish(&mut self) -> SequenceEvent {
        self.phase = SequencePhase::Idle;
        self.label = None;
        SequenceEvent::Dismissed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing() -> SequenceTiming {
        SequenceTiming {
            door_duration_ms: 100,
            welcome_duration_ms: 50,
        }
    }

    #[test]
    fn test_full_timeline() {
        let mut player = SequencePlayer::new(timing());
        assert!(!player.is_visible());

        assert_eq!(
            player.start(1_000, Some("Abi".to_string())),
            SequenceEvent::DoorsOpening
        );
        assert_eq!(player.next_deadline(), Some(1_100));
        assert_eq!(player.advance(1_099, || true), None);
        assert_eq!(
            player.advance(1_100, || true),
            Some(SequenceEvent::Welcome {
                label: Some("Abi".to_string())
            })
        );
        assert_eq!(player.advance(1_149, || true), None);
        assert_eq!(player.advance(1_150, || true), Some(SequenceEvent::Dismissed));
        assert_eq!(player.phase(), &SequencePhase::Idle);
    }

    #[test]
    fn test_welcome_gate_closed_ends_after_doors() {
        let mut player = SequencePlayer::new(timing());
        player.start(0, None);
        assert_eq!(player.advance(500, || false), Some(SequenceEvent::Dismissed));
        assert!(!player.is_visible());
    }

    #[test]
    fn test_dismiss_only_during_welcome() {
        let mut player = SequencePlayer::new(timing());
        player.start(0, None);
        assert_eq!(player.dismiss(), None);
        player.advance(100, || true);
        assert_eq!(player.dismiss(), Some(SequenceEvent::Dismissed));
        assert_eq!(player.dismiss(), None);
    }

    #[test]
    fn test_hide_is_always_safe() {
        let mut player = SequencePlayer::new(timing());
        assert_eq!(player.hide(), None);
        player.start(0, None);
        assert_eq!(player.hide(), Some(SequenceEvent::Dismissed));
        assert_eq!(player.advance(1_000, || panic!("gate must not run")), None);
    }
}
