//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use factorlock_core::storage::{FileStore, StateStore};
use factorlock_core::{
    AnimationSequencer, ControllerConfig, Navigator, SecurityViolation, SequenceEvent,
    SequencePlayer, SequenceTiming, ValidationController,
};

/// Sequencer that queues success requests for the test to render later,
/// mimicking a browser sequencer that draws on the next animation frame.
#[derive(Default)]
pub struct QueueingSequencer {
    pending: Mutex<Vec<Option<String>>>,
    violations: Mutex<Vec<SecurityViolation>>,
    hides: Mutex<usize>,
}

impl QueueingSequencer {
    /// Takes the oldest queued success request.
    pub fn take_pending(&self) -> Option<Option<String>> {
        let mut pending = self.pending.lock().unwrap();
        (!pending.is_empty()).then(|| pending.remove(0))
    }

    /// Number of queued success requests.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Alerts shown so far.
    pub fn violations(&self) -> Vec<SecurityViolation> {
        self.violations.lock().unwrap().clone()
    }
}

impl AnimationSequencer for QueueingSequencer {
    fn play_success_sequence(&self, user_label: Option<String>) {
        self.pending.lock().unwrap().push(user_label);
    }

    fn play_security_violation(&self, violation: &SecurityViolation) {
        self.violations.lock().unwrap().push(violation.clone());
    }

    fn hide(&self) {
        *self.hides.lock().unwrap() += 1;
    }
}

/// Navigator that records redirects instead of performing them.
#[derive(Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<(String, u64)>>,
}

impl RecordingNavigator {
    /// Redirects requested so far.
    pub fn redirects(&self) -> Vec<(String, u64)> {
        self.redirects.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect_after(&self, location: &str, delay_ms: u64) {
        self.redirects
            .lock()
            .unwrap()
            .push((location.to_string(), delay_ms));
    }
}

/// One "page load": a controller over file-backed stores plus its collaborators.
pub struct Page {
    /// The controller under test.
    pub controller: ValidationController,
    /// Sequencer collaborator.
    pub sequencer: Arc<QueueingSequencer>,
    /// Navigator collaborator.
    pub navigator: Arc<RecordingNavigator>,
}

impl Page {
    /// Loads a page whose durable state lives in `durable.json` under `root` and
    /// whose session state lives in `session-<session>.json`.
    pub fn load(root: &Path, session: &str) -> Self {
        let durable: Arc<dyn StateStore> =
            Arc::new(FileStore::open(root.join("durable.json")).unwrap());
        let session: Arc<dyn StateStore> =
            Arc::new(FileStore::open(root.join(format!("session-{session}.json"))).unwrap());
        let sequencer = Arc::new(QueueingSequencer::default());
        let navigator = Arc::new(RecordingNavigator::default());
        let config = ControllerConfig {
            sequence: SequenceTiming {
                door_duration_ms: 10,
                welcome_duration_ms: 20,
            },
            ..ControllerConfig::default()
        };
        let controller = ValidationController::load(
            config,
            durable,
            session,
            sequencer.clone(),
            navigator.clone(),
        );
        Self {
            controller,
            sequencer,
            navigator,
        }
    }

    /// Renders the oldest queued success request the way a real sequencer
    /// would, returning the events it produced. Nothing renders when the
    /// controller's re-check fails.
    pub fn render_pending(&self) -> Vec<SequenceEvent> {
        let Some(label) = self.sequencer.take_pending() else {
            return Vec::new();
        };
        if !self.controller.confirm_render() {
            return Vec::new();
        }

        let mut player = SequencePlayer::new(self.controller.config().sequence);
        let mut events = vec![player.start(0, label)];
        while let Some(deadline) = player.next_deadline() {
            if let Some(event) = player.advance(deadline, || self.controller.take_welcome()) {
                events.push(event);
            }
        }
        self.controller.sequence_finished();
        events
    }
}
