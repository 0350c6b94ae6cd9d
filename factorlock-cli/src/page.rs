//! A terminal stand-in for the browser page hosting the controller.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use eyre::WrapErr;
use factorlock_core::storage::FileStore;
use factorlock_core::{
    AnimationSequencer, ControllerConfig, Navigator, SecurityViolation, SequenceEvent,
    SequencePlayer, ValidationController,
};
use tracing::{debug, info};

const DURABLE_FILE: &str = "durable.json";

/// Session state file for `session`.
pub fn session_file(state_dir: &Path, session: &str) -> PathBuf {
    state_dir.join(format!("session-{session}.json"))
}

/// Queues success requests so they can be rendered after the command ran.
#[derive(Debug, Default)]
pub struct ConsoleSequencer {
    pending: Mutex<Vec<Option<String>>>,
}

impl ConsoleSequencer {
    fn take_pending(&self) -> Option<Option<String>> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        (!pending.is_empty()).then(|| pending.remove(0))
    }

    fn clear(&self) -> usize {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let count = pending.len();
        pending.clear();
        count
    }
}

impl AnimationSequencer for ConsoleSequencer {
    fn play_success_sequence(&self, user_label: Option<String>) {
        debug!(?user_label, "success sequence requested");
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(user_label);
    }

    fn play_security_violation(&self, violation: &SecurityViolation) {
        eprintln!("!! {}", violation.message());
    }

    fn hide(&self) {
        let dropped = self.clear();
        if dropped > 0 {
            debug!(dropped, "pending success sequences hidden");
        }
    }
}

/// Prints where the page would go instead of going there.
#[derive(Debug, Default)]
pub struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn redirect_after(&self, location: &str, delay_ms: u64) {
        println!("redirecting to {location} in {delay_ms} ms");
    }
}

/// One "page load": a controller over the state files of one session.
#[derive(Debug)]
pub struct Page {
    /// The controller.
    pub controller: ValidationController,
    sequencer: Arc<ConsoleSequencer>,
    config: ControllerConfig,
}

impl Page {
    /// Loads the controller from `state_dir`.
    ///
    /// Loading replays the success sequence when the session already completed
    /// validation; the replay stays queued until [`Self::render_pending`] or
    /// [`Self::discard_replay`].
    pub fn load(state_dir: &Path, session: &str, config: ControllerConfig) -> eyre::Result<Self> {
        let durable = FileStore::open(state_dir.join(DURABLE_FILE))
            .wrap_err("failed to open durable state")?;
        let session_store = FileStore::open(session_file(state_dir, session))
            .wrap_err("failed to open session state")?;
        let sequencer = Arc::new(ConsoleSequencer::default());
        let controller = ValidationController::load(
            config.clone(),
            Arc::new(durable),
            Arc::new(session_store),
            Arc::clone(&sequencer) as Arc<dyn AnimationSequencer>,
            Arc::new(ConsoleNavigator),
        );
        Ok(Self {
            controller,
            sequencer,
            config,
        })
    }

    /// Drops the replay queued by loading, for commands that are not a reload.
    pub fn discard_replay(&self) {
        if self.sequencer.clear() > 0 {
            self.controller.sequence_finished();
        }
    }

    /// Plays every queued success sequence. With `fast` the timeline is
    /// stepped without waiting.
    pub async fn render_pending(&self, fast: bool) {
        while let Some(label) = self.sequencer.take_pending() {
            if !self.controller.confirm_render() {
                info!("success sequence dropped, validation state changed");
                continue;
            }
            let mut player = SequencePlayer::new(self.config.sequence);
            let started = Instant::now();
            print_event(&player.start(0, label));
            while let Some(deadline) = player.next_deadline() {
                let now = if fast {
                    deadline
                } else {
                    let elapsed = elapsed_ms(started);
                    if elapsed < deadline {
                        tokio::time::sleep(Duration::from_millis(deadline - elapsed)).await;
                    }
                    elapsed_ms(started)
                };
                if let Some(event) = player.advance(now, || self.controller.take_welcome()) {
                    print_event(&event);
                }
            }
            self.controller.sequence_finished();
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn print_event(event: &SequenceEvent) {
    match event {
        SequenceEvent::DoorsOpening => println!("*** doors opening ***"),
        SequenceEvent::Welcome { label: Some(name) } => println!("*** welcome, {name} ***"),
        SequenceEvent::Welcome { label: None } => println!("*** welcome ***"),
        SequenceEvent::Dismissed => println!("*** sequence finished ***"),
    }
}
